//! Stake delegation, reward withdrawal and deregistration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::parse_pool_id;
use super::client::CardanoLedger;
use super::send::{submit_intent, CardanoSubmission};
use super::transaction::{Certificate, TxIntent, Withdrawal};
use crate::error::WalletError;
use crate::keys::CardanoIdentity;

/// Headroom for the deposit (2 ADA) and fee (0.5 ADA) of a first delegation
pub const REGISTRATION_BUFFER: u64 = 2_000_000;
pub const DELEGATION_BUFFER: u64 = 500_000;
pub const DEREGISTRATION_BUFFER: u64 = 300_000;
pub const WITHDRAWAL_BUFFER: u64 = 200_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRewards {
    /// Lovelace earned over the account's lifetime
    pub total_rewards: u64,
    pub withdrawable_rewards: u64,
    pub current_epoch: u64,
    pub next_epoch_time: DateTime<Utc>,
    pub pool_id: Option<String>,
    pub active: bool,
}

/// Reward totals for the identity's stake address
pub async fn stake_rewards(
    ledger: &dyn CardanoLedger,
    identity: &CardanoIdentity,
) -> Result<StakeRewards, WalletError> {
    let epoch = ledger.latest_epoch().await?;
    let account = ledger.account(&identity.stake_address).await?;

    Ok(match account {
        Some(account) => StakeRewards {
            total_rewards: account.rewards_sum,
            withdrawable_rewards: account.withdrawable_amount,
            current_epoch: epoch.epoch,
            next_epoch_time: epoch.end_time,
            pool_id: account.pool_id,
            active: account.active,
        },
        None => StakeRewards {
            total_rewards: 0,
            withdrawable_rewards: 0,
            current_epoch: epoch.epoch,
            next_epoch_time: epoch.end_time,
            pool_id: None,
            active: false,
        },
    })
}

/// Delegate to `pool_id`, registering the stake key first if it is not registered yet
pub async fn delegate_stake(
    ledger: &dyn CardanoLedger,
    identity: &CardanoIdentity,
    pool_id: &str,
) -> Result<CardanoSubmission, WalletError> {
    let pool_key_hash = parse_pool_id(pool_id)?;
    let stake_key_hash = identity.stake_key_hash;

    let registered = ledger
        .account(&identity.stake_address)
        .await?
        .map(|account| account.active)
        .unwrap_or(false);

    let mut certificates = Vec::with_capacity(2);
    let mut selection_target = DELEGATION_BUFFER;
    if !registered {
        certificates.push(Certificate::StakeRegistration { stake_key_hash });
        selection_target += REGISTRATION_BUFFER;
    }
    certificates.push(Certificate::StakeDelegation {
        stake_key_hash,
        pool_key_hash,
    });

    log::info!(
        "Delegating {} to pool {} (registration: {})",
        identity.stake_address,
        pool_id,
        !registered
    );

    let intent = TxIntent {
        certificates,
        selection_target,
        ..Default::default()
    };
    submit_intent(ledger, identity, &intent).await
}

/// Withdraw the full withdrawable reward balance to the payment address
pub async fn withdraw_rewards(
    ledger: &dyn CardanoLedger,
    identity: &CardanoIdentity,
) -> Result<CardanoSubmission, WalletError> {
    let withdrawable = ledger
        .account(&identity.stake_address)
        .await?
        .map(|account| account.withdrawable_amount)
        .unwrap_or(0);

    if withdrawable == 0 {
        return Err(WalletError::NoRewards(identity.stake_address.clone()));
    }

    log::info!(
        "Withdrawing {} lovelace from {}",
        withdrawable,
        identity.stake_address
    );

    let intent = TxIntent {
        withdrawals: vec![Withdrawal {
            reward_address: identity.stake_address_bytes(),
            lovelace: withdrawable,
        }],
        selection_target: WITHDRAWAL_BUFFER,
        ..Default::default()
    };
    submit_intent(ledger, identity, &intent).await
}

/// Deregister the stake key, reclaiming the deposit and any remaining rewards
pub async fn deregister_stake(
    ledger: &dyn CardanoLedger,
    identity: &CardanoIdentity,
) -> Result<CardanoSubmission, WalletError> {
    let account = ledger
        .account(&identity.stake_address)
        .await?
        .filter(|account| account.active)
        .ok_or_else(|| WalletError::StakeNotActive(identity.stake_address.clone()))?;

    let mut withdrawals = Vec::new();
    if account.withdrawable_amount > 0 {
        withdrawals.push(Withdrawal {
            reward_address: identity.stake_address_bytes(),
            lovelace: account.withdrawable_amount,
        });
    }

    log::info!(
        "Deregistering {} and withdrawing {} lovelace in rewards",
        identity.stake_address,
        account.withdrawable_amount
    );

    let intent = TxIntent {
        certificates: vec![Certificate::StakeDeregistration {
            stake_key_hash: identity.stake_key_hash,
        }],
        withdrawals,
        selection_target: DEREGISTRATION_BUFFER,
        ..Default::default()
    };
    submit_intent(ledger, identity, &intent).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardano::address::blake2b_256;
    use crate::cardano::cbor::{self, Value};
    use crate::cardano::client::{CardanoUtxo, EpochInfo, ProtocolParameters, StakeAccount};
    use crate::config::WalletConfig;
    use crate::keys::KeyManager;
    use async_trait::async_trait;
    use bip39::Mnemonic;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct MockLedger {
        account: Option<StakeAccount>,
        utxos: Vec<CardanoUtxo>,
        calls: Mutex<Vec<&'static str>>,
        submitted: Mutex<Vec<Vec<u8>>>,
    }

    impl MockLedger {
        fn new(account: Option<StakeAccount>) -> Self {
            Self {
                account,
                utxos: vec![CardanoUtxo {
                    tx_hash: hex::encode([4u8; 32]),
                    output_index: 0,
                    lovelace: 20_000_000,
                    has_assets: false,
                }],
                calls: Mutex::new(Vec::new()),
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn called(&self, name: &str) -> bool {
            self.calls.lock().unwrap().iter().any(|c| *c == name)
        }

        fn submitted_body(&self) -> Value {
            let submitted = self.submitted.lock().unwrap();
            let tx = cbor::decode(&submitted[0]).unwrap();
            tx.as_array().unwrap()[0].clone()
        }
    }

    #[async_trait]
    impl CardanoLedger for MockLedger {
        async fn list_utxos(&self, _address: &str) -> Result<Vec<CardanoUtxo>, WalletError> {
            self.calls.lock().unwrap().push("list_utxos");
            Ok(self.utxos.clone())
        }

        async fn address_balance(&self, _address: &str) -> Result<u64, WalletError> {
            Ok(self.utxos.iter().map(|u| u.lovelace).sum())
        }

        async fn protocol_parameters(&self) -> Result<ProtocolParameters, WalletError> {
            self.calls.lock().unwrap().push("protocol_parameters");
            Ok(ProtocolParameters {
                min_fee_a: 44,
                min_fee_b: 155_381,
                key_deposit: 2_000_000,
            })
        }

        async fn tip_slot(&self) -> Result<u64, WalletError> {
            Ok(50_000)
        }

        async fn latest_epoch(&self) -> Result<EpochInfo, WalletError> {
            Ok(EpochInfo {
                epoch: 412,
                start_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                end_time: Utc.timestamp_opt(1_700_432_000, 0).unwrap(),
            })
        }

        async fn account(&self, _stake: &str) -> Result<Option<StakeAccount>, WalletError> {
            self.calls.lock().unwrap().push("account");
            Ok(self.account.clone())
        }

        async fn submit(&self, tx_cbor: &[u8]) -> Result<String, WalletError> {
            self.submitted.lock().unwrap().push(tx_cbor.to_vec());
            let body_len = cbor::item_len(&tx_cbor[1..])?;
            Ok(hex::encode(blake2b_256(&tx_cbor[1..1 + body_len])))
        }
    }

    fn identity() -> CardanoIdentity {
        KeyManager::new(&WalletConfig::default())
            .derive_cardano(Mnemonic::from_entropy(&[3u8; 32]).unwrap())
            .unwrap()
    }

    fn account(active: bool, withdrawable: u64) -> StakeAccount {
        StakeAccount {
            stake_address: identity().stake_address,
            active,
            controlled_amount: 20_000_000,
            rewards_sum: withdrawable + 1_000,
            withdrawable_amount: withdrawable,
            pool_id: None,
        }
    }

    const POOL: &str = "0f292fcaa02b8b2f9b3c8f9fd8e0bb21abedb692a6d5058df3ef2735";

    #[tokio::test]
    async fn test_withdraw_without_rewards_fails_before_utxo_fetch() {
        let ledger = MockLedger::new(Some(account(true, 0)));
        let err = withdraw_rewards(&ledger, &identity()).await.unwrap_err();

        assert!(matches!(err, WalletError::NoRewards(_)));
        assert!(!ledger.called("list_utxos"));
        assert!(!ledger.called("protocol_parameters"));
    }

    #[tokio::test]
    async fn test_withdraw_unknown_account_is_no_rewards() {
        let ledger = MockLedger::new(None);
        assert!(matches!(
            withdraw_rewards(&ledger, &identity()).await,
            Err(WalletError::NoRewards(_))
        ));
    }

    #[tokio::test]
    async fn test_withdraw_attaches_full_amount() {
        let ledger = MockLedger::new(Some(account(true, 3_210_000)));
        let identity = identity();
        let submission = withdraw_rewards(&ledger, &identity).await.unwrap();

        let body = ledger.submitted_body();
        let withdrawals = body.get(5).unwrap();
        match withdrawals {
            Value::Map(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].0.as_bytes().unwrap(), identity.stake_address_bytes());
                assert_eq!(entries[0].1.as_uint(), Some(3_210_000));
            }
            other => panic!("unexpected withdrawals {:?}", other),
        }
        assert_eq!(body.get(3).and_then(Value::as_uint), Some(53_600));
        assert_eq!(
            20_000_000 + 3_210_000,
            submission.fee + submission.change
        );
    }

    #[tokio::test]
    async fn test_unstake_inactive_account() {
        let ledger = MockLedger::new(Some(account(false, 0)));
        assert!(matches!(
            deregister_stake(&ledger, &identity()).await,
            Err(WalletError::StakeNotActive(_))
        ));
        assert!(!ledger.called("list_utxos"));

        let ledger = MockLedger::new(None);
        assert!(matches!(
            deregister_stake(&ledger, &identity()).await,
            Err(WalletError::StakeNotActive(_))
        ));
    }

    #[tokio::test]
    async fn test_unstake_refunds_deposit() {
        let ledger = MockLedger::new(Some(account(true, 0)));
        let submission = deregister_stake(&ledger, &identity()).await.unwrap();

        let body = ledger.submitted_body();
        assert!(body.get(5).is_none());
        let certs = body.get(4).and_then(Value::as_array).unwrap();
        assert_eq!(certs[0].as_array().unwrap()[0].as_uint(), Some(1));
        assert_eq!(20_000_000 + 2_000_000, submission.fee + submission.change);
    }

    #[tokio::test]
    async fn test_first_delegation_registers_key() {
        let ledger = MockLedger::new(None);
        let submission = delegate_stake(&ledger, &identity(), POOL).await.unwrap();

        let body = ledger.submitted_body();
        let certs = body.get(4).and_then(Value::as_array).unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].as_array().unwrap()[0].as_uint(), Some(0));
        assert_eq!(certs[1].as_array().unwrap()[0].as_uint(), Some(2));
        assert_eq!(20_000_000, submission.fee + submission.change + 2_000_000);

        let submitted = ledger.submitted.lock().unwrap();
        let tx = cbor::decode(&submitted[0]).unwrap();
        let witnesses = tx.as_array().unwrap()[1].get(0).and_then(Value::as_array).unwrap();
        assert_eq!(witnesses.len(), 2);
    }

    #[tokio::test]
    async fn test_redelegation_skips_registration() {
        let ledger = MockLedger::new(Some(account(true, 0)));
        let submission = delegate_stake(&ledger, &identity(), POOL).await.unwrap();

        let certs_len = ledger
            .submitted_body()
            .get(4)
            .and_then(Value::as_array)
            .map(|c| c.len());
        assert_eq!(certs_len, Some(1));
        assert_eq!(20_000_000, submission.fee + submission.change);
    }

    #[tokio::test]
    async fn test_bad_pool_id() {
        let ledger = MockLedger::new(None);
        assert!(matches!(
            delegate_stake(&ledger, &identity(), "not-a-pool").await,
            Err(WalletError::InvalidInput(_))
        ));
        assert!(!ledger.called("account"));
    }

    #[tokio::test]
    async fn test_rewards_report() {
        let ledger = MockLedger::new(Some(account(true, 7_000)));
        let rewards = stake_rewards(&ledger, &identity()).await.unwrap();

        assert_eq!(rewards.current_epoch, 412);
        assert_eq!(rewards.withdrawable_rewards, 7_000);
        assert_eq!(rewards.total_rewards, 8_000);
        assert_eq!(rewards.next_epoch_time.timestamp(), 1_700_432_000);
    }
}
