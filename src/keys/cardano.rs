use bip39::Mnemonic;
use ed25519_dalek::{SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;

use crate::cardano::address;
use crate::config::CardanoNetwork;
use crate::error::WalletError;

type HmacSha512 = Hmac<Sha512>;

const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Payment + stake key identity with its base and reward addresses
#[derive(Clone)]
pub struct CardanoIdentity {
    mnemonic: Mnemonic,
    pub payment_path: String,
    pub stake_path: String,
    /// Payment verification key, hex
    pub payment_public_key: String,
    /// Stake verification key, hex
    pub stake_public_key: String,
    pub payment_key_hash: [u8; 28],
    pub stake_key_hash: [u8; 28],
    /// Bech32 base address (payment + stake credential)
    pub payment_address: String,
    /// Bech32 reward address
    pub stake_address: String,
    pub network: CardanoNetwork,
}

/// Signing keys for one operation. Zeroized on drop.
pub struct CardanoSigningKeys {
    pub payment: SigningKey,
    pub stake: SigningKey,
}

impl CardanoIdentity {
    pub(crate) fn derive(
        mnemonic: Mnemonic,
        payment_path: &str,
        stake_path: &str,
        network: CardanoNetwork,
    ) -> Result<Self, WalletError> {
        let keys = derive_signing_keys(&mnemonic, payment_path, stake_path)?;
        let payment_vk = keys.payment.verifying_key();
        let stake_vk = keys.stake.verifying_key();

        let payment_key_hash = address::key_hash(payment_vk.as_bytes());
        let stake_key_hash = address::key_hash(stake_vk.as_bytes());

        let payment_address = address::encode_base_address(
            network,
            &payment_key_hash,
            &stake_key_hash,
        )?;
        let stake_address = address::encode_reward_address(network, &stake_key_hash)?;

        Ok(Self {
            mnemonic,
            payment_path: payment_path.to_string(),
            stake_path: stake_path.to_string(),
            payment_public_key: hex::encode(payment_vk.as_bytes()),
            stake_public_key: hex::encode(stake_vk.as_bytes()),
            payment_key_hash,
            stake_key_hash,
            payment_address,
            stake_address,
            network,
        })
    }

    pub fn mnemonic_phrase(&self) -> String {
        self.mnemonic.to_string()
    }

    /// Re-derive both signing keys, checking them against the stored public keys
    pub fn signing_keys(&self) -> Result<CardanoSigningKeys, WalletError> {
        let keys = derive_signing_keys(&self.mnemonic, &self.payment_path, &self.stake_path)?;

        if hex::encode(keys.payment.verifying_key().as_bytes()) != self.payment_public_key
            || hex::encode(keys.stake.verifying_key().as_bytes()) != self.stake_public_key
        {
            return Err(WalletError::Derivation(
                "re-derived keys do not match the stored verification keys".into(),
            ));
        }

        Ok(keys)
    }

    /// Reward address in raw header + hash form
    pub fn stake_address_bytes(&self) -> Vec<u8> {
        address::reward_address_bytes(self.network, &self.stake_key_hash)
    }

    pub fn payment_verifying_key(&self) -> Result<VerifyingKey, WalletError> {
        parse_verifying_key(&self.payment_public_key)
    }

    pub fn stake_verifying_key(&self) -> Result<VerifyingKey, WalletError> {
        parse_verifying_key(&self.stake_public_key)
    }
}

impl fmt::Debug for CardanoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardanoIdentity")
            .field("payment_path", &self.payment_path)
            .field("stake_path", &self.stake_path)
            .field("payment_address", &self.payment_address)
            .field("stake_address", &self.stake_address)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

fn parse_verifying_key(hex_key: &str) -> Result<VerifyingKey, WalletError> {
    let bytes: [u8; 32] = hex::decode(hex_key)
        .map_err(|e| WalletError::Derivation(e.to_string()))?
        .try_into()
        .map_err(|_| WalletError::Derivation("verification key must be 32 bytes".into()))?;

    VerifyingKey::from_bytes(&bytes).map_err(|e| WalletError::Derivation(e.to_string()))
}

fn derive_signing_keys(
    mnemonic: &Mnemonic,
    payment_path: &str,
    stake_path: &str,
) -> Result<CardanoSigningKeys, WalletError> {
    let seed = mnemonic.to_seed("");

    Ok(CardanoSigningKeys {
        payment: SigningKey::from_bytes(&derive_ed25519(&seed, payment_path)?),
        stake: SigningKey::from_bytes(&derive_ed25519(&seed, stake_path)?),
    })
}

/// SLIP-0010 ed25519 derivation. Only hardened indices exist for this curve.
pub(crate) fn derive_ed25519(seed: &[u8], path: &str) -> Result<[u8; 32], WalletError> {
    let (mut key, mut chain_code) = hmac_split(ED25519_SEED_KEY, &[seed])?;

    for index in parse_hardened_path(path)? {
        let index_bytes = (index | HARDENED_OFFSET).to_be_bytes();
        let parts: [&[u8]; 3] = [&[0u8], &key, &index_bytes];
        let (child_key, child_chain) = hmac_split(&chain_code, &parts)?;
        key = child_key;
        chain_code = child_chain;
    }

    Ok(key)
}

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32]), WalletError> {
    let mut mac =
        HmacSha512::new_from_slice(key).map_err(|e| WalletError::Derivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let output = mac.finalize().into_bytes();

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    Ok((left, right))
}

fn parse_hardened_path(path: &str) -> Result<Vec<u32>, WalletError> {
    let mut segments = path.split('/');
    if segments.next() != Some("m") {
        return Err(WalletError::Derivation(format!(
            "path must start with 'm': {}",
            path
        )));
    }

    segments
        .map(|segment| {
            let digits = segment
                .strip_suffix('\'')
                .or_else(|| segment.strip_suffix('h'))
                .ok_or_else(|| {
                    WalletError::Derivation(format!(
                        "ed25519 derivation needs hardened indices, got '{}'",
                        segment
                    ))
                })?;
            let index: u32 = digits
                .parse()
                .map_err(|_| WalletError::Derivation(format!("bad path index '{}'", segment)))?;
            if index >= HARDENED_OFFSET {
                return Err(WalletError::Derivation(format!(
                    "path index out of range '{}'",
                    segment
                )));
            }
            Ok(index)
        })
        .collect()
}
