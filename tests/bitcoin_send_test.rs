//! Bitcoin Transfer Integration Tests
//!
//! Drives `WalletService::send_bitcoin` against the in-memory Esplora and
//! blockchain.info mocks and inspects what was broadcast.
//!
//! Run with: cargo test --test bitcoin_send_test -- --nocapture

mod common;

use bitcoin::{Address, Transaction};
use common::*;
use std::str::FromStr;
use ussd_wallet_core::BitcoinIndexer;

fn decode_tx(hex_tx: &str) -> Transaction {
    bitcoin::consensus::deserialize(&hex::decode(hex_tx).unwrap()).unwrap()
}

fn script_of(address: &str) -> bitcoin::ScriptBuf {
    Address::from_str(address)
        .unwrap()
        .assume_checked()
        .script_pubkey()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_send_selects_two_inputs_with_change() -> anyhow::Result<()> {
    let env = setup().await?;
    let wallet = env.create_wallet(PHONE)?;
    env.ledger.fund_bitcoin(&wallet.bitcoin_address, 50_000)?;
    env.ledger.fund_bitcoin(&wallet.bitcoin_address, 60_000)?;

    let result = env
        .service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 70_000, Some(5))
        .await;
    assert!(result.is_success(), "{:?}", result);

    let txid = result.tx_hash().unwrap().to_string();
    assert_eq!(env.ledger.broadcasts(), vec![txid.clone()]);

    let tx = decode_tx(&env.ledger.bitcoin_transaction(&txid).unwrap());
    assert_eq!(tx.input.len(), 2);
    assert_eq!(tx.output.len(), 2);
    assert_eq!(tx.output[0].value.to_sat(), 70_000);
    assert_eq!(tx.output[0].script_pubkey, script_of(EXTERNAL_BTC_ADDRESS));
    assert_eq!(tx.output[1].value.to_sat(), 38_130);
    assert_eq!(tx.output[1].script_pubkey, script_of(&wallet.bitcoin_address));

    // P2WPKH witness: signature + compressed pubkey
    for input in &tx.input {
        assert_eq!(input.witness.len(), 2);
        assert_eq!(input.witness.nth(1).unwrap().len(), 33);
    }

    match result {
        ussd_wallet_core::TransactionResult::Success(receipt) => {
            assert_eq!(receipt.fee, Some(1_870))
        }
        other => panic!("unexpected {:?}", other),
    }

    // change is spendable again, the funded outputs are gone
    assert_eq!(env.ledger.bitcoin_balance(&wallet.bitcoin_address), 38_130);
    Ok(())
}

#[tokio::test]
async fn test_dust_change_is_folded_into_fee() -> anyhow::Result<()> {
    let env = setup().await?;
    let wallet = env.create_wallet(PHONE)?;
    env.ledger.fund_bitcoin(&wallet.bitcoin_address, 11_676)?;

    let result = env
        .service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 10_000, Some(5))
        .await;
    assert!(result.is_success(), "{:?}", result);

    let tx = decode_tx(
        &env.ledger
            .bitcoin_transaction(result.tx_hash().unwrap())
            .unwrap(),
    );
    assert_eq!(tx.output.len(), 1);
    assert_eq!(tx.output[0].value.to_sat(), 10_000);
    assert_eq!(env.ledger.bitcoin_balance(&wallet.bitcoin_address), 0);
    Ok(())
}

#[tokio::test]
async fn test_insufficient_funds_never_broadcasts() -> anyhow::Result<()> {
    let env = setup().await?;
    let wallet = env.create_wallet(PHONE)?;
    env.ledger.fund_bitcoin(&wallet.bitcoin_address, 10_000)?;

    let result = env
        .service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 9_500, Some(5))
        .await;

    assert!(!result.is_success());
    assert!(result.failure_reason().unwrap().contains("Insufficient funds"));
    assert!(env.ledger.broadcasts().is_empty());
    assert!(!env.ledger.called("POST /esplora/tx"));
    Ok(())
}

#[tokio::test]
async fn test_empty_address_reports_no_utxos() -> anyhow::Result<()> {
    let env = setup().await?;
    env.create_wallet(PHONE)?;

    let result = env
        .service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 1_000, None)
        .await;

    assert!(result
        .failure_reason()
        .unwrap()
        .contains("No spendable outputs"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_recipient_is_rejected_before_any_read() -> anyhow::Result<()> {
    let env = setup().await?;
    env.create_wallet(PHONE)?;

    // mainnet address on a testnet wallet
    let result = env
        .service
        .send_bitcoin(PHONE, "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu", 1_000, None)
        .await;

    assert!(result.failure_reason().unwrap().contains("Invalid input"));
    assert!(!env.ledger.called("/utxo"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_broadcast_is_a_failed_result() -> anyhow::Result<()> {
    let env = setup().await?;
    let wallet = env.create_wallet(PHONE)?;
    env.ledger.fund_bitcoin(&wallet.bitcoin_address, 100_000)?;
    env.ledger.set_broadcast_failure(true);

    let result = env
        .service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 20_000, None)
        .await;

    let reason = result.failure_reason().unwrap();
    assert!(reason.contains("broadcast failed"), "{}", reason);
    assert!(reason.contains("min relay fee not met"), "{}", reason);
    assert_eq!(env.ledger.bitcoin_balance(&wallet.bitcoin_address), 100_000);
    Ok(())
}

#[tokio::test]
async fn test_blockchain_info_indexer() -> anyhow::Result<()> {
    let env = setup_with(|config| config.bitcoin_indexer = BitcoinIndexer::BlockchainInfo).await?;
    let wallet = env.create_wallet(PHONE)?;
    env.ledger.fund_bitcoin(&wallet.bitcoin_address, 50_000)?;
    env.ledger.fund_bitcoin(&wallet.bitcoin_address, 60_000)?;

    let result = env
        .service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 70_000, Some(5))
        .await;
    assert!(result.is_success(), "{:?}", result);

    // txid is computed locally and matches what the mock indexed
    assert_eq!(env.ledger.broadcasts(), vec![result.tx_hash().unwrap().to_string()]);
    assert!(env.ledger.called("POST /blockchain/pushtx"));
    assert!(env.ledger.called("GET /blockchain/rawtx/"));
    assert!(!env.ledger.called("/esplora/"));
    Ok(())
}

#[tokio::test]
async fn test_blockchain_info_empty_address() -> anyhow::Result<()> {
    let env = setup_with(|config| config.bitcoin_indexer = BitcoinIndexer::BlockchainInfo).await?;
    env.create_wallet(PHONE)?;

    let result = env
        .service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 1_000, None)
        .await;

    // "No free outputs" is an empty list, not an outage
    assert!(result
        .failure_reason()
        .unwrap()
        .contains("No spendable outputs"));
    Ok(())
}
