//! Shelley address construction and parsing (CIP-19)

use bech32::{Bech32, Hrp};
use blake2::{Blake2b, Digest};
use typenum::{U28, U32};

use crate::config::CardanoNetwork;
use crate::error::WalletError;

type Blake2b224 = Blake2b<U28>;
type Blake2b256 = Blake2b<U32>;

/// Base address: payment key hash + stake key hash
const HEADER_BASE: u8 = 0b0000_0000;
/// Reward address: stake key hash
const HEADER_REWARD: u8 = 0b1110_0000;

const POOL_HRP: &str = "pool";

/// Key hash used in credentials: blake2b-224 of the verification key
pub fn key_hash(verification_key: &[u8]) -> [u8; 28] {
    let digest = Blake2b224::digest(verification_key);
    let mut out = [0u8; 28];
    out.copy_from_slice(&digest);
    out
}

/// Transaction id: blake2b-256 of the encoded body
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let digest = Blake2b256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn base_address_bytes(
    network: CardanoNetwork,
    payment_hash: &[u8; 28],
    stake_hash: &[u8; 28],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(57);
    bytes.push(HEADER_BASE | network.network_id());
    bytes.extend_from_slice(payment_hash);
    bytes.extend_from_slice(stake_hash);
    bytes
}

pub fn reward_address_bytes(network: CardanoNetwork, stake_hash: &[u8; 28]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(29);
    bytes.push(HEADER_REWARD | network.network_id());
    bytes.extend_from_slice(stake_hash);
    bytes
}

pub fn encode_base_address(
    network: CardanoNetwork,
    payment_hash: &[u8; 28],
    stake_hash: &[u8; 28],
) -> Result<String, WalletError> {
    encode(
        network.address_hrp(),
        &base_address_bytes(network, payment_hash, stake_hash),
    )
}

pub fn encode_reward_address(
    network: CardanoNetwork,
    stake_hash: &[u8; 28],
) -> Result<String, WalletError> {
    encode(network.stake_hrp(), &reward_address_bytes(network, stake_hash))
}

fn encode(hrp: &str, data: &[u8]) -> Result<String, WalletError> {
    let hrp = Hrp::parse(hrp).map_err(|e| WalletError::Derivation(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| WalletError::Derivation(e.to_string()))
}

/// Parse a bech32 payment address for `network` into its raw bytes.
///
/// Only Shelley payment addresses (header types 0-7) are accepted.
pub fn decode_payment_address(
    address: &str,
    network: CardanoNetwork,
) -> Result<Vec<u8>, WalletError> {
    let (hrp, data) = bech32::decode(address)
        .map_err(|e| WalletError::InvalidInput(format!("Invalid address {}: {}", address, e)))?;

    if hrp.to_string().to_lowercase() != network.address_hrp() {
        return Err(WalletError::InvalidInput(format!(
            "Address {} is not a {} address",
            address,
            network.address_hrp()
        )));
    }

    let header = *data
        .first()
        .ok_or_else(|| WalletError::InvalidInput("Empty address payload".into()))?;
    let address_type = header >> 4;
    let network_id = header & 0x0f;

    if address_type > 7 {
        return Err(WalletError::InvalidInput(format!(
            "Address {} cannot receive payments",
            address
        )));
    }
    if network_id != network.network_id() {
        return Err(WalletError::InvalidInput(format!(
            "Address network mismatch: {}",
            address
        )));
    }

    Ok(data)
}

/// Accept a pool id as bech32 (`pool1...`) or 56 hex characters
pub fn parse_pool_id(pool_id: &str) -> Result<[u8; 28], WalletError> {
    let pool_id = pool_id.trim();

    let bytes = if pool_id.starts_with(POOL_HRP) && !is_hex(pool_id) {
        let (hrp, data) = bech32::decode(pool_id)
            .map_err(|e| WalletError::InvalidInput(format!("Invalid pool id: {}", e)))?;
        if hrp.to_string() != POOL_HRP {
            return Err(WalletError::InvalidInput(format!(
                "Invalid pool id prefix: {}",
                hrp
            )));
        }
        data
    } else {
        hex::decode(pool_id)
            .map_err(|e| WalletError::InvalidInput(format!("Invalid pool id: {}", e)))?
    };

    bytes
        .try_into()
        .map_err(|_| WalletError::InvalidInput("Pool id must be 28 bytes".into()))
}

/// Bech32 form of a pool key hash
pub fn encode_pool_id(pool_hash: &[u8; 28]) -> Result<String, WalletError> {
    encode(POOL_HRP, pool_hash)
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}
