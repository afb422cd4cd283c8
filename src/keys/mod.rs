//! Key derivation
//!
//! - Mnemonic generation (24 words, 256-bit entropy)
//! - BIP84 P2WPKH identity for Bitcoin and Lightning
//! - Payment + stake ed25519 identity for Cardano
//!
//! Identities carry mnemonics and public material only. Signing keys are
//! re-derived on demand by the operation that needs them and dropped with it.

mod bitcoin;
mod cardano;

pub use self::bitcoin::BitcoinIdentity;
pub use self::cardano::{CardanoIdentity, CardanoSigningKeys};

use bip39::Mnemonic;
use serde::{Deserialize, Serialize};

use crate::config::WalletConfig;
use crate::error::WalletError;

/// Number of words in every mnemonic this service generates
pub const MNEMONIC_WORDS: usize = 24;

/// Per-user identity holding one independent mnemonic per chain
#[derive(Clone, Debug)]
pub struct WalletIdentity {
    pub wallet_id: String,
    pub bitcoin: BitcoinIdentity,
    pub cardano: CardanoIdentity,
}

/// Public view of an identity, safe to hand to menus and logs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletAddresses {
    pub wallet_id: String,
    pub bitcoin_address: String,
    pub bitcoin_public_key: String,
    pub cardano_payment_address: String,
    pub cardano_stake_address: String,
}

impl WalletIdentity {
    pub fn addresses(&self) -> WalletAddresses {
        WalletAddresses {
            wallet_id: self.wallet_id.clone(),
            bitcoin_address: self.bitcoin.address.clone(),
            bitcoin_public_key: self.bitcoin.public_key.clone(),
            cardano_payment_address: self.cardano.payment_address.clone(),
            cardano_stake_address: self.cardano.stake_address.clone(),
        }
    }
}

/// Derives identities and signing keys for the configured networks
#[derive(Clone, Debug)]
pub struct KeyManager {
    bitcoin_network: ::bitcoin::Network,
    bitcoin_path: String,
    cardano_network: crate::config::CardanoNetwork,
    cardano_payment_path: String,
    cardano_stake_path: String,
}

impl KeyManager {
    pub fn new(config: &WalletConfig) -> Self {
        Self {
            bitcoin_network: config.bitcoin_network,
            bitcoin_path: config.bitcoin_derivation_path(),
            cardano_network: config.cardano_network,
            cardano_payment_path: config.cardano_payment_path(),
            cardano_stake_path: config.cardano_stake_path(),
        }
    }

    /// Generate a fresh 24-word mnemonic from 256 bits of OS entropy
    pub fn generate_mnemonic() -> Result<Mnemonic, WalletError> {
        let entropy = ::bitcoin::secp256k1::rand::random::<[u8; 32]>();

        Mnemonic::from_entropy(&entropy).map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
    }

    /// Parse a stored mnemonic phrase
    pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, WalletError> {
        let mnemonic =
            Mnemonic::parse(words).map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

        if mnemonic.word_count() != MNEMONIC_WORDS {
            return Err(WalletError::InvalidMnemonic(format!(
                "expected {} words, got {}",
                MNEMONIC_WORDS,
                mnemonic.word_count()
            )));
        }

        Ok(mnemonic)
    }

    /// Create a brand new identity: one fresh mnemonic per chain and a new wallet id
    pub fn derive_wallet(&self) -> Result<WalletIdentity, WalletError> {
        let bitcoin = self.derive_bitcoin(Self::generate_mnemonic()?)?;
        let cardano = self.derive_cardano(Self::generate_mnemonic()?)?;
        let wallet_id = format!("wallet_{}", uuid::Uuid::new_v4().simple());

        log::info!(
            "Derived wallet {} (bitcoin {}, cardano {})",
            wallet_id,
            bitcoin.address,
            cardano.payment_address
        );

        Ok(WalletIdentity {
            wallet_id,
            bitcoin,
            cardano,
        })
    }

    /// Rebuild an identity from stored mnemonics
    pub fn restore_wallet(
        &self,
        wallet_id: &str,
        bitcoin_mnemonic: &str,
        cardano_mnemonic: &str,
    ) -> Result<WalletIdentity, WalletError> {
        Ok(WalletIdentity {
            wallet_id: wallet_id.to_string(),
            bitcoin: self.derive_bitcoin(Self::parse_mnemonic(bitcoin_mnemonic)?)?,
            cardano: self.derive_cardano(Self::parse_mnemonic(cardano_mnemonic)?)?,
        })
    }

    pub fn derive_bitcoin(&self, mnemonic: Mnemonic) -> Result<BitcoinIdentity, WalletError> {
        BitcoinIdentity::derive(mnemonic, &self.bitcoin_path, self.bitcoin_network)
    }

    pub fn derive_cardano(&self, mnemonic: Mnemonic) -> Result<CardanoIdentity, WalletError> {
        CardanoIdentity::derive(
            mnemonic,
            &self.cardano_payment_path,
            &self.cardano_stake_path,
            self.cardano_network,
        )
    }

    pub fn bitcoin_network(&self) -> ::bitcoin::Network {
        self.bitcoin_network
    }

    pub fn cardano_network(&self) -> crate::config::CardanoNetwork {
        self.cardano_network
    }
}
