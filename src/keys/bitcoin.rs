use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, Network, PrivateKey};
use std::fmt;
use std::str::FromStr;

use crate::error::WalletError;

/// Single-key native segwit identity (BIP84)
#[derive(Clone)]
pub struct BitcoinIdentity {
    mnemonic: Mnemonic,
    pub derivation_path: String,
    /// Compressed public key, hex
    pub public_key: String,
    pub address: String,
    pub network: Network,
}

impl BitcoinIdentity {
    /// Derive the BIP84 key at `path` and its P2WPKH address
    pub(crate) fn derive(
        mnemonic: Mnemonic,
        path: &str,
        network: Network,
    ) -> Result<Self, WalletError> {
        let private_key = derive_private_key(&mnemonic, path, network)?;
        let secp = Secp256k1::new();
        let compressed = CompressedPublicKey::from_private_key(&secp, &private_key)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;
        let address = Address::p2wpkh(&compressed, network);

        Ok(Self {
            mnemonic,
            derivation_path: path.to_string(),
            public_key: hex::encode(compressed.to_bytes()),
            address: address.to_string(),
            network,
        })
    }

    pub fn mnemonic_phrase(&self) -> String {
        self.mnemonic.to_string()
    }

    /// Parsed, network-checked address of this identity
    pub fn address(&self) -> Result<Address, WalletError> {
        Address::from_str(&self.address)
            .map_err(|e| WalletError::Derivation(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| WalletError::Derivation(e.to_string()))
    }

    /// Re-derive the signing key for this identity.
    ///
    /// Fails with a derivation error if the key no longer produces the stored address.
    pub fn signing_key(&self) -> Result<PrivateKey, WalletError> {
        let private_key = derive_private_key(&self.mnemonic, &self.derivation_path, self.network)?;
        let secp = Secp256k1::new();
        let compressed = CompressedPublicKey::from_private_key(&secp, &private_key)
            .map_err(|e| WalletError::Derivation(e.to_string()))?;

        if hex::encode(compressed.to_bytes()) != self.public_key {
            return Err(WalletError::Derivation(
                "re-derived key does not match the stored public key".into(),
            ));
        }

        Ok(private_key)
    }
}

impl fmt::Debug for BitcoinIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitcoinIdentity")
            .field("derivation_path", &self.derivation_path)
            .field("public_key", &self.public_key)
            .field("address", &self.address)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

fn derive_private_key(
    mnemonic: &Mnemonic,
    path: &str,
    network: Network,
) -> Result<PrivateKey, WalletError> {
    let seed = mnemonic.to_seed("");
    let secp = Secp256k1::new();

    let master_key =
        Xpriv::new_master(network, &seed).map_err(|e| WalletError::Derivation(e.to_string()))?;
    let path =
        DerivationPath::from_str(path).map_err(|e| WalletError::Derivation(e.to_string()))?;
    let derived_key = master_key
        .derive_priv(&secp, &path)
        .map_err(|e| WalletError::Derivation(e.to_string()))?;

    Ok(PrivateKey::new(derived_key.private_key, network))
}
