//! Wallet collaborator: key storage and password handling live outside
//! this crate, so the prebuilder only sees this trait and a mock double
//! in tests.

use crate::error::WalletError;
use crate::types::{AssetId, ZetherPoint};

pub struct WalletAddress {
    pub public_key: [u8; 32],
    pub private_key: Option<[u8; 32]>,
    pub spend_private_key: Option<[u8; 32]>,
    pub spend_public_key: Option<ZetherPoint>,
}

pub trait WalletBackend: Send + Sync {
    fn get_wallet_address_by_encoded_address(
        &self,
        encoded_address: &str,
    ) -> Result<WalletAddress, WalletError>;

    /// Decrypts the sender's balance. `hint` seeds a bounded search when
    /// `has_hint` is true; otherwise the search is unbounded (costly, and
    /// the reason the prebuilder takes this under a suspendable context).
    fn decrypt_balance_by_public_key(
        &self,
        public_key: &[u8; 32],
        encrypted_balance: &[u8; 64],
        asset: AssetId,
        has_hint: bool,
        hint: u64,
    ) -> Result<u64, WalletError>;
}

/// Deterministic test double: every address decodes to a fixed key pair
/// and decrypts to a caller-configured balance.
pub struct MockWallet {
    pub balances: std::collections::HashMap<[u8; 32], u64>,
}

impl MockWallet {
    pub fn new() -> Self {
        MockWallet {
            balances: std::collections::HashMap::new(),
        }
    }

    pub fn with_balance(mut self, public_key: [u8; 32], balance: u64) -> Self {
        self.balances.insert(public_key, balance);
        self
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletBackend for MockWallet {
    fn get_wallet_address_by_encoded_address(
        &self,
        encoded_address: &str,
    ) -> Result<WalletAddress, WalletError> {
        let mut public_key = [0u8; 32];
        let decoded = hex::decode(encoded_address).unwrap_or_else(|_| encoded_address.as_bytes().to_vec());
        let n = decoded.len().min(32);
        public_key[..n].copy_from_slice(&decoded[..n]);

        if !self.balances.contains_key(&public_key) {
            return Err(WalletError::PrivateKeyMissing);
        }

        Ok(WalletAddress {
            public_key,
            private_key: Some(public_key),
            spend_private_key: None,
            spend_public_key: None,
        })
    }

    fn decrypt_balance_by_public_key(
        &self,
        public_key: &[u8; 32],
        _encrypted_balance: &[u8; 64],
        _asset: AssetId,
        _has_hint: bool,
        _hint: u64,
    ) -> Result<u64, WalletError> {
        self.balances
            .get(public_key)
            .copied()
            .ok_or(WalletError::PrivateKeyMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_wallet_decrypts_configured_balance() {
        let wallet = MockWallet::new().with_balance([1u8; 32], 1000);
        let balance = wallet
            .decrypt_balance_by_public_key(&[1u8; 32], &[0u8; 64], AssetId([0u8; 32]), false, 0)
            .unwrap();
        assert_eq!(balance, 1000);
    }

    #[test]
    fn mock_wallet_rejects_unknown_key() {
        let wallet = MockWallet::new();
        assert!(wallet
            .decrypt_balance_by_public_key(&[9u8; 32], &[0u8; 64], AssetId([0u8; 32]), false, 0)
            .is_err());
    }
}
