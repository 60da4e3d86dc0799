//! Encrypted-balance cache: per-(asset, curve-point) snapshot of the latest
//! encrypted balance, folded forward over pending transactions.

use crate::account::Account;
use crate::transaction::Transaction;
use crate::types::{AssetId, ElGamal, ZetherPoint};
use std::collections::HashMap;

#[derive(Default)]
pub struct EncryptedBalanceMap {
    balances: HashMap<AssetId, HashMap<String, ElGamal>>,
    has_rollover: HashMap<String, bool>,
}

impl EncryptedBalanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up (or builds, folding `pending_txs`) the current encrypted
    /// balance for `point` under `asset`. Pure given `(existing_account,
    /// pending_txs)`: the cache itself has no external side effects.
    pub fn get_zether_balance(
        &mut self,
        point: ZetherPoint,
        asset: AssetId,
        existing_account: Option<&Account>,
        stakable: bool,
        pending_txs: &[Transaction],
    ) -> ElGamal {
        let key = point.canonical_string();

        if let Some(balance) = self.balances.get(&asset).and_then(|m| m.get(&key)) {
            return *balance;
        }

        let mut balance = existing_account
            .map(|acc| acc.balance.amount)
            .unwrap_or_else(ElGamal::zero);

        for tx in pending_txs {
            if let Transaction::Zether(zether) = tx {
                for payload in &zether.payloads {
                    if payload.asset != asset {
                        continue;
                    }
                    for (i, ring_point) in payload.statement.ring_public_keys.iter().enumerate() {
                        if *ring_point == point {
                            if let Some(delta) = payload.statement.commitments.get(i) {
                                balance = balance.add(*delta);
                            }
                        }
                    }
                }
            }
        }

        self.has_rollover
            .insert(key.clone(), existing_account.is_some() && stakable);
        self.balances
            .entry(asset)
            .or_default()
            .insert(key, balance);
        balance
    }

    pub fn has_rollover(&self, point: &ZetherPoint) -> bool {
        self.has_rollover
            .get(&point.canonical_string())
            .copied()
            .unwrap_or(false)
    }

    pub fn into_parts(self) -> (HashMap<AssetId, HashMap<String, ElGamal>>, HashMap<String, bool>) {
        (self.balances, self.has_rollover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::zether::{Payload, Statement, TransactionZether, ZetherExtra};

    fn payload_touching(point: ZetherPoint, delta: ElGamal, asset: AssetId) -> Payload {
        Payload {
            index: 0,
            asset,
            burn_value: 0,
            statement: Statement {
                ring_public_keys: vec![point],
                commitments: vec![delta],
                proof: Vec::new(),
            },
            extra: ZetherExtra::None,
            nonce: vec![1],
        }
    }

    #[test]
    fn missing_account_starts_from_zero_and_folds_pending() {
        let asset = AssetId([0u8; 32]);
        let point = ZetherPoint::generator();
        let delta = ElGamal::encode_amount(5);
        let pending = vec![Transaction::Zether(TransactionZether {
            payloads: vec![payload_touching(point, delta, asset)],
        })];

        let mut emap = EncryptedBalanceMap::new();
        let balance = emap.get_zether_balance(point, asset, None, false, &pending);
        assert_eq!(balance, ElGamal::zero().add(delta));
    }

    #[test]
    fn lookup_is_idempotent_for_same_snapshot_and_pending() {
        let asset = AssetId([1u8; 32]);
        let point = ZetherPoint::generator();
        let mut emap = EncryptedBalanceMap::new();
        let first = emap.get_zether_balance(point, asset, None, true, &[]);
        let second = emap.get_zether_balance(point, asset, None, true, &[]);
        assert_eq!(first, second);
        assert!(emap.has_rollover(&point) == false);
    }
}
