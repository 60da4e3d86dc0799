//! Per-asset account: an encrypted balance under one public key.

use crate::codec::{CodecError, Reader, WireCodec, Writer, MAX_BLOB_LEN};
use crate::error::ValidationError;
use crate::types::{AssetId, ElGamal};

/// Encrypted balance for one (account, asset) pair, homomorphic under
/// ElGamal addition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Balance {
    pub amount: ElGamal,
}

impl Balance {
    pub fn zero() -> Self {
        Balance {
            amount: ElGamal::zero(),
        }
    }

    /// Adjusts the balance by the ElGamal encoding of `amt` in the given
    /// direction. Signed so callers don't need a separate subtract path.
    pub fn add_balance(&mut self, sign: bool, amt: u64) {
        let delta = ElGamal::encode_amount(amt);
        self.amount = if sign {
            self.amount.add(delta)
        } else {
            self.amount.sub(delta)
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub version: u64,
    pub asset: AssetId,
    pub balance: Balance,
}

impl Account {
    pub fn new(asset: AssetId) -> Self {
        Account {
            version: 0,
            asset,
            balance: Balance::zero(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version != 0 {
            return Err(ValidationError::InvalidVersion);
        }
        Ok(())
    }

    /// True when the account carries no balance worth keeping around.
    pub fn is_empty(&self) -> bool {
        self.balance.amount == ElGamal::zero()
    }
}

impl WireCodec for Account {
    fn encode(&self, w: &mut Writer) {
        w.write_uvarint(self.version);
        w.write_blob(&self.asset.0);
        w.write_blob(&self.balance.amount.serialize());
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let version = r.read_uvarint()?;
        let asset_bytes = r.read_blob(32)?;
        let mut asset = [0u8; 32];
        asset.copy_from_slice(&asset_bytes);

        let balance_bytes = r.read_blob(MAX_BLOB_LEN)?;
        let mut fixed = [0u8; 64];
        if balance_bytes.len() != 64 {
            return Err(CodecError::LengthExceeded(balance_bytes.len() as u64, 64));
        }
        fixed.copy_from_slice(&balance_bytes);
        let amount = ElGamal::deserialize(&fixed).ok_or(CodecError::InvalidTag(0))?;

        Ok(Account {
            version,
            asset: AssetId(asset),
            balance: Balance { amount },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_subtract_is_a_no_op() {
        let mut balance = Balance::zero();
        balance.add_balance(true, 500);
        balance.add_balance(false, 500);
        assert_eq!(balance.amount, ElGamal::zero());
    }

    #[test]
    fn account_round_trips_through_codec() {
        let mut acc = Account::new(AssetId([7u8; 32]));
        acc.balance.add_balance(true, 12345);
        let bytes = acc.to_bytes();
        let back = Account::from_bytes(&bytes).unwrap();
        assert_eq!(acc, back);
    }
}
