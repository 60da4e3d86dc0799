//! Simple (non-Zether) transactions: delegate updates, unstakes, claims.

use crate::codec::{CodecError, Reader, WireCodec, Writer, MAX_BLOB_LEN};
use crate::error::{StateError, ValidationError};
use crate::plain_account::PlainAccount;
use crate::types::{Hash, PublicKeyBytes};
use sha3::{Digest, Sha3_256};

pub const TRANSACTIONS_MAX_DATA_LENGTH: u64 = 1 << 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptType {
    UpdateDelegate,
    Unstake,
    Claim,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataVersion {
    None,
    Plain,
    Encrypted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vin {
    pub public_key: PublicKeyBytes,
    pub signature: Vec<u8>,
}

pub const SIGNATURE_LEN: usize = 64;

impl Vin {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.signature.is_empty() && self.signature.len() != SIGNATURE_LEN {
            return Err(ValidationError::SignatureSizeMismatch {
                expected: SIGNATURE_LEN,
                got: self.signature.len(),
            });
        }
        Ok(())
    }
}

/// Script-specific payload attached to a simple transaction. `Claim` moves
/// the account's accrued claimable fees into its stake-available line;
/// `Unstake`/`UpdateDelegate` touch the delegated-stake record directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimpleExtra {
    UpdateDelegate { stake_delta: u64, sign: bool },
    Unstake { amount: u64, activation_height: u64 },
    Claim,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSimple {
    pub script: ScriptType,
    pub data_version: DataVersion,
    pub data: Vec<u8>,
    pub nonce: u64,
    pub fee: u64,
    pub vin: Vin,
    pub extra: SimpleExtra,
}

impl TransactionSimple {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.vin.validate()?;
        match self.data_version {
            DataVersion::None => {
                if !self.data.is_empty() {
                    return Err(ValidationError::InvalidDataLength);
                }
            }
            DataVersion::Plain | DataVersion::Encrypted => {
                if self.data.is_empty() || self.data.len() as u64 > TRANSACTIONS_MAX_DATA_LENGTH {
                    return Err(ValidationError::InvalidDataLength);
                }
            }
        }
        Ok(())
    }

    /// Applies the transaction against `plain_acc`: nonce check/increment,
    /// script-specific fee handling, then the script's own effect. Returns
    /// the native-asset balance credit the caller must apply to the
    /// account's encrypted balance (non-zero only for `Unstake`, whose
    /// queued entries later resolve through `RefreshDelegatedStake`; here
    /// the fee itself is routed to stake-available or claimable).
    pub fn include_transaction(&self, plain_acc: &mut PlainAccount) -> Result<(), StateError> {
        plain_acc.check_nonce(self.nonce)?;
        plain_acc.increment_nonce()?;

        match self.script {
            ScriptType::UpdateDelegate | ScriptType::Unstake => {
                let stake = plain_acc
                    .delegated_stake
                    .get_or_insert_with(Default::default);
                stake.add_stake_available(false, self.fee)?;
            }
            ScriptType::Claim => {
                plain_acc.add_claimable(false, self.fee)?;
            }
        }

        match &self.extra {
            SimpleExtra::UpdateDelegate { stake_delta, sign } => {
                let stake = plain_acc
                    .delegated_stake
                    .get_or_insert_with(Default::default);
                stake.add_stake_available(*sign, *stake_delta)?;
            }
            SimpleExtra::Unstake {
                amount,
                activation_height,
            } => {
                let stake = plain_acc
                    .delegated_stake
                    .get_or_insert_with(Default::default);
                stake.add_stake_available(false, *amount)?;
                stake.pending.push(crate::plain_account::StakePending {
                    activation_height: *activation_height,
                    amount: *amount,
                    kind: crate::plain_account::StakePendingKind::Unstake,
                });
            }
            SimpleExtra::Claim => {}
        }

        Ok(())
    }

    pub fn compute_all_keys(&self) -> [PublicKeyBytes; 1] {
        [self.vin.public_key]
    }

    /// Hash for signing: domain-separated SHA3 over the canonical
    /// serialization with signature bytes omitted.
    pub fn hash_for_signing(&self) -> Hash {
        let mut writer = Writer::new();
        self.encode_advanced(&mut writer, false);
        let mut hasher = Sha3_256::new();
        hasher.update(b"zether-core/tx-simple/v1");
        hasher.update(writer.into_bytes());
        hasher.finalize().into()
    }

    fn encode_advanced(&self, w: &mut Writer, include_signature: bool) {
        w.write_uvarint(match self.script {
            ScriptType::UpdateDelegate => 0,
            ScriptType::Unstake => 1,
            ScriptType::Claim => 2,
        });
        w.write_byte(match self.data_version {
            DataVersion::None => 0,
            DataVersion::Plain => 1,
            DataVersion::Encrypted => 2,
        });
        if !matches!(self.data_version, DataVersion::None) {
            w.write_blob(&self.data);
        }
        w.write_uvarint(self.nonce);
        w.write_uvarint(self.fee);
        w.write_blob(&self.vin.public_key);
        if include_signature {
            w.write_blob(&self.vin.signature);
        }
        self.encode_extra(w);
    }

    fn encode_extra(&self, w: &mut Writer) {
        match &self.extra {
            SimpleExtra::UpdateDelegate { stake_delta, sign } => {
                w.write_uvarint(*stake_delta);
                w.write_byte(*sign as u8);
            }
            SimpleExtra::Unstake {
                amount,
                activation_height,
            } => {
                w.write_uvarint(*amount);
                w.write_uvarint(*activation_height);
            }
            SimpleExtra::Claim => {}
        }
    }
}

impl WireCodec for TransactionSimple {
    fn encode(&self, w: &mut Writer) {
        self.encode_advanced(w, true);
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let script = match r.read_uvarint()? {
            0 => ScriptType::UpdateDelegate,
            1 => ScriptType::Unstake,
            2 => ScriptType::Claim,
            other => return Err(CodecError::InvalidTag(other as u8)),
        };

        let data_version = match r.read_byte()? {
            0 => DataVersion::None,
            1 => DataVersion::Plain,
            2 => DataVersion::Encrypted,
            other => return Err(CodecError::InvalidTag(other)),
        };
        let data = if matches!(data_version, DataVersion::None) {
            Vec::new()
        } else {
            r.read_blob(TRANSACTIONS_MAX_DATA_LENGTH)?
        };

        let nonce = r.read_uvarint()?;
        let fee = r.read_uvarint()?;

        let pk_bytes = r.read_blob(32)?;
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&pk_bytes);
        let signature = r.read_blob(MAX_BLOB_LEN)?;

        let extra = match script {
            ScriptType::UpdateDelegate => SimpleExtra::UpdateDelegate {
                stake_delta: r.read_uvarint()?,
                sign: r.read_byte()? != 0,
            },
            ScriptType::Unstake => SimpleExtra::Unstake {
                amount: r.read_uvarint()?,
                activation_height: r.read_uvarint()?,
            },
            ScriptType::Claim => SimpleExtra::Claim,
        };

        Ok(TransactionSimple {
            script,
            data_version,
            data,
            nonce,
            fee,
            vin: Vin {
                public_key,
                signature,
            },
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransactionSimple {
        TransactionSimple {
            script: ScriptType::UpdateDelegate,
            data_version: DataVersion::None,
            data: Vec::new(),
            nonce: 5,
            fee: 10,
            vin: Vin {
                public_key: [1u8; 32],
                signature: vec![0u8; SIGNATURE_LEN],
            },
            extra: SimpleExtra::UpdateDelegate {
                stake_delta: 0,
                sign: true,
            },
        }
    }

    #[test]
    fn simple_update_delegate_end_to_end() {
        let mut acc = PlainAccount::new([1u8; 32]);
        acc.nonce = 5;
        acc.delegated_stake = Some(crate::plain_account::DelegatedStake {
            stake_available: 1000,
            pending: Vec::new(),
        });

        let tx = sample();
        tx.include_transaction(&mut acc).unwrap();
        assert_eq!(acc.nonce, 6);
        assert_eq!(acc.delegated_stake_available(), 990);
    }

    #[test]
    fn nonce_mismatch_rejects_tx() {
        let mut acc = PlainAccount::new([1u8; 32]);
        acc.nonce = 5;
        acc.delegated_stake = Some(crate::plain_account::DelegatedStake {
            stake_available: 1000,
            pending: Vec::new(),
        });

        let mut tx = sample();
        tx.nonce = 4;
        let err = tx.include_transaction(&mut acc).unwrap_err();
        assert!(matches!(
            err,
            StateError::NonceMismatch {
                expected: 5,
                got: 4
            }
        ));
    }

    #[test]
    fn hash_for_signing_is_independent_of_signature_bytes() {
        let mut tx = sample();
        let hash_empty = tx.hash_for_signing();
        tx.vin.signature = vec![0xffu8; SIGNATURE_LEN];
        let hash_filled = tx.hash_for_signing();
        assert_eq!(hash_empty, hash_filled);
    }

    #[test]
    fn round_trips_through_codec() {
        let tx = sample();
        let bytes = tx.to_bytes();
        let back = TransactionSimple::from_bytes(&bytes).unwrap();
        assert_eq!(tx, back);
    }
}
