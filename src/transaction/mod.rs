//! Closed tagged variant over the two transaction kinds, dispatched through
//! a common capability set (serialize, validate, compute keys, hash).

pub mod simple;
pub mod zether;

use crate::codec::{CodecError, Reader, WireCodec, Writer};
use crate::error::ValidationError;
use crate::types::{Hash, PublicKeyBytes};
use simple::TransactionSimple;
use zether::TransactionZether;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Simple(TransactionSimple),
    Zether(TransactionZether),
}

impl Transaction {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Transaction::Simple(tx) => tx.validate(),
            Transaction::Zether(tx) => tx.validate(),
        }
    }

    pub fn compute_all_keys(&self) -> Vec<PublicKeyBytes> {
        match self {
            Transaction::Simple(tx) => tx.compute_all_keys().to_vec(),
            Transaction::Zether(tx) => tx.compute_all_keys(),
        }
    }

    pub fn hash(&self) -> Hash {
        match self {
            Transaction::Simple(tx) => tx.hash_for_signing(),
            Transaction::Zether(tx) => tx.hash(),
        }
    }

    pub fn hash_string(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn is_zether(&self) -> bool {
        matches!(self, Transaction::Zether(_))
    }
}

impl WireCodec for Transaction {
    fn encode(&self, w: &mut Writer) {
        match self {
            Transaction::Simple(tx) => {
                w.write_byte(0);
                tx.encode(w);
            }
            Transaction::Zether(tx) => {
                w.write_byte(1);
                tx.encode(w);
            }
        }
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        match r.read_byte()? {
            0 => Ok(Transaction::Simple(TransactionSimple::decode(r)?)),
            1 => Ok(Transaction::Zether(TransactionZether::decode(r)?)),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}
