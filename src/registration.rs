//! Registration table: public key <-> dense index, plus stakability and an
//! optional spend public key for staked accounts.

use crate::codec::{CodecError, Reader, WireCodec, Writer, MAX_BLOB_LEN};
use crate::types::{PublicKeyBytes, ZetherPoint};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub public_key: PublicKeyBytes,
    pub index: u64,
    pub stakable: bool,
    pub spend_public_key: Option<ZetherPoint>,
}

impl WireCodec for Registration {
    fn encode(&self, w: &mut Writer) {
        w.write_uvarint(self.index);
        w.write_byte(self.stakable as u8);
        match &self.spend_public_key {
            None => w.write_byte(0),
            Some(pk) => {
                w.write_byte(1);
                w.write_blob(&pk.to_bytes());
            }
        }
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let index = r.read_uvarint()?;
        let stakable = r.read_byte()? != 0;
        let spend_public_key = match r.read_byte()? {
            0 => None,
            1 => {
                let bytes = r.read_blob(MAX_BLOB_LEN)?;
                let mut fixed = [0u8; 32];
                if bytes.len() != 32 {
                    return Err(CodecError::LengthExceeded(bytes.len() as u64, 32));
                }
                fixed.copy_from_slice(&bytes);
                Some(ZetherPoint::from_bytes(&fixed).ok_or(CodecError::InvalidTag(1))?)
            }
            other => return Err(CodecError::InvalidTag(other)),
        };

        Ok(Registration {
            public_key: [0u8; 32],
            index,
            stakable,
            spend_public_key,
        })
    }
}

/// Caller-supplied registration payload for a public key not yet on the
/// registration table. Carried through the prebuilder when a ring member
/// (most commonly a fresh synthetic account) has no existing index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub stakable: bool,
    pub spend_public_key: Option<ZetherPoint>,
    pub signature: Vec<u8>,
}
