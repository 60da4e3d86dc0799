//! Public-key index: for each key touched during a prebuild, resolve an
//! existing registration index or the caller-supplied registration request.

use crate::error::RegistrationError;
use crate::registration::{Registration, RegistrationRequest};
use crate::types::ZetherPoint;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKeyIndexEntry {
    Registered {
        index: u64,
    },
    Pending {
        stakable: bool,
        spend_public_key: Option<ZetherPoint>,
        signature: Vec<u8>,
    },
}

#[derive(Default)]
pub struct PublicKeyIndex {
    entries: HashMap<[u8; 32], PublicKeyIndexEntry>,
}

impl PublicKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the entry for `point` the first time it's seen; subsequent
    /// calls for the same point are no-ops (matching the "only insert once
    /// per public key" behavior of the original construction loop).
    pub fn resolve(
        &mut self,
        point: ZetherPoint,
        registration: Option<&Registration>,
        pending_registration: Option<&RegistrationRequest>,
    ) -> Result<(), RegistrationError> {
        let key = point.to_bytes();
        if self.entries.contains_key(&key) {
            return Ok(());
        }

        let entry = match registration {
            Some(reg) => PublicKeyIndexEntry::Registered { index: reg.index },
            None => match pending_registration {
                Some(req) => PublicKeyIndexEntry::Pending {
                    stakable: req.stakable,
                    spend_public_key: req.spend_public_key,
                    signature: req.signature.clone(),
                },
                None => {
                    return Err(RegistrationError::MissingRegistrationSignature(
                        point.canonical_string(),
                    ))
                }
            },
        };

        self.entries.insert(key, entry);
        Ok(())
    }

    /// Validates that a sender-supplied spend public key (when staked and
    /// not part of a reward pairing) matches the one on file.
    pub fn check_spend_public_key_matches(
        on_file: &Option<ZetherPoint>,
        supplied: &ZetherPoint,
    ) -> Result<(), crate::error::WalletError> {
        match on_file {
            Some(pk) if pk == supplied => Ok(()),
            _ => Err(crate::error::WalletError::SpendPublicKeyMismatch),
        }
    }

    pub fn covers(&self, point: &ZetherPoint) -> bool {
        self.entries.contains_key(&point.to_bytes())
    }

    pub fn get(&self, point: &ZetherPoint) -> Option<&PublicKeyIndexEntry> {
        self.entries.get(&point.to_bytes())
    }

    pub fn into_map(self) -> HashMap<[u8; 32], PublicKeyIndexEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_registration_and_pending_fails() {
        let mut index = PublicKeyIndex::new();
        let point = ZetherPoint::generator();
        let err = index.resolve(point, None, None).unwrap_err();
        assert!(matches!(err, RegistrationError::MissingRegistrationSignature(_)));
    }

    #[test]
    fn pending_registration_is_recorded() {
        let mut index = PublicKeyIndex::new();
        let point = ZetherPoint::generator();
        let request = RegistrationRequest {
            stakable: true,
            spend_public_key: None,
            signature: vec![1, 2, 3],
        };
        index.resolve(point, None, Some(&request)).unwrap();
        assert!(index.covers(&point));
    }

    #[test]
    fn spend_public_key_mismatch_is_rejected() {
        use rand::SeedableRng;
        let on_file = Some(ZetherPoint::generator());
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(99);
        let supplied = ZetherPoint::random(&mut rng);
        assert!(PublicKeyIndex::check_spend_public_key_matches(&on_file, &supplied).is_err());
    }
}
