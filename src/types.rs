//! Scalar types shared across the core: hashes, curve points, asset ids.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Hash = [u8; 32];
pub type PublicKeyBytes = [u8; 32];

/// Canonical native asset id. Mandatory for stake/unstake/reward payloads.
pub const NATIVE_ASSET_FULL: AssetId = AssetId([0u8; 32]);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub [u8; 32]);

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", hex::encode(self.0))
    }
}

impl AssetId {
    pub fn is_native(&self) -> bool {
        *self == NATIVE_ASSET_FULL
    }
}

/// A point on the Ristretto group, standing in for the curve used by the
/// ring/Zether math.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ZetherPoint(pub RistrettoPoint);

impl ZetherPoint {
    pub fn identity() -> Self {
        ZetherPoint(RistrettoPoint::default())
    }

    pub fn generator() -> Self {
        ZetherPoint(RISTRETTO_BASEPOINT_POINT)
    }

    pub fn random(rng: &mut (impl RngCore + rand::CryptoRng)) -> Self {
        ZetherPoint(RistrettoPoint::random(rng))
    }

    pub fn compress(&self) -> CompressedRistretto {
        self.0.compress()
    }

    /// Canonical string form used as the `emap` key: hex of the compressed
    /// 32-byte encoding.
    pub fn canonical_string(&self) -> String {
        hex::encode(self.compress().to_bytes())
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.compress().to_bytes()
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        CompressedRistretto::from_slice(bytes)
            .ok()?
            .decompress()
            .map(ZetherPoint)
    }
}

impl fmt::Debug for ZetherPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZetherPoint({})", self.canonical_string())
    }
}

impl std::ops::Add for ZetherPoint {
    type Output = ZetherPoint;
    fn add(self, rhs: ZetherPoint) -> ZetherPoint {
        ZetherPoint(self.0 + rhs.0)
    }
}

impl std::ops::Sub for ZetherPoint {
    type Output = ZetherPoint;
    fn sub(self, rhs: ZetherPoint) -> ZetherPoint {
        ZetherPoint(self.0 - rhs.0)
    }
}

impl std::ops::Neg for ZetherPoint {
    type Output = ZetherPoint;
    fn neg(self) -> ZetherPoint {
        ZetherPoint(-self.0)
    }
}

/// Homomorphic ElGamal commitment pair, (left, right) = (g^r, h^r * m).
/// Addition of two pairs corresponds to addition of the encoded values.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ElGamal {
    pub left: ZetherPoint,
    pub right: ZetherPoint,
}

impl ElGamal {
    pub fn zero() -> Self {
        ElGamal {
            left: ZetherPoint::identity(),
            right: ZetherPoint::identity(),
        }
    }

    /// Encode `amount` in the clear against the generator; used where a
    /// full re-randomized encryption isn't needed (synthetic accounts,
    /// local test fixtures).
    pub fn encode_amount(amount: u64) -> Self {
        let scalar = Scalar::from(amount);
        ElGamal {
            left: ZetherPoint::identity(),
            right: ZetherPoint(RISTRETTO_BASEPOINT_POINT * scalar),
        }
    }

    pub fn add(self, rhs: ElGamal) -> ElGamal {
        ElGamal {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
        }
    }

    pub fn sub(self, rhs: ElGamal) -> ElGamal {
        ElGamal {
            left: self.left - rhs.left,
            right: self.right - rhs.right,
        }
    }

    pub fn serialize(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.left.to_bytes());
        out[32..].copy_from_slice(&self.right.to_bytes());
        out
    }

    pub fn deserialize(bytes: &[u8; 64]) -> Option<Self> {
        let mut left = [0u8; 32];
        let mut right = [0u8; 32];
        left.copy_from_slice(&bytes[..32]);
        right.copy_from_slice(&bytes[32..]);
        Some(ElGamal {
            left: ZetherPoint::from_bytes(&left)?,
            right: ZetherPoint::from_bytes(&right)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_round_trips_through_bytes() {
        let p = ZetherPoint::generator();
        let bytes = p.to_bytes();
        let back = ZetherPoint::from_bytes(&bytes).unwrap();
        assert_eq!(p.canonical_string(), back.canonical_string());
    }

    #[test]
    fn elgamal_add_sub_is_identity() {
        let a = ElGamal::encode_amount(42);
        let b = ElGamal::encode_amount(7);
        let added = a.add(b);
        let back = added.sub(b);
        assert_eq!(back.right.to_bytes(), a.right.to_bytes());
    }
}
