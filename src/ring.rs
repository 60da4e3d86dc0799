//! Ring sampler: builds sender/recipient anonymity sets for a Zether
//! payload from a mix of explicit members, synthetic accounts, and random
//! real accounts.

use crate::error::ValidationError;
use crate::types::{AssetId, ZetherPoint};
use rand::Rng;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingSideConfig {
    pub require_staked_accounts: bool,
    pub include_members: Vec<ZetherPoint>,
    /// -1 requests the probabilistic default.
    pub new_accounts: i32,
}

impl Default for RingSideConfig {
    fn default() -> Self {
        RingSideConfig {
            require_staked_accounts: false,
            include_members: Vec::new(),
            new_accounts: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingConfig {
    /// -1 requests the probabilistic default.
    pub ring_size: i32,
    pub sender: RingSideConfig,
    pub recipient: RingSideConfig,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            ring_size: -1,
            sender: RingSideConfig::default(),
            recipient: RingSideConfig::default(),
        }
    }
}

/// A candidate real account the sampler may draw into a ring.
#[derive(Clone, Copy, Debug)]
pub struct CandidateAccount {
    pub point: ZetherPoint,
    pub stakable: bool,
    pub has_spend_public_key: bool,
}

/// Abstracts the store lookups the sampler needs: how many accounts exist
/// for an asset, and drawing one at random. Kept as a trait so tests can
/// supply a fixed in-memory population without a store.
pub trait AccountSource {
    fn count(&self, asset: AssetId) -> u64;
    fn random_account(&self, asset: AssetId, rng: &mut dyn rand::RngCore) -> Option<CandidateAccount>;
}

/// Resolves `ring_size == -1` and `new_accounts == -1` to concrete values
/// via the documented probability tables, then validates the result.
pub fn preset_ring_config(config: &mut RingConfig, rng: &mut impl Rng) -> Result<(), ValidationError> {
    if config.ring_size == -1 {
        let p = rng.gen_range(0..1000);
        config.ring_size = if p < 400 {
            32
        } else if p < 600 {
            64
        } else if p < 800 {
            128
        } else {
            256
        };
    }
    if config.recipient.new_accounts == -1 {
        let p = rng.gen_range(0..1000);
        config.recipient.new_accounts = if p < 800 {
            0
        } else if p < 900 {
            1
        } else {
            2
        };
    }
    if config.sender.new_accounts == -1 {
        let p = rng.gen_range(0..1000);
        config.sender.new_accounts = if p < 800 {
            0
        } else if p < 900 {
            1
        } else {
            2
        };
    }

    if config.ring_size <= 0 {
        return Err(ValidationError::InvalidRingConfig(
            "ring size must be positive".into(),
        ));
    }
    if !(config.ring_size as u32).is_power_of_two() {
        return Err(ValidationError::InvalidRingConfig(
            "ring size must be a power of two".into(),
        ));
    }
    let max_new = config.ring_size / 2 - 1;
    if config.recipient.new_accounts < 0 || config.recipient.new_accounts > max_new {
        return Err(ValidationError::InvalidRingConfig(format!(
            "new_accounts must be in [0, {max_new}]"
        )));
    }
    if config.sender.new_accounts < 0 || config.sender.new_accounts > max_new {
        return Err(ValidationError::InvalidRingConfig(format!(
            "new_accounts must be in [0, {max_new}]"
        )));
    }
    Ok(())
}

pub struct RingSampler<'a> {
    rng: &'a mut dyn rand::RngCore,
    already_used: HashSet<[u8; 32]>,
}

impl<'a> RingSampler<'a> {
    pub fn new(rng: &'a mut dyn rand::RngCore) -> Self {
        RingSampler {
            rng,
            already_used: HashSet::new(),
        }
    }

    fn mark_used(&mut self, point: &ZetherPoint) -> bool {
        self.already_used.insert(point.to_bytes())
    }

    fn is_used(&self, point: &ZetherPoint) -> bool {
        self.already_used.contains(&point.to_bytes())
    }

    fn draw_random_point(&mut self) -> ZetherPoint {
        ZetherPoint::random(&mut RngCoreMut(&mut *self.rng))
    }

    /// Resolves the principal (sender or recipient) for one side: if
    /// `principal` is `None`, draws a uniformly random account meeting the
    /// stakability constraint; otherwise validates the supplied point is
    /// unused.
    fn resolve_principal(
        &mut self,
        principal: Option<ZetherPoint>,
        require_staked: bool,
        asset: AssetId,
        accounts: &dyn AccountSource,
    ) -> Result<ZetherPoint, ValidationError> {
        let point = match principal {
            Some(p) => p,
            None => {
                if accounts.count(asset) == self.already_used.len() as u64 {
                    return Err(ValidationError::InvalidRingConfig(
                        "accounts have only member, impossible to get random recipient".into(),
                    ));
                }
                loop {
                    let candidate = accounts.random_account(asset, &mut RngCoreMut(&mut *self.rng));
                    let candidate = match candidate {
                        Some(c) => c,
                        None => self.draw_random_point().into_candidate(),
                    };
                    if require_staked && !candidate.stakable {
                        continue;
                    }
                    if !require_staked && candidate.has_spend_public_key {
                        continue;
                    }
                    if self.is_used(&candidate.point) {
                        continue;
                    }
                    break candidate.point;
                }
            }
        };
        if !self.mark_used(&point) {
            return Err(ValidationError::InvalidRingConfig(
                "address was used before".into(),
            ));
        }
        Ok(point)
    }

    fn include_members(&mut self, ring: &mut Vec<ZetherPoint>, members: &[ZetherPoint]) {
        for member in members {
            if self.mark_used(member) {
                ring.push(*member);
            }
        }
    }

    fn fill_new_accounts(&mut self, ring: &mut Vec<ZetherPoint>, count: i32, half_minus_one: i32) {
        let mut added = 0;
        while added < count && (ring.len() as i32) < half_minus_one {
            let point = self.draw_random_point();
            if self.mark_used(&point) {
                ring.push(point);
                added += 1;
            }
        }
    }

    fn fill_random_real_accounts(
        &mut self,
        ring: &mut Vec<ZetherPoint>,
        half_minus_one: i32,
        require_staked: bool,
        asset: AssetId,
        accounts: &dyn AccountSource,
    ) {
        while (ring.len() as i32) < half_minus_one {
            let candidate = if accounts.count(asset) <= self.already_used.len() as u64 {
                self.draw_random_point().into_candidate()
            } else {
                match accounts.random_account(asset, &mut RngCoreMut(&mut *self.rng)) {
                    Some(c) => {
                        if (require_staked && !c.stakable) || (!require_staked && c.has_spend_public_key) {
                            continue;
                        }
                        c
                    }
                    None => self.draw_random_point().into_candidate(),
                }
            };
            if self.mark_used(&candidate.point) {
                ring.push(candidate.point);
            }
        }
    }

    /// Builds a single ring half around one principal, for payloads where
    /// sender and recipient are the same party (a staking reward credited
    /// back to the staker) and only one decoy set is needed.
    pub fn create_self_ring(
        &mut self,
        principal: Option<ZetherPoint>,
        asset: AssetId,
        config: &RingConfig,
        accounts: &dyn AccountSource,
    ) -> Result<(ZetherPoint, Vec<ZetherPoint>), ValidationError> {
        let point =
            self.resolve_principal(principal, config.sender.require_staked_accounts, asset, accounts)?;

        let half_minus_one = config.ring_size / 2 - 1;
        let mut ring = Vec::new();
        self.include_members(&mut ring, &config.sender.include_members);
        self.fill_new_accounts(&mut ring, config.sender.new_accounts, half_minus_one);
        self.fill_random_real_accounts(
            &mut ring,
            half_minus_one,
            config.sender.require_staked_accounts,
            asset,
            accounts,
        );
        Ok((point, ring))
    }

    /// Builds one full ring configuration (sender side + recipient side)
    /// for a single payload, given a ring config already resolved by
    /// `preset_ring_config`.
    pub fn create_ring(
        &mut self,
        sender: Option<ZetherPoint>,
        recipient: Option<ZetherPoint>,
        asset: AssetId,
        config: &RingConfig,
        accounts: &dyn AccountSource,
    ) -> Result<(ZetherPoint, ZetherPoint, Vec<ZetherPoint>, Vec<ZetherPoint>), ValidationError> {
        let sender_point =
            self.resolve_principal(sender, config.sender.require_staked_accounts, asset, accounts)?;
        let recipient_point = self.resolve_principal(
            recipient,
            config.sender.require_staked_accounts,
            asset,
            accounts,
        )?;

        let half_minus_one = config.ring_size / 2 - 1;

        let mut sender_ring = Vec::new();
        let mut recipient_ring = Vec::new();

        self.include_members(&mut sender_ring, &config.sender.include_members);
        self.include_members(&mut recipient_ring, &config.recipient.include_members);

        self.fill_new_accounts(&mut sender_ring, config.sender.new_accounts, half_minus_one);
        self.fill_new_accounts(&mut recipient_ring, config.recipient.new_accounts, half_minus_one);

        self.fill_random_real_accounts(
            &mut sender_ring,
            half_minus_one,
            config.sender.require_staked_accounts,
            asset,
            accounts,
        );
        self.fill_random_real_accounts(
            &mut recipient_ring,
            half_minus_one,
            config.sender.require_staked_accounts,
            asset,
            accounts,
        );

        Ok((sender_point, recipient_point, sender_ring, recipient_ring))
    }
}

impl ZetherPoint {
    fn into_candidate(self) -> CandidateAccount {
        CandidateAccount {
            point: self,
            stakable: false,
            has_spend_public_key: false,
        }
    }
}

/// Adapter so `rand::RngCore` trait objects satisfy `RngCore` by value
/// where the dalek API wants a concrete generic.
struct RngCoreMut<'a>(&'a mut dyn rand::RngCore);

impl<'a> rand::RngCore for RngCoreMut<'a> {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}

// Callers always construct `RingSampler` with a cryptographically secure
// RNG (see tests and prebuilder.rs); this marker just lets the type-erased
// `dyn RngCore` satisfy dalek's `CryptoRngCore` bound through the adapter.
impl<'a> rand::CryptoRng for RngCoreMut<'a> {}

/// Fisher-Yates permutation over `[0, ring_size)`, used to map logical
/// positions (sender at 0, recipient at 1, decoys after) into the order
/// the prover witnesses.
pub fn shuffle_witness_indexes(ring_size: u32, rng: &mut impl Rng) -> Vec<u32> {
    let mut indexes: Vec<u32> = (0..ring_size).collect();
    for i in (1..indexes.len()).rev() {
        let j = rng.gen_range(0..=i);
        indexes.swap(i, j);
    }
    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct FixedPopulation {
        points: Vec<ZetherPoint>,
    }

    impl AccountSource for FixedPopulation {
        fn count(&self, _asset: AssetId) -> u64 {
            self.points.len() as u64
        }
        fn random_account(&self, _asset: AssetId, rng: &mut dyn rand::RngCore) -> Option<CandidateAccount> {
            if self.points.is_empty() {
                return None;
            }
            let idx = (rng.next_u32() as usize) % self.points.len();
            Some(CandidateAccount {
                point: self.points[idx],
                stakable: true,
                has_spend_public_key: false,
            })
        }
    }

    fn population(n: usize) -> FixedPopulation {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        FixedPopulation {
            points: (0..n).map(|_| ZetherPoint::random(&mut rng)).collect(),
        }
    }

    #[test]
    fn ring_size_32_no_explicit_members_has_no_duplicates() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = RingConfig {
            ring_size: 32,
            sender: RingSideConfig {
                require_staked_accounts: false,
                include_members: Vec::new(),
                new_accounts: 0,
            },
            recipient: RingSideConfig {
                require_staked_accounts: false,
                include_members: Vec::new(),
                new_accounts: 0,
            },
        };
        let asset = AssetId([0u8; 32]);
        let accounts = population(64);

        let mut sampler = RingSampler::new(&mut rng);
        let (sender_point, recipient_point, sender_ring, recipient_ring) = sampler
            .create_ring(None, None, asset, &config, &accounts)
            .unwrap();

        assert_eq!(sender_ring.len(), 15);
        assert_eq!(recipient_ring.len(), 15);

        let mut all = vec![sender_point, recipient_point];
        all.extend(sender_ring);
        all.extend(recipient_ring);
        let unique: HashSet<_> = all.iter().map(|p| p.to_bytes()).collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn small_population_falls_back_to_synthetic_accounts() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let config = RingConfig {
            ring_size: 32,
            sender: RingSideConfig::default(),
            recipient: RingSideConfig::default(),
        };
        let asset = AssetId([0u8; 32]);
        let accounts = population(4);

        let mut sampler = RingSampler::new(&mut rng);
        let (_, _, sender_ring, recipient_ring) = sampler
            .create_ring(None, None, asset, &config, &accounts)
            .unwrap();

        assert_eq!(sender_ring.len(), 15);
        assert_eq!(recipient_ring.len(), 15);
    }

    #[test]
    fn preset_rejects_non_power_of_two() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut config = RingConfig {
            ring_size: 33,
            ..RingConfig::default()
        };
        assert!(preset_ring_config(&mut config, &mut rng).is_err());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let shuffled = shuffle_witness_indexes(32, &mut rng);
        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, (0..32).collect::<Vec<_>>());
    }
}
