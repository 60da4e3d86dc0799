//! Zether transaction prebuilder: the read-only half of building a
//! confidential transfer. Samples a ring, resolves registrations, and
//! folds pending-mempool state into a balance snapshot, producing a
//! witness bundle for the external prover.

use crate::account::Account;
use crate::emap::EncryptedBalanceMap;
use crate::error::{PrebuildError, StateError, ValidationError};
use crate::pubkey_index::{PublicKeyIndex, PublicKeyIndexEntry};
use crate::registration::{Registration, RegistrationRequest};
use crate::ring::{preset_ring_config, shuffle_witness_indexes, AccountSource, RingConfig, RingSampler};
use crate::store::StoreHandle;
use crate::transaction::Transaction;
use crate::transaction::zether::ZetherExtra;
use crate::types::{AssetId, ElGamal, ZetherPoint};
use crate::wallet::WalletBackend;
use rand::RngCore;
use std::collections::HashMap;

/// Flat per-decoy fee rate used when the caller doesn't supply an explicit
/// fee; native-asset only. Non-native transfers need an explicit fee paid
/// out of an asset liquidity pool the wallet collaborator is responsible
/// for pricing.
const AUTO_FEE_PER_RING_MEMBER: u64 = 100;

pub struct PrebuildRequest {
    pub asset: AssetId,
    pub sender_address: String,
    pub recipient: Option<ZetherPoint>,
    pub amount: u64,
    pub fee: Option<u64>,
    pub ring_config: RingConfig,
    pub extra: ZetherExtra,
    /// Registrations for not-yet-chain-confirmed keys the caller vouches
    /// for (freshly registering sender, or an explicitly included member
    /// who registered in the same block window).
    pub pending_registrations: HashMap<[u8; 32], RegistrationRequest>,
}

/// Everything the external prover needs to produce a Zether proof: the
/// shuffled ring, the two distinguished positions within it, and the
/// balance/fee/height context the statement must bind to. No proof or
/// range-commitment math happens here.
#[derive(Debug)]
pub struct Witness {
    pub asset: AssetId,
    pub ring_public_keys: Vec<ZetherPoint>,
    pub sender_ring_index: usize,
    pub recipient_ring_index: usize,
    pub sender_balance_before: ElGamal,
    pub recipient_balance_before: ElGamal,
    pub sender_plaintext_balance: u64,
    pub amount: u64,
    pub fee: u64,
    pub chain_height: u64,
    pub chain_kernel_hash: Vec<u8>,
    pub extra: ZetherExtra,
    pub public_key_index: HashMap<[u8; 32], PublicKeyIndexEntry>,
    /// Every encrypted balance folded while resolving this witness, keyed
    /// by asset then canonical point string. Lets the prover look up ring
    /// members' balances it needs to expand besides the two distinguished
    /// ones.
    pub emap: HashMap<AssetId, HashMap<String, ElGamal>>,
    /// Whether each point's folded balance started from a staked account,
    /// keyed by canonical point string. Toggles whether staked funds are
    /// included when the prover expands the balance.
    pub has_rollovers: HashMap<String, bool>,
}

fn registration_key(point: &ZetherPoint) -> Vec<u8> {
    format!("registration:{}", point.canonical_string()).into_bytes()
}

fn account_key(asset: AssetId, point: &ZetherPoint) -> Vec<u8> {
    format!("account:{}:{}", hex::encode(asset.0), point.canonical_string()).into_bytes()
}

fn lookup_registration(store: &StoreHandle, point: &ZetherPoint) -> Result<Option<Registration>, PrebuildError> {
    let bytes = store
        .view("registrations", |v| v.get(&registration_key(point)))
        .map_err(|e| PrebuildError::Store(e.to_string()))?;
    match bytes {
        Some(raw) => {
            use crate::codec::WireCodec;
            Ok(Some(Registration::from_bytes(&raw)?))
        }
        None => Ok(None),
    }
}

fn lookup_account(store: &StoreHandle, asset: AssetId, point: &ZetherPoint) -> Result<Option<Account>, PrebuildError> {
    let bytes = store
        .view("accounts", |v| v.get(&account_key(asset, point)))
        .map_err(|e| PrebuildError::Store(e.to_string()))?;
    match bytes {
        Some(raw) => {
            use crate::codec::WireCodec;
            Ok(Some(Account::from_bytes(&raw)?))
        }
        None => Ok(None),
    }
}

fn resolve_index(
    index: &mut PublicKeyIndex,
    store: &StoreHandle,
    pending: &HashMap<[u8; 32], RegistrationRequest>,
    point: &ZetherPoint,
) -> Result<(), PrebuildError> {
    let registration = lookup_registration(store, point)?;
    let pending_registration = pending.get(&point.to_bytes());
    index
        .resolve(*point, registration.as_ref(), pending_registration)
        .map_err(PrebuildError::from)
}

/// Inverts a Fisher-Yates permutation: `permutation[shuffled_position] =
/// original_position`, so this returns `shuffled_position` for a given
/// `original_position`.
fn shuffled_position_of(permutation: &[u32], original_position: usize) -> usize {
    permutation
        .iter()
        .position(|&p| p as usize == original_position)
        .expect("original_position must be within the permutation")
}

pub fn prebuild<R: RngCore>(
    store: &StoreHandle,
    wallet: &dyn WalletBackend,
    accounts: &dyn AccountSource,
    pending_txs: &[Transaction],
    mut request: PrebuildRequest,
    rng: &mut R,
) -> Result<Witness, PrebuildError> {
    let sender_wallet = wallet.get_wallet_address_by_encoded_address(&request.sender_address)?;
    let sender_point = ZetherPoint::from_bytes(&sender_wallet.public_key).ok_or_else(|| {
        PrebuildError::Validation(ValidationError::InvalidRingConfig(
            "sender public key does not decode to a curve point".into(),
        ))
    })?;

    preset_ring_config(&mut request.ring_config, rng)?;

    let is_reward = matches!(request.extra, ZetherExtra::StakingReward);
    if is_reward {
        request.ring_config.recipient.include_members = request.ring_config.sender.include_members.clone();
        request.ring_config.recipient.new_accounts = request.ring_config.sender.new_accounts;
        request.ring_config.recipient.require_staked_accounts = request.ring_config.sender.require_staked_accounts;
    }

    let mut sampler = RingSampler::new(&mut *rng);
    let (sender_point, recipient_point, sender_ring, recipient_ring) = if is_reward {
        let (resolved, ring) =
            sampler.create_self_ring(Some(sender_point), request.asset, &request.ring_config, accounts)?;
        (resolved, resolved, ring.clone(), ring)
    } else {
        sampler.create_ring(
            Some(sender_point),
            request.recipient,
            request.asset,
            &request.ring_config,
            accounts,
        )?
    };

    let fee = match request.fee {
        Some(fee) => fee,
        None if request.asset.is_native() => {
            AUTO_FEE_PER_RING_MEMBER * (2 + sender_ring.len() as u64 + recipient_ring.len() as u64)
        }
        None => return Err(PrebuildError::State(StateError::NoAssetFeeLiquidity)),
    };

    let (chain_height, chain_kernel_hash) = store
        .view("blockchain", |v| Ok((v.chain_height()?, v.chain_kernel_hash()?)))
        .map_err(|e| PrebuildError::Store(e.to_string()))?;

    let sender_account = lookup_account(store, request.asset, &sender_point)?;
    let recipient_account = lookup_account(store, request.asset, &recipient_point)?;

    let mut emap = EncryptedBalanceMap::new();
    let sender_balance_before = emap.get_zether_balance(
        sender_point,
        request.asset,
        sender_account.as_ref(),
        request.ring_config.sender.require_staked_accounts,
        pending_txs,
    );
    let recipient_balance_before = emap.get_zether_balance(
        recipient_point,
        request.asset,
        recipient_account.as_ref(),
        request.ring_config.recipient.require_staked_accounts,
        pending_txs,
    );

    let encrypted = sender_balance_before.serialize();
    let sender_plaintext_balance =
        wallet.decrypt_balance_by_public_key(&sender_wallet.public_key, &encrypted, request.asset, false, 0)?;

    if sender_plaintext_balance == 0 {
        return Err(PrebuildError::State(StateError::NoFunds));
    }
    let spent = request.amount + if request.asset.is_native() { fee } else { 0 };
    if sender_plaintext_balance < spent {
        return Err(PrebuildError::State(StateError::InsufficientFunds));
    }

    let mut pubkey_index = PublicKeyIndex::new();
    resolve_index(&mut pubkey_index, store, &request.pending_registrations, &sender_point)?;
    resolve_index(&mut pubkey_index, store, &request.pending_registrations, &recipient_point)?;
    for member in request
        .ring_config
        .sender
        .include_members
        .iter()
        .chain(request.ring_config.recipient.include_members.iter())
    {
        resolve_index(&mut pubkey_index, store, &request.pending_registrations, member)?;
    }

    if let Some(supplied) = sender_wallet.spend_public_key {
        if let Some(PublicKeyIndexEntry::Pending { spend_public_key: Some(on_file), .. }) =
            pubkey_index.get(&sender_point)
        {
            PublicKeyIndex::check_spend_public_key_matches(&Some(*on_file), &supplied)
                .map_err(PrebuildError::from)?;
        }
    }

    let mut full_ring = Vec::with_capacity(sender_ring.len() + recipient_ring.len() + 2);
    full_ring.push(sender_point);
    full_ring.push(recipient_point);
    full_ring.extend(sender_ring);
    full_ring.extend(recipient_ring);

    let permutation = shuffle_witness_indexes(full_ring.len() as u32, rng);
    let shuffled_ring: Vec<ZetherPoint> = permutation.iter().map(|&i| full_ring[i as usize]).collect();
    let sender_ring_index = shuffled_position_of(&permutation, 0);
    let recipient_ring_index = shuffled_position_of(&permutation, 1);

    let (emap_balances, has_rollovers) = emap.into_parts();

    Ok(Witness {
        asset: request.asset,
        ring_public_keys: shuffled_ring,
        sender_ring_index,
        recipient_ring_index,
        sender_balance_before,
        recipient_balance_before,
        sender_plaintext_balance,
        amount: request.amount,
        fee,
        chain_height,
        chain_kernel_hash,
        extra: request.extra,
        public_key_index: pubkey_index.into_map(),
        emap: emap_balances,
        has_rollovers,
    })
}
