//! Plaintext per-key account state: nonce, delegated stake, claimable fees.

use crate::codec::{CodecError, Reader, WireCodec, Writer};
use crate::error::StateError;
use crate::types::PublicKeyBytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakePendingKind {
    Rollover,
    Unstake,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakePending {
    pub activation_height: u64,
    pub amount: u64,
    pub kind: StakePendingKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DelegatedStake {
    pub stake_available: u64,
    pub pending: Vec<StakePending>,
}

impl DelegatedStake {
    pub fn is_empty(&self) -> bool {
        self.stake_available == 0 && self.pending.is_empty()
    }

    pub fn add_stake_available(&mut self, sign: bool, amount: u64) -> Result<(), StateError> {
        if sign {
            self.stake_available = self
                .stake_available
                .checked_add(amount)
                .ok_or(StateError::BalanceCannotGoNegative)?;
        } else {
            self.stake_available = self
                .stake_available
                .checked_sub(amount)
                .ok_or(StateError::InsufficientFunds)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PlainAccount {
    pub public_key: PublicKeyBytes,
    pub nonce: u64,
    pub delegated_stake: Option<DelegatedStake>,
    pub claimable: u64,
}

impl PlainAccount {
    pub fn new(public_key: PublicKeyBytes) -> Self {
        PlainAccount {
            public_key,
            nonce: 0,
            delegated_stake: None,
            claimable: 0,
        }
    }

    pub fn has_delegated_stake(&self) -> bool {
        self.delegated_stake.is_some()
    }

    pub fn is_account_empty(&self) -> bool {
        match &self.delegated_stake {
            None => true,
            Some(stake) => stake.is_empty(),
        }
    }

    pub fn increment_nonce(&mut self) -> Result<(), StateError> {
        self.nonce = self
            .nonce
            .checked_add(1)
            .ok_or(StateError::BalanceCannotGoNegative)?;
        Ok(())
    }

    pub fn check_nonce(&self, expected: u64) -> Result<(), StateError> {
        if self.nonce != expected {
            return Err(StateError::NonceMismatch {
                expected: self.nonce,
                got: expected,
            });
        }
        Ok(())
    }

    pub fn add_claimable(&mut self, sign: bool, amount: u64) -> Result<(), StateError> {
        if sign {
            self.claimable = self
                .claimable
                .checked_add(amount)
                .ok_or(StateError::BalanceCannotGoNegative)?;
        } else {
            self.claimable = self
                .claimable
                .checked_sub(amount)
                .ok_or(StateError::InsufficientFunds)?;
        }
        Ok(())
    }

    /// Applies every pending entry whose `activation_height <= height`.
    /// Rollovers fold into `stake_available`; unstakes are reported back to
    /// the caller as a native-asset balance credit (the encrypted balance
    /// lives on a different component, so this returns the amount rather
    /// than mutating it directly). Entries are walked from the end so
    /// removal doesn't disturb indices still to be visited, matching the
    /// original's descending-index removal loop; pending order is
    /// insertion order (ascending activation height in practice), so the
    /// walk direction doesn't change which entries qualify.
    pub fn refresh_delegated_stake(&mut self, height: u64) -> Result<u64, StateError> {
        let mut native_credit = 0u64;

        let stake = match &mut self.delegated_stake {
            Some(stake) => stake,
            None => return Ok(0),
        };

        let mut i = stake.pending.len();
        while i > 0 {
            i -= 1;
            let entry = stake.pending[i];
            if entry.activation_height <= height {
                match entry.kind {
                    StakePendingKind::Rollover => {
                        stake.stake_available = stake
                            .stake_available
                            .checked_add(entry.amount)
                            .ok_or(StateError::BalanceCannotGoNegative)?;
                    }
                    StakePendingKind::Unstake => {
                        native_credit = native_credit
                            .checked_add(entry.amount)
                            .ok_or(StateError::BalanceCannotGoNegative)?;
                    }
                }
                stake.pending.remove(i);
            }
        }

        if stake.is_empty() {
            self.delegated_stake = None;
        }

        Ok(native_credit)
    }

    pub fn delegated_stake_available(&self) -> u64 {
        self.delegated_stake
            .as_ref()
            .map(|s| s.stake_available)
            .unwrap_or(0)
    }
}

impl WireCodec for PlainAccount {
    fn encode(&self, w: &mut Writer) {
        w.write_uvarint(self.nonce);
        w.write_uvarint(self.claimable);
        match &self.delegated_stake {
            None => w.write_uvarint(0),
            Some(stake) => {
                w.write_uvarint(1);
                w.write_uvarint(stake.stake_available);
                w.write_uvarint(stake.pending.len() as u64);
                for entry in &stake.pending {
                    w.write_uvarint(entry.activation_height);
                    w.write_uvarint(entry.amount);
                    w.write_byte(match entry.kind {
                        StakePendingKind::Rollover => 0,
                        StakePendingKind::Unstake => 1,
                    });
                }
            }
        }
    }

    fn decode(r: &mut Reader) -> Result<Self, CodecError> {
        let nonce = r.read_uvarint()?;
        let claimable = r.read_uvarint()?;
        let delegated_stake_version = r.read_uvarint()?;
        let delegated_stake = if delegated_stake_version == 1 {
            let stake_available = r.read_uvarint()?;
            let n = r.read_uvarint()?;
            let mut pending = Vec::with_capacity(n as usize);
            for _ in 0..n {
                let activation_height = r.read_uvarint()?;
                let amount = r.read_uvarint()?;
                let kind = match r.read_byte()? {
                    0 => StakePendingKind::Rollover,
                    1 => StakePendingKind::Unstake,
                    other => return Err(CodecError::InvalidTag(other)),
                };
                pending.push(StakePending {
                    activation_height,
                    amount,
                    kind,
                });
            }
            Some(DelegatedStake {
                stake_available,
                pending,
            })
        } else {
            None
        };

        Ok(PlainAccount {
            public_key: [0u8; 32],
            nonce,
            delegated_stake,
            claimable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with_stake(available: u64) -> PlainAccount {
        let mut acc = PlainAccount::new([1u8; 32]);
        acc.nonce = 5;
        acc.delegated_stake = Some(DelegatedStake {
            stake_available: available,
            pending: Vec::new(),
        });
        acc
    }

    #[test]
    fn nonce_mismatch_reports_both_values() {
        let acc = account_with_stake(1000);
        let err = acc.check_nonce(4).unwrap_err();
        match err {
            StateError::NonceMismatch { expected, got } => {
                assert_eq!(expected, 5);
                assert_eq!(got, 4);
            }
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn simple_update_delegate_accepts_matching_nonce() {
        let mut acc = account_with_stake(1000);
        acc.check_nonce(5).unwrap();
        acc.increment_nonce().unwrap();
        acc.delegated_stake
            .as_mut()
            .unwrap()
            .add_stake_available(false, 10)
            .unwrap();
        assert_eq!(acc.nonce, 6);
        assert_eq!(acc.delegated_stake_available(), 990);
    }

    #[test]
    fn refresh_applies_all_due_entries_and_none_remain() {
        let mut acc = account_with_stake(100);
        let stake = acc.delegated_stake.as_mut().unwrap();
        stake.pending.push(StakePending {
            activation_height: 10,
            amount: 50,
            kind: StakePendingKind::Rollover,
        });
        stake.pending.push(StakePending {
            activation_height: 20,
            amount: 30,
            kind: StakePendingKind::Unstake,
        });
        stake.pending.push(StakePending {
            activation_height: 999,
            amount: 1,
            kind: StakePendingKind::Rollover,
        });

        let credit = acc.refresh_delegated_stake(20).unwrap();
        assert_eq!(credit, 30);
        let stake = acc.delegated_stake.as_ref().unwrap();
        assert_eq!(stake.stake_available, 150);
        assert!(stake
            .pending
            .iter()
            .all(|e| e.activation_height > 20));
    }

    #[test]
    fn delegated_stake_destroyed_when_fully_drained() {
        let mut acc = PlainAccount::new([2u8; 32]);
        acc.delegated_stake = Some(DelegatedStake {
            stake_available: 0,
            pending: vec![StakePending {
                activation_height: 1,
                amount: 10,
                kind: StakePendingKind::Unstake,
            }],
        });
        let credit = acc.refresh_delegated_stake(5).unwrap();
        assert_eq!(credit, 10);
        assert!(acc.delegated_stake.is_none());
    }

    #[test]
    fn plain_account_round_trips_through_codec() {
        let mut acc = account_with_stake(42);
        acc.delegated_stake.as_mut().unwrap().pending.push(StakePending {
            activation_height: 7,
            amount: 3,
            kind: StakePendingKind::Rollover,
        });
        acc.add_claimable(true, 9).unwrap();
        let bytes = acc.to_bytes();
        let mut back = PlainAccount::from_bytes(&bytes).unwrap();
        back.public_key = acc.public_key;
        assert_eq!(acc, back);
    }
}
