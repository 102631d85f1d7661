//! # Credit Ledger
//!
//! One non-negative credit balance per user, and the operations the rest of
//! the helpdesk is allowed to perform on it: read, set, grant, and — the
//! one that matters — an atomic conditional spend.
//!
//! ## Atomicity
//!
//! [`CreditLedger::try_spend`] is the only place a balance goes down, and
//! it goes down through a sled compare-and-swap loop: read the current
//! value, check it covers the cost, then swap in the reduced value only if
//! nobody else has touched the key in between. Two in-flight requests
//! racing to spend the last credit resolve to exactly one success — the
//! loser re-reads, sees the reduced balance, and reports insufficient
//! credits like any other poor soul.
//!
//! There is no "check" API separate from "spend". A separate read-then-
//! write pair is precisely the race this module exists to prevent, so the
//! check and the deduction are one operation.
//!
//! ## Representation
//!
//! Balances are stored as 8-byte big-endian u64 values keyed by user id.
//! A missing row reads as zero — that's the documented default for a user
//! who has never been granted credits, not an error. The `u64` type makes
//! a negative balance unrepresentable by construction.

use sled::Tree;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
///
/// Note what is *not* here: insufficient credits. That's a normal business
/// outcome, reported through [`SpendOutcome`], not an error path.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The balance store failed underneath us.
    #[error("balance store error: {0}")]
    Storage(#[from] sled::Error),

    /// A stored balance wasn't 8 bytes. Either the tree got corrupted or
    /// something other than the ledger wrote to it.
    #[error("corrupt balance record for user {user}")]
    Corrupt {
        /// The user whose record is unreadable.
        user: u64,
    },

    /// A grant would push the balance past `u64::MAX`. If you're hitting
    /// this, someone is granting more than 18.4 quintillion credits.
    /// That's either a bug or a very generous admin.
    #[error("balance overflow: current {current}, grant {grant} (user {user})")]
    Overflow {
        /// The user being granted credits.
        user: u64,
        /// The balance before the failed grant.
        current: u64,
        /// The grant amount that caused the overflow.
        grant: u64,
    },
}

// ---------------------------------------------------------------------------
// SpendOutcome
// ---------------------------------------------------------------------------

/// The result of a [`CreditLedger::try_spend`] call that reached the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpendOutcome {
    /// The cost was covered and has been deducted.
    Spent {
        /// Balance remaining after the deduction.
        remaining: u64,
    },

    /// The balance didn't cover the cost. Nothing was changed.
    InsufficientCredits {
        /// The balance at the time of the attempt.
        available: u64,
        /// The cost that couldn't be covered.
        requested: u64,
    },
}

impl SpendOutcome {
    /// Returns `true` if the spend went through.
    pub fn is_spent(&self) -> bool {
        matches!(self, SpendOutcome::Spent { .. })
    }
}

// ---------------------------------------------------------------------------
// CreditLedger
// ---------------------------------------------------------------------------

/// Manages per-user credit balances over the `credits` tree.
///
/// Cloneable and thread-safe: clones share the same underlying tree, so a
/// ledger handle can be passed to as many request handlers as needed.
#[derive(Debug, Clone)]
pub struct CreditLedger {
    credits: Tree,
}

impl CreditLedger {
    /// Creates a ledger over the given credits tree
    /// (see [`crate::storage::DeskDb::credits_tree`]).
    pub fn new(credits: Tree) -> Self {
        Self { credits }
    }

    /// Current balance for a user. A user with no record has balance 0.
    ///
    /// Zero-for-missing is the deliberate, documented default for a user
    /// who has never been granted credits — not an error, not a null.
    pub fn get_balance(&self, user: u64) -> Result<u64, LedgerError> {
        match self.credits.get(user.to_be_bytes())? {
            Some(bytes) => decode_balance(&bytes, user),
            None => Ok(0),
        }
    }

    /// Upsert the balance to exactly `credits`.
    ///
    /// This is the admin "set this customer's credits" action — it replaces
    /// whatever was there, including rows that never existed.
    pub fn set_balance(&self, user: u64, credits: u64) -> Result<(), LedgerError> {
        self.credits
            .insert(user.to_be_bytes(), &credits.to_be_bytes())?;
        tracing::debug!(user, credits, "balance set");
        Ok(())
    }

    /// Attempt to atomically deduct `cost` from the user's balance.
    ///
    /// If the balance covers the cost, it's reduced by exactly `cost` and
    /// the call returns [`SpendOutcome::Spent`]. Otherwise nothing changes
    /// and the call returns [`SpendOutcome::InsufficientCredits`].
    ///
    /// Concurrent spends against the same user serialize through the CAS:
    /// each retry re-reads the current balance, so the cost is checked
    /// against the latest value every time. N racing spends of 1 credit
    /// against a balance of k end with exactly k successes.
    pub fn try_spend(&self, user: u64, cost: u64) -> Result<SpendOutcome, LedgerError> {
        let key = user.to_be_bytes();

        loop {
            let current = self.credits.get(key)?;
            let balance = match &current {
                Some(bytes) => decode_balance(bytes, user)?,
                None => 0,
            };

            if balance < cost {
                return Ok(SpendOutcome::InsufficientCredits {
                    available: balance,
                    requested: cost,
                });
            }

            let remaining = balance - cost;
            match self
                .credits
                .compare_and_swap(key, current, Some(remaining.to_be_bytes().to_vec()))?
            {
                Ok(()) => {
                    tracing::debug!(user, cost, remaining, "credits spent");
                    return Ok(SpendOutcome::Spent { remaining });
                }
                // Someone else moved the balance first; re-read and retry.
                Err(_) => continue,
            }
        }
    }

    /// Atomically add `amount` to the user's balance (admin top-up).
    ///
    /// Returns the new balance. Uses the same CAS loop as `try_spend`, so
    /// grants interleaved with spends never lose an update.
    pub fn grant(&self, user: u64, amount: u64) -> Result<u64, LedgerError> {
        let key = user.to_be_bytes();

        loop {
            let current = self.credits.get(key)?;
            let balance = match &current {
                Some(bytes) => decode_balance(bytes, user)?,
                None => 0,
            };

            let new_balance = balance
                .checked_add(amount)
                .ok_or(LedgerError::Overflow {
                    user,
                    current: balance,
                    grant: amount,
                })?;

            match self
                .credits
                .compare_and_swap(key, current, Some(new_balance.to_be_bytes().to_vec()))?
            {
                Ok(()) => {
                    tracing::debug!(user, amount, new_balance, "credits granted");
                    return Ok(new_balance);
                }
                Err(_) => continue,
            }
        }
    }
}

/// Decode an 8-byte big-endian balance value.
fn decode_balance(bytes: &[u8], user: u64) -> Result<u64, LedgerError> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LedgerError::Corrupt { user })?;
    Ok(u64::from_be_bytes(array))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DeskDb;

    fn test_ledger() -> CreditLedger {
        let db = DeskDb::open_temporary().expect("temp db");
        CreditLedger::new(db.credits_tree())
    }

    #[test]
    fn unknown_user_has_zero_balance() {
        let ledger = test_ledger();
        assert_eq!(ledger.get_balance(42).unwrap(), 0);
    }

    #[test]
    fn set_balance_upserts() {
        let ledger = test_ledger();

        ledger.set_balance(42, 10).unwrap();
        assert_eq!(ledger.get_balance(42).unwrap(), 10);

        ledger.set_balance(42, 3).unwrap();
        assert_eq!(ledger.get_balance(42).unwrap(), 3);
    }

    #[test]
    fn spend_within_balance_succeeds() {
        let ledger = test_ledger();
        ledger.set_balance(42, 10).unwrap();

        let outcome = ledger.try_spend(42, 4).unwrap();
        assert_eq!(outcome, SpendOutcome::Spent { remaining: 6 });
        assert_eq!(ledger.get_balance(42).unwrap(), 6);
    }

    #[test]
    fn spend_beyond_balance_refused_and_unchanged() {
        let ledger = test_ledger();
        ledger.set_balance(42, 3).unwrap();

        let outcome = ledger.try_spend(42, 4).unwrap();
        assert_eq!(
            outcome,
            SpendOutcome::InsufficientCredits {
                available: 3,
                requested: 4
            }
        );
        assert_eq!(ledger.get_balance(42).unwrap(), 3);
    }

    #[test]
    fn spend_exact_balance_then_refuse() {
        // Balance 3, spend 3 -> success, 0; spend 1 -> refusal, still 0.
        let ledger = test_ledger();
        ledger.set_balance(42, 3).unwrap();

        let outcome = ledger.try_spend(42, 3).unwrap();
        assert_eq!(outcome, SpendOutcome::Spent { remaining: 0 });
        assert_eq!(ledger.get_balance(42).unwrap(), 0);

        let outcome = ledger.try_spend(42, 1).unwrap();
        assert!(!outcome.is_spent());
        assert_eq!(ledger.get_balance(42).unwrap(), 0);
    }

    #[test]
    fn spend_against_missing_row_refused() {
        let ledger = test_ledger();
        let outcome = ledger.try_spend(42, 1).unwrap();
        assert_eq!(
            outcome,
            SpendOutcome::InsufficientCredits {
                available: 0,
                requested: 1
            }
        );
    }

    #[test]
    fn zero_cost_spend_is_a_noop_success() {
        let ledger = test_ledger();
        ledger.set_balance(42, 5).unwrap();

        let outcome = ledger.try_spend(42, 0).unwrap();
        assert_eq!(outcome, SpendOutcome::Spent { remaining: 5 });
        assert_eq!(ledger.get_balance(42).unwrap(), 5);
    }

    #[test]
    fn grant_accumulates() {
        let ledger = test_ledger();

        assert_eq!(ledger.grant(42, 5).unwrap(), 5);
        assert_eq!(ledger.grant(42, 3).unwrap(), 8);
        assert_eq!(ledger.get_balance(42).unwrap(), 8);
    }

    #[test]
    fn grant_overflow_rejected() {
        let ledger = test_ledger();
        ledger.set_balance(42, u64::MAX).unwrap();

        let result = ledger.grant(42, 1);
        assert!(matches!(result, Err(LedgerError::Overflow { .. })));
        assert_eq!(ledger.get_balance(42).unwrap(), u64::MAX);
    }

    #[test]
    fn balances_are_per_user() {
        let ledger = test_ledger();
        ledger.set_balance(1, 10).unwrap();
        ledger.set_balance(2, 20).unwrap();

        ledger.try_spend(1, 5).unwrap();

        assert_eq!(ledger.get_balance(1).unwrap(), 5);
        assert_eq!(ledger.get_balance(2).unwrap(), 20);
    }

    #[test]
    fn concurrent_spends_never_oversell() {
        use std::sync::Arc;
        use std::thread;

        // Balance of 5, 8 threads each trying to spend 1: exactly 5 must
        // succeed and the final balance must be 0.
        let ledger = Arc::new(test_ledger());
        ledger.set_balance(42, 5).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.try_spend(42, 1).unwrap().is_spent())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("spender thread should not panic"))
            .filter(|&ok| ok)
            .count();

        assert_eq!(successes, 5);
        assert_eq!(ledger.get_balance(42).unwrap(), 0);
    }

    #[test]
    fn concurrent_grants_lose_nothing() {
        use std::sync::Arc;
        use std::thread;

        let ledger = Arc::new(test_ledger());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..10 {
                        ledger.grant(42, 1).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("granter thread should not panic");
        }

        assert_eq!(ledger.get_balance(42).unwrap(), 80);
    }
}
