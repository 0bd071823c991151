//! Shared retry budget.

use std::sync::atomic::{AtomicU32, Ordering};

/// Caps the total number of bounded fetch attempts.
///
/// The count only ever grows: once `max_attempts` acquisitions have been
/// handed out the budget stays exhausted for the lifetime of the value. Share
/// one budget (behind an `Arc`) between every reconciler that should draw from
/// the same allowance.
#[derive(Debug)]
pub struct RetryBudget {
    attempts: AtomicU32,
    max_attempts: u32,
}

impl RetryBudget {
    /// Creates a budget allowing `max_attempts` fetches.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            max_attempts,
        }
    }

    /// Claims one attempt. Returns `false` when the budget was already spent.
    ///
    /// Every call counts, successful or not, so concurrent callers can never
    /// claim more than `max_attempts` slots between them.
    pub fn try_acquire(&self) -> bool {
        let previous = self
            .attempts
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
            .unwrap_or_else(|n| n);
        previous < self.max_attempts
    }

    /// Number of acquisitions requested so far, including refused ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// The configured ceiling.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether no further attempt will be granted.
    pub fn is_exhausted(&self) -> bool {
        self.attempts() >= self.max_attempts
    }
}
