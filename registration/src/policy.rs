//! Retry and lockout policy for invalid code submissions.

use chrono::{DateTime, Duration, Utc};

/// What happens after an invalid code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptVerdict {
    /// The user may try again
    Retry {
        /// Attempts left before lockout
        remaining: u32,
    },
    /// Attempts exhausted; the conversation is locked until `until`
    LockedOut {
        /// End of the cooldown
        until: DateTime<Utc>,
    },
}

/// Consecutive-failure lockout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_attempts: u32,
    cooldown: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(3, Duration::seconds(60))
    }
}

impl LockoutPolicy {
    /// Create a policy; `max_attempts` below 1 is treated as 1
    #[must_use]
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
        }
    }

    /// Invalid attempts allowed before lockout
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Lockout length
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Judge the `failures`-th consecutive invalid attempt
    #[must_use]
    pub fn register_failure(&self, failures: u32, now: DateTime<Utc>) -> AttemptVerdict {
        if failures >= self.max_attempts {
            AttemptVerdict::LockedOut {
                until: now
                    .checked_add_signed(self.cooldown)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            }
        } else {
            AttemptVerdict::Retry {
                remaining: self.max_attempts - failures,
            }
        }
    }

    /// Whole seconds left until `until`, rounded up; zero once expired
    #[must_use]
    pub fn remaining_secs(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        let left = until - now;
        if left <= Duration::zero() {
            return 0;
        }
        let secs = left.num_seconds();
        if left > Duration::seconds(secs) { secs + 1 } else { secs }
    }
}
