//! Per-user conversation state.
//!
//! Sessions are transient: they live in the store owned by the runtime and are
//! lost on restart, lockouts included.
//!
//! An expired lock is dropped when its user writes again, or by
//! [`SessionStore::sweep_expired`], which the controller runs whenever it
//! locks someone. Users who never come back are therefore held at most until
//! the next lockout.

use crate::types::{PhoneNumber, RegistrationCode, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Where a user is in the registration dialogue
///
/// Each stage carries only what is meaningful in it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    /// No registration in progress
    #[default]
    Idle,
    /// Waiting for the user to share their contact
    AwaitingPhone {
        /// Invalid codes already counted in this round
        retries: u32,
    },
    /// Phone captured, waiting for a code
    AwaitingCode {
        /// Captured phone number
        phone: PhoneNumber,
        /// Consecutive invalid codes so far
        retries: u32,
    },
    /// A registered code is being redeemed against storage
    Redeeming {
        /// Captured phone number
        phone: PhoneNumber,
        /// Code being redeemed
        code: RegistrationCode,
        /// Consecutive invalid codes before this one
        retries: u32,
    },
    /// Registration done, waiting for "register another?" answer
    AwaitingContinue,
}

impl Stage {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingPhone { .. } => "awaiting_phone",
            Self::AwaitingCode { .. } => "awaiting_code",
            Self::Redeeming { .. } => "redeeming",
            Self::AwaitingContinue => "awaiting_continue",
        }
    }
}

/// One user's conversation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    /// Dialogue stage
    pub stage: Stage,
    /// Lockout expiry, kept across stage resets
    pub locked_until: Option<DateTime<Utc>>,
}

impl Session {
    /// Nothing worth keeping: idle and not locked
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.stage == Stage::Idle && self.locked_until.is_none()
    }
}

/// All live sessions, keyed by user
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: HashMap<UserId, Session>,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A user's session, if they have one
    #[must_use]
    pub fn get(&self, user: UserId) -> Option<&Session> {
        self.sessions.get(&user)
    }

    /// A user's stage; users without a session are idle
    #[must_use]
    pub fn stage(&self, user: UserId) -> Stage {
        self.get(user).map(|s| s.stage.clone()).unwrap_or_default()
    }

    /// Move a user to `stage`, keeping any lock
    pub fn set_stage(&mut self, user: UserId, stage: Stage) {
        self.sessions.entry(user).or_default().stage = stage;
        self.prune(user);
    }

    /// Clear a user's dialogue back to idle, keeping any lock
    pub fn clear(&mut self, user: UserId) {
        self.set_stage(user, Stage::Idle);
    }

    /// Clear the dialogue and lock the user until `until`
    pub fn lock(&mut self, user: UserId, until: DateTime<Utc>) {
        let session = self.sessions.entry(user).or_default();
        session.stage = Stage::Idle;
        session.locked_until = Some(until);
    }

    /// The lock expiry if the user is locked at `now`
    ///
    /// An expired lock is dropped as a side effect.
    pub fn active_lock(&mut self, user: UserId, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let session = self.sessions.get_mut(&user)?;
        match session.locked_until {
            Some(until) if now < until => Some(until),
            Some(_) => {
                session.locked_until = None;
                self.prune(user);
                None
            },
            None => None,
        }
    }

    /// Drop every expired lock, and with it any session left vacant
    ///
    /// Returns how many sessions were removed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            if session.locked_until.is_some_and(|until| until <= now) {
                session.locked_until = None;
            }
            !session.is_vacant()
        });
        before - self.sessions.len()
    }

    /// Number of users with a live session
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no user has a live session
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn prune(&mut self, user: UserId) {
        if self.sessions.get(&user).is_some_and(Session::is_vacant) {
            self.sessions.remove(&user);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use chrono::Duration;
    use campaign_core::environment::Clock;
    use campaign_testing::test_clock;

    const USER: UserId = UserId(7);

    #[test]
    fn unknown_user_is_idle() {
        let sessions = SessionStore::new();
        assert_eq!(sessions.stage(USER), Stage::Idle);
        assert!(sessions.is_empty());
    }

    #[test]
    fn clearing_keeps_the_lock() {
        let mut sessions = SessionStore::new();
        let until = test_clock().now() + Duration::seconds(60);

        sessions.lock(USER, until);
        sessions.clear(USER);

        assert_eq!(sessions.get(USER).and_then(|s| s.locked_until), Some(until));
    }

    #[test]
    fn expired_lock_is_dropped_lazily() {
        let mut sessions = SessionStore::new();
        let now = test_clock().now();
        sessions.lock(USER, now + Duration::seconds(60));

        assert!(sessions.active_lock(USER, now + Duration::seconds(59)).is_some());
        assert!(sessions.active_lock(USER, now + Duration::seconds(60)).is_none());
        assert!(sessions.get(USER).is_none());
    }

    #[test]
    fn sweep_drops_expired_locks_of_absent_users() {
        let mut sessions = SessionStore::new();
        let now = test_clock().now();
        sessions.lock(UserId(1), now - Duration::seconds(1));
        sessions.lock(UserId(2), now + Duration::seconds(30));
        sessions.lock(UserId(3), now - Duration::seconds(5));
        sessions.set_stage(UserId(3), Stage::AwaitingPhone { retries: 0 });

        assert_eq!(sessions.sweep_expired(now), 1);

        assert!(sessions.get(UserId(1)).is_none());
        assert!(sessions.get(UserId(2)).unwrap().locked_until.is_some());
        let returning = sessions.get(UserId(3)).unwrap();
        assert!(returning.locked_until.is_none());
        assert_eq!(returning.stage, Stage::AwaitingPhone { retries: 0 });
    }

    #[test]
    fn idle_sessions_are_pruned() {
        let mut sessions = SessionStore::new();
        sessions.set_stage(USER, Stage::AwaitingPhone { retries: 0 });
        assert_eq!(sessions.len(), 1);

        sessions.clear(USER);
        assert!(sessions.is_empty());
    }
}
