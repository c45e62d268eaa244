//! Durable state of the campaign: the redemption ledger and the registration store.
//!
//! Both live behind traits so the conversation controller can run against the
//! in-memory backend in tests and against `PostgreSQL` in production. The traits
//! return boxed futures so they stay object safe and can be shared as
//! `Arc<dyn CampaignStorage>`.
//!
//! # Atomicity
//!
//! [`CampaignStorage::redeem`] is the only write path the controller uses. It
//! marks the code redeemed, takes the next ticket number and appends the row as
//! one unit: either all three happen or none does. Two concurrent redemptions of
//! the same code therefore yield exactly one [`Redemption::Registered`].

use crate::types::{NewRegistration, Registration, RegistrationCode, UserId};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCampaignStore;
pub use postgres::PostgresCampaignStore;

/// Future returned by storage operations
pub type StorageFuture<'a, T> = BoxFuture<'a, Result<T, StorageError>>;

/// Errors from the storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A registration row already exists for this code
    #[error("Code {0} already has a registration")]
    DuplicateRegistration(RegistrationCode),

    /// A stored value could not be mapped back into the domain
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// The in-memory store's lock was poisoned by a panicking writer
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Outcome of marking a code as redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The code was unused and is now redeemed
    Marked,
    /// The code had been redeemed before; nothing changed
    AlreadyRedeemed,
}

/// Outcome of an atomic redemption
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// Code redeemed and registration written
    Registered(Registration),
    /// Code had been redeemed before; nothing was written
    AlreadyRedeemed,
}

/// Set of codes that have been consumed
///
/// Membership is permanent: once [`RedemptionLedger::mark_redeemed`] returns
/// [`MarkOutcome::Marked`] for a code, every later `is_redeemed` returns `true`.
pub trait RedemptionLedger: Send + Sync {
    /// Whether the code has been redeemed
    fn is_redeemed<'a>(&'a self, code: &'a RegistrationCode) -> StorageFuture<'a, bool>;

    /// Insert the code if absent
    fn mark_redeemed<'a>(
        &'a self,
        code: &'a RegistrationCode,
        at: DateTime<Utc>,
    ) -> StorageFuture<'a, MarkOutcome>;
}

/// Append-only list of registrations
pub trait RegistrationStore: Send + Sync {
    /// Append a row, assigning the next ticket number
    ///
    /// Fails with [`StorageError::DuplicateRegistration`] if the code already
    /// has a row; the ticket sequence is left untouched in that case.
    fn append(&self, registration: NewRegistration) -> StorageFuture<'_, Registration>;

    /// Number of registrations
    fn count(&self) -> StorageFuture<'_, u64>;

    /// All registrations in insertion (ticket) order
    fn export(&self) -> StorageFuture<'_, Vec<Registration>>;

    /// One user's registrations in ticket order
    fn registrations_for(&self, user: UserId) -> StorageFuture<'_, Vec<Registration>>;
}

/// Ledger and store combined, with the atomic redemption the controller relies on
pub trait CampaignStorage: RedemptionLedger + RegistrationStore {
    /// Mark the code redeemed and append its registration as one unit
    fn redeem(&self, registration: NewRegistration) -> StorageFuture<'_, Redemption>;
}
