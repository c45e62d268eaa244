//! In-memory campaign storage.
//!
//! Used by tests and when no `DATABASE_URL` is configured. Ledger, rows and the
//! ticket counter sit under one mutex, which makes [`CampaignStorage::redeem`]
//! atomic. Nothing survives a restart.

use super::{
    CampaignStorage, MarkOutcome, Redemption, RedemptionLedger, RegistrationStore, StorageError,
    StorageFuture,
};
use crate::types::{NewRegistration, Registration, RegistrationCode, TicketNumber, UserId};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    ledger: HashMap<RegistrationCode, DateTime<Utc>>,
    rows: Vec<Registration>,
    last_ticket: u64,
}

impl Inner {
    fn append(&mut self, new: NewRegistration) -> Result<Registration, StorageError> {
        if self.rows.iter().any(|row| row.code == new.code) {
            return Err(StorageError::DuplicateRegistration(new.code));
        }

        self.last_ticket += 1;
        let registration = Registration::issue(new, TicketNumber(self.last_ticket));
        self.rows.push(registration.clone());
        Ok(registration)
    }
}

/// Campaign storage kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryCampaignStore {
    inner: Mutex<Inner>,
}

impl InMemoryCampaignStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl RedemptionLedger for InMemoryCampaignStore {
    fn is_redeemed<'a>(&'a self, code: &'a RegistrationCode) -> StorageFuture<'a, bool> {
        let result = self.lock().map(|inner| inner.ledger.contains_key(code));
        futures::future::ready(result).boxed()
    }

    fn mark_redeemed<'a>(
        &'a self,
        code: &'a RegistrationCode,
        at: DateTime<Utc>,
    ) -> StorageFuture<'a, MarkOutcome> {
        let result = self.lock().map(|mut inner| {
            if inner.ledger.contains_key(code) {
                MarkOutcome::AlreadyRedeemed
            } else {
                inner.ledger.insert(code.clone(), at);
                MarkOutcome::Marked
            }
        });
        futures::future::ready(result).boxed()
    }
}

impl RegistrationStore for InMemoryCampaignStore {
    fn append(&self, registration: NewRegistration) -> StorageFuture<'_, Registration> {
        let result = self.lock().and_then(|mut inner| inner.append(registration));
        futures::future::ready(result).boxed()
    }

    fn count(&self) -> StorageFuture<'_, u64> {
        let result = self.lock().map(|inner| inner.rows.len() as u64);
        futures::future::ready(result).boxed()
    }

    fn export(&self) -> StorageFuture<'_, Vec<Registration>> {
        let result = self.lock().map(|inner| inner.rows.clone());
        futures::future::ready(result).boxed()
    }

    fn registrations_for(&self, user: UserId) -> StorageFuture<'_, Vec<Registration>> {
        let result = self.lock().map(|inner| {
            inner
                .rows
                .iter()
                .filter(|row| row.user == user)
                .cloned()
                .collect()
        });
        futures::future::ready(result).boxed()
    }
}

impl CampaignStorage for InMemoryCampaignStore {
    fn redeem(&self, registration: NewRegistration) -> StorageFuture<'_, Redemption> {
        let result = self.lock().and_then(|mut inner| {
            if inner.ledger.contains_key(&registration.code) {
                return Ok(Redemption::AlreadyRedeemed);
            }

            let code = registration.code.clone();
            let at = registration.registered_at;
            let row = inner.append(registration)?;
            inner.ledger.insert(code, at);
            Ok(Redemption::Registered(row))
        });
        futures::future::ready(result).boxed()
    }
}
