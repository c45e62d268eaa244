//! `PostgreSQL` campaign storage.
//!
//! # Schema
//!
//! See `migrations/`. Three tables:
//!
//! - `redeemed_codes`: the ledger, keyed by code
//! - `ticket_counter`: a single row holding the last issued ticket
//! - `registrations`: append-only rows, `code` unique
//!
//! # Atomicity
//!
//! `redeem` runs in one transaction: `INSERT … ON CONFLICT DO NOTHING` into the
//! ledger decides the race for a code, the counter row is bumped with
//! `UPDATE … RETURNING` (its row lock serializes ticket issuing), then the
//! registration is inserted. A rollback at any step also rolls back the
//! counter, so tickets have no gaps.
//!
//! # Example
//!
//! ```no_run
//! use registration::stores::PostgresCampaignStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresCampaignStore::connect("postgres://localhost/campaign", 5).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use super::{
    CampaignStorage, MarkOutcome, Redemption, RedemptionLedger, RegistrationStore, StorageError,
    StorageFuture,
};
use crate::types::{
    NewRegistration, PhoneNumber, Registration, RegistrationCode, TicketNumber, UserId,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};

/// Row shape shared by the registration queries
type RegistrationRow = (i64, String, String, i64, DateTime<Utc>);

const SELECT_REGISTRATIONS: &str = r"
    SELECT ticket_number, phone, code, telegram_id, registered_at
    FROM registrations
";

/// `PostgreSQL` campaign storage
#[derive(Clone, Debug)]
pub struct PostgresCampaignStore {
    pool: PgPool,
}

impl PostgresCampaignStore {
    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DatabaseError`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

fn database_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |e| StorageError::DatabaseError(format!("{context}: {e}"))
}

fn into_registration(row: RegistrationRow) -> Result<Registration, StorageError> {
    let (ticket, phone, code, telegram_id, registered_at) = row;
    let ticket = u64::try_from(ticket)
        .map_err(|_| StorageError::Corrupt(format!("negative ticket number {ticket}")))?;

    Ok(Registration {
        ticket: TicketNumber(ticket),
        phone: PhoneNumber::from_stored(phone),
        code: RegistrationCode::from_stored(code),
        user: UserId(telegram_id),
        registered_at,
    })
}

/// Take the next ticket and insert the row on an open transaction
async fn insert_registration(
    conn: &mut PgConnection,
    new: NewRegistration,
) -> Result<Registration, StorageError> {
    let (ticket,): (i64,) = sqlx::query_as(
        r"
        UPDATE ticket_counter
        SET last_ticket = last_ticket + 1
        RETURNING last_ticket
        ",
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(database_error("Failed to take ticket number"))?;

    let inserted = sqlx::query(
        r"
        INSERT INTO registrations (ticket_number, phone, code, telegram_id, registered_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(ticket)
    .bind(new.phone.as_str())
    .bind(new.code.as_str())
    .bind(new.user.0)
    .bind(new.registered_at)
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => {},
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(StorageError::DuplicateRegistration(new.code));
        },
        Err(e) => return Err(database_error("Failed to insert registration")(e)),
    }

    let ticket = u64::try_from(ticket)
        .map_err(|_| StorageError::Corrupt(format!("negative ticket number {ticket}")))?;
    Ok(Registration::issue(new, TicketNumber(ticket)))
}

impl RedemptionLedger for PostgresCampaignStore {
    fn is_redeemed<'a>(&'a self, code: &'a RegistrationCode) -> StorageFuture<'a, bool> {
        async move {
            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM redeemed_codes WHERE code = $1)")
                    .bind(code.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(database_error("Failed to check ledger"))?;
            Ok(exists)
        }
        .boxed()
    }

    fn mark_redeemed<'a>(
        &'a self,
        code: &'a RegistrationCode,
        at: DateTime<Utc>,
    ) -> StorageFuture<'a, MarkOutcome> {
        async move {
            let result = sqlx::query(
                r"
                INSERT INTO redeemed_codes (code, redeemed_at)
                VALUES ($1, $2)
                ON CONFLICT (code) DO NOTHING
                ",
            )
            .bind(code.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(database_error("Failed to mark code redeemed"))?;

            Ok(if result.rows_affected() == 1 {
                MarkOutcome::Marked
            } else {
                MarkOutcome::AlreadyRedeemed
            })
        }
        .boxed()
    }
}

impl RegistrationStore for PostgresCampaignStore {
    fn append(&self, registration: NewRegistration) -> StorageFuture<'_, Registration> {
        async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(database_error("Failed to start transaction"))?;

            // Dropping the transaction on error rolls the counter back
            let row = insert_registration(&mut *tx, registration).await?;

            tx.commit()
                .await
                .map_err(database_error("Failed to commit transaction"))?;
            Ok(row)
        }
        .boxed()
    }

    fn count(&self) -> StorageFuture<'_, u64> {
        async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations")
                .fetch_one(&self.pool)
                .await
                .map_err(database_error("Failed to count registrations"))?;
            u64::try_from(count).map_err(|_| StorageError::Corrupt(format!("row count {count}")))
        }
        .boxed()
    }

    fn export(&self) -> StorageFuture<'_, Vec<Registration>> {
        async move {
            let rows: Vec<RegistrationRow> =
                sqlx::query_as(&format!("{SELECT_REGISTRATIONS} ORDER BY ticket_number"))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(database_error("Failed to export registrations"))?;
            rows.into_iter().map(into_registration).collect()
        }
        .boxed()
    }

    fn registrations_for(&self, user: UserId) -> StorageFuture<'_, Vec<Registration>> {
        async move {
            let rows: Vec<RegistrationRow> = sqlx::query_as(&format!(
                "{SELECT_REGISTRATIONS} WHERE telegram_id = $1 ORDER BY ticket_number"
            ))
            .bind(user.0)
            .fetch_all(&self.pool)
            .await
            .map_err(database_error("Failed to load user registrations"))?;
            rows.into_iter().map(into_registration).collect()
        }
        .boxed()
    }
}

impl CampaignStorage for PostgresCampaignStore {
    fn redeem(&self, registration: NewRegistration) -> StorageFuture<'_, Redemption> {
        async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(database_error("Failed to start transaction"))?;

            let marked = sqlx::query(
                r"
                INSERT INTO redeemed_codes (code, redeemed_at)
                VALUES ($1, $2)
                ON CONFLICT (code) DO NOTHING
                ",
            )
            .bind(registration.code.as_str())
            .bind(registration.registered_at)
            .execute(&mut *tx)
            .await
            .map_err(database_error("Failed to mark code redeemed"))?;

            if marked.rows_affected() == 0 {
                if let Err(e) = tx.rollback().await {
                    tracing::debug!(error = %e, "Rollback after duplicate redemption failed");
                }
                return Ok(Redemption::AlreadyRedeemed);
            }

            let row = insert_registration(&mut *tx, registration).await?;

            tx.commit()
                .await
                .map_err(database_error("Failed to commit transaction"))?;

            tracing::debug!(ticket = %row.ticket, code = %row.code, "Registration committed");
            Ok(Redemption::Registered(row))
        }
        .boxed()
    }
}
