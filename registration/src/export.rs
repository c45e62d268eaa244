//! Admin export of all registrations as CSV.
//!
//! The document has a fixed header and one row per registration in ticket
//! order. Rendering is deterministic, so two exports without new
//! registrations in between are byte-identical.

use crate::stores::{RegistrationStore, StorageError};
use crate::types::{Registration, UserId};
use chrono::SecondsFormat;
use thiserror::Error;

/// File name used for the export document
pub const FILE_NAME: &str = "registrations.csv";

/// Export columns, in order
pub const HEADER: [&str; 5] = ["phone", "code", "telegram_id", "datetime", "ticket_number"];

/// Export failures
#[derive(Debug, Error)]
pub enum ExportError {
    /// Requester is not the administrator
    #[error("User {0} is not allowed to export registrations")]
    Unauthorized(UserId),

    /// Reading the registrations failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A rendered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    /// File name to present
    pub file_name: String,
    /// CSV bytes (UTF-8)
    pub bytes: Vec<u8>,
    /// Number of data rows
    pub rows: usize,
}

/// Export gate for the single configured administrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminExport {
    admin: UserId,
}

impl AdminExport {
    /// Gate exports to `admin`
    #[must_use]
    pub const fn new(admin: UserId) -> Self {
        Self { admin }
    }

    /// The administrator
    #[must_use]
    pub const fn admin(&self) -> UserId {
        self.admin
    }

    /// Export all registrations for `requester`
    ///
    /// Returns `Ok(None)` when nothing has been registered yet. Storage is not
    /// touched for anyone but the administrator.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Unauthorized`] for non-admins, or
    /// [`ExportError::Storage`] if the rows cannot be read.
    pub async fn export<S>(
        &self,
        requester: UserId,
        storage: &S,
    ) -> Result<Option<ExportDocument>, ExportError>
    where
        S: RegistrationStore + ?Sized,
    {
        if requester != self.admin {
            return Err(ExportError::Unauthorized(requester));
        }

        let rows = storage.export().await?;
        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(ExportDocument {
            file_name: FILE_NAME.to_string(),
            bytes: render_csv(&rows).into_bytes(),
            rows: rows.len(),
        }))
    }
}

/// Render registrations as RFC 4180 CSV with `\r\n` line endings
#[must_use]
pub fn render_csv(rows: &[Registration]) -> String {
    let mut out = String::new();
    push_record(&mut out, HEADER);

    for row in rows {
        push_record(
            &mut out,
            [
                row.phone.as_str(),
                row.code.as_str(),
                row.user.to_string().as_str(),
                row.registered_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
                    .as_str(),
                row.ticket.to_string().as_str(),
            ],
        );
    }

    out
}

fn push_record<const N: usize>(out: &mut String, fields: [&str; N]) {
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
