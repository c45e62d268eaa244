//! Domain types for the registration campaign.

use chrono::{DateTime, Utc};
use std::fmt;

/// Chat-platform user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat a reply is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An 8-character product code
///
/// Values built through [`RegistrationCode::parse`] are trimmed and consist
/// of exactly [`RegistrationCode::LENGTH`] ASCII letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationCode(String);

impl RegistrationCode {
    /// Number of characters in a code
    pub const LENGTH: usize = 8;

    /// Parse user or file input into a code
    ///
    /// Surrounding whitespace is ignored. Returns `None` when the remaining
    /// text is not exactly eight ASCII alphanumerics.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let well_formed = trimmed.len() == Self::LENGTH
            && trimmed.bytes().all(|b| b.is_ascii_alphanumeric());
        well_formed.then(|| Self(trimmed.to_string()))
    }

    /// Rebuild a code read back from durable storage
    pub(crate) const fn from_stored(code: String) -> Self {
        Self(code)
    }

    /// The code text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phone number captured from a shared contact
///
/// Telegram reports numbers with or without the leading `+`; they are stored
/// with it so exports are uniform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize a reported phone number
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('+') {
            Self(trimmed.to_string())
        } else {
            Self(format!("+{trimmed}"))
        }
    }

    pub(crate) const fn from_stored(phone: String) -> Self {
        Self(phone)
    }

    /// The number, including the leading `+`
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequential ticket number handed out per registration, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketNumber(pub u64);

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registration about to be written; the store assigns the ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    /// Phone number shared by the user
    pub phone: PhoneNumber,
    /// Code being redeemed
    pub code: RegistrationCode,
    /// Who redeemed it
    pub user: UserId,
    /// When the redemption was requested
    pub registered_at: DateTime<Utc>,
}

/// A completed, immutable registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Ticket number assigned by the store
    pub ticket: TicketNumber,
    /// Phone number shared by the user
    pub phone: PhoneNumber,
    /// Redeemed code
    pub code: RegistrationCode,
    /// Who redeemed it
    pub user: UserId,
    /// When it was registered
    pub registered_at: DateTime<Utc>,
}

impl Registration {
    /// Complete a new registration with its ticket
    #[must_use]
    pub fn issue(new: NewRegistration, ticket: TicketNumber) -> Self {
        Self {
            ticket,
            phone: new.phone,
            code: new.code,
            user: new.user,
            registered_at: new.registered_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_trimmed() {
        let code = RegistrationCode::parse("  AB12CD34\n");
        assert_eq!(code.map(|c| c.to_string()), Some("AB12CD34".to_string()));
    }

    #[test]
    fn code_rejects_wrong_length_and_symbols() {
        assert!(RegistrationCode::parse("AB12CD3").is_none());
        assert!(RegistrationCode::parse("AB12CD345").is_none());
        assert!(RegistrationCode::parse("AB12-D34").is_none());
        assert!(RegistrationCode::parse("AB12 D34").is_none());
        assert!(RegistrationCode::parse("").is_none());
    }

    #[test]
    fn code_rejects_multibyte_text_of_eight_bytes() {
        // Four two-byte letters
        assert!(RegistrationCode::parse("жжжж").is_none());
    }

    #[test]
    fn phone_gets_leading_plus() {
        assert_eq!(PhoneNumber::new("998901234567").as_str(), "+998901234567");
        assert_eq!(PhoneNumber::new("+998901234567").as_str(), "+998901234567");
    }
}
