//! Actions for the registration reducer.
//!
//! Commands come from the chat transport; events are fed back by the
//! redemption effect.

use crate::types::{ChatId, PhoneNumber, Registration, RegistrationCode, UserId};

/// Everything the conversation controller reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationAction {
    // Commands
    /// `/start`
    Start {
        /// Sender
        user: UserId,
        /// Reply target
        chat: ChatId,
    },
    /// Main menu "join" button
    BeginRegistration {
        /// Sender
        user: UserId,
        /// Reply target
        chat: ChatId,
    },
    /// The user shared their own contact
    ContactShared {
        /// Sender
        user: UserId,
        /// Reply target
        chat: ChatId,
        /// Phone number from the contact
        phone: PhoneNumber,
    },
    /// Any other text (codes, yes/no answers)
    TextReceived {
        /// Sender
        user: UserId,
        /// Reply target
        chat: ChatId,
        /// Raw message text
        text: String,
    },
    /// A message the dialogue cannot use (sticker, photo, someone else's contact)
    UnsupportedMessage {
        /// Sender
        user: UserId,
        /// Reply target
        chat: ChatId,
    },
    /// `/export`
    ExportRequested {
        /// Sender
        user: UserId,
        /// Reply target
        chat: ChatId,
    },
    /// Main menu social media button
    SocialLinksRequested {
        /// Sender
        user: UserId,
        /// Reply target
        chat: ChatId,
    },

    // Events
    /// Code redeemed and registration written
    CodeRedeemed {
        /// Redeeming user
        user: UserId,
        /// Reply target
        chat: ChatId,
        /// The stored registration
        registration: Registration,
    },
    /// Code was in the ledger already
    CodeAlreadyUsed {
        /// Redeeming user
        user: UserId,
        /// Reply target
        chat: ChatId,
        /// Rejected code
        code: RegistrationCode,
    },
    /// Storage failed while redeeming
    RedemptionFailed {
        /// Redeeming user
        user: UserId,
        /// Reply target
        chat: ChatId,
        /// Error description
        error: String,
    },
}

impl RegistrationAction {
    /// The user this action belongs to
    #[must_use]
    pub const fn user(&self) -> UserId {
        match self {
            Self::Start { user, .. }
            | Self::BeginRegistration { user, .. }
            | Self::ContactShared { user, .. }
            | Self::TextReceived { user, .. }
            | Self::UnsupportedMessage { user, .. }
            | Self::ExportRequested { user, .. }
            | Self::SocialLinksRequested { user, .. }
            | Self::CodeRedeemed { user, .. }
            | Self::CodeAlreadyUsed { user, .. }
            | Self::RedemptionFailed { user, .. } => *user,
        }
    }

    /// Whether this is an event fed back by an effect
    #[must_use]
    pub const fn is_event(&self) -> bool {
        matches!(
            self,
            Self::CodeRedeemed { .. } | Self::CodeAlreadyUsed { .. } | Self::RedemptionFailed { .. }
        )
    }
}
