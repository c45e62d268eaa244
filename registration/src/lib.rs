//! Promotional campaign registration bot.
//!
//! Customers register product codes through a Telegram dialogue. Each valid,
//! unused code is redeemed exactly once and earns a sequential ticket number
//! for the prize draw. The administrator can export every registration as CSV.
//!
//! # Architecture
//!
//! ```text
//!  Telegram ──getUpdates──▶ UpdatePoller ──route_update──▶ Store<SessionStore>
//!                                                              │
//!                                                   RegistrationReducer
//!                                                              │ effects
//!                        ┌─────────────────────┬───────────────┴────────┐
//!                        ▼                     ▼                        ▼
//!                  Messenger            CampaignStorage            AdminExport
//!              (TelegramMessenger)   (ledger + registrations)      (CSV render)
//! ```
//!
//! # Guarantees
//!
//! - A code is redeemed at most once, even under concurrent submissions.
//! - Ticket numbers start at 1 and increase by one per registration.
//! - Three consecutive invalid codes lock the user out for a cooldown.
//! - Only the configured administrator can export.

pub mod actions;
pub mod app;
pub mod config;
pub mod copy;
pub mod export;
pub mod messenger;
pub mod mocks;
pub mod policy;
pub mod reducer;
pub mod registry;
pub mod session;
pub mod stores;
pub mod transport;
pub mod types;

pub use actions::RegistrationAction;
pub use reducer::{RegistrationEnvironment, RegistrationReducer};
pub use session::{Session, SessionStore, Stage};

/// The store running the registration dialogue
pub type CampaignStore = campaign_runtime::Store<
    SessionStore,
    RegistrationAction,
    RegistrationEnvironment,
    RegistrationReducer,
>;
