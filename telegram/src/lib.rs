//! # Campaign Telegram
//!
//! A small Telegram Bot API client covering what a registration bot needs:
//! long polling, text replies with reply keyboards, and document uploads.
//!
//! ## Example
//!
//! ```ignore
//! use campaign_telegram::{SendMessage, TelegramClient};
//!
//! let client = TelegramClient::new(token);
//! let updates = client.get_updates(None, 30).await?;
//! for update in updates {
//!     if let Some(message) = update.message {
//!         client.send_message(&SendMessage::text(message.chat.id, "Hello")).await?;
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_API_URL, TelegramClient};
pub use error::TelegramError;
pub use types::{
    Chat, Contact, KeyboardButton, Message, ReplyKeyboardMarkup, ReplyKeyboardRemove,
    ReplyMarkup, SendMessage, Update, User,
};
