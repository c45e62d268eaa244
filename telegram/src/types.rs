//! Bot API object types
//!
//! Only the fields the campaign bot reads or writes are modelled; unknown
//! fields in responses are ignored by serde.

use serde::{Deserialize, Serialize};

/// Incoming update from `getUpdates`
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier, used as the polling offset
    pub update_id: i64,
    /// New incoming message, if this update carries one
    #[serde(default)]
    pub message: Option<Message>,
}

/// A chat message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Message identifier inside the chat
    pub message_id: i64,
    /// Sender; empty for messages sent to channels
    #[serde(default)]
    pub from: Option<User>,
    /// Conversation the message belongs to
    pub chat: Chat,
    /// Unix time the message was sent
    pub date: i64,
    /// UTF-8 text of the message
    #[serde(default)]
    pub text: Option<String>,
    /// Shared contact
    #[serde(default)]
    pub contact: Option<Contact>,
}

/// A Telegram user or bot
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: i64,
    /// True for bots
    #[serde(default)]
    pub is_bot: bool,
    /// First name
    pub first_name: String,
    /// Username, without the leading `@`
    #[serde(default)]
    pub username: Option<String>,
}

/// A chat
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Chat {
    /// Unique chat identifier
    pub id: i64,
}

/// A phone contact shared through the contact button
#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    /// Phone number as Telegram reports it (may lack a leading `+`)
    pub phone_number: String,
    /// Contact's first name
    pub first_name: String,
    /// Telegram user the contact belongs to, if known
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Parameters for `sendMessage`
#[derive(Debug, Clone, Serialize)]
pub struct SendMessage {
    /// Target chat
    pub chat_id: i64,
    /// Message text
    pub text: String,
    /// Keyboard change to apply with this message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
    /// Disable link previews (the closing message carries links)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_web_page_preview: bool,
}

impl SendMessage {
    /// Plain text message without keyboard changes
    #[must_use]
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_markup: None,
            disable_web_page_preview: false,
        }
    }

    /// Attach a keyboard change
    #[must_use]
    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

/// Reply markup variants the bot uses
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    /// Custom reply keyboard
    Keyboard(ReplyKeyboardMarkup),
    /// Hide the current custom keyboard
    Remove(ReplyKeyboardRemove),
}

impl ReplyMarkup {
    /// One button per row, resized to fit
    #[must_use]
    pub fn rows(buttons: Vec<KeyboardButton>) -> Self {
        Self::Keyboard(ReplyKeyboardMarkup {
            keyboard: buttons.into_iter().map(|button| vec![button]).collect(),
            resize_keyboard: true,
            one_time_keyboard: false,
        })
    }

    /// Single row of buttons, resized to fit
    #[must_use]
    pub fn row(buttons: Vec<KeyboardButton>) -> Self {
        Self::Keyboard(ReplyKeyboardMarkup {
            keyboard: vec![buttons],
            resize_keyboard: true,
            one_time_keyboard: false,
        })
    }

    /// Remove the keyboard
    #[must_use]
    pub const fn remove() -> Self {
        Self::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        })
    }
}

/// Custom keyboard
#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardMarkup {
    /// Rows of buttons
    pub keyboard: Vec<Vec<KeyboardButton>>,
    /// Shrink the keyboard to its content
    pub resize_keyboard: bool,
    /// Hide after one press
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub one_time_keyboard: bool,
}

/// Keyboard button
#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    /// Label, sent back as a text message when pressed
    pub text: String,
    /// Ask the user to share their phone number instead of sending text
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
}

impl KeyboardButton {
    /// Plain text button
    #[must_use]
    pub fn text(label: impl Into<String>) -> Self {
        Self {
            text: label.into(),
            request_contact: false,
        }
    }

    /// Button that shares the user's contact
    #[must_use]
    pub fn request_contact(label: impl Into<String>) -> Self {
        Self {
            text: label.into(),
            request_contact: true,
        }
    }
}

/// Keyboard removal marker
#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardRemove {
    /// Always `true`
    pub remove_keyboard: bool,
}

/// Parameters for `getUpdates`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'a [&'a str],
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Extra error information
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}
