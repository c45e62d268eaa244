//! Error types for the Telegram Bot API client

use thiserror::Error;

/// Errors that can occur when talking to the Telegram Bot API
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response body was not a valid Bot API envelope
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Bot token was rejected
    #[error("Unauthorized - invalid bot token")]
    Unauthorized,

    /// Flood control: Telegram asks us to wait before retrying
    #[error("Rate limited - retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait, when Telegram says
        retry_after: Option<u64>,
    },

    /// API returned `ok: false`
    #[error("API error (status {status}): {description}")]
    ApiError {
        /// Bot API error code (mirrors the HTTP status)
        status: u16,
        /// Human readable description from Telegram
        description: String,
    },
}

impl TelegramError {
    /// Whether retrying the same call later can succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::RateLimited { .. } => true,
            Self::ApiError { status, .. } => *status >= 500,
            Self::ResponseParseFailed(_) | Self::Unauthorized => false,
        }
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(error: reqwest::Error) -> Self {
        // Strip the URL: it embeds the bot token
        Self::RequestFailed(error.without_url().to_string())
    }
}
