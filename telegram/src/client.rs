//! Telegram Bot API client implementation

use crate::{
    error::TelegramError,
    types::{ApiResponse, GetUpdates, Message, SendMessage, Update, User},
};
use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Default Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Extra time granted to the HTTP request beyond the long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
    api_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a new client with an explicit bot token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Point the client at another Bot API server (local server or test double)
    #[must_use]
    pub fn with_base_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Fetch the bot's own account; used as a token check at startup
    ///
    /// # Errors
    ///
    /// Returns `TelegramError::Unauthorized` for a bad token, or transport errors
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long-poll for new message updates
    ///
    /// `offset` is one past the last processed `update_id`; Telegram forgets
    /// every update below it.
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API errors, or parsing failures
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .json(&params)
            .send()
            .await?;

        decode(response).await
    }

    /// Send a text message
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API errors, or parsing failures
    pub async fn send_message(&self, message: &SendMessage) -> Result<Message, TelegramError> {
        self.call("sendMessage", message).await
    }

    /// Upload a document (multipart form)
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API errors, or parsing failures
    pub async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<Message, TelegramError> {
        let document = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", document);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        decode(response).await
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .send()
            .await?;

        decode(response).await
    }
}

/// Decode a Bot API envelope, regardless of HTTP status
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TelegramError> {
    let status = response.status();
    let body = response.text().await?;

    let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
        TelegramError::ResponseParseFailed(format!("status {status}: {e}"))
    })?;

    if envelope.ok {
        return envelope.result.ok_or_else(|| {
            TelegramError::ResponseParseFailed("`ok` response without `result`".to_string())
        });
    }

    let code = envelope.error_code.unwrap_or_else(|| status.as_u16());
    let description = envelope.description.unwrap_or_default();

    tracing::debug!(code, %description, "Bot API call rejected");

    match code {
        401 => Err(TelegramError::Unauthorized),
        429 => Err(TelegramError::RateLimited {
            retry_after: envelope.parameters.and_then(|p| p.retry_after),
        }),
        status => Err(TelegramError::ApiError {
            status,
            description,
        }),
    }
}
