//! Telegram Bot API transport.
//!
//! [`TelegramMessenger`] renders replies with the campaign keyboards.
//! [`UpdatePoller`] long-polls `getUpdates` and feeds routed actions into the
//! store until it receives a shutdown signal.

use super::route_update;
use crate::CampaignStore;
use crate::copy;
use crate::messenger::{Document, Keyboard, Messenger, MessengerError, Reply};
use campaign_runtime::StoreError;
use campaign_telegram::{KeyboardButton, ReplyMarkup, SendMessage, TelegramClient, TelegramError};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

// ============================================================================
// Messenger
// ============================================================================

/// [`Messenger`] backed by the Bot API
#[derive(Debug, Clone)]
pub struct TelegramMessenger {
    client: Arc<TelegramClient>,
}

impl TelegramMessenger {
    /// Deliver through `client`
    #[must_use]
    pub const fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

/// Bot API markup for a keyboard; `None` leaves the current one in place
#[must_use]
pub fn keyboard_markup(keyboard: Keyboard) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::Keep => None,
        Keyboard::MainMenu => Some(ReplyMarkup::rows(vec![
            KeyboardButton::text(copy::BEGIN_BUTTON),
            KeyboardButton::text(copy::SOCIAL_BUTTON),
        ])),
        Keyboard::ShareContact => Some(ReplyMarkup::rows(vec![KeyboardButton::request_contact(
            copy::SHARE_CONTACT_BUTTON,
        )])),
        Keyboard::YesNo => Some(ReplyMarkup::row(vec![
            KeyboardButton::text(copy::YES_BUTTON),
            KeyboardButton::text(copy::NO_BUTTON),
        ])),
        Keyboard::Remove => Some(ReplyMarkup::remove()),
    }
}

fn delivery_error(error: &TelegramError) -> MessengerError {
    MessengerError::Delivery(error.to_string())
}

impl Messenger for TelegramMessenger {
    fn send_reply(&self, reply: Reply) -> BoxFuture<'_, Result<(), MessengerError>> {
        async move {
            let mut message = SendMessage::text(reply.chat.0, reply.text);
            if let Some(markup) = keyboard_markup(reply.keyboard) {
                message = message.with_markup(markup);
            }

            self.client
                .send_message(&message)
                .await
                .map(|_| ())
                .map_err(|e| delivery_error(&e))
        }
        .boxed()
    }

    fn send_document(&self, document: Document) -> BoxFuture<'_, Result<(), MessengerError>> {
        async move {
            self.client
                .send_document(
                    document.chat.0,
                    &document.file_name,
                    document.bytes,
                    document.caption.as_deref(),
                )
                .await
                .map(|_| ())
                .map_err(|e| delivery_error(&e))
        }
        .boxed()
    }
}

// ============================================================================
// Long polling
// ============================================================================

/// Longest pause between failed polls
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Long-polling update loop
///
/// Offsets are acknowledged as soon as an update has been handed to the store,
/// so an update is never routed twice.
pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    store: CampaignStore,
    poll_timeout_secs: u64,
    retry_delay: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl UpdatePoller {
    /// Create a poller feeding `store`
    ///
    /// Defaults: 30 second long-poll timeout, 1 second initial retry delay.
    #[must_use]
    pub const fn new(
        client: Arc<TelegramClient>,
        store: CampaignStore,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            client,
            store,
            poll_timeout_secs: 30,
            retry_delay: Duration::from_secs(1),
            shutdown,
        }
    }

    /// Set the `getUpdates` long-poll timeout
    #[must_use]
    pub const fn with_poll_timeout(mut self, seconds: u64) -> Self {
        self.poll_timeout_secs = seconds;
        self
    }

    /// Set the first retry delay after a failed poll (doubles up to a minute)
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run the loop in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<(), TelegramError>> {
        tokio::spawn(self.run())
    }

    /// Poll until shutdown
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::Unauthorized`] if the bot token is rejected;
    /// every other failure is retried with backoff.
    #[tracing::instrument(skip(self), name = "update_poller")]
    pub async fn run(mut self) -> Result<(), TelegramError> {
        info!("Update poller started");

        let mut offset: Option<i64> = None;
        let mut backoff = self.retry_delay;

        'poll: loop {
            let updates = tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Update poller received shutdown signal");
                    break;
                }
                result = self.client.get_updates(offset, self.poll_timeout_secs) => result,
            };

            match updates {
                Ok(updates) => {
                    backoff = self.retry_delay;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        metrics::counter!("telegram.updates.received").increment(1);

                        let Some(action) = route_update(&update) else {
                            debug!(update_id = update.update_id, "Ignoring update");
                            continue;
                        };

                        match self.store.send(action).await {
                            Ok(_handle) => {},
                            Err(StoreError::ShutdownInProgress) => {
                                info!("Store shutting down, update poller stopping");
                                break 'poll;
                            },
                            Err(e) => warn!(error = %e, "Store rejected update"),
                        }
                    }
                },
                Err(TelegramError::Unauthorized) => {
                    error!("Bot token rejected, update poller stopping");
                    return Err(TelegramError::Unauthorized);
                },
                Err(e) => {
                    let delay = match &e {
                        TelegramError::RateLimited {
                            retry_after: Some(seconds),
                        } => Duration::from_secs(*seconds),
                        _ => backoff,
                    };
                    warn!(error = %e, transient = e.is_transient(), "Polling failed, retrying in {:?}", delay);
                    metrics::counter!("telegram.poll.failures").increment(1);

                    tokio::select! {
                        _ = self.shutdown.recv() => {
                            info!("Update poller received shutdown signal");
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                },
            }
        }

        // Confirm the last offset so a restart does not route the same updates again
        if offset.is_some() {
            if let Err(e) = self.client.get_updates(offset, 0).await {
                warn!(error = %e, "Could not acknowledge final update offset");
            }
        }

        info!("Update poller stopped");
        Ok(())
    }
}
