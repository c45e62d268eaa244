//! Test doubles for the registration environment.

use crate::messenger::{Document, Keyboard, Messenger, MessengerError, Reply};
use crate::types::ChatId;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Something the messenger was asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text reply
    Reply(Reply),
    /// A document
    Document(Document),
}

/// Messenger that records everything it is asked to send
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<Outbound>>>,
    fail: Arc<AtomicBool>,
    stall: Arc<Mutex<Option<Duration>>>,
}

impl RecordingMessenger {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later delivery fail (still recorded)
    pub fn fail_deliveries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Hold the next delivery for `delay` before recording it
    pub fn stall_next_delivery(&self, delay: Duration) {
        if let Ok(mut stall) = self.stall.lock() {
            *stall = Some(delay);
        }
    }

    /// Everything sent so far
    #[must_use]
    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Text replies sent so far
    #[must_use]
    pub fn replies(&self) -> Vec<Reply> {
        self.sent()
            .into_iter()
            .filter_map(|outbound| match outbound {
                Outbound::Reply(reply) => Some(reply),
                Outbound::Document(_) => None,
            })
            .collect()
    }

    /// Documents sent so far
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        self.sent()
            .into_iter()
            .filter_map(|outbound| match outbound {
                Outbound::Document(document) => Some(document),
                Outbound::Reply(_) => None,
            })
            .collect()
    }

    /// Most recent reply to `chat`
    #[must_use]
    pub fn last_reply_to(&self, chat: ChatId) -> Option<Reply> {
        self.replies().into_iter().rev().find(|reply| reply.chat == chat)
    }

    /// Most recent reply text to `chat`, or an empty string
    #[must_use]
    pub fn last_text_to(&self, chat: ChatId) -> String {
        self.last_reply_to(chat).map(|reply| reply.text).unwrap_or_default()
    }

    /// Keyboard of the most recent reply to `chat`
    #[must_use]
    pub fn last_keyboard_to(&self, chat: ChatId) -> Option<Keyboard> {
        self.last_reply_to(chat).map(|reply| reply.keyboard)
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn record(&self, outbound: Outbound) -> Result<(), MessengerError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(outbound);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(MessengerError::Delivery("recording messenger set to fail".into()));
        }
        Ok(())
    }
}

impl Messenger for RecordingMessenger {
    fn send_reply(&self, reply: Reply) -> BoxFuture<'_, Result<(), MessengerError>> {
        let stall = self.stall.lock().ok().and_then(|mut stall| stall.take());
        async move {
            if let Some(delay) = stall {
                tokio::time::sleep(delay).await;
            }
            self.record(Outbound::Reply(reply))
        }
        .boxed()
    }

    fn send_document(&self, document: Document) -> BoxFuture<'_, Result<(), MessengerError>> {
        futures::future::ready(self.record(Outbound::Document(document))).boxed()
    }
}
