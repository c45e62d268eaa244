//! Outbound messaging seam.
//!
//! The reducer describes replies as values; a [`Messenger`] delivers them over
//! whatever chat transport is wired in (Telegram in production, a recorder in
//! tests).
//!
//! Every delivery runs in its own task, so [`DeliveryOrder`] hands out
//! per-chat turns while the reducer runs. A delivery waits for the turns
//! before it, which keeps a chat's messages in reduction order.

use crate::types::ChatId;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;

/// Reply keyboard to show with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave the current keyboard alone
    Keep,
    /// Campaign main menu
    MainMenu,
    /// Single contact-sharing button
    ShareContact,
    /// Yes / No answer buttons
    YesNo,
    /// Hide the keyboard
    Remove,
}

/// A text reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Destination chat
    pub chat: ChatId,
    /// Message text
    pub text: String,
    /// Keyboard change
    pub keyboard: Keyboard,
}

impl Reply {
    /// Build a reply
    #[must_use]
    pub fn new(chat: ChatId, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            chat,
            text: text.into(),
            keyboard,
        }
    }
}

/// A file sent to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Destination chat
    pub chat: ChatId,
    /// File name shown to the receiver
    pub file_name: String,
    /// File contents
    pub bytes: Vec<u8>,
    /// Optional caption
    pub caption: Option<String>,
}

/// Delivery failure
#[derive(Debug, Error)]
pub enum MessengerError {
    /// The transport rejected or failed to deliver the message
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Sends replies and documents to users
pub trait Messenger: Send + Sync {
    /// Send a text reply
    fn send_reply(&self, reply: Reply) -> BoxFuture<'_, Result<(), MessengerError>>;

    /// Send a document
    fn send_document(&self, document: Document) -> BoxFuture<'_, Result<(), MessengerError>>;
}

// ============================================================================
// Delivery order
// ============================================================================

#[derive(Debug)]
struct ChatQueue {
    issued: u64,
    served: watch::Sender<u64>,
}

/// Per-chat turn dispenser
///
/// A chat's entry is dropped once every turn taken for it has been served.
#[derive(Debug, Default)]
pub struct DeliveryOrder {
    chats: Mutex<HashMap<ChatId, ChatQueue>>,
}

impl DeliveryOrder {
    /// Create an empty dispenser
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next turn for `chat`
    #[must_use]
    pub fn take_turn(self: &Arc<Self>, chat: ChatId) -> Turn {
        let mut chats = self.chats();
        let queue = chats.entry(chat).or_insert_with(|| ChatQueue {
            issued: 0,
            served: watch::channel(0).0,
        });
        let ticket = queue.issued;
        queue.issued += 1;

        Turn {
            order: Arc::clone(self),
            chat,
            ticket,
        }
    }

    /// Turns taken for `chat` and not yet served
    #[must_use]
    pub fn pending(&self, chat: ChatId) -> u64 {
        self.chats()
            .get(&chat)
            .map_or(0, |queue| queue.issued - *queue.served.borrow())
    }

    fn chats(&self) -> MutexGuard<'_, HashMap<ChatId, ChatQueue>> {
        self.chats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A place in a chat's delivery queue; served when dropped
#[derive(Debug)]
pub struct Turn {
    order: Arc<DeliveryOrder>,
    chat: ChatId,
    ticket: u64,
}

impl Turn {
    /// Resolve once every earlier turn for the chat has been served
    pub async fn ready(&self) {
        let served = self
            .order
            .chats()
            .get(&self.chat)
            .map(|queue| queue.served.subscribe());

        if let Some(mut served) = served {
            let ticket = self.ticket;
            let _ = served.wait_for(|served| *served >= ticket).await;
        }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        let mut chats = self.order.chats();
        if let Some(queue) = chats.get_mut(&self.chat) {
            let served = *queue.served.borrow() + 1;
            if served >= queue.issued {
                chats.remove(&self.chat);
            } else {
                queue.served.send_replace(served);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn later_turn_waits_for_earlier_one() {
        let order = Arc::new(DeliveryOrder::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = order.take_turn(ChatId(7));
        let second = order.take_turn(ChatId(7));
        assert_eq!(order.pending(ChatId(7)), 2);

        let later = {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                second.ready().await;
                log.lock().unwrap().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(log.lock().unwrap().is_empty());

        first.ready().await;
        log.lock().unwrap().push("first");
        drop(first);

        later.await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
        assert_eq!(order.pending(ChatId(7)), 0);
    }

    #[tokio::test]
    async fn chats_do_not_wait_for_each_other() {
        let order = Arc::new(DeliveryOrder::new());
        let _busy = order.take_turn(ChatId(1));
        let other = order.take_turn(ChatId(2));

        tokio::time::timeout(Duration::from_millis(100), other.ready())
            .await
            .unwrap();
    }
}
