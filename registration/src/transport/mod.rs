//! Chat transport: turning inbound Telegram updates into actions and
//! delivering replies.
//!
//! Routing is a pure function of the update so it can be tested without a
//! network. The [`telegram`] module holds the Bot API messenger and the long
//! polling loop.

pub mod telegram;

pub use telegram::{TelegramMessenger, UpdatePoller};

use crate::actions::RegistrationAction;
use crate::copy;
use crate::types::{ChatId, PhoneNumber, UserId};
use campaign_telegram::{Message, Update};

/// Map an update to the action it stands for
///
/// Returns `None` for updates the bot ignores: non-message updates, messages
/// without a sender, and messages from other bots.
#[must_use]
pub fn route_update(update: &Update) -> Option<RegistrationAction> {
    let message = update.message.as_ref()?;
    let sender = message.from.as_ref()?;
    if sender.is_bot {
        return None;
    }

    let user = UserId(sender.id);
    let chat = ChatId(message.chat.id);
    Some(route_message(message, user, chat))
}

fn route_message(message: &Message, user: UserId, chat: ChatId) -> RegistrationAction {
    if let Some(contact) = &message.contact {
        // Only the sender's own contact counts as their phone number
        return match contact.user_id {
            Some(owner) if owner != user.0 => RegistrationAction::UnsupportedMessage { user, chat },
            _ => RegistrationAction::ContactShared {
                user,
                chat,
                phone: PhoneNumber::new(&contact.phone_number),
            },
        };
    }

    let Some(text) = message.text.as_deref() else {
        return RegistrationAction::UnsupportedMessage { user, chat };
    };

    match command(text) {
        Some("start") => return RegistrationAction::Start { user, chat },
        Some("export") => return RegistrationAction::ExportRequested { user, chat },
        _ => {},
    }

    match text.trim() {
        copy::BEGIN_BUTTON => RegistrationAction::BeginRegistration { user, chat },
        copy::SOCIAL_BUTTON => RegistrationAction::SocialLinksRequested { user, chat },
        _ => RegistrationAction::TextReceived {
            user,
            chat,
            text: text.to_string(),
        },
    }
}

/// Command name of `/name`, `/name@bot` or `/name payload`
fn command(text: &str) -> Option<&str> {
    let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
    Some(word.split('@').next().unwrap_or(word))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use campaign_telegram::{Chat, Contact, User};

    fn message(text: Option<&str>, contact: Option<Contact>) -> Update {
        Update {
            update_id: 1,
            message: Some(Message {
                message_id: 10,
                from: Some(User {
                    id: 42,
                    is_bot: false,
                    first_name: "Aziza".into(),
                    username: None,
                }),
                chat: Chat { id: 420 },
                date: 1_735_689_600,
                text: text.map(str::to_string),
                contact,
            }),
        }
    }

    fn contact(user_id: Option<i64>) -> Contact {
        Contact {
            phone_number: "998901234567".into(),
            first_name: "Aziza".into(),
            user_id,
        }
    }

    #[test]
    fn commands() {
        let user = UserId(42);
        let chat = ChatId(420);
        assert_eq!(
            route_update(&message(Some("/start"), None)),
            Some(RegistrationAction::Start { user, chat })
        );
        assert_eq!(
            route_update(&message(Some("/start@campaign_bot promo"), None)),
            Some(RegistrationAction::Start { user, chat })
        );
        assert_eq!(
            route_update(&message(Some("/export"), None)),
            Some(RegistrationAction::ExportRequested { user, chat })
        );
    }

    #[test]
    fn menu_buttons() {
        assert!(matches!(
            route_update(&message(Some(copy::BEGIN_BUTTON), None)),
            Some(RegistrationAction::BeginRegistration { .. })
        ));
        assert!(matches!(
            route_update(&message(Some(copy::SOCIAL_BUTTON), None)),
            Some(RegistrationAction::SocialLinksRequested { .. })
        ));
    }

    #[test]
    fn own_contact_is_normalized() {
        let action = route_update(&message(None, Some(contact(Some(42))))).unwrap();
        assert_eq!(
            action,
            RegistrationAction::ContactShared {
                user: UserId(42),
                chat: ChatId(420),
                phone: PhoneNumber::new("+998901234567"),
            }
        );
    }

    #[test]
    fn foreign_contact_is_unsupported() {
        assert!(matches!(
            route_update(&message(None, Some(contact(Some(7))))),
            Some(RegistrationAction::UnsupportedMessage { .. })
        ));
    }

    #[test]
    fn other_text_and_media() {
        assert_eq!(
            route_update(&message(Some(" AB12CD34 "), None)),
            Some(RegistrationAction::TextReceived {
                user: UserId(42),
                chat: ChatId(420),
                text: " AB12CD34 ".into(),
            })
        );
        assert!(matches!(
            route_update(&message(None, None)),
            Some(RegistrationAction::UnsupportedMessage { .. })
        ));
    }

    #[test]
    fn ignored_updates() {
        assert_eq!(
            route_update(&Update {
                update_id: 2,
                message: None
            }),
            None
        );

        let mut from_bot = message(Some("/start"), None);
        if let Some(message) = from_bot.message.as_mut() {
            message.from.as_mut().unwrap().is_bot = true;
        }
        assert_eq!(route_update(&from_bot), None);
    }
}
