//! User-facing texts and button labels.

use crate::types::TicketNumber;
use std::fmt::Write as _;

/// Main menu: start a registration
pub const BEGIN_BUTTON: &str = "🎁 Join the campaign";
/// Main menu: show social links
pub const SOCIAL_BUTTON: &str = "🌐 Our social media";
/// Contact-sharing button
pub const SHARE_CONTACT_BUTTON: &str = "📱 Share phone number";
/// Continue prompt: register another code
pub const YES_BUTTON: &str = "✅ Yes";
/// Continue prompt: finish
pub const NO_BUTTON: &str = "❌ No";

/// Phone request shown after the begin button
pub const ASK_PHONE: &str = "Please share your phone number using the button below.";
/// Typed text while a phone number is expected
pub const USE_CONTACT_BUTTON: &str =
    "📱 Please use the \"Share phone number\" button so we can confirm your number.";
/// Code request once the phone is known
pub const ASK_CODE: &str =
    "Now enter the 8-character product code 🧾 to take part in the prize draw 🎁";
/// Non-text input while a code is expected
pub const TYPE_THE_CODE: &str = "Please type the 8-character product code as a text message.";
/// Input outside a dialogue
pub const USE_MENU: &str = "Press \"🎁 Join the campaign\" to register a product code.";
/// Input while a redemption is in flight
pub const PLEASE_WAIT: &str = "⏳ Checking your code, please wait…";
/// Code exists but was redeemed before
pub const CODE_ALREADY_USED: &str = "⚠️ Unfortunately this code has already been used.\n\
     📌 Perhaps another participant registered it before you.\n\
     💡 Don't give up, luck may still be on your side!";
/// Repeated "another code?" prompt
pub const ASK_CONTINUE: &str =
    "Do you have another code to register? Please answer with the buttons below.";
/// Export requested by someone other than the admin
pub const NOT_AUTHORIZED: &str = "You do not have permission to do that.";
/// Export with no registrations yet
pub const NOTHING_REGISTERED: &str = "📂 Nobody has registered yet.";
/// Export could not read the store
pub const EXPORT_FAILED: &str = "⚠️ The export could not be created. Please try again later.";
/// Storage failed during redemption
pub const TEMPORARY_FAILURE: &str =
    "⚠️ We could not register your code right now. Please send it again in a moment.";

/// Answer to the "another code?" prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Register another code
    Yes,
    /// Finish
    No,
}

impl Answer {
    /// Recognize a button press or a typed yes/no
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == YES_BUTTON || ["yes", "y"].iter().any(|w| text.eq_ignore_ascii_case(w)) {
            Some(Self::Yes)
        } else if text == NO_BUTTON || ["no", "n"].iter().any(|w| text.eq_ignore_ascii_case(w)) {
            Some(Self::No)
        } else {
            None
        }
    }
}

/// Answer to `/start`
#[must_use]
pub fn greeting() -> String {
    format!(
        "👋 Welcome to the campaign!\n\
         🌟 Every code is a chance. Every chance is a step closer to your dream!\n\n\
         Press \"{BEGIN_BUTTON}\" to register a product code."
    )
}

/// Unknown code with `remaining` attempts left
#[must_use]
pub fn invalid_code(remaining: u32) -> String {
    format!(
        "❌ This code is not part of the campaign.\n\
         Please check it and try again. Attempts left: {remaining}"
    )
}

/// Lockout notice right after the last failed attempt
#[must_use]
pub fn locked_out(seconds: i64) -> String {
    format!(
        "⛔ Too many invalid codes. Registration is blocked for {seconds} seconds, \
         please try again later."
    )
}

/// Any input during a lockout
#[must_use]
pub fn still_locked(seconds: i64) -> String {
    format!("⏳ You are temporarily blocked. Please try again in {seconds} seconds.")
}

/// Successful registration with its ticket
#[must_use]
pub fn registered(ticket: TicketNumber) -> String {
    format!(
        "✅ Congratulations! Your code has been registered.\n\
         🎯 Your unique campaign number: {ticket}\n\
         🌟 You are one step closer to your dream. Good luck in the draw!\n\n\
         Do you have another code to register?"
    )
}

/// Farewell after declining another round
#[must_use]
pub fn closing(tickets: &[TicketNumber], links: &[String]) -> String {
    let mut text = String::from("🙏 Thank you for taking part!");

    if !tickets.is_empty() {
        let numbers: Vec<String> = tickets.iter().map(ToString::to_string).collect();
        let _ = write!(text, "\n🎟 Your campaign numbers: {}", numbers.join(", "));
    }

    if !links.is_empty() {
        text.push_str("\n\nFollow us to see the draw results:");
        for link in links {
            let _ = write!(text, "\n{link}");
        }
    }

    text
}

/// Answer to the social media button
#[must_use]
pub fn social_links(links: &[String]) -> String {
    if links.is_empty() {
        return "🌐 Our social media pages will be announced soon.".to_string();
    }

    let mut text = String::from("🌐 Follow us:");
    for link in links {
        let _ = write!(text, "\n{link}");
    }
    text
}

/// Caption of the export document
#[must_use]
pub fn export_caption(rows: usize) -> String {
    format!("📊 Registrations: {rows}")
}
