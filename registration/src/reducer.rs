//! The conversation controller.
//!
//! One reducer drives every user's dialogue:
//!
//! ```text
//! Idle ──begin──▶ AwaitingPhone ──contact──▶ AwaitingCode ──valid code──▶ Redeeming
//!  ▲                    ▲                        │   ▲                      │
//!  │                    │                 invalid│   │already used/failed   │redeemed
//!  │                    │              (3rd: lock)   └──────────────────────┤
//!  │                    └───────────yes──── AwaitingContinue ◀──────────────┘
//!  └──────────────────────────────no─────────────┘
//! ```
//!
//! Replies and storage access are effects; the reducer itself only touches
//! the session store.

use crate::actions::RegistrationAction;
use crate::copy::{self, Answer};
use crate::export::{AdminExport, ExportError};
use crate::messenger::{DeliveryOrder, Document, Keyboard, Messenger, Reply};
use crate::policy::{AttemptVerdict, LockoutPolicy};
use crate::registry::CodeRegistry;
use crate::session::{SessionStore, Stage};
use crate::stores::{CampaignStorage, Redemption};
use crate::types::{ChatId, NewRegistration, PhoneNumber, TicketNumber, UserId};
use campaign_core::effect::Effect;
use campaign_core::environment::Clock;
use campaign_core::reducer::Reducer;
use chrono::{DateTime, Utc};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

type Effects = SmallVec<[Effect<RegistrationAction>; 4]>;

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the conversation controller
#[derive(Clone)]
pub struct RegistrationEnvironment {
    /// Valid campaign codes
    pub registry: Arc<CodeRegistry>,
    /// Ledger and registration store
    pub storage: Arc<dyn CampaignStorage>,
    /// Outbound chat messages
    pub messenger: Arc<dyn Messenger>,
    /// Keeps each chat's messages in reduction order
    pub delivery: Arc<DeliveryOrder>,
    /// Time source for lockouts and timestamps
    pub clock: Arc<dyn Clock>,
    /// Invalid-code lockout
    pub policy: LockoutPolicy,
    /// Admin export gate
    pub export: AdminExport,
    /// Links shown by the social button and the closing message
    pub social_links: Arc<[String]>,
}

impl RegistrationEnvironment {
    /// Creates a new `RegistrationEnvironment` with the default lockout policy
    /// and no social links
    #[must_use]
    pub fn new(
        registry: Arc<CodeRegistry>,
        storage: Arc<dyn CampaignStorage>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
        admin: UserId,
    ) -> Self {
        Self {
            registry,
            storage,
            messenger,
            delivery: Arc::new(DeliveryOrder::new()),
            clock,
            policy: LockoutPolicy::default(),
            export: AdminExport::new(admin),
            social_links: Arc::from(Vec::new()),
        }
    }

    /// Replace the lockout policy
    #[must_use]
    pub const fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the social links
    #[must_use]
    pub fn with_social_links(mut self, links: Vec<String>) -> Self {
        self.social_links = Arc::from(links);
        self
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the registration dialogue
#[derive(Clone, Debug, Default)]
pub struct RegistrationReducer;

impl RegistrationReducer {
    /// Creates a new `RegistrationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn transition(state: &mut SessionStore, user: UserId, stage: Stage) {
        let from = state.stage(user);
        tracing::debug!(%user, from = from.name(), to = stage.name(), "Stage transition");
        state.set_stage(user, stage);
    }

    /// Reminder for input the current stage cannot use
    fn remind(stage: &Stage, chat: ChatId, env: &RegistrationEnvironment) -> Effects {
        let (text, keyboard) = match stage {
            Stage::Idle => (copy::USE_MENU, Keyboard::MainMenu),
            Stage::AwaitingPhone { .. } => (copy::USE_CONTACT_BUTTON, Keyboard::ShareContact),
            Stage::AwaitingCode { .. } => (copy::TYPE_THE_CODE, Keyboard::Keep),
            Stage::Redeeming { .. } => (copy::PLEASE_WAIT, Keyboard::Keep),
            Stage::AwaitingContinue => (copy::ASK_CONTINUE, Keyboard::YesNo),
        };
        smallvec![reply(env, chat, text, keyboard)]
    }

    fn ask_phone(
        state: &mut SessionStore,
        user: UserId,
        chat: ChatId,
        retries: u32,
        env: &RegistrationEnvironment,
    ) -> Effects {
        Self::transition(state, user, Stage::AwaitingPhone { retries });
        smallvec![reply(env, chat, copy::ASK_PHONE, Keyboard::ShareContact)]
    }

    /// Code submitted in `AwaitingCode`
    #[allow(clippy::too_many_arguments)]
    fn submit_code(
        state: &mut SessionStore,
        user: UserId,
        chat: ChatId,
        phone: PhoneNumber,
        retries: u32,
        text: &str,
        now: DateTime<Utc>,
        env: &RegistrationEnvironment,
    ) -> Effects {
        let Some(code) = env.registry.lookup(text) else {
            metrics::counter!("registration.codes.invalid").increment(1);
            let failures = retries + 1;

            return match env.policy.register_failure(failures, now) {
                AttemptVerdict::Retry { remaining } => {
                    tracing::debug!(%user, failures, remaining, "Invalid code");
                    Self::transition(state, user, Stage::AwaitingCode { phone, retries: failures });
                    smallvec![reply(env, chat, copy::invalid_code(remaining), Keyboard::Keep)]
                },
                AttemptVerdict::LockedOut { until } => {
                    metrics::counter!("registration.lockouts").increment(1);
                    tracing::info!(%user, %until, "User locked out after invalid codes");
                    let swept = state.sweep_expired(now);
                    if swept > 0 {
                        tracing::debug!(swept, "Dropped sessions with expired locks");
                    }
                    state.lock(user, until);
                    let seconds = LockoutPolicy::remaining_secs(until, now);
                    smallvec![reply(env, chat, copy::locked_out(seconds), Keyboard::MainMenu)]
                },
            };
        };

        Self::transition(
            state,
            user,
            Stage::Redeeming {
                phone: phone.clone(),
                code: code.clone(),
                retries,
            },
        );

        let storage = Arc::clone(&env.storage);
        let registration = NewRegistration {
            phone,
            code: code.clone(),
            user,
            registered_at: now,
        };

        smallvec![Effect::future(async move {
            match storage.redeem(registration).await {
                Ok(Redemption::Registered(registration)) => Some(RegistrationAction::CodeRedeemed {
                    user,
                    chat,
                    registration,
                }),
                Ok(Redemption::AlreadyRedeemed) => {
                    Some(RegistrationAction::CodeAlreadyUsed { user, chat, code })
                },
                Err(error) => {
                    tracing::error!(%user, %code, error = %error, "Redemption failed");
                    Some(RegistrationAction::RedemptionFailed {
                        user,
                        chat,
                        error: error.to_string(),
                    })
                },
            }
        })]
    }

    /// Back to `AwaitingCode` after a rejected redemption, retries unchanged
    fn resume_code_entry(state: &mut SessionStore, user: UserId) {
        match state.stage(user) {
            Stage::Redeeming { phone, retries, .. } => {
                Self::transition(state, user, Stage::AwaitingCode { phone, retries });
            },
            other => {
                tracing::warn!(%user, stage = other.name(), "Redemption outcome for a session not redeeming");
            },
        }
    }

    fn finish(user: UserId, chat: ChatId, env: &RegistrationEnvironment) -> Effects {
        let storage = Arc::clone(&env.storage);
        let messenger = Arc::clone(&env.messenger);
        let links = Arc::clone(&env.social_links);
        let turn = env.delivery.take_turn(chat);

        smallvec![Effect::fire_and_forget(async move {
            let tickets: Vec<TicketNumber> = match storage.registrations_for(user).await {
                Ok(rows) => rows.into_iter().map(|row| row.ticket).collect(),
                Err(error) => {
                    tracing::warn!(%user, error = %error, "Could not list tickets for closing message");
                    Vec::new()
                },
            };
            let text = copy::closing(&tickets, &links);
            turn.ready().await;
            deliver(&*messenger, Reply::new(chat, text, Keyboard::MainMenu)).await;
        })]
    }

    fn export(user: UserId, chat: ChatId, env: &RegistrationEnvironment) -> Effects {
        let storage = Arc::clone(&env.storage);
        let messenger = Arc::clone(&env.messenger);
        let export = env.export;
        let turn = env.delivery.take_turn(chat);

        smallvec![Effect::fire_and_forget(async move {
            let outcome = export.export(user, &*storage).await;
            turn.ready().await;
            match outcome {
                Ok(Some(document)) => {
                    tracing::info!(%user, rows = document.rows, "Registrations exported");
                    let caption = copy::export_caption(document.rows);
                    let document = Document {
                        chat,
                        file_name: document.file_name,
                        bytes: document.bytes,
                        caption: Some(caption),
                    };
                    if let Err(error) = messenger.send_document(document).await {
                        tracing::warn!(%chat, error = %error, "Failed to deliver export");
                    }
                },
                Ok(None) => {
                    deliver(&*messenger, Reply::new(chat, copy::NOTHING_REGISTERED, Keyboard::Keep))
                        .await;
                },
                Err(ExportError::Unauthorized(_)) => {
                    tracing::warn!(%user, "Export denied");
                    deliver(&*messenger, Reply::new(chat, copy::NOT_AUTHORIZED, Keyboard::Keep)).await;
                },
                Err(ExportError::Storage(error)) => {
                    tracing::error!(error = %error, "Export failed");
                    deliver(&*messenger, Reply::new(chat, copy::EXPORT_FAILED, Keyboard::Keep)).await;
                },
            }
        })]
    }
}

impl Reducer for RegistrationReducer {
    type State = SessionStore;
    type Action = RegistrationAction;
    type Environment = RegistrationEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per inbound message kind
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        let now = env.clock.now();

        // ========== Always available ==========
        match &action {
            RegistrationAction::ExportRequested { user, chat } => {
                return Self::export(*user, *chat, env);
            },
            RegistrationAction::SocialLinksRequested { chat, .. } => {
                let text = copy::social_links(&env.social_links);
                return smallvec![reply(env, *chat, text, Keyboard::Keep)];
            },
            _ => {},
        }

        // ========== Lockout gate ==========
        if !action.is_event() {
            if let Some(until) = state.active_lock(action.user(), now) {
                let chat = match &action {
                    RegistrationAction::Start { chat, .. }
                    | RegistrationAction::BeginRegistration { chat, .. }
                    | RegistrationAction::ContactShared { chat, .. }
                    | RegistrationAction::TextReceived { chat, .. }
                    | RegistrationAction::UnsupportedMessage { chat, .. } => *chat,
                    _ => return SmallVec::new(),
                };
                tracing::debug!(user = %action.user(), %until, "Input while locked out");
                let seconds = LockoutPolicy::remaining_secs(until, now);
                return smallvec![reply(env, chat, copy::still_locked(seconds), Keyboard::Keep)];
            }
        }

        match action {
            // ========== Commands ==========
            RegistrationAction::Start { chat, .. } => {
                smallvec![reply(env, chat, copy::greeting(), Keyboard::MainMenu)]
            },

            RegistrationAction::BeginRegistration { user, chat } => match state.stage(user) {
                Stage::Idle | Stage::AwaitingContinue => Self::ask_phone(state, user, chat, 0, env),
                Stage::AwaitingPhone { retries } | Stage::AwaitingCode { retries, .. } => {
                    Self::ask_phone(state, user, chat, retries, env)
                },
                stage @ Stage::Redeeming { .. } => Self::remind(&stage, chat, env),
            },

            RegistrationAction::ContactShared { user, chat, phone } => match state.stage(user) {
                Stage::AwaitingPhone { retries } => {
                    tracing::debug!(%user, "Phone captured");
                    Self::transition(state, user, Stage::AwaitingCode { phone, retries });
                    smallvec![reply(env, chat, copy::ASK_CODE, Keyboard::Remove)]
                },
                stage => Self::remind(&stage, chat, env),
            },

            RegistrationAction::TextReceived { user, chat, text } => match state.stage(user) {
                Stage::AwaitingCode { phone, retries } => {
                    Self::submit_code(state, user, chat, phone, retries, &text, now, env)
                },
                Stage::AwaitingContinue => match Answer::parse(&text) {
                    Some(Answer::Yes) => Self::ask_phone(state, user, chat, 0, env),
                    Some(Answer::No) => {
                        Self::transition(state, user, Stage::Idle);
                        Self::finish(user, chat, env)
                    },
                    None => Self::remind(&Stage::AwaitingContinue, chat, env),
                },
                stage => Self::remind(&stage, chat, env),
            },

            RegistrationAction::UnsupportedMessage { user, chat } => {
                Self::remind(&state.stage(user), chat, env)
            },

            // ========== Redemption outcomes ==========
            RegistrationAction::CodeRedeemed {
                user,
                chat,
                registration,
            } => {
                metrics::counter!("registration.completed").increment(1);
                tracing::info!(
                    %user,
                    ticket = %registration.ticket,
                    code = %registration.code,
                    "Registration completed"
                );
                if !matches!(state.stage(user), Stage::Redeeming { .. }) {
                    tracing::warn!(%user, "Registration completed for a session not redeeming");
                }
                Self::transition(state, user, Stage::AwaitingContinue);
                smallvec![reply(env, chat, copy::registered(registration.ticket), Keyboard::YesNo)]
            },

            RegistrationAction::CodeAlreadyUsed { user, chat, code } => {
                metrics::counter!("registration.codes.already_used").increment(1);
                tracing::debug!(%user, %code, "Code already redeemed");
                Self::resume_code_entry(state, user);
                smallvec![reply(env, chat, copy::CODE_ALREADY_USED, Keyboard::Keep)]
            },

            RegistrationAction::RedemptionFailed { user, chat, .. } => {
                Self::resume_code_entry(state, user);
                smallvec![reply(env, chat, copy::TEMPORARY_FAILURE, Keyboard::Keep)]
            },

            RegistrationAction::ExportRequested { .. }
            | RegistrationAction::SocialLinksRequested { .. } => SmallVec::new(),
        }
    }
}

// ============================================================================
// Reply effects
// ============================================================================

/// Effect that sends one reply
fn reply(
    env: &RegistrationEnvironment,
    chat: ChatId,
    text: impl Into<String>,
    keyboard: Keyboard,
) -> Effect<RegistrationAction> {
    let messenger = Arc::clone(&env.messenger);
    let turn = env.delivery.take_turn(chat);
    let reply = Reply::new(chat, text, keyboard);
    Effect::fire_and_forget(async move {
        turn.ready().await;
        deliver(&*messenger, reply).await;
    })
}

async fn deliver(messenger: &dyn Messenger, reply: Reply) {
    let chat = reply.chat;
    if let Err(error) = messenger.send_reply(reply).await {
        tracing::warn!(%chat, error = %error, "Failed to deliver reply");
    }
}
