//! End-to-end dialogue tests: store, reducer, in-memory storage and a
//! recording messenger.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use campaign_testing::ManualClock;
use chrono::Duration;
use registration::copy;
use registration::export::render_csv;
use registration::messenger::Keyboard;
use registration::mocks::RecordingMessenger;
use registration::registry::CodeRegistry;
use registration::stores::{InMemoryCampaignStore, RegistrationStore};
use registration::types::{ChatId, PhoneNumber, TicketNumber, UserId};
use registration::{
    CampaignStore, RegistrationAction, RegistrationEnvironment, RegistrationReducer, SessionStore,
    Stage,
};
use std::sync::Arc;

const ADMIN: UserId = UserId(1);

struct Harness {
    store: CampaignStore,
    storage: Arc<InMemoryCampaignStore>,
    messenger: RecordingMessenger,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        Self::with_links(Vec::new())
    }

    fn with_links(links: Vec<String>) -> Self {
        let registry = CodeRegistry::load(concat!(env!("CARGO_MANIFEST_DIR"), "/data/codes.txt"))
            .expect("sample codes load");
        let storage = Arc::new(InMemoryCampaignStore::new());
        let messenger = RecordingMessenger::new();
        let clock = ManualClock::starting_at_test_epoch();

        let env = RegistrationEnvironment::new(
            Arc::new(registry),
            storage.clone(),
            Arc::new(messenger.clone()),
            Arc::new(clock.clone()),
            ADMIN,
        )
        .with_social_links(links);

        Self {
            store: CampaignStore::new(SessionStore::new(), RegistrationReducer::new(), env),
            storage,
            messenger,
            clock,
        }
    }

    /// Send and wait until every effect, feedback included, has finished
    async fn send(&self, action: RegistrationAction) {
        let mut handle = self.store.send(action).await.expect("store accepts actions");
        handle
            .wait_with_timeout(std::time::Duration::from_secs(5))
            .await
            .expect("effects finish");
    }

    async fn stage(&self, user: UserId) -> Stage {
        self.store.state(|sessions| sessions.stage(user)).await
    }

    fn last_text(&self, user: UserId) -> String {
        self.messenger.last_text_to(chat(user))
    }

    /// Start, begin, share contact
    async fn reach_code_entry(&self, user: UserId) {
        self.send(RegistrationAction::Start { user, chat: chat(user) }).await;
        self.send(RegistrationAction::BeginRegistration { user, chat: chat(user) }).await;
        self.send(RegistrationAction::ContactShared {
            user,
            chat: chat(user),
            phone: phone(),
        })
        .await;
    }

    async fn text(&self, user: UserId, text: &str) {
        self.send(RegistrationAction::TextReceived {
            user,
            chat: chat(user),
            text: text.to_string(),
        })
        .await;
    }
}

const fn chat(user: UserId) -> ChatId {
    ChatId(user.0)
}

fn phone() -> PhoneNumber {
    PhoneNumber::new("+998901234567")
}

#[tokio::test]
async fn registers_a_code_and_closes() {
    let harness = Harness::with_links(vec!["https://t.me/campaign".to_string()]);
    let user = UserId(100);

    harness.send(RegistrationAction::Start { user, chat: chat(user) }).await;
    assert_eq!(harness.last_text(user), copy::greeting());
    assert_eq!(harness.messenger.last_keyboard_to(chat(user)), Some(Keyboard::MainMenu));

    harness.send(RegistrationAction::BeginRegistration { user, chat: chat(user) }).await;
    assert_eq!(harness.stage(user).await, Stage::AwaitingPhone { retries: 0 });
    assert_eq!(harness.messenger.last_keyboard_to(chat(user)), Some(Keyboard::ShareContact));

    harness
        .send(RegistrationAction::ContactShared {
            user,
            chat: chat(user),
            phone: phone(),
        })
        .await;
    assert_eq!(harness.last_text(user), copy::ASK_CODE);

    harness.text(user, "AB12CD34").await;
    assert_eq!(harness.stage(user).await, Stage::AwaitingContinue);
    assert_eq!(harness.last_text(user), copy::registered(TicketNumber(1)));

    let rows = harness.storage.export().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ticket, TicketNumber(1));
    assert_eq!(rows[0].phone, phone());
    assert_eq!(rows[0].user, user);

    harness.text(user, copy::NO_BUTTON).await;
    assert_eq!(harness.stage(user).await, Stage::Idle);
    assert_eq!(
        harness.last_text(user),
        copy::closing(&[TicketNumber(1)], &["https://t.me/campaign".to_string()])
    );
}

#[tokio::test]
async fn third_invalid_code_locks_until_cooldown_ends() {
    let harness = Harness::new();
    let user = UserId(200);
    harness.reach_code_entry(user).await;

    harness.text(user, "11111111").await;
    assert_eq!(harness.last_text(user), copy::invalid_code(2));
    harness.text(user, "22222222").await;
    assert_eq!(harness.last_text(user), copy::invalid_code(1));
    harness.text(user, "33333333").await;
    assert_eq!(harness.last_text(user), copy::locked_out(60));
    assert_eq!(harness.stage(user).await, Stage::Idle);

    harness.send(RegistrationAction::Start { user, chat: chat(user) }).await;
    assert_eq!(harness.last_text(user), copy::still_locked(60));

    harness.clock.advance(Duration::seconds(30));
    harness.send(RegistrationAction::BeginRegistration { user, chat: chat(user) }).await;
    assert_eq!(harness.last_text(user), copy::still_locked(30));
    assert_eq!(harness.stage(user).await, Stage::Idle);

    harness.clock.advance(Duration::seconds(31));
    harness.send(RegistrationAction::BeginRegistration { user, chat: chat(user) }).await;
    assert_eq!(harness.stage(user).await, Stage::AwaitingPhone { retries: 0 });

    assert_eq!(harness.storage.count().await.unwrap(), 0);
}

#[tokio::test]
async fn replies_to_one_chat_arrive_in_order() {
    let harness = Harness::new();
    let user = UserId(250);
    harness.reach_code_entry(user).await;
    harness.messenger.clear();

    // The first reply is slow to deliver; the second must still come after it
    harness.messenger.stall_next_delivery(std::time::Duration::from_millis(50));
    let mut handles = Vec::new();
    for code in ["11111111", "22222222"] {
        handles.push(
            harness
                .store
                .send(RegistrationAction::TextReceived {
                    user,
                    chat: chat(user),
                    text: code.to_string(),
                })
                .await
                .unwrap(),
        );
    }
    for mut handle in handles {
        handle
            .wait_with_timeout(std::time::Duration::from_secs(5))
            .await
            .unwrap();
    }

    let texts: Vec<String> = harness.messenger.replies().into_iter().map(|reply| reply.text).collect();
    assert_eq!(texts, [copy::invalid_code(2), copy::invalid_code(1)]);
}

#[tokio::test]
async fn two_invalid_codes_then_a_valid_one_does_not_lock() {
    let harness = Harness::new();
    let user = UserId(300);
    harness.reach_code_entry(user).await;

    harness.text(user, "11111111").await;
    harness.text(user, "not a code").await;
    harness.text(user, "EF56GH78").await;

    assert_eq!(harness.stage(user).await, Stage::AwaitingContinue);
    assert_eq!(harness.last_text(user), copy::registered(TicketNumber(1)));

    harness.text(user, "yes").await;
    assert_eq!(harness.stage(user).await, Stage::AwaitingPhone { retries: 0 });
}

#[tokio::test]
async fn code_used_by_someone_else_is_rejected() {
    let harness = Harness::new();
    let first = UserId(400);
    let second = UserId(401);

    harness.reach_code_entry(first).await;
    harness.text(first, "AB12CD34").await;

    harness.reach_code_entry(second).await;
    harness.text(second, " AB12CD34 ").await;

    assert_eq!(harness.last_text(second), copy::CODE_ALREADY_USED);
    assert_eq!(
        harness.stage(second).await,
        Stage::AwaitingCode {
            phone: phone(),
            retries: 0
        }
    );
    assert_eq!(harness.storage.count().await.unwrap(), 1);
}

#[tokio::test]
async fn tickets_are_sequential_across_users() {
    let harness = Harness::new();
    let codes = ["AB12CD34", "EF56GH78", "JK90LM12"];

    for (index, code) in codes.iter().enumerate() {
        let user = UserId(500 + i64::try_from(index).unwrap());
        harness.reach_code_entry(user).await;
        harness.text(user, code).await;
        assert_eq!(
            harness.last_text(user),
            copy::registered(TicketNumber(u64::try_from(index).unwrap() + 1))
        );
    }

    let tickets: Vec<u64> = harness
        .storage
        .export()
        .await
        .unwrap()
        .iter()
        .map(|row| row.ticket.0)
        .collect();
    assert_eq!(tickets, [1, 2, 3]);
}

#[tokio::test]
async fn concurrent_submissions_of_one_code_register_once() {
    let harness = Harness::new();
    let first = UserId(600);
    let second = UserId(601);
    harness.reach_code_entry(first).await;
    harness.reach_code_entry(second).await;

    tokio::join!(harness.text(first, "NP34QR56"), harness.text(second, "NP34QR56"));

    let rows = harness.storage.export().await.unwrap();
    assert_eq!(rows.len(), 1);

    let stages = [harness.stage(first).await, harness.stage(second).await];
    assert_eq!(
        stages.iter().filter(|stage| **stage == Stage::AwaitingContinue).count(),
        1
    );
    assert!(
        [first, second]
            .iter()
            .any(|user| harness.last_text(*user) == copy::CODE_ALREADY_USED)
    );
}

#[tokio::test]
async fn admin_export_is_stable_and_gated() {
    let harness = Harness::new();

    harness.send(RegistrationAction::ExportRequested { user: ADMIN, chat: chat(ADMIN) }).await;
    assert_eq!(harness.last_text(ADMIN), copy::NOTHING_REGISTERED);
    assert!(harness.messenger.documents().is_empty());

    for (user, code) in [(UserId(700), "ST78UV90"), (UserId(701), "WX12YZ34")] {
        harness.reach_code_entry(user).await;
        harness.text(user, code).await;
    }

    harness.send(RegistrationAction::ExportRequested { user: ADMIN, chat: chat(ADMIN) }).await;
    harness.send(RegistrationAction::ExportRequested { user: ADMIN, chat: chat(ADMIN) }).await;

    let documents = harness.messenger.documents();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].bytes, documents[1].bytes);
    assert_eq!(documents[0].file_name, "registrations.csv");
    assert_eq!(documents[0].caption.as_deref(), Some(copy::export_caption(2).as_str()));

    let rows = harness.storage.export().await.unwrap();
    assert_eq!(documents[0].bytes, render_csv(&rows).into_bytes());

    let outsider = UserId(702);
    harness.send(RegistrationAction::ExportRequested { user: outsider, chat: chat(outsider) }).await;
    assert_eq!(harness.last_text(outsider), copy::NOT_AUTHORIZED);
    assert_eq!(harness.messenger.documents().len(), 2);
}

#[tokio::test]
async fn social_links_and_export_work_during_lockout() {
    let harness = Harness::with_links(vec!["https://instagram.com/campaign".to_string()]);
    harness.reach_code_entry(ADMIN).await;
    for code in ["11111111", "22222222", "33333333"] {
        harness.text(ADMIN, code).await;
    }
    assert_eq!(harness.last_text(ADMIN), copy::locked_out(60));

    harness.send(RegistrationAction::SocialLinksRequested { user: ADMIN, chat: chat(ADMIN) }).await;
    assert_eq!(
        harness.last_text(ADMIN),
        copy::social_links(&["https://instagram.com/campaign".to_string()])
    );

    harness.send(RegistrationAction::ExportRequested { user: ADMIN, chat: chat(ADMIN) }).await;
    assert_eq!(harness.last_text(ADMIN), copy::NOTHING_REGISTERED);
}

#[tokio::test]
async fn failed_deliveries_do_not_stall_the_dialogue() {
    let harness = Harness::new();
    let user = UserId(800);
    harness.messenger.fail_deliveries();

    harness.reach_code_entry(user).await;
    harness.text(user, "A1B2C3D4").await;

    assert_eq!(harness.stage(user).await, Stage::AwaitingContinue);
    assert_eq!(harness.storage.count().await.unwrap(), 1);
}

#[tokio::test]
async fn unusable_messages_get_a_reminder() {
    let harness = Harness::new();
    let user = UserId(900);
    harness.send(RegistrationAction::BeginRegistration { user, chat: chat(user) }).await;

    harness.text(user, "+998901234567").await;
    assert_eq!(harness.last_text(user), copy::USE_CONTACT_BUTTON);

    harness.send(RegistrationAction::UnsupportedMessage { user, chat: chat(user) }).await;
    assert_eq!(harness.last_text(user), copy::USE_CONTACT_BUTTON);
    assert_eq!(harness.stage(user).await, Stage::AwaitingPhone { retries: 0 });
}
