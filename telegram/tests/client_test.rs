//! Bot API client tests against a mock HTTP server.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect

use campaign_telegram::{KeyboardButton, ReplyMarkup, SendMessage, TelegramClient, TelegramError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:TEST";

fn client_for(server: &MockServer) -> TelegramClient {
    TelegramClient::new(TOKEN).with_base_url(server.uri())
}

#[tokio::test]
async fn get_updates_decodes_text_and_contact_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:TEST/getUpdates"))
        .and(body_partial_json(json!({"offset": 41, "timeout": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 41,
                    "message": {
                        "message_id": 10,
                        "from": {"id": 7, "is_bot": false, "first_name": "Aziza"},
                        "chat": {"id": 7, "type": "private"},
                        "date": 1_735_689_600,
                        "text": "/start"
                    }
                },
                {
                    "update_id": 42,
                    "message": {
                        "message_id": 11,
                        "from": {"id": 7, "is_bot": false, "first_name": "Aziza"},
                        "chat": {"id": 7, "type": "private"},
                        "date": 1_735_689_601,
                        "contact": {"phone_number": "+998901234567", "first_name": "Aziza", "user_id": 7}
                    }
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let updates = client.get_updates(Some(41), 0).await.unwrap();

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
    let contact = updates[1].message.as_ref().unwrap().contact.as_ref().unwrap();
    assert_eq!(contact.phone_number, "+998901234567");
    assert_eq!(contact.user_id, Some(7));
}

#[tokio::test]
async fn send_message_posts_reply_keyboard() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:TEST/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": 7,
            "reply_markup": {"keyboard": [[{"text": "Yes"}, {"text": "No"}]]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {
                "message_id": 12,
                "chat": {"id": 7, "type": "private"},
                "date": 1_735_689_602,
                "text": "Register another code?"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let message = SendMessage::text(7, "Register another code?").with_markup(ReplyMarkup::row(
        vec![KeyboardButton::text("Yes"), KeyboardButton::text("No")],
    ));

    let sent = client.send_message(&message).await.unwrap();
    assert_eq!(sent.message_id, 12);
}

#[tokio::test]
async fn send_document_uses_multipart_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:TEST/sendDocument"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {
                "message_id": 13,
                "chat": {"id": 1, "type": "private"},
                "date": 1_735_689_603
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let sent = client
        .send_document(1, "registrations.csv", b"phone,code\n".to_vec(), Some("export"))
        .await
        .unwrap();
    assert_eq!(sent.message_id, 13);
}

#[tokio::test]
async fn unauthorized_token_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:TEST/getMe"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_me().await.unwrap_err();
    assert!(matches!(err, TelegramError::Unauthorized));
}

#[tokio::test]
async fn flood_control_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:TEST/sendMessage"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 5",
            "parameters": {"retry_after": 5}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .send_message(&SendMessage::text(7, "hi"))
        .await
        .unwrap_err();

    match err {
        TelegramError::RateLimited { retry_after } => assert_eq!(retry_after, Some(5)),
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert!(TelegramError::RateLimited { retry_after: None }.is_transient());
}

#[tokio::test]
async fn api_error_keeps_description() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:TEST/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .send_message(&SendMessage::text(404, "hi"))
        .await
        .unwrap_err();

    match err {
        TelegramError::ApiError { status, description } => {
            assert_eq!(status, 400);
            assert_eq!(description, "Bad Request: chat not found");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_a_parse_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:TEST/getMe"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_me().await.unwrap_err();
    assert!(matches!(err, TelegramError::ResponseParseFailed(_)));
}
