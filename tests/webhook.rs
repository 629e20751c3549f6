//! Webhook and health endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use assistant_bridge::api::ApiServerBuilder;
use assistant_bridge::assistant::Orchestrator;
use assistant_bridge::db::MessageRole;
use assistant_bridge::functions::FunctionDispatcher;
use assistant_bridge::localtime::DEFAULT_TIMEZONE;
use assistant_bridge::{DbPool, StationRegistry};

mod common;
use common::{
    MockAssistant, fast_poller, session_manager, session_repo, setup_test_db, submission_repo,
    test_stations,
};

const SECRET: &str = "watson-secret";

struct TestApp {
    router: axum::Router,
    db: DbPool,
    assistant: Arc<MockAssistant>,
}

fn build_app(reply: &str, rate_limit: Option<u32>) -> TestApp {
    let db = setup_test_db();
    let assistant = Arc::new(MockAssistant::new(reply));
    let sessions = session_manager(&db);
    let orchestrator = Orchestrator::new(
        assistant.clone(),
        sessions.clone(),
        FunctionDispatcher::new(submission_repo(&db), DEFAULT_TIMEZONE),
        fast_poller(),
    );

    let server = ApiServerBuilder::new(
        db.clone(),
        StationRegistry::new(test_stations()),
        sessions,
        orchestrator,
        0,
    )
    .webhook_secret(Some(SecretString::from(SECRET.to_string())))
    .rate_limit(rate_limit)
    .build();

    TestApp {
        router: server.router(),
        db,
        assistant,
    }
}

fn webhook_body(user_id: &str, text: Option<&str>) -> Value {
    let mut payload = json!({
        "payload": {
            "context": {
                "global": {
                    "session_id": "watson-session-1",
                    "system": { "user_id": user_id }
                }
            }
        }
    });
    if let Some(text) = text {
        payload["payload"]["input"] = json!({ "text": text });
    }
    payload
}

fn webhook_request(station: &str, auth: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/webhook/{station}"))
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn authorized() -> Option<&'static str> {
    Some("Basic watson-secret")
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn reply_text(json: &Value) -> &str {
    json["output"]["generic"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app("{}", None);

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = build_app("{}", None);

    let response = app
        .router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["stations"]["status"], "ok");
    assert_eq!(json["checks"]["stations"]["message"], "serving News On 6, News 9");
}

#[tokio::test]
async fn test_missing_authorization_rejected() {
    let app = build_app("{}", None);

    let response = app
        .router
        .oneshot(webhook_request("n6", None, &webhook_body("u1", Some("hi"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await, json!({ "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let app = build_app("{}", None);

    // Bearer scheme is not accepted even with the right secret
    let response = app
        .router
        .oneshot(webhook_request(
            "n6",
            Some("Bearer watson-secret"),
            &webhook_body("u1", Some("hi")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.assistant.threads_created(), 0);
}

#[tokio::test]
async fn test_empty_text_gets_welcome() {
    let app = build_app("{}", None);

    let response = app
        .router
        .oneshot(webhook_request("n9", authorized(), &webhook_body("u1", None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["x-watson-assistant-webhook-return"],
        "true"
    );

    let json = read_json(response).await;
    assert_eq!(
        reply_text(&json),
        "Hi! I'm Newsy, your n9 chatbot assistant. How can I help you today?"
    );

    let station = &test_stations()[1];
    let session = session_repo(&app.db)
        .latest_for_user(station, "u1")
        .unwrap()
        .unwrap();
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].role, MessageRole::Assistant);
    assert_eq!(session.session_id.as_deref(), Some("watson-session-1"));
    assert_eq!(app.assistant.threads_created(), 0);
}

#[tokio::test]
async fn test_whitespace_text_goes_to_assistant() {
    let app = build_app(r#"{"message":"Anything else?"}"#, None);

    let response = app
        .router
        .oneshot(webhook_request("n6", authorized(), &webhook_body("u1", Some(" "))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(reply_text(&json), "Anything else?");
    assert_eq!(app.assistant.threads_created(), 1);
    let messages = app.assistant.messages.lock().unwrap().clone();
    assert_eq!(messages, [("thread_1".to_string(), " ".to_string())]);
}

#[tokio::test]
async fn test_message_is_answered_by_assistant() {
    let app = build_app(r#"{"response":{"message":"Sunny and 75."}}"#, None);

    let response = app
        .router
        .oneshot(webhook_request(
            "n6",
            authorized(),
            &webhook_body("u1", Some("What's the weather?")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(reply_text(&json), "Sunny and 75.");

    let station = &test_stations()[0];
    let session = session_repo(&app.db)
        .latest_for_user(station, "u1")
        .unwrap()
        .unwrap();
    assert_eq!(session.thread_id.as_deref(), Some("thread_1"));
    let roles: Vec<_> = session.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, [MessageRole::User, MessageRole::Assistant]);
    assert_eq!(session.messages[1].content, "Sunny and 75.");

    let runs = app.assistant.runs_created.lock().unwrap().clone();
    assert_eq!(runs, [("thread_1".to_string(), "asst_n6".to_string())]);
}

#[tokio::test]
async fn test_thread_is_reused_within_session() {
    let app = build_app(r#"{"message":"ok"}"#, None);

    for text in ["first", "second"] {
        let response = app
            .router
            .clone()
            .oneshot(webhook_request("n6", authorized(), &webhook_body("u1", Some(text))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.assistant.threads_created(), 1);
    let messages = app.assistant.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|(thread, _)| thread == "thread_1"));
}

#[tokio::test]
async fn test_limit_warning_appended() {
    let app = build_app(r#"{"message":"Answer"}"#, None);
    let station = &test_stations()[0];
    let repo = session_repo(&app.db);
    let now = Utc::now();
    let session = repo.create(station, "u1", None, now).unwrap();
    for i in 0..17 {
        repo.append_message(station, &session.id, MessageRole::User, &format!("q{i}"), now)
            .unwrap();
    }

    let response = app
        .router
        .oneshot(webhook_request("n6", authorized(), &webhook_body("u1", Some("q17"))))
        .await
        .unwrap();

    let json = read_json(response).await;
    assert_eq!(
        reply_text(&json),
        "Answer\n\n[2 more responses remaining for the advanced AI.]"
    );
}

#[tokio::test]
async fn test_cooldown_reply_skips_assistant() {
    let app = build_app(r#"{"message":"unused"}"#, None);
    let station = &test_stations()[0];
    let repo = session_repo(&app.db);
    let now = Utc::now();
    let session = repo.create(station, "u1", None, now).unwrap();
    for i in 0..20 {
        repo.append_message(station, &session.id, MessageRole::User, &format!("q{i}"), now)
            .unwrap();
    }

    let response = app
        .router
        .oneshot(webhook_request("n6", authorized(), &webhook_body("u1", Some("one more"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert!(reply_text(&json).contains("try again in 180 minutes"));
    assert_eq!(app.assistant.threads_created(), 0);

    let stored = repo.get(station, &session.id).unwrap().unwrap();
    assert_eq!(stored.messages.len(), 20);
}

#[tokio::test]
async fn test_unknown_station_not_found() {
    let app = build_app("{}", None);

    let response = app
        .router
        .oneshot(webhook_request("kotv", authorized(), &webhook_body("u1", Some("hi"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let app = build_app("{}", None);

    let response = app
        .router
        .oneshot(webhook_request("n6", authorized(), &json!({ "payload": {} })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unparseable_reply_is_server_error() {
    let app = build_app("plain text, not json", None);

    let response = app
        .router
        .oneshot(webhook_request("n6", authorized(), &webhook_body("u1", Some("hi"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({ "error": "Internal Server Error" })
    );
}

#[tokio::test]
async fn test_rate_limit_exceeded() {
    let app = build_app("{}", Some(1));

    let first = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
