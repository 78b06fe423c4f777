//! Route-level tests against an in-memory store.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use ephemera_api::routes::router;
use ephemera_api::state::AppStateInner;
use ephemera_core::{MemoryStore, RecordStore};
use ephemera_types::api::Claims;
use ephemera_types::models::{MessageRecord, MessageStatus};

const SECRET: &str = "test-secret";

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppStateInner {
        store: store.clone(),
        jwt_secret: SECRET.into(),
        public_base_url: "https://ephemera.test/".into(),
    });
    (router(state), store)
}

fn token(user: Uuid) -> String {
    let claims = Claims {
        sub: user,
        email: Some("owner@example.com".into()),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn record(owner: Uuid) -> MessageRecord {
    MessageRecord {
        id: Uuid::new_v4(),
        owner_id: owner,
        body: "door code 4711".into(),
        created_at: Utc::now(),
        expiration_minutes: 60,
        view_limit: 2,
        view_count: 0,
        status: MessageStatus::Active,
        self_destruct: false,
        self_destruct_timer_seconds: None,
        timer_armed_at: None,
        allowed_recipients: BTreeSet::new(),
        allowed_domains: BTreeSet::new(),
        attachments: vec![],
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn post_json(uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn create_requires_token() {
    let (app, store) = app();

    let (status, _) = send(&app, post_json("/messages", json!({ "body": "hi" }), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = post_json("/messages", json!({ "body": "hi" }), Some("garbage"));
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(store.is_empty());
}

#[tokio::test]
async fn create_then_reveal_until_expired() {
    let (app, _store) = app();
    let owner = Uuid::new_v4();

    let (status, created) = send(
        &app,
        post_json(
            "/messages",
            json!({ "body": "  two views only ", "view_limit": 2, "expiration": "1h 30m" }),
            Some(&token(owner)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["share_url"], format!("https://ephemera.test/view/{}", id));

    let (status, preview) = send(
        &app,
        Request::get(format!("/messages/{}", id)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["available"], true);
    assert_eq!(preview["requires_email"], false);
    assert_eq!(preview["view_limit"], 2);
    assert!(preview.get("body").is_none());

    let reveal_uri = format!("/messages/{}/reveal", id);
    let (status, first) = send(&app, post_json(&reveal_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["body"], "two views only");
    assert_eq!(first["views_remaining"], 1);

    let (status, second) = send(&app, post_json(&reveal_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["views_remaining"], 0);

    let (status, _) = send(&app, post_json(&reveal_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let (app, store) = app();
    let bearer = token(Uuid::new_v4());

    let (status, body) = send(
        &app,
        post_json("/messages", json!({ "body": "x", "expiration": "forever" }), Some(&bearer)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("1d 5h 30m"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn access_policy_is_checked_on_reveal() {
    let (app, store) = app();
    let mut rec = record(Uuid::new_v4());
    rec.allowed_domains = ["@x.com".to_string()].into_iter().collect();
    store.insert(rec.clone()).unwrap();

    let access_uri = format!("/messages/{}/access", rec.id);
    let req = post_json(&access_uri, json!({ "email": "b@evilx.com" }), None);
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], false);

    let (_, body) = send(&app, post_json(&access_uri, json!({ "email": "B@X.com" }), None)).await;
    assert_eq!(body["granted"], true);

    let reveal_uri = format!("/messages/{}/reveal", rec.id);
    let req = post_json(&reveal_uri, json!({ "email": "b@evilx.com" }), None);
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(store.get(rec.id).unwrap().unwrap().view_count, 0);

    let req = post_json(&reveal_uri, json!({ "email": "b@x.com" }), None);
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "door code 4711");
}

#[tokio::test]
async fn anonymous_reveal_needs_no_body() {
    let (app, store) = app();
    let rec = record(Uuid::new_v4());
    store.insert(rec.clone()).unwrap();

    let bare = |uri: String| Request::post(uri).body(Body::empty()).unwrap();

    let (status, body) = send(&app, bare(format!("/messages/{}/access", rec.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], true);

    let (status, body) = send(&app, bare(format!("/messages/{}/reveal", rec.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "door code 4711");
    assert_eq!(store.get(rec.id).unwrap().unwrap().view_count, 1);
}

#[tokio::test]
async fn self_destruct_reveal_then_not_found() {
    let (app, store) = app();
    let mut rec = record(Uuid::new_v4());
    rec.self_destruct = true;
    store.insert(rec.clone()).unwrap();

    let reveal_uri = format!("/messages/{}/reveal", rec.id);
    let (status, body) = send(&app, post_json(&reveal_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destroyed"], true);

    let (status, _) = send(&app, post_json(&reveal_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expire_honours_server_deadline_only() {
    let (app, store) = app();
    let mut rec = record(Uuid::new_v4());
    rec.self_destruct = true;
    rec.self_destruct_timer_seconds = Some(30);
    store.insert(rec.clone()).unwrap();

    let reveal_uri = format!("/messages/{}/reveal", rec.id);
    let (status, body) = send(&app, post_json(&reveal_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["expiry_deadline"].is_string());

    // A client claiming the countdown is over early changes nothing.
    let expire_uri = format!("/messages/{}/expire", rec.id);
    let (status, body) = send(&app, post_json(&expire_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destroyed"], false);
    assert!(store.get(rec.id).unwrap().is_some());

    // Once the persisted deadline has passed, any request deletes.
    let mut armed = store.get(rec.id).unwrap().unwrap();
    armed.timer_armed_at = Some(Utc::now() - Duration::minutes(1));
    store.insert(armed).unwrap();

    let (status, body) = send(&app, post_json(&expire_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destroyed"], true);
    assert!(store.get(rec.id).unwrap().is_none());

    let (status, _) = send(&app, post_json(&expire_uri, json!({}), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_reports_elapsed_messages() {
    let (app, store) = app();
    let mut rec = record(Uuid::new_v4());
    rec.created_at = Utc::now() - Duration::minutes(16);
    rec.expiration_minutes = 15;
    store.insert(rec.clone()).unwrap();

    let (status, body) = send(
        &app,
        Request::get(format!("/messages/{}", rec.id)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert_eq!(body["unavailable_reason"], "time_elapsed");
    assert_eq!(store.get(rec.id).unwrap().unwrap().status, MessageStatus::Expired);
}

#[tokio::test]
async fn only_owner_may_delete() {
    let (app, store) = app();
    let owner = Uuid::new_v4();
    let rec = record(owner);
    store.insert(rec.clone()).unwrap();

    let uri = format!("/messages/{}", rec.id);
    let delete = |bearer: String| {
        Request::delete(uri.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, delete(token(Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(store.get(rec.id).unwrap().unwrap(), rec);

    let (status, _) = send(&app, delete(token(owner))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(store.get(rec.id).unwrap().is_none());

    let (status, _) = send(&app, delete(token(owner))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app();
    let res = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
