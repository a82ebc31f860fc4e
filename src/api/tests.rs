use super::*;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use chrono::TimeZone;
use followup_core::{
    config::ApiConfig,
    record::{ApplicationRecord, ApplicationStatus, NewApplication, Recipient},
    traits::{DeliveryChannel, DeliveryResult},
};
use followup_store::Store;
use http_body_util::BodyExt;
use std::sync::Mutex;
use std::time::Duration;
use tower::ServiceExt;

/// Authoritative channel that records what it was asked to send.
#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    async fn send(&self, record: &ApplicationRecord, _recipient: &Recipient) -> DeliveryResult {
        self.sent.lock().unwrap().push(record.id.clone());
        DeliveryResult::delivered()
    }
}

struct Harness {
    store: Arc<Store>,
    channel: Arc<RecordingChannel>,
    app: Router,
}

async fn harness(api_key: &str, cron_secret: &str) -> Harness {
    let store = Arc::new(Store::in_memory().await.unwrap());
    store
        .upsert_user("alice", Some("alice@example.test"), Some("Alice"))
        .await
        .unwrap();
    let channel = Arc::new(RecordingChannel::default());
    let sweeper = SweepCoordinator::new(store.clone(), store.clone(), channel.clone());
    let config = ApiConfig {
        api_key: api_key.to_string(),
        cron_secret: cron_secret.to_string(),
        ..Default::default()
    };
    let app = build_router(ApiState::new(&config, store.clone(), sweeper));
    Harness {
        store,
        channel,
        app,
    }
}

fn application(company: &str, reminder: Option<DateTime<Utc>>) -> NewApplication {
    NewApplication {
        company: company.to_string(),
        position: "Engineer".to_string(),
        status: ApplicationStatus::Applied,
        reminder,
        ..Default::default()
    }
}

fn past() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn reminder_request(id: &str, owner: &str, body: &str) -> Request<Body> {
    Request::put(format!("/api/applications/{id}/reminder"))
        .header("Content-Type", "application/json")
        .header("X-Owner-Id", owner)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq("secret", "secret"));
    assert!(!constant_time_eq("secret", "secreT"));
    assert!(!constant_time_eq("secret", "secret2"));
    assert!(constant_time_eq("", ""));
}

#[tokio::test]
async fn test_health_without_key_is_open() {
    let h = harness("", "").await;
    let req = Request::get("/api/health").body(Body::empty()).unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}

#[tokio::test]
async fn test_health_checks_bearer_key() {
    let h = harness("k3y", "").await;

    let missing = Request::get("/api/health").body(Body::empty()).unwrap();
    let resp = h.app.clone().oneshot(missing).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::get("/api/health")
        .header("Authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "invalid token");

    let ok = Request::get("/api/health")
        .header("Authorization", "Bearer k3y")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.oneshot(ok).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cron_rejects_bad_or_missing_token() {
    let h = harness("", "cr0n").await;
    for uri in [
        "/api/cron/check-reminders",
        "/api/cron/check-reminders?token=wrong",
    ] {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await, json!({"error": "Unauthorized"}));
    }
}

#[tokio::test]
async fn test_cron_without_configured_secret_is_closed() {
    let h = harness("", "").await;
    let req = Request::get("/api/cron/check-reminders?token=")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_runs_a_sweep() {
    let h = harness("", "cr0n").await;
    let a = h
        .store
        .create("alice", application("Acme", Some(past())))
        .await
        .unwrap();

    let req = Request::get("/api/cron/check-reminders?token=cr0n")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["processed"], 1);
    assert_eq!(json["results"][0]["id"], a.id.as_str());
    assert_eq!(json["results"][0]["success"], true);
    assert!(h.store.get(&a.id).await.unwrap().unwrap().reminder_sent);
}

#[tokio::test]
async fn test_cron_reports_store_failure() {
    let h = harness("", "cr0n").await;
    h.store.close().await;

    let req = Request::get("/api/cron/check-reminders?token=cr0n")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(resp).await,
        json!({"error": "Failed to check reminders"})
    );
}

#[tokio::test]
async fn test_list_requires_owner_header() {
    let h = harness("", "").await;
    let req = Request::get("/api/applications").body(Body::empty()).unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_returns_own_records_and_sweeps() {
    let h = harness("", "").await;
    let mine = h
        .store
        .create("alice", application("Acme", Some(past())))
        .await
        .unwrap();
    h.store
        .create("bob", application("Globex", None))
        .await
        .unwrap();

    let req = Request::get("/api/applications")
        .header("X-Owner-Id", "alice")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], mine.id.as_str());
    assert_eq!(list[0]["ownerId"], "alice");

    // The background sweep acknowledges the due reminder shortly after.
    let mut acknowledged = false;
    for _ in 0..50 {
        if h.store.get(&mine.id).await.unwrap().unwrap().reminder_sent {
            acknowledged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(acknowledged);
    assert_eq!(*h.channel.sent.lock().unwrap(), vec![mine.id.clone()]);
}

#[tokio::test]
async fn test_put_reminder_rearms_sent_record() {
    let h = harness("", "").await;
    let a = h
        .store
        .create("alice", application("Acme", Some(past())))
        .await
        .unwrap();
    assert!(h.store.mark_sent(&a.id, past()).await.unwrap());

    let resp = h
        .app
        .oneshot(reminder_request(
            &a.id,
            "alice",
            r#"{"reminder": "2024-02-01T09:00:00Z"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["reminderSent"], false);

    let stored = h.store.get(&a.id).await.unwrap().unwrap();
    assert_eq!(
        stored.reminder,
        Some(Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap())
    );
    assert!(!stored.reminder_sent);
}

#[tokio::test]
async fn test_put_null_clears_reminder() {
    let h = harness("", "").await;
    let a = h
        .store
        .create("alice", application("Acme", Some(past())))
        .await
        .unwrap();

    let resp = h
        .app
        .oneshot(reminder_request(&a.id, "alice", r#"{"reminder": null}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = h.store.get(&a.id).await.unwrap().unwrap();
    assert_eq!(stored.reminder, None);
    assert!(!stored.reminder_sent);
}

#[tokio::test]
async fn test_put_reminder_checks_owner_and_existence() {
    let h = harness("", "").await;
    let a = h
        .store
        .create("alice", application("Acme", Some(past())))
        .await
        .unwrap();

    let resp = h
        .app
        .clone()
        .oneshot(reminder_request(&a.id, "mallory", r#"{"reminder": null}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.store.get(&a.id).await.unwrap().unwrap().reminder, Some(past()));

    let resp = h
        .app
        .clone()
        .oneshot(reminder_request("missing", "alice", r#"{"reminder": null}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = h
        .app
        .oneshot(reminder_request(&a.id, "alice", r#"{"reminder": "next week"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
