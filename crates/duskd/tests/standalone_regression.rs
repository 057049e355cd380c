//! Standalone regression tests.
//!
//! Drives the HTTP surface the daemon serves against an in-memory store:
//! instance registration, the evaluation trigger, and the postpone callback.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use dusk_api::{build_router, ApiState};
use dusk_core::{
    DaemonConfig, DuskConfig, InstanceStatus, Notice, Notifier, NotifierConfig,
    PostponementToken, TAG_ACTUAL_DEADLINE, TAG_NOTIFICATION_SENT, TAG_OPT_IN, TAG_SCHEDULED_TIME,
};
use dusk_scheduler::{Evaluator, PostponementHandler};
use dusk_state::{InstanceRecord, StateStore};

struct Silent;

#[async_trait::async_trait]
impl Notifier for Silent {
    async fn send(&self, _notice: &Notice) -> anyhow::Result<()> {
        Ok(())
    }
}

fn test_config() -> Arc<DuskConfig> {
    Arc::new(DuskConfig {
        notify_lead_minutes: 15,
        shutdown_window_minutes: 15,
        from_address: "dusk@example.com".to_string(),
        postpone_callback_url: "http://localhost:8080/postpone".to_string(),
        token_store_name: "tokens".to_string(),
        token_ttl_minutes: 60,
        postpone_by_hours: 2,
        call_timeout_secs: 5,
        daemon: DaemonConfig::default(),
        notifier: NotifierConfig::default(),
    })
}

fn test_state() -> ApiState {
    let store = StateStore::open_in_memory("tokens").unwrap();
    let config = test_config();
    let repo = Arc::new(store.clone());
    ApiState {
        evaluator: Arc::new(Evaluator::new(
            config.clone(),
            repo.clone(),
            repo.clone(),
            Arc::new(Silent),
        )),
        postponer: Arc::new(PostponementHandler::new(config, repo.clone(), repo)),
        store,
    }
}

fn tracked(id: &str, status: InstanceStatus) -> InstanceRecord {
    InstanceRecord::new(id, status)
        .with_tag(TAG_OPT_IN, "true")
        .with_tag(TAG_SCHEDULED_TIME, "1800")
        .with_tag(TAG_ACTUAL_DEADLINE, "1800")
        .with_tag(TAG_NOTIFICATION_SENT, "True")
}

fn issue_token(store: &StateStore, id: &str, token: &str) {
    let expires_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
        + 3600;
    store
        .put_token(&PostponementToken {
            token: token.to_string(),
            instance_id: id.to_string(),
            expires_at,
        })
        .unwrap();
}

fn postpone_request(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/postpone")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn standalone_healthz() {
    let router = build_router(test_state());

    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
async fn standalone_register_and_get_instance() {
    let router = build_router(test_state());

    let body = serde_json::json!({
        "status": "running",
        "tags": { "autoshutdown": "true", "shutdown_time": "1800", "Name": "build-box" }
    });
    let req = Request::builder()
        .method("PUT")
        .uri("/api/v1/instances/i-1")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = Request::builder()
        .uri("/api/v1/instances/i-1")
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(json["data"]["tags"]["shutdown_time"], "1800");

    let req = Request::builder()
        .uri("/api/v1/instances")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn standalone_rejects_malformed_shutdown_time() {
    let router = build_router(test_state());

    let body = serde_json::json!({
        "status": "running",
        "tags": { "autoshutdown": "true", "shutdown_time": "6pm" }
    });
    let req = Request::builder()
        .method("PUT")
        .uri("/api/v1/instances/i-1")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn standalone_get_missing_instance() {
    let router = build_router(test_state());

    let req = Request::builder()
        .uri("/api/v1/instances/i-nope")
        .body(Body::empty())
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn standalone_evaluate_reports_pass() {
    let state = test_state();
    state
        .store
        .put_instance(
            &InstanceRecord::new("i-1", InstanceStatus::Running)
                .with_tag(TAG_OPT_IN, "true")
                .with_tag(TAG_SCHEDULED_TIME, "1800"),
        )
        .unwrap();
    let router = build_router(state);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/evaluate")
        .body(Body::empty())
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(json["statusCode"], 200);
    assert_eq!(json["report"]["examined"], 1);
}

#[tokio::test]
async fn standalone_postpone_with_valid_token() {
    let state = test_state();
    state
        .store
        .put_instance(&tracked("i-1", InstanceStatus::Running).with_tag("Name", "build-box"))
        .unwrap();
    issue_token(&state.store, "i-1", "3f1c9a52-token");
    let store = state.store.clone();
    let router = build_router(state);

    let resp = router
        .clone()
        .oneshot(postpone_request("token=3f1c9a52-token"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = body_text(resp).await;
    assert!(text.contains("build-box(i-1)"));
    assert!(text.contains("2000"));

    let record = store.get_instance("i-1").unwrap().unwrap();
    assert_eq!(record.tag(TAG_ACTUAL_DEADLINE), Some("2000"));
    assert_eq!(record.tag(TAG_NOTIFICATION_SENT), Some("False"));

    // Tokens are single use.
    let resp = router
        .oneshot(postpone_request("token=3f1c9a52-token"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.contains("cannot be found"));
}

#[tokio::test]
async fn standalone_postpone_without_token() {
    let router = build_router(test_state());

    let resp = router.oneshot(postpone_request("")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn standalone_postpone_for_stopped_instance() {
    let state = test_state();
    state
        .store
        .put_instance(&tracked("i-1", InstanceStatus::Stopped))
        .unwrap();
    issue_token(&state.store, "i-1", "tok");
    let store = state.store.clone();
    let router = build_router(state);

    let resp = router.oneshot(postpone_request("token=tok")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.contains("no running instance with id i-1"));

    let record = store.get_instance("i-1").unwrap().unwrap();
    assert_eq!(record.tag(TAG_ACTUAL_DEADLINE), Some("1800"));
}
