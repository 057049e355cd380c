//! HTTP handlers.
//!
//! The postpone callback answers in plain text because its caller is a
//! person clicking a button in an email. Everything under `/api/v1` answers
//! in JSON.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::Deserialize;
use tracing::info;

use dusk_core::{InstanceStatus, Moment};
use dusk_state::InstanceRecord;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Postponement ───────────────────────────────────────────────

/// Form body posted by the button in the notice email.
#[derive(Debug, Deserialize)]
pub struct PostponeForm {
    pub token: Option<String>,
}

/// POST /postpone
pub async fn postpone(
    State(state): State<ApiState>,
    Form(form): Form<PostponeForm>,
) -> impl IntoResponse {
    let token = form.token.unwrap_or_default();
    let outcome = state.postponer.postpone(&token, &Moment::now()).await;
    info!(status = %outcome.status, "postpone callback handled");
    let code =
        StatusCode::from_u16(outcome.status.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    (code, outcome.message)
}

// ── Evaluation ─────────────────────────────────────────────────

/// POST /api/v1/evaluate
pub async fn evaluate(State(state): State<ApiState>) -> impl IntoResponse {
    let response = state.evaluator.trigger(&Moment::now()).await;
    let code =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(response))
}

// ── Instances ──────────────────────────────────────────────────

/// Body of a registration: the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct RegisterInstance {
    pub status: InstanceStatus,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// GET /api/v1/instances
pub async fn list_instances(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_instances() {
        Ok(instances) => ApiResponse::ok(instances).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/instances/{id}
pub async fn get_instance(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_instance(&id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("instance not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// PUT /api/v1/instances/{id}
pub async fn put_instance(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<RegisterInstance>,
) -> impl IntoResponse {
    let mut record = InstanceRecord::new(id, req.status);
    record.tags = req.tags;
    if let Err(e) = record.to_instance() {
        return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }
    match state.store.put_instance(&record) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
