//! dusk-api — HTTP surface for dusk.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/postpone` | Redeem a postponement token (form field `token`) |
//! | POST | `/api/v1/evaluate` | Run one evaluation pass now |
//! | GET | `/api/v1/instances` | List the local instance registry |
//! | GET | `/api/v1/instances/{id}` | Get one instance record |
//! | PUT | `/api/v1/instances/{id}` | Register or replace an instance record |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use dusk_scheduler::{Evaluator, PostponementHandler};
use dusk_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub evaluator: Arc<Evaluator>,
    pub postponer: Arc<PostponementHandler>,
}

/// Build the complete router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/evaluate", post(handlers::evaluate))
        .route("/instances", get(handlers::list_instances))
        .route(
            "/instances/{id}",
            get(handlers::get_instance).put(handlers::put_instance),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/postpone", post(handlers::postpone).with_state(state))
        .route("/healthz", get(handlers::healthz))
}
