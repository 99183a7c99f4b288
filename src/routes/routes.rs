//! Defines the function runtime's HTTP surface.
//!
//! - `POST /`        -> run one invocation, answer with its result
//! - `GET  /healthz` -> liveness

use crate::{
    handlers::{function_handlers::invoke, health_handlers::healthz},
    services::pipeline::Pipeline,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. The shared `Pipeline` is handed to handlers as state.
pub fn routes() -> Router<Pipeline> {
    Router::new()
        .route("/", post(invoke))
        .route("/healthz", get(healthz))
}
