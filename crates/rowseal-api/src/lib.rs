//! # rowseal-api — Admin HTTP API
//!
//! Operator endpoints over a [`rowseal_mapper::Mapper`]: list entity
//! types, inspect how rows are distributed over forms and keys, and roll
//! rows onto the current keys.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → request metrics → bearer auth → handler
//! ```
//!
//! Health probes and `/metrics` are mounted outside the auth middleware.

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::admin::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(state);

    Router::new().merge(public).merge(api)
}

/// Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// 200 once storage hands out connections.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.db.acquire().await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

async fn render_metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}
