//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = match &state.conn {
        Some(pool) => {
            let pool = pool.clone();
            tokio::task::spawn_blocking(move || pool.get().is_ok())
                .await
                .unwrap_or(false)
        }
        None => true,
    };

    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "chamados",
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_ok,
            "webhook": state.webhook.is_some(),
            "realtime_subscribers": state.feed.subscriber_count(),
        })),
    )
}

pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "chamados",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
