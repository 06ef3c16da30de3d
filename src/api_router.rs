//! API router
//!
//! Merges the routes of every module and wraps them in the session middleware, CORS and
//! request tracing.

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::middleware::session_middleware;
use crate::core::shared::state::AppState;
use crate::main_module::{health_check, health_check_simple};

/// Configure all API routes from all modules
pub fn configure_api_routes() -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/health", get(health_check_simple))
        .route("/api/health", get(health_check))
        .merge(crate::auth::configure_auth_routes())
        .merge(crate::technicians::configure_technicians_routes())
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::chat::configure_chat_routes())
        .merge(crate::realtime::configure_realtime_routes());

    #[cfg(feature = "dashboards")]
    let router = router.merge(crate::dashboards::configure_dashboards_routes());

    router
}

pub fn build_router(state: Arc<AppState>) -> Router {
    configure_api_routes()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
