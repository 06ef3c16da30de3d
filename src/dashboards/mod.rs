pub mod error;
pub mod handlers;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::DashboardsError;
pub use handlers::*;
pub use types::*;

pub fn configure_dashboards_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/dashboards", get(handle_get_dashboard))
}
