use axum::{response::IntoResponse, Json};
use log::error;

use crate::core::shared::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DashboardsError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for DashboardsError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Store(e) => {
                error!("Dashboard store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro ao carregar os indicadores".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
