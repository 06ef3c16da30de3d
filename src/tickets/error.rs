use axum::{response::IntoResponse, Json};
use log::error;

use crate::core::shared::error::StoreError;

use super::lifecycle::LifecycleError;

#[derive(Debug, thiserror::Error)]
pub enum TicketsError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(String),
}

impl From<LifecycleError> for TicketsError {
    fn from(e: LifecycleError) -> Self {
        if e.is_validation() {
            Self::Validation(e.to_string())
        } else {
            Self::InvalidTransition(e.to_string())
        }
    }
}

impl From<StoreError> for TicketsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            other => Self::Store(other.to_string()),
        }
    }
}

impl IntoResponse for TicketsError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Store(msg) => {
                error!("Ticket store error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro ao acessar os chamados".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
