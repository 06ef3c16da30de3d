pub mod credentials;
pub mod storage;
pub mod types;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use log::{error, info};
use std::sync::Arc;

use crate::core::middleware::{AdminSession, Session};
use crate::core::shared::enums::Permission;
use crate::core::shared::error::StoreError;
use crate::core::shared::state::AppState;
use crate::realtime::{ChangeEvent, TECHNICIANS_TABLE};

pub use credentials::{CredentialService, PgCredentialService, DEFAULT_PASSWORD, MIN_PASSWORD_LEN};
pub use storage::{PgTechnicianStore, TechnicianStore};
pub use types::{
    CreateTechnicianRequest, TechnicianAccount, TechnicianFields, TechnicianRef,
    UpdateTechnicianRequest,
};

#[derive(Debug, thiserror::Error)]
pub enum TechniciansError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TechniciansError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for TechniciansError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Conflict(_) => (
                StatusCode::CONFLICT,
                "Já existe um funcionário com este email".to_string(),
            ),
            Self::Store(e) => {
                error!("Technician store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro ao processar funcionário".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub async fn list_technicians(
    State(state): State<Arc<AppState>>,
    _session: Session,
) -> Result<Json<Vec<TechnicianAccount>>, TechniciansError> {
    Ok(Json(state.technicians.list().await?))
}

/// Creates an account with the default credential, hashed by the database.
pub async fn create_technician(
    State(state): State<Arc<AppState>>,
    AdminSession(admin): AdminSession,
    Json(req): Json<CreateTechnicianRequest>,
) -> Result<(StatusCode, Json<TechnicianAccount>), TechniciansError> {
    let fields = TechnicianFields::parse(&req.nome, &req.email, req.permissao)
        .map_err(TechniciansError::Validation)?;

    let senha_hash = state.credentials.hash(DEFAULT_PASSWORD).await?;
    let account = state.technicians.create(fields, senha_hash).await?;
    state
        .feed
        .publish(ChangeEvent::insert(TECHNICIANS_TABLE, &account));

    info!(
        "Technician {} ({}) created by {}",
        account.id, account.email, admin.email
    );
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn update_technician(
    State(state): State<Arc<AppState>>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTechnicianRequest>,
) -> Result<Json<TechnicianAccount>, TechniciansError> {
    let fields = TechnicianFields::parse(&req.nome, &req.email, req.permissao)
        .map_err(TechniciansError::Validation)?;

    let previous = state
        .technicians
        .get(id)
        .await?
        .ok_or_else(|| TechniciansError::NotFound(format!("funcionario {id}")))?;
    let account = state.technicians.update(id, fields).await?;
    state
        .feed
        .publish(ChangeEvent::update(TECHNICIANS_TABLE, &previous, &account));
    info!("Technician {} updated by {}", account.id, admin.email);
    Ok(Json(account))
}

/// Creates the first admin account when the table is empty. Returns the account if one
/// was created.
pub async fn ensure_bootstrap_admin(
    technicians: &dyn TechnicianStore,
    credentials: &dyn CredentialService,
    nome: &str,
    email: &str,
) -> Result<Option<TechnicianAccount>, TechniciansError> {
    if !technicians.list().await?.is_empty() {
        return Ok(None);
    }
    let fields = TechnicianFields::parse(nome, email, Permission::Admin)
        .map_err(TechniciansError::Validation)?;
    let senha_hash = credentials.hash(DEFAULT_PASSWORD).await?;
    let account = technicians.create(fields, senha_hash).await?;
    info!("Bootstrap admin {} created", account.email);
    Ok(Some(account))
}

pub fn configure_technicians_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/funcionarios",
            get(list_technicians).post(create_technician),
        )
        .route("/api/funcionarios/:id", put(update_technician))
}
