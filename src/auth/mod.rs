//! Login and credential changes for technician accounts
//!
//! Passwords are only ever compared and hashed by the database functions behind
//! [`CredentialService`]. A successful login returns a signed session token; accounts still
//! on the default credential are flagged so the client forces a change.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::middleware::{Session, TokenError};
use crate::core::shared::error::StoreError;
use crate::core::shared::state::AppState;
use crate::technicians::{TechnicianAccount, DEFAULT_PASSWORD, MIN_PASSWORD_LEN};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Token(e) => {
                error!("Failed to issue session token: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno do servidor".to_string(),
                )
            }
            Self::Store(e) => {
                error!("Credential store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno do servidor".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub senha: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub funcionario: TechnicianAccount,
    pub needs_password_change: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub funcionario_id: Option<i64>,
    #[serde(default)]
    pub nova_senha: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeCurrentPasswordRequest {
    pub funcionario_id: Option<i64>,
    #[serde(default)]
    pub senha_atual: String,
    #[serde(default)]
    pub nova_senha: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    pub success: bool,
    pub message: String,
}

impl PasswordChanged {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            message: "Senha alterada com sucesso".to_string(),
        })
    }
}

/// Rules every new password must satisfy.
pub fn validate_new_password(nova_senha: &str) -> Result<(), AuthError> {
    if nova_senha.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "A nova senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    if nova_senha == DEFAULT_PASSWORD {
        return Err(AuthError::Validation(
            "A nova senha não pode ser a senha padrão".to_string(),
        ));
    }
    Ok(())
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.senha.is_empty() {
        return Err(AuthError::Validation(
            "Email e senha são obrigatórios".to_string(),
        ));
    }

    let Some((account, senha_hash)) = state.technicians.find_with_hash(&email).await? else {
        warn!("Login attempt for unknown email {}", email);
        return Err(AuthError::Unauthorized(
            "Funcionário não encontrado".to_string(),
        ));
    };
    if !state.credentials.verify(&req.senha, &senha_hash).await? {
        warn!("Wrong password for technician {}", account.id);
        return Err(AuthError::Unauthorized("Senha incorreta".to_string()));
    }

    let token = state.session_keys.issue(&Session::for_account(&account))?;
    let needs_password_change = req.senha == DEFAULT_PASSWORD;
    info!(
        "Technician {} logged in (password change required: {})",
        account.id, needs_password_change
    );

    Ok(Json(LoginResponse {
        token,
        funcionario: account,
        needs_password_change,
    }))
}

pub async fn current_session(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<TechnicianAccount>, AuthError> {
    state
        .technicians
        .get(session.funcionario_id)
        .await?
        .map(Json)
        .ok_or_else(|| AuthError::NotFound("Funcionário não encontrado".to_string()))
}

/// Sets a new password without checking the old one: admins resetting an account, or a
/// technician leaving the default credential right after login.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<PasswordChanged>, AuthError> {
    let Some(funcionario_id) = req.funcionario_id.filter(|_| !req.nova_senha.is_empty()) else {
        return Err(AuthError::Validation(
            "ID do funcionário e nova senha são obrigatórios".to_string(),
        ));
    };
    authorize(&session, funcionario_id)?;
    validate_new_password(&req.nova_senha)?;

    store_password(&state, funcionario_id, &req.nova_senha).await?;
    info!(
        "Password of technician {} changed by {}",
        funcionario_id, session.funcionario_id
    );
    Ok(PasswordChanged::ok())
}

pub async fn change_current_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(req): Json<ChangeCurrentPasswordRequest>,
) -> Result<Json<PasswordChanged>, AuthError> {
    let funcionario_id = req
        .funcionario_id
        .filter(|_| !req.senha_atual.is_empty() && !req.nova_senha.is_empty())
        .ok_or_else(|| {
            AuthError::Validation(
                "Funcionário ID, senha atual e nova senha são obrigatórios".to_string(),
            )
        })?;
    authorize(&session, funcionario_id)?;
    validate_new_password(&req.nova_senha)?;

    let senha_hash = state
        .technicians
        .password_hash(funcionario_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("Funcionário não encontrado".to_string()))?;
    if !state.credentials.verify(&req.senha_atual, &senha_hash).await? {
        return Err(AuthError::Validation("Senha atual incorreta".to_string()));
    }

    store_password(&state, funcionario_id, &req.nova_senha).await?;
    info!("Technician {} changed own password", funcionario_id);
    Ok(PasswordChanged::ok())
}

fn authorize(session: &Session, funcionario_id: i64) -> Result<(), AuthError> {
    if session.can_act_for(funcionario_id) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(
            "Sem permissão para alterar a senha deste funcionário".to_string(),
        ))
    }
}

async fn store_password(
    state: &AppState,
    funcionario_id: i64,
    nova_senha: &str,
) -> Result<(), AuthError> {
    let senha_hash = state.credentials.hash(nova_senha).await?;
    match state
        .technicians
        .set_password_hash(funcionario_id, senha_hash)
        .await
    {
        Err(StoreError::NotFound { .. }) => Err(AuthError::NotFound(
            "Funcionário não encontrado".to_string(),
        )),
        other => Ok(other?),
    }
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(current_session))
        .route("/api/auth/change-password", post(change_password))
        .route(
            "/api/auth/change-current-password",
            post(change_current_password),
        )
}
