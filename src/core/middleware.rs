use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::config::AuthConfig;
use crate::core::shared::enums::Permission;
use crate::core::shared::state::AppState;
use crate::technicians::{TechnicianAccount, TechnicianRef, TechnicianStore};

// ============================================================================
// Session
// ============================================================================

/// The technician acting on a request.
///
/// Built once per request from the bearer token and handed by reference to every
/// lifecycle operation; nothing reads identity from anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub funcionario_id: i64,
    pub nome: String,
    pub email: String,
    pub permissao: Permission,
}

impl Session {
    pub fn for_account(account: &TechnicianAccount) -> Self {
        Self {
            funcionario_id: account.id,
            nome: account.nome.clone(),
            email: account.email.clone(),
            permissao: account.permissao,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.permissao == Permission::Admin
    }

    pub fn technician(&self) -> TechnicianRef {
        TechnicianRef {
            id: self.funcionario_id,
            nome: self.nome.clone(),
        }
    }

    pub fn can_act_for(&self, funcionario_id: i64) -> bool {
        self.is_admin() || self.funcionario_id == funcionario_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub nome: String,
    pub email: String,
    pub permissao: Permission,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("Malformed subject: {0}")]
    Subject(String),
}

/// Signs and verifies session tokens (HS256).
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

impl SessionKeys {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_minutes: config.token_ttl_minutes,
        }
    }

    pub fn issue(&self, session: &Session) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: session.funcionario_id.to_string(),
            nome: session.nome.clone(),
            email: session.email.clone(),
            permissao: session.permissao,
            iat: now,
            exp: now + self.ttl_minutes * 60,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Session, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<TokenClaims>(token, &self.decoding, &validation)?;
        let claims = data.claims;
        let funcionario_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Subject(claims.sub.clone()))?;
        Ok(Session {
            funcionario_id,
            nome: claims.nome,
            email: claims.email,
            permissao: claims.permissao,
        })
    }
}

// ============================================================================
// Middleware
// ============================================================================

fn extract_token(request: &Request<Body>) -> Option<String> {
    let from_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    // EventSource clients cannot set headers.
    from_header.or_else(|| {
        request.uri().query().and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("access_token="))
                .and_then(|raw| urlencoding::decode(raw).ok())
                .map(|t| t.into_owned())
        })
    })
}

/// Decodes the bearer token, if any, and stores the resulting [`Session`] in the request.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(&request) {
        match state.session_keys.verify(&token) {
            Ok(session) => {
                request.extensions_mut().insert(session);
            }
            Err(e) => debug!("Rejected session token: {}", e),
        }
    }
    next.run(request).await
}

// ============================================================================
// Axum Extractors
// ============================================================================

type Rejection = (StatusCode, Json<serde_json::Value>);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Authentication required"
            })),
        ))
    }
}

/// A session whose technician currently has the `admin` permission.
///
/// The permission is read back from the store on every request, so a demotion applies
/// before the token expires.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let mut session = Session::from_request_parts(parts, state).await?;
        let account = match state.technicians.get(session.funcionario_id).await {
            Ok(account) => account,
            Err(e) => {
                error!("Failed to load technician {}: {}", session.funcionario_id, e);
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Erro interno do servidor" })),
                ));
            }
        };
        let Some(account) = account else {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Authentication required" })),
            ));
        };
        if account.permissao != Permission::Admin {
            return Err((
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({
                    "error": "Administrator permission required"
                })),
            ));
        }
        session.permissao = account.permissao;
        Ok(AdminSession(session))
    }
}
