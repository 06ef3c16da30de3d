//! Chat channel tied to a ticket
//!
//! With an automation webhook configured, outbound messages are handed to it and the
//! automation writes `mensagens_chat` itself. Without one, messages are inserted directly.

pub mod storage;
pub mod types;
pub mod webhook;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use std::sync::Arc;

use crate::core::middleware::Session;
use crate::core::shared::enums::SenderKind;
use crate::core::shared::error::StoreError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{check_len, non_blank, MAX_TEXT_LEN};
use crate::realtime::{ChangeEvent, MESSAGES_TABLE};
use crate::tickets::{NewTicket, Ticket, TicketsError};

pub use storage::{ChatStore, PgChatStore};
pub use types::{ChatMessage, MessagesQuery, NewChatMessage, SendMessageRequest, SendMessageResponse};
pub use webhook::{WebhookClient, WebhookError, WebhookRequest, WebhookResponse};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),
    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<TicketsError> for ChatError {
    fn from(e: TicketsError) -> Self {
        match e {
            TicketsError::Validation(msg) | TicketsError::InvalidTransition(msg) => {
                Self::Validation(msg)
            }
            TicketsError::NotFound(msg) => Self::NotFound(msg),
            TicketsError::Store(msg) => Self::Store(msg),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Webhook(e) => {
                error!("Chat webhook error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Não foi possível enviar a mensagem".to_string(),
                )
            }
            Self::Store(msg) => {
                error!("Chat store error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro ao acessar as mensagens".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Who is speaking on a ticket's conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Speaker {
    remetente_id: String,
    tipo: SenderKind,
}

/// Technicians speak through their session; requesters must present the ticket's
/// conversation id.
fn speaker_for(
    ticket: &Ticket,
    session: Option<&Session>,
    query: &MessagesQuery,
) -> Result<Speaker, ChatError> {
    if let Some(session) = session {
        return Ok(Speaker {
            remetente_id: session.funcionario_id.to_string(),
            tipo: SenderKind::Tecnico,
        });
    }
    match (&ticket.session_id, &query.session_id) {
        (Some(expected), Some(given)) if expected == given => Ok(Speaker {
            remetente_id: given.clone(),
            tipo: SenderKind::Usuario,
        }),
        _ => Err(ChatError::Unauthorized(
            "Acesso à conversa não autorizado".to_string(),
        )),
    }
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    session: Option<Session>,
    Path(id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, ChatError> {
    let ticket = state.tickets.get(id).await?;
    speaker_for(&ticket, session.as_ref(), &query)?;
    Ok(Json(state.chat.list(id).await?))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    session: Option<Session>,
    Path(id): Path<i64>,
    Query(query): Query<MessagesQuery>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ChatError> {
    let texto = non_blank(Some(req.texto_mensagem))
        .ok_or_else(|| ChatError::Validation("A mensagem não pode ser vazia".to_string()))?;
    let ticket = state.tickets.get(id).await?;
    let speaker = speaker_for(&ticket, session.as_ref(), &query)?;

    let response = deliver(&state, Some(id), speaker, texto).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// First message of a requester without a ticket. The conversation id becomes the new
/// ticket's `session_id`.
pub async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ChatError> {
    let texto = non_blank(Some(req.texto_mensagem))
        .ok_or_else(|| ChatError::Validation("A mensagem não pode ser vazia".to_string()))?;
    let remetente_id = non_blank(req.remetente_id)
        .ok_or_else(|| ChatError::Validation("remetente_id é obrigatório".to_string()))?;
    check_len("remetente_id", Some(&remetente_id), MAX_TEXT_LEN).map_err(ChatError::Validation)?;
    let speaker = Speaker {
        remetente_id: remetente_id.clone(),
        tipo: SenderKind::Usuario,
    };

    if state.webhook.is_some() {
        let response = deliver(&state, None, speaker, texto).await?;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    let ticket = state
        .tickets
        .open(NewTicket {
            session_id: Some(remetente_id),
            nome_funcionario: req.nome_funcionario,
            email: req.email,
            loja: req.loja,
            descricao_problema: Some(texto.clone()),
            ..Default::default()
        })
        .await?;
    let mut response = deliver(&state, Some(ticket.id_chamado), speaker, texto).await?;
    response.novo_chamado_id = Some(ticket.id_chamado);
    Ok((StatusCode::CREATED, Json(response)))
}

async fn deliver(
    state: &AppState,
    chamado_id: Option<i64>,
    speaker: Speaker,
    texto: String,
) -> Result<SendMessageResponse, ChatError> {
    if let Some(webhook) = &state.webhook {
        let answer = webhook
            .send_message(chamado_id, &speaker.remetente_id, speaker.tipo, &texto)
            .await?;
        let target = chamado_id.or(answer.novo_chamado_id);
        if let Some(target) = target {
            state.feed.publish(ChangeEvent::insert(
                MESSAGES_TABLE,
                &serde_json::json!({
                    "chamado_id": target,
                    "remetente_id": speaker.remetente_id,
                    "tipo_remetente": speaker.tipo,
                    "texto_mensagem": texto,
                }),
            ));
        }
        info!("Message relayed to automation for ticket {:?}", target);
        return Ok(SendMessageResponse {
            chamado_id: target,
            novo_chamado_id: answer.novo_chamado_id,
            mensagem: None,
        });
    }

    let Some(chamado_id) = chamado_id else {
        return Err(ChatError::Validation(
            "Conversa sem chamado associado".to_string(),
        ));
    };
    let stored = state
        .chat
        .insert(NewChatMessage {
            chamado_id,
            remetente_id: speaker.remetente_id,
            tipo_remetente: speaker.tipo,
            texto_mensagem: texto,
        })
        .await?;
    state
        .feed
        .publish(ChangeEvent::insert(MESSAGES_TABLE, &stored));
    Ok(SendMessageResponse {
        chamado_id: Some(chamado_id),
        novo_chamado_id: None,
        mensagem: Some(stored),
    })
}

pub fn configure_chat_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/mensagens", post(start_conversation))
        .route(
            "/api/chamados/:id/mensagens",
            get(list_messages).post(send_message),
        )
}
