use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::SenderKind;
use crate::core::shared::schema::mensagens_chat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = mensagens_chat)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChatMessage {
    pub id: i64,
    pub chamado_id: i64,
    pub remetente_id: String,
    pub tipo_remetente: SenderKind,
    pub texto_mensagem: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = mensagens_chat)]
pub struct NewChatMessage {
    pub chamado_id: i64,
    pub remetente_id: String,
    pub tipo_remetente: SenderKind,
    pub texto_mensagem: String,
}

/// Body of a message post. Technicians are identified by their session; requesters
/// supply `remetente_id` themselves.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub texto_mensagem: String,
    #[serde(default)]
    pub remetente_id: Option<String>,
    /// Requester details used when the message opens a new ticket.
    #[serde(default)]
    pub nome_funcionario: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub loja: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    /// Requester access: must equal the ticket's `session_id`.
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessageResponse {
    pub chamado_id: Option<i64>,
    /// Set when the message opened a ticket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub novo_chamado_id: Option<i64>,
    /// The stored row, when written directly rather than through the automation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensagem: Option<ChatMessage>,
}
