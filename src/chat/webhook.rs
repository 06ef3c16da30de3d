//! Client for the chat automation webhook
//!
//! Every call is a `POST` of `{"action": ..., "payload": {...}}`. The automation may answer
//! with an empty body or with JSON that carries `novo_chamado_id` when a message opened a
//! ticket.

use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::core::config::WebhookConfig;
use crate::core::shared::enums::SenderKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "payload")]
pub enum WebhookRequest {
    #[serde(rename = "enviar_mensagem")]
    SendMessage {
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<i64>,
        remetente_id: String,
        tipo_remetente: SenderKind,
        texto_mensagem: String,
    },
    #[serde(rename = "assumir_chamado")]
    ClaimTicket {
        conversation_id: i64,
        tecnico_id: String,
    },
    #[serde(rename = "transferir_chamado")]
    TransferTicket {
        conversation_id: i64,
        novo_tecnico_id: String,
    },
}

impl WebhookRequest {
    pub fn action(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "enviar_mensagem",
            Self::ClaimTicket { .. } => "assumir_chamado",
            Self::TransferTicket { .. } => "transferir_chamado",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebhookResponse {
    #[serde(default, deserialize_with = "lenient_id")]
    pub novo_chamado_id: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Accepts the id as a number or a numeric string.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(n)) => Ok(Some(n)),
        Some(RawId::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawId::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Webhook response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// `None` when no webhook url is configured.
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>, WebhookError> {
        config
            .url
            .as_deref()
            .map(|url| Self::new(url, config.timeout()))
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn send(&self, request: &WebhookRequest) -> Result<WebhookResponse, WebhookError> {
        debug!("Calling webhook action {}", request.action());

        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                "Webhook action {} failed with status {}",
                request.action(),
                status
            );
            return Err(WebhookError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(WebhookResponse::default());
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn send_message(
        &self,
        conversation_id: Option<i64>,
        remetente_id: &str,
        tipo_remetente: SenderKind,
        texto_mensagem: &str,
    ) -> Result<WebhookResponse, WebhookError> {
        self.send(&WebhookRequest::SendMessage {
            conversation_id,
            remetente_id: remetente_id.to_string(),
            tipo_remetente,
            texto_mensagem: texto_mensagem.to_string(),
        })
        .await
    }

    pub async fn claim_ticket(
        &self,
        conversation_id: i64,
        tecnico_id: i64,
    ) -> Result<WebhookResponse, WebhookError> {
        self.send(&WebhookRequest::ClaimTicket {
            conversation_id,
            tecnico_id: tecnico_id.to_string(),
        })
        .await
    }

    pub async fn transfer_ticket(
        &self,
        conversation_id: i64,
        novo_tecnico_id: i64,
    ) -> Result<WebhookResponse, WebhookError> {
        self.send(&WebhookRequest::TransferTicket {
            conversation_id,
            novo_tecnico_id: novo_tecnico_id.to_string(),
        })
        .await
    }
}
