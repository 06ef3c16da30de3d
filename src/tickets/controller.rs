use log::{info, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::chat::webhook::{WebhookClient, WebhookError, WebhookResponse};
use crate::core::middleware::Session;
use crate::core::shared::utils::{check_len, non_blank, MAX_TEXT_LEN};
use crate::realtime::{
    ChangeEvent, ChangeFeed, ATTACHMENTS_TABLE, HISTORY_TABLE, TICKETS_TABLE,
};
use crate::technicians::{TechnicianRef, TechnicianStore};

use super::error::TicketsError;
use super::lifecycle::{plan, HistoryDraft, LifecycleError, Outcome, Transition};
use super::storage::TicketStore;
use super::types::{Attachment, HistoryEntry, NewAttachment, NewTicket, Ticket};

pub const REQUESTER_ACTOR: &str = "usuario";
const MAX_PHONE_LEN: usize = 50;

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionResult {
    pub chamado: Ticket,
    pub historico: HistoryEntry,
}

/// Runs lifecycle operations against the store and announces every commit.
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    technicians: Arc<dyn TechnicianStore>,
    feed: ChangeFeed,
    webhook: Option<Arc<WebhookClient>>,
}

impl TicketService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        technicians: Arc<dyn TechnicianStore>,
        feed: ChangeFeed,
        webhook: Option<Arc<WebhookClient>>,
    ) -> Self {
        Self {
            store,
            technicians,
            feed,
            webhook,
        }
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Opens a ticket. An empty description is accepted.
    pub async fn open(&self, mut new: NewTicket) -> Result<Ticket, TicketsError> {
        new.session_id = non_blank(new.session_id);
        new.nome_funcionario = non_blank(new.nome_funcionario);
        new.email = non_blank(new.email);
        new.telefone_contato = non_blank(new.telefone_contato);
        new.departamento = non_blank(new.departamento);
        new.loja = non_blank(new.loja);
        new.descricao_problema = non_blank(new.descricao_problema);
        for (field, value, max) in [
            ("session_id", &new.session_id, MAX_TEXT_LEN),
            ("nome_funcionario", &new.nome_funcionario, MAX_TEXT_LEN),
            ("email", &new.email, MAX_TEXT_LEN),
            ("departamento", &new.departamento, MAX_TEXT_LEN),
            ("loja", &new.loja, MAX_TEXT_LEN),
            ("telefone_contato", &new.telefone_contato, MAX_PHONE_LEN),
        ] {
            check_len(field, value.as_deref(), max).map_err(TicketsError::Validation)?;
        }
        if new.anexos.is_null() {
            new.anexos = serde_json::Value::Array(Vec::new());
        }
        if !new.anexos.is_array() {
            return Err(TicketsError::Validation(
                "anexos deve ser uma lista".to_string(),
            ));
        }

        let message = match &new.nome_funcionario {
            Some(nome) => format!("Chamado aberto por {nome}"),
            None => "Chamado aberto".to_string(),
        };
        let (ticket, entry) = self
            .store
            .create(new, HistoryDraft::new(REQUESTER_ACTOR, message))
            .await?;

        info!("Ticket {} opened", ticket.id_chamado);
        self.feed.publish(ChangeEvent::insert(TICKETS_TABLE, &ticket));
        self.feed.publish(ChangeEvent::insert(HISTORY_TABLE, &entry));
        Ok(ticket)
    }

    pub async fn get(&self, id: i64) -> Result<Ticket, TicketsError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TicketsError::NotFound(format!("chamado {id}")))
    }

    pub async fn claim(
        &self,
        session: &Session,
        id: i64,
        technician_id: Option<i64>,
    ) -> Result<TransitionResult, TicketsError> {
        let technician = match technician_id {
            Some(tid) => Some(self.technician(tid).await?),
            None => None,
        };
        let result = self
            .run(session, id, Transition::Claim { technician })
            .await?;
        if let Some(tid) = result.chamado.assigned_func_ti_id {
            self.notify("assumir_chamado", move |webhook| async move {
                webhook.claim_ticket(id, tid).await
            });
        }
        Ok(result)
    }

    pub async fn finish(
        &self,
        session: &Session,
        id: i64,
        outcome: Outcome,
        solution: String,
    ) -> Result<TransitionResult, TicketsError> {
        self.run(session, id, Transition::Finish { outcome, solution })
            .await
    }

    pub async fn transfer(
        &self,
        session: &Session,
        id: i64,
        to: Option<i64>,
    ) -> Result<TransitionResult, TicketsError> {
        let to = to.ok_or(LifecycleError::MissingTechnician)?;
        let to = self.technician(to).await?;
        let novo_tecnico_id = to.id;
        let result = self.run(session, id, Transition::Transfer { to }).await?;
        self.notify("transferir_chamado", move |webhook| async move {
            webhook.transfer_ticket(id, novo_tecnico_id).await
        });
        Ok(result)
    }

    /// Appends a history entry. Identical observations are stored twice.
    pub async fn observe(
        &self,
        session: &Session,
        id: i64,
        text: String,
    ) -> Result<TransitionResult, TicketsError> {
        self.run(session, id, Transition::Observe { text }).await
    }

    pub async fn add_attachment(&self, attachment: NewAttachment) -> Result<Attachment, TicketsError> {
        let file_path = attachment.file_path.trim().trim_start_matches('/').to_string();
        if file_path.is_empty() {
            return Err(TicketsError::Validation(
                "file_path é obrigatório".to_string(),
            ));
        }
        let created = self
            .store
            .add_attachment(NewAttachment {
                file_path,
                ..attachment
            })
            .await?;
        self.feed
            .publish(ChangeEvent::insert(ATTACHMENTS_TABLE, &created));
        Ok(created)
    }

    async fn run(
        &self,
        session: &Session,
        id: i64,
        transition: Transition,
    ) -> Result<TransitionResult, TicketsError> {
        transition.validate()?;

        let ticket = self.get(id).await?;
        let assignee = self.assignee_of(&ticket).await?;
        let mutation = plan(&ticket, &transition, session, assignee.as_ref())?;
        let changed = !mutation.changes.is_empty();

        let (updated, entry) = self.store.apply(id, mutation).await?;

        info!(
            "Ticket {} {} by technician {} ({} -> {})",
            id,
            transition.action(),
            session.funcionario_id,
            ticket.status,
            updated.status
        );
        if updated.status.is_terminal() && !ticket.status.is_terminal() {
            info!("Ticket {} closed as {}", id, updated.status.label());
        }
        if changed {
            self.feed
                .publish(ChangeEvent::update(TICKETS_TABLE, &ticket, &updated));
        }
        self.feed.publish(ChangeEvent::insert(HISTORY_TABLE, &entry));

        Ok(TransitionResult {
            chamado: updated,
            historico: entry,
        })
    }

    async fn technician(&self, id: i64) -> Result<TechnicianRef, TicketsError> {
        self.technicians
            .get(id)
            .await?
            .map(|account| account.to_ref())
            .ok_or_else(|| TicketsError::Validation(format!("Técnico {id} não encontrado")))
    }

    async fn assignee_of(&self, ticket: &Ticket) -> Result<Option<TechnicianRef>, TicketsError> {
        let Some(id) = ticket.assigned_func_ti_id else {
            return Ok(None);
        };
        if let Some(account) = self.technicians.get(id).await? {
            return Ok(Some(account.to_ref()));
        }
        Ok(ticket
            .tecnico_responsavel
            .clone()
            .map(|nome| TechnicianRef { id, nome }))
    }

    /// Tells the chat automation, without holding up the caller.
    fn notify<F, Fut>(&self, action: &'static str, call: F)
    where
        F: FnOnce(Arc<WebhookClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<WebhookResponse, WebhookError>> + Send + 'static,
    {
        let Some(webhook) = self.webhook.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = call(webhook).await {
                warn!("Webhook notification {} failed: {}", action, e);
            }
        });
    }
}
