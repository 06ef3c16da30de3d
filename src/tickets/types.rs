use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::{AttachmentKind, Priority, TicketStatus};
use crate::core::shared::schema::{chamados_ti, chamados_ti_anexos, chamados_ti_historico};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = chamados_ti)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ticket {
    pub id_chamado: i64,
    pub session_id: Option<String>,
    pub nome_funcionario: Option<String>,
    pub email: Option<String>,
    pub telefone_contato: Option<String>,
    pub departamento: Option<String>,
    pub loja: Option<String>,
    pub descricao_problema: Option<String>,
    pub anexos: serde_json::Value,
    pub status: TicketStatus,
    pub prioridade: Option<Priority>,
    pub tentativas_ia: Option<i32>,
    pub tecnico_responsavel: Option<String>,
    pub assigned_func_ti_id: Option<i64>,
    pub solucao_aplicada: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

/// Requester-supplied fields of a new ticket. Status always starts at `aberto`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = chamados_ti)]
pub struct NewTicket {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub nome_funcionario: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefone_contato: Option<String>,
    #[serde(default)]
    pub departamento: Option<String>,
    #[serde(default)]
    pub loja: Option<String>,
    #[serde(default)]
    pub descricao_problema: Option<String>,
    #[serde(default = "empty_array")]
    pub anexos: serde_json::Value,
    #[serde(default)]
    pub prioridade: Option<Priority>,
}

impl Default for NewTicket {
    fn default() -> Self {
        Self {
            session_id: None,
            nome_funcionario: None,
            email: None,
            telefone_contato: None,
            departamento: None,
            loja: None,
            descricao_problema: None,
            anexos: empty_array(),
            prioridade: None,
        }
    }
}

/// Field changes produced by a lifecycle transition. `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = chamados_ti)]
pub struct TicketChanges {
    pub status: Option<TicketStatus>,
    pub assigned_func_ti_id: Option<i64>,
    pub tecnico_responsavel: Option<String>,
    pub solucao_aplicada: Option<String>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assigned_func_ti_id.is_none()
            && self.tecnico_responsavel.is_none()
            && self.solucao_aplicada.is_none()
    }

    pub fn apply_to(&self, ticket: &mut Ticket) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(id) = self.assigned_func_ti_id {
            ticket.assigned_func_ti_id = Some(id);
        }
        if let Some(nome) = &self.tecnico_responsavel {
            ticket.tecnico_responsavel = Some(nome.clone());
        }
        if let Some(solucao) = &self.solucao_aplicada {
            ticket.solucao_aplicada = Some(solucao.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = chamados_ti_historico)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HistoryEntry {
    pub id: i64,
    pub chamado_id: i64,
    pub actor: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = chamados_ti_historico)]
pub struct NewHistoryEntry {
    pub chamado_id: i64,
    pub actor: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = chamados_ti_anexos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Attachment {
    pub id: i64,
    pub id_chamado: i64,
    pub file_path: String,
    pub tipo: AttachmentKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = chamados_ti_anexos)]
pub struct NewAttachment {
    pub id_chamado: i64,
    pub file_path: String,
    pub tipo: AttachmentKind,
}

/// Per-ticket attachment counts shown in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentCounts {
    pub total: usize,
    pub images: usize,
}

impl AttachmentCounts {
    pub fn record(&mut self, kind: AttachmentKind) {
        self.total += 1;
        if kind == AttachmentKind::Imagem {
            self.images += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<i64>,
    pub loja: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive match on requester name, email and description. A numeric term
    /// also matches the ticket id.
    pub search: Option<String>,
    #[serde(default)]
    pub order: SortOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TicketFilter {
    /// Open tickets, oldest first.
    pub fn queue() -> Self {
        Self {
            status: Some(TicketStatus::Open),
            order: SortOrder::Asc,
            ..Default::default()
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self.status.is_some_and(|s| s != ticket.status) {
            return false;
        }
        if self
            .assigned_to
            .is_some_and(|id| ticket.assigned_func_ti_id != Some(id))
        {
            return false;
        }
        if self
            .loja
            .as_deref()
            .is_some_and(|loja| ticket.loja.as_deref() != Some(loja))
        {
            return false;
        }
        if self.created_since.is_some_and(|t| ticket.created_at < t) {
            return false;
        }
        if self.created_before.is_some_and(|t| ticket.created_at >= t) {
            return false;
        }
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            let by_id = term.parse::<i64>().ok() == Some(ticket.id_chamado);
            let by_text = [
                &ticket.nome_funcionario,
                &ticket.email,
                &ticket.descricao_problema,
            ]
            .iter()
            .any(|field| {
                field
                    .as_deref()
                    .is_some_and(|v| v.to_lowercase().contains(&term))
            });
            if !by_id && !by_text {
                return false;
            }
        }
        true
    }

    /// The trimmed search term, if any is left.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ticket(id: i64, loja: &str, nome: &str, days_ago: i64) -> Ticket {
        let now = Utc::now() - Duration::days(days_ago);
        Ticket {
            id_chamado: id,
            session_id: None,
            nome_funcionario: Some(nome.into()),
            email: None,
            telefone_contato: None,
            departamento: None,
            loja: Some(loja.into()),
            descricao_problema: Some("Sem acesso ao sistema 100%".into()),
            anexos: serde_json::json!([]),
            status: TicketStatus::Open,
            prioridade: None,
            tentativas_ia: None,
            tecnico_responsavel: None,
            assigned_func_ti_id: None,
            solucao_aplicada: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_search_is_trimmed_and_numeric_matches_id() {
        let t = ticket(1234, "Loja 1", "Maria", 0);
        let search = |term: &str| TicketFilter {
            search: Some(term.into()),
            ..Default::default()
        };
        assert!(search("  maria ").matches(&t));
        assert!(search("1234").matches(&t));
        assert!(search(" 100% ").matches(&t));
        assert!(!search("4321").matches(&t));
        assert!(search("   ").matches(&t));
    }

    #[test]
    fn test_store_and_period_filters() {
        let recent = ticket(1, "Loja 1", "Maria", 1);
        let old = ticket(2, "Loja 2", "João", 10);
        let filter = TicketFilter {
            loja: Some("Loja 1".into()),
            ..Default::default()
        };
        assert!(filter.matches(&recent));
        assert!(!filter.matches(&old));

        let window = TicketFilter {
            created_since: Some(Utc::now() - Duration::days(15)),
            created_before: Some(Utc::now() - Duration::days(5)),
            ..Default::default()
        };
        assert!(!window.matches(&recent));
        assert!(window.matches(&old));
    }
}
