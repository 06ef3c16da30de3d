//! Ticket lifecycle transitions
//!
//! `aberto -> em_atendimento -> {resolvido, fechado}`, with transfers while in service and
//! observations at any point. Planning is pure: it turns a ticket plus a requested
//! [`Transition`] into the field changes and the single history entry that the store
//! commits together.

use serde::{Deserialize, Serialize};

use crate::core::middleware::Session;
use crate::core::shared::enums::TicketStatus;
use crate::technicians::TechnicianRef;

use super::types::{Ticket, TicketChanges};

pub const SYSTEM_ACTOR: &str = "Sistema";

/// How an in-service ticket ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "resolvido")]
    Resolved,
    #[serde(rename = "fechado")]
    Closed,
}

impl Outcome {
    pub fn status(self) -> TicketStatus {
        match self {
            Self::Resolved => TicketStatus::Resolved,
            Self::Closed => TicketStatus::Closed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `technician: None` keeps the current assignee, or assigns the acting technician.
    Claim { technician: Option<TechnicianRef> },
    Finish { outcome: Outcome, solution: String },
    Transfer { to: TechnicianRef },
    Observe { text: String },
}

impl Transition {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "assumir",
            Self::Finish { .. } => "encerrar",
            Self::Transfer { .. } => "transferir",
            Self::Observe { .. } => "observar",
        }
    }

    /// Checks that depend only on the request, run before the store is touched.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        match self {
            Self::Finish { solution, .. } if solution.trim().is_empty() => {
                Err(LifecycleError::MissingSolution)
            }
            Self::Observe { text } if text.trim().is_empty() => {
                Err(LifecycleError::EmptyObservation)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDraft {
    pub actor: String,
    pub message: String,
}

impl HistoryDraft {
    pub fn new(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            message: message.into(),
        }
    }
}

/// Everything one transition writes: ticket columns plus exactly one history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketMutation {
    pub changes: TicketChanges,
    pub history: HistoryDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Informe a solução aplicada antes de encerrar o chamado")]
    MissingSolution,
    #[error("Selecione um técnico para transferir o chamado")]
    MissingTechnician,
    #[error("A observação não pode ser vazia")]
    EmptyObservation,
    #[error("O chamado já está com {0}")]
    SameTechnician(String),
    #[error("Não é possível {action} um chamado com status {}", from.label())]
    InvalidTransition {
        action: &'static str,
        from: TicketStatus,
    },
}

impl LifecycleError {
    /// Caused by the request itself rather than the ticket's current state.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::InvalidTransition { .. })
    }
}

/// Plans `transition` against the ticket as last read.
///
/// `assignee` is the ticket's current technician, resolved by the caller.
pub fn plan(
    ticket: &Ticket,
    transition: &Transition,
    session: &Session,
    assignee: Option<&TechnicianRef>,
) -> Result<TicketMutation, LifecycleError> {
    transition.validate()?;

    let invalid = || LifecycleError::InvalidTransition {
        action: transition.action(),
        from: ticket.status,
    };

    match transition {
        Transition::Claim { technician } => {
            if ticket.status != TicketStatus::Open {
                return Err(invalid());
            }
            let technician = technician
                .clone()
                .or_else(|| assignee.cloned())
                .unwrap_or_else(|| session.technician());
            Ok(TicketMutation {
                changes: TicketChanges {
                    status: Some(TicketStatus::InService),
                    assigned_func_ti_id: Some(technician.id),
                    tecnico_responsavel: Some(technician.nome.clone()),
                    solucao_aplicada: None,
                },
                history: HistoryDraft::new(
                    technician.nome.clone(),
                    format!("Atendimento iniciado por {}", technician.nome),
                ),
            })
        }
        Transition::Finish { outcome, solution } => {
            if ticket.status != TicketStatus::InService {
                return Err(invalid());
            }
            let solution = solution.trim().to_string();
            let mut changes = TicketChanges {
                status: Some(outcome.status()),
                solucao_aplicada: Some(solution.clone()),
                ..Default::default()
            };
            let responsible_missing = ticket
                .tecnico_responsavel
                .as_deref()
                .map_or(true, |n| n.trim().is_empty());
            if responsible_missing {
                match assignee {
                    Some(technician) => {
                        changes.tecnico_responsavel = Some(technician.nome.clone());
                    }
                    None => {
                        changes.assigned_func_ti_id = Some(session.funcionario_id);
                        changes.tecnico_responsavel = Some(session.nome.clone());
                    }
                }
            }
            let verb = match outcome {
                Outcome::Resolved => "resolvido",
                Outcome::Closed => "fechado",
            };
            Ok(TicketMutation {
                changes,
                history: HistoryDraft::new(
                    session.nome.clone(),
                    format!("Chamado {verb} por {}. Solução: {solution}", session.nome),
                ),
            })
        }
        Transition::Transfer { to } => {
            if ticket.status != TicketStatus::InService {
                return Err(invalid());
            }
            if ticket.assigned_func_ti_id == Some(to.id) {
                return Err(LifecycleError::SameTechnician(to.nome.clone()));
            }
            Ok(TicketMutation {
                changes: TicketChanges {
                    assigned_func_ti_id: Some(to.id),
                    tecnico_responsavel: Some(to.nome.clone()),
                    ..Default::default()
                },
                history: HistoryDraft::new(
                    SYSTEM_ACTOR,
                    format!("Chamado transferido para {}", to.nome),
                ),
            })
        }
        Transition::Observe { text } => Ok(TicketMutation {
            changes: TicketChanges::default(),
            history: HistoryDraft::new(session.nome.clone(), text.trim().to_string()),
        }),
    }
}
