//! IT helpdesk ticket service
//!
//! Tickets (`chamados`) move through `aberto -> em_atendimento -> resolvido | fechado`,
//! every change is recorded in an append-only history, and clients follow the queue over a
//! realtime change feed.

pub mod api_router;
pub mod auth;
pub mod chat;
pub mod core;
#[cfg(feature = "dashboards")]
pub mod dashboards;
pub mod main_module;
pub mod realtime;
pub mod technicians;
pub mod tickets;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
