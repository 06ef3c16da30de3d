use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::HistoryEntry;

/// Display label for the actor tags written by the automation and the intake.
/// Technician names and other free-form actors are shown as stored.
pub fn actor_label(actor: &str) -> &str {
    match actor {
        "usuario" => "Usuário",
        "ia" => "IA",
        "humano" => "Técnico",
        other => other,
    }
}

/// Relative time in pt-BR, e.g. "há 5 minutos".
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds();
    if seconds < 60 {
        return "agora mesmo".to_string();
    }
    let (amount, one, many) = if seconds < 3_600 {
        (seconds / 60, "minuto", "minutos")
    } else if seconds < 86_400 {
        (seconds / 3_600, "hora", "horas")
    } else if seconds < 30 * 86_400 {
        (seconds / 86_400, "dia", "dias")
    } else if seconds < 365 * 86_400 {
        (seconds / (30 * 86_400), "mês", "meses")
    } else {
        (seconds / (365 * 86_400), "ano", "anos")
    };
    let unit = if amount == 1 { one } else { many };
    format!("há {amount} {unit}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub id: i64,
    pub chamado_id: i64,
    pub actor: String,
    pub actor_label: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub relativo: String,
}

impl TimelineEntry {
    pub fn render(entry: HistoryEntry, now: DateTime<Utc>) -> Self {
        Self {
            actor_label: actor_label(&entry.actor).to_string(),
            relativo: relative_time(entry.created_at, now),
            id: entry.id,
            chamado_id: entry.chamado_id,
            actor: entry.actor,
            message: entry.message,
            created_at: entry.created_at,
        }
    }
}
