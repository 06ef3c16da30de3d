use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::shared::error::StoreError;

use super::storage::TicketStore;
use super::types::{AttachmentCounts, Ticket};

/// One waiting ticket as the queue shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    #[serde(flatten)]
    pub chamado: Ticket,
    pub total_anexos: usize,
    pub total_imagens: usize,
    pub espera_segundos: i64,
}

/// Open tickets, oldest first, in the order the store returns them.
pub async fn load_queue(
    store: &dyn TicketStore,
    now: DateTime<Utc>,
) -> Result<Vec<QueueItem>, StoreError> {
    let tickets = store.queue().await?;
    let ids: Vec<i64> = tickets.iter().map(|t| t.id_chamado).collect();
    let summary = if ids.is_empty() {
        Default::default()
    } else {
        store.attachment_summary(&ids).await?
    };

    Ok(tickets
        .into_iter()
        .map(|chamado| {
            let counts: AttachmentCounts =
                summary.get(&chamado.id_chamado).copied().unwrap_or_default();
            let espera_segundos = (now - chamado.created_at).num_seconds().max(0);
            QueueItem {
                chamado,
                total_anexos: counts.total,
                total_imagens: counts.images,
                espera_segundos,
            }
        })
        .collect())
}
