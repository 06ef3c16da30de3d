use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::collections::HashMap;

use crate::core::shared::enums::{AttachmentKind, TicketStatus};
use crate::core::shared::error::StoreError;
use crate::core::shared::schema::{chamados_ti, chamados_ti_anexos, chamados_ti_historico};
use crate::core::shared::utils::{with_conn, DbPool};

use super::lifecycle::{HistoryDraft, TicketMutation};
use super::types::{
    Attachment, AttachmentCounts, HistoryEntry, NewAttachment, NewHistoryEntry, NewTicket,
    SortOrder, Ticket, TicketFilter,
};

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Inserts the ticket as `aberto` together with its opening history entry.
    async fn create(
        &self,
        ticket: NewTicket,
        history: HistoryDraft,
    ) -> Result<(Ticket, HistoryEntry), StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Ticket>, StoreError>;

    async fn list(&self, filter: TicketFilter) -> Result<Vec<Ticket>, StoreError>;

    async fn queue(&self) -> Result<Vec<Ticket>, StoreError> {
        self.list(TicketFilter::queue()).await
    }

    /// Commits the field changes and the history entry atomically.
    ///
    /// No version check: concurrent mutations of the same ticket resolve last-write-wins.
    async fn apply(
        &self,
        id: i64,
        mutation: TicketMutation,
    ) -> Result<(Ticket, HistoryEntry), StoreError>;

    async fn history(&self, id: i64, order: SortOrder) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Distinct non-blank `loja` values, sorted.
    async fn stores(&self) -> Result<Vec<String>, StoreError>;

    async fn attachments(&self, id: i64) -> Result<Vec<Attachment>, StoreError>;

    async fn add_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError>;

    async fn attachment_summary(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, AttachmentCounts>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgTicketStore {
    pool: DbPool,
}

impl PgTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn create(
        &self,
        ticket: NewTicket,
        history: HistoryDraft,
    ) -> Result<(Ticket, HistoryEntry), StoreError> {
        with_conn(&self.pool, move |conn| {
            conn.transaction(|conn| {
                let created = diesel::insert_into(chamados_ti::table)
                    .values((&ticket, chamados_ti::status.eq(TicketStatus::Open)))
                    .returning(Ticket::as_returning())
                    .get_result(conn)?;
                let entry = diesel::insert_into(chamados_ti_historico::table)
                    .values(NewHistoryEntry {
                        chamado_id: created.id_chamado,
                        actor: history.actor,
                        message: history.message,
                    })
                    .returning(HistoryEntry::as_returning())
                    .get_result(conn)?;
                Ok::<_, StoreError>((created, entry))
            })
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        with_conn(&self.pool, move |conn| {
            let ticket = chamados_ti::table
                .find(id)
                .select(Ticket::as_select())
                .first(conn)
                .optional()?;
            Ok(ticket)
        })
        .await
    }

    async fn list(&self, filter: TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        with_conn(&self.pool, move |conn| {
            let mut query = chamados_ti::table
                .select(Ticket::as_select())
                .into_boxed();

            if let Some(status) = filter.status {
                query = query.filter(chamados_ti::status.eq(status));
            }
            if let Some(id) = filter.assigned_to {
                query = query.filter(chamados_ti::assigned_func_ti_id.eq(id));
            }
            if let Some(loja) = filter.loja.clone() {
                query = query.filter(chamados_ti::loja.eq(loja));
            }
            if let Some(since) = filter.created_since {
                query = query.filter(chamados_ti::created_at.ge(since));
            }
            if let Some(before) = filter.created_before {
                query = query.filter(chamados_ti::created_at.lt(before));
            }
            if let Some(term) = filter.search_term() {
                let pattern = like_pattern(term);
                let by_text = chamados_ti::nome_funcionario
                    .ilike(pattern.clone())
                    .or(chamados_ti::email.ilike(pattern.clone()))
                    .or(chamados_ti::descricao_problema.ilike(pattern));
                query = match term.parse::<i64>() {
                    Ok(id) => query.filter(by_text.or(chamados_ti::id_chamado.eq(id).nullable())),
                    Err(_) => query.filter(by_text),
                };
            }

            query = match filter.order {
                SortOrder::Asc => query.order((
                    chamados_ti::created_at.asc(),
                    chamados_ti::id_chamado.asc(),
                )),
                SortOrder::Desc => query.order((
                    chamados_ti::created_at.desc(),
                    chamados_ti::id_chamado.desc(),
                )),
            };
            if let Some(limit) = filter.limit {
                query = query.limit(limit);
            }
            if let Some(offset) = filter.offset {
                query = query.offset(offset);
            }

            Ok(query.load(conn)?)
        })
        .await
    }

    async fn apply(
        &self,
        id: i64,
        mutation: TicketMutation,
    ) -> Result<(Ticket, HistoryEntry), StoreError> {
        with_conn(&self.pool, move |conn| {
            conn.transaction(|conn| {
                let ticket = if mutation.changes.is_empty() {
                    chamados_ti::table
                        .find(id)
                        .select(Ticket::as_select())
                        .first(conn)
                        .optional()?
                } else {
                    diesel::update(chamados_ti::table.find(id))
                        .set((&mutation.changes, chamados_ti::updated_at.eq(Utc::now())))
                        .returning(Ticket::as_returning())
                        .get_result(conn)
                        .optional()?
                };
                let ticket = ticket.ok_or_else(|| StoreError::not_found("chamado", id))?;

                let entry = diesel::insert_into(chamados_ti_historico::table)
                    .values(NewHistoryEntry {
                        chamado_id: id,
                        actor: mutation.history.actor,
                        message: mutation.history.message,
                    })
                    .returning(HistoryEntry::as_returning())
                    .get_result(conn)?;
                Ok::<_, StoreError>((ticket, entry))
            })
        })
        .await
    }

    async fn history(&self, id: i64, order: SortOrder) -> Result<Vec<HistoryEntry>, StoreError> {
        with_conn(&self.pool, move |conn| {
            let query = chamados_ti_historico::table
                .filter(chamados_ti_historico::chamado_id.eq(id))
                .select(HistoryEntry::as_select())
                .into_boxed();
            let query = match order {
                SortOrder::Asc => query.order((
                    chamados_ti_historico::created_at.asc(),
                    chamados_ti_historico::id.asc(),
                )),
                SortOrder::Desc => query.order((
                    chamados_ti_historico::created_at.desc(),
                    chamados_ti_historico::id.desc(),
                )),
            };
            Ok(query.load(conn)?)
        })
        .await
    }

    async fn stores(&self) -> Result<Vec<String>, StoreError> {
        with_conn(&self.pool, |conn| {
            let stores: Vec<Option<String>> = chamados_ti::table
                .select(chamados_ti::loja)
                .filter(chamados_ti::loja.is_not_null())
                .distinct()
                .order(chamados_ti::loja.asc())
                .load(conn)?;
            Ok(stores
                .into_iter()
                .flatten()
                .filter(|loja| !loja.trim().is_empty())
                .collect())
        })
        .await
    }

    async fn attachments(&self, id: i64) -> Result<Vec<Attachment>, StoreError> {
        with_conn(&self.pool, move |conn| {
            let attachments = chamados_ti_anexos::table
                .filter(chamados_ti_anexos::id_chamado.eq(id))
                .select(Attachment::as_select())
                .order((
                    chamados_ti_anexos::created_at.desc(),
                    chamados_ti_anexos::id.desc(),
                ))
                .load(conn)?;
            Ok(attachments)
        })
        .await
    }

    async fn add_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError> {
        with_conn(&self.pool, move |conn| {
            let exists = chamados_ti::table
                .find(attachment.id_chamado)
                .select(chamados_ti::id_chamado)
                .first::<i64>(conn)
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::not_found("chamado", attachment.id_chamado));
            }
            let created = diesel::insert_into(chamados_ti_anexos::table)
                .values(&attachment)
                .returning(Attachment::as_returning())
                .get_result(conn)?;
            Ok(created)
        })
        .await
    }

    async fn attachment_summary(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, AttachmentCounts>, StoreError> {
        let ids = ids.to_vec();
        with_conn(&self.pool, move |conn| {
            let rows: Vec<(i64, AttachmentKind)> = chamados_ti_anexos::table
                .filter(chamados_ti_anexos::id_chamado.eq_any(ids))
                .select((chamados_ti_anexos::id_chamado, chamados_ti_anexos::tipo))
                .load(conn)?;

            let mut summary: HashMap<i64, AttachmentCounts> = HashMap::new();
            for (id, kind) in rows {
                summary.entry(id).or_default().record(kind);
            }
            Ok(summary)
        })
        .await
    }
}

/// `%term%` for ILIKE, with the pattern metacharacters of `term` escaped. Postgres uses
/// backslash as the default LIKE escape.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
