use async_trait::async_trait;
use diesel::prelude::*;

use crate::core::shared::error::StoreError;
use crate::core::shared::schema::mensagens_chat;
use crate::core::shared::utils::{with_conn, DbPool};

use super::types::{ChatMessage, NewChatMessage};

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Messages of one ticket, oldest first.
    async fn list(&self, chamado_id: i64) -> Result<Vec<ChatMessage>, StoreError>;
    async fn insert(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: DbPool,
}

impl PgChatStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn list(&self, chamado_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
        with_conn(&self.pool, move |conn| {
            let messages = mensagens_chat::table
                .filter(mensagens_chat::chamado_id.eq(chamado_id))
                .select(ChatMessage::as_select())
                .order((mensagens_chat::created_at.asc(), mensagens_chat::id.asc()))
                .load(conn)?;
            Ok(messages)
        })
        .await
    }

    async fn insert(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        with_conn(&self.pool, move |conn| {
            let stored = diesel::insert_into(mensagens_chat::table)
                .values(&message)
                .returning(ChatMessage::as_returning())
                .get_result(conn)?;
            Ok(stored)
        })
        .await
    }
}
