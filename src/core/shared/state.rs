use std::sync::Arc;

use crate::chat::{ChatStore, PgChatStore, WebhookClient, WebhookError};
use crate::core::config::AppConfig;
use crate::core::middleware::SessionKeys;
use crate::core::shared::utils::DbPool;
use crate::realtime::ChangeFeed;
use crate::technicians::{
    CredentialService, PgCredentialService, PgTechnicianStore, TechnicianStore,
};
use crate::tickets::{PgTicketStore, TicketService, TicketStore};

/// Persistence collaborators, swappable as a set.
#[derive(Clone)]
pub struct Backends {
    pub tickets: Arc<dyn TicketStore>,
    pub technicians: Arc<dyn TechnicianStore>,
    pub credentials: Arc<dyn CredentialService>,
    pub chat: Arc<dyn ChatStore>,
}

impl Backends {
    pub fn postgres(pool: &DbPool) -> Self {
        Self {
            tickets: Arc::new(PgTicketStore::new(pool.clone())),
            technicians: Arc::new(PgTechnicianStore::new(pool.clone())),
            credentials: Arc::new(PgCredentialService::new(pool.clone())),
            chat: Arc::new(PgChatStore::new(pool.clone())),
        }
    }
}

pub struct AppState {
    pub config: AppConfig,
    /// Present when backed by Postgres; used by the health check.
    pub conn: Option<DbPool>,
    pub session_keys: SessionKeys,
    pub tickets: Arc<TicketService>,
    pub technicians: Arc<dyn TechnicianStore>,
    pub credentials: Arc<dyn CredentialService>,
    pub chat: Arc<dyn ChatStore>,
    pub webhook: Option<Arc<WebhookClient>>,
    /// Broadcast of committed writes for realtime subscribers
    pub feed: ChangeFeed,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        backends: Backends,
        conn: Option<DbPool>,
    ) -> Result<Self, WebhookError> {
        let webhook = WebhookClient::from_config(&config.webhook)?.map(Arc::new);
        let feed = ChangeFeed::new(config.realtime.channel_capacity);
        let tickets = Arc::new(TicketService::new(
            backends.tickets,
            Arc::clone(&backends.technicians),
            feed.clone(),
            webhook.clone(),
        ));

        Ok(Self {
            session_keys: SessionKeys::new(&config.auth),
            config,
            conn,
            tickets,
            technicians: backends.technicians,
            credentials: backends.credentials,
            chat: backends.chat,
            webhook,
            feed,
        })
    }
}
