//! In-memory stand-ins for the Postgres backends, plus a ready-made application state.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::chat::{ChatMessage, ChatStore, NewChatMessage};
use crate::core::config::AppConfig;
use crate::core::middleware::Session;
use crate::core::shared::enums::{Permission, TicketStatus};
use crate::core::shared::error::StoreError;
use crate::core::shared::state::{AppState, Backends};
use crate::technicians::{
    CredentialService, TechnicianAccount, TechnicianFields, TechnicianStore, DEFAULT_PASSWORD,
};
use crate::tickets::lifecycle::{HistoryDraft, TicketMutation};
use crate::tickets::types::AttachmentCounts;
use crate::tickets::{
    Attachment, HistoryEntry, NewAttachment, NewTicket, SortOrder, Ticket, TicketFilter,
    TicketStore,
};

// ============================================================================
// Tickets
// ============================================================================

#[derive(Default)]
struct TicketTables {
    tickets: Vec<Ticket>,
    history: Vec<HistoryEntry>,
    attachments: Vec<Attachment>,
    next_id: i64,
}

impl TicketTables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_history(&mut self, chamado_id: i64, draft: HistoryDraft) -> HistoryEntry {
        let entry = HistoryEntry {
            id: self.next_id(),
            chamado_id,
            actor: draft.actor,
            message: draft.message,
            created_at: Utc::now(),
        };
        self.history.push(entry.clone());
        entry
    }
}

#[derive(Default)]
pub struct MemoryTicketStore {
    tables: Mutex<TicketTables>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a ticket exactly as given, keeping its id and timestamps.
    pub fn seed(&self, ticket: Ticket) -> Ticket {
        let mut tables = self.tables.lock().expect("ticket tables");
        tables.next_id = tables.next_id.max(ticket.id_chamado);
        tables.tickets.push(ticket.clone());
        ticket
    }

    pub fn history_of(&self, chamado_id: i64) -> Vec<HistoryEntry> {
        let tables = self.tables.lock().expect("ticket tables");
        tables
            .history
            .iter()
            .filter(|e| e.chamado_id == chamado_id)
            .cloned()
            .collect()
    }

    pub fn ticket(&self, id: i64) -> Option<Ticket> {
        let tables = self.tables.lock().expect("ticket tables");
        tables.tickets.iter().find(|t| t.id_chamado == id).cloned()
    }
}

/// A ticket row with only the fields tests usually care about.
pub fn sample_ticket(id: i64, status: TicketStatus) -> Ticket {
    let now = Utc::now();
    Ticket {
        id_chamado: id,
        session_id: Some(format!("conv-{id}")),
        nome_funcionario: Some("Maria Silva".into()),
        email: Some("maria@empresa.com".into()),
        telefone_contato: None,
        departamento: Some("Financeiro".into()),
        loja: Some("Loja Centro".into()),
        descricao_problema: Some("Computador não liga".into()),
        anexos: serde_json::json!([]),
        status,
        prioridade: None,
        tentativas_ia: None,
        tecnico_responsavel: None,
        assigned_func_ti_id: None,
        solucao_aplicada: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create(
        &self,
        ticket: NewTicket,
        history: HistoryDraft,
    ) -> Result<(Ticket, HistoryEntry), StoreError> {
        let mut tables = self.tables.lock().expect("ticket tables");
        let now = Utc::now();
        let created = Ticket {
            id_chamado: tables.next_id(),
            session_id: ticket.session_id,
            nome_funcionario: ticket.nome_funcionario,
            email: ticket.email,
            telefone_contato: ticket.telefone_contato,
            departamento: ticket.departamento,
            loja: ticket.loja,
            descricao_problema: ticket.descricao_problema,
            anexos: ticket.anexos,
            status: TicketStatus::Open,
            prioridade: ticket.prioridade,
            tentativas_ia: None,
            tecnico_responsavel: None,
            assigned_func_ti_id: None,
            solucao_aplicada: None,
            created_at: now,
            updated_at: now,
        };
        tables.tickets.push(created.clone());
        let entry = tables.push_history(created.id_chamado, history);
        Ok((created, entry))
    }

    async fn get(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        Ok(self.ticket(id))
    }

    async fn list(&self, filter: TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let tables = self.tables.lock().expect("ticket tables");
        let mut tickets: Vec<Ticket> = tables
            .tickets
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.created_at, t.id_chamado));
        if filter.order == SortOrder::Desc {
            tickets.reverse();
        }
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(tickets.into_iter().skip(offset).take(limit).collect())
    }

    async fn apply(
        &self,
        id: i64,
        mutation: TicketMutation,
    ) -> Result<(Ticket, HistoryEntry), StoreError> {
        let mut tables = self.tables.lock().expect("ticket tables");
        let ticket = tables
            .tickets
            .iter_mut()
            .find(|t| t.id_chamado == id)
            .ok_or_else(|| StoreError::not_found("chamado", id))?;
        if !mutation.changes.is_empty() {
            mutation.changes.apply_to(ticket);
            ticket.updated_at = Utc::now();
        }
        let updated = ticket.clone();
        let entry = tables.push_history(id, mutation.history);
        Ok((updated, entry))
    }

    async fn history(&self, id: i64, order: SortOrder) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut entries = self.history_of(id);
        entries.sort_by_key(|e| (e.created_at, e.id));
        if order == SortOrder::Desc {
            entries.reverse();
        }
        Ok(entries)
    }

    async fn stores(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock().expect("ticket tables");
        let stores: BTreeSet<String> = tables
            .tickets
            .iter()
            .filter_map(|t| t.loja.clone())
            .filter(|loja| !loja.trim().is_empty())
            .collect();
        Ok(stores.into_iter().collect())
    }

    async fn attachments(&self, id: i64) -> Result<Vec<Attachment>, StoreError> {
        let tables = self.tables.lock().expect("ticket tables");
        let mut attachments: Vec<Attachment> = tables
            .attachments
            .iter()
            .filter(|a| a.id_chamado == id)
            .cloned()
            .collect();
        attachments.sort_by_key(|a| std::cmp::Reverse((a.created_at, a.id)));
        Ok(attachments)
    }

    async fn add_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError> {
        let mut tables = self.tables.lock().expect("ticket tables");
        if !tables
            .tickets
            .iter()
            .any(|t| t.id_chamado == attachment.id_chamado)
        {
            return Err(StoreError::not_found("chamado", attachment.id_chamado));
        }
        let created = Attachment {
            id: tables.next_id(),
            id_chamado: attachment.id_chamado,
            file_path: attachment.file_path,
            tipo: attachment.tipo,
            created_at: Utc::now(),
        };
        tables.attachments.push(created.clone());
        Ok(created)
    }

    async fn attachment_summary(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, AttachmentCounts>, StoreError> {
        let tables = self.tables.lock().expect("ticket tables");
        let mut summary: HashMap<i64, AttachmentCounts> = HashMap::new();
        for attachment in tables.attachments.iter().filter(|a| ids.contains(&a.id_chamado)) {
            summary
                .entry(attachment.id_chamado)
                .or_default()
                .record(attachment.tipo);
        }
        Ok(summary)
    }
}

// ============================================================================
// Technicians and credentials
// ============================================================================

#[derive(Default)]
pub struct MemoryTechnicianStore {
    accounts: Mutex<Vec<(TechnicianAccount, String)>>,
}

#[async_trait]
impl TechnicianStore for MemoryTechnicianStore {
    async fn list(&self) -> Result<Vec<TechnicianAccount>, StoreError> {
        let accounts = self.accounts.lock().expect("accounts");
        let mut list: Vec<TechnicianAccount> = accounts.iter().map(|(a, _)| a.clone()).collect();
        list.sort_by(|a, b| a.nome.cmp(&b.nome));
        Ok(list)
    }

    async fn get(&self, id: i64) -> Result<Option<TechnicianAccount>, StoreError> {
        let accounts = self.accounts.lock().expect("accounts");
        Ok(accounts.iter().find(|(a, _)| a.id == id).map(|(a, _)| a.clone()))
    }

    async fn find_with_hash(
        &self,
        email: &str,
    ) -> Result<Option<(TechnicianAccount, String)>, StoreError> {
        let email = email.trim().to_lowercase();
        let accounts = self.accounts.lock().expect("accounts");
        Ok(accounts.iter().find(|(a, _)| a.email == email).cloned())
    }

    async fn password_hash(&self, id: i64) -> Result<Option<String>, StoreError> {
        let accounts = self.accounts.lock().expect("accounts");
        Ok(accounts.iter().find(|(a, _)| a.id == id).map(|(_, h)| h.clone()))
    }

    async fn create(
        &self,
        fields: TechnicianFields,
        senha_hash: String,
    ) -> Result<TechnicianAccount, StoreError> {
        let mut accounts = self.accounts.lock().expect("accounts");
        if accounts.iter().any(|(a, _)| a.email == fields.email) {
            return Err(StoreError::Conflict(format!("email {}", fields.email)));
        }
        let account = TechnicianAccount {
            id: accounts.iter().map(|(a, _)| a.id).max().unwrap_or(0) + 1,
            nome: fields.nome,
            email: fields.email,
            permissao: fields.permissao,
            created_at: Utc::now(),
        };
        accounts.push((account.clone(), senha_hash));
        Ok(account)
    }

    async fn update(
        &self,
        id: i64,
        fields: TechnicianFields,
    ) -> Result<TechnicianAccount, StoreError> {
        let mut accounts = self.accounts.lock().expect("accounts");
        if accounts
            .iter()
            .any(|(a, _)| a.id != id && a.email == fields.email)
        {
            return Err(StoreError::Conflict(format!("email {}", fields.email)));
        }
        let (account, _) = accounts
            .iter_mut()
            .find(|(a, _)| a.id == id)
            .ok_or_else(|| StoreError::not_found("funcionario", id))?;
        account.nome = fields.nome;
        account.email = fields.email;
        account.permissao = fields.permissao;
        Ok(account.clone())
    }

    async fn set_password_hash(&self, id: i64, senha_hash: String) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().expect("accounts");
        let (_, hash) = accounts
            .iter_mut()
            .find(|(a, _)| a.id == id)
            .ok_or_else(|| StoreError::not_found("funcionario", id))?;
        *hash = senha_hash;
        Ok(())
    }
}

/// Reversible "hash" so tests can assert what was stored.
#[derive(Debug, Default)]
pub struct FakeCredentialService;

impl FakeCredentialService {
    pub fn hash_of(plain: &str) -> String {
        format!("hashed:{plain}")
    }
}

#[async_trait]
impl CredentialService for FakeCredentialService {
    async fn hash(&self, plain: &str) -> Result<String, StoreError> {
        Ok(Self::hash_of(plain))
    }

    async fn verify(&self, plain: &str, hash: &str) -> Result<bool, StoreError> {
        Ok(Self::hash_of(plain) == hash)
    }
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Default)]
pub struct MemoryChatStore {
    messages: Mutex<Vec<ChatMessage>>,
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn list(&self, chamado_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = self.messages.lock().expect("messages");
        Ok(messages
            .iter()
            .filter(|m| m.chamado_id == chamado_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let mut messages = self.messages.lock().expect("messages");
        let stored = ChatMessage {
            id: messages.len() as i64 + 1,
            chamado_id: message.chamado_id,
            remetente_id: message.remetente_id,
            tipo_remetente: message.tipo_remetente,
            texto_mensagem: message.texto_mensagem,
            created_at: Utc::now(),
        };
        messages.push(stored.clone());
        Ok(stored)
    }
}

// ============================================================================
// Application harness
// ============================================================================

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "postgres://localhost/chamados_test".to_string();
    config.auth.jwt_secret = "test-secret".to_string();
    config.storage.public_base_url = "https://files.test/public".to_string();
    config
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub tickets: Arc<MemoryTicketStore>,
    pub technicians: Arc<MemoryTechnicianStore>,
    pub chat: Arc<MemoryChatStore>,
}

pub fn test_app() -> TestApp {
    test_app_with(test_config())
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let tickets = Arc::new(MemoryTicketStore::new());
    let technicians = Arc::new(MemoryTechnicianStore::default());
    let chat = Arc::new(MemoryChatStore::default());
    let backends = Backends {
        tickets: tickets.clone(),
        technicians: technicians.clone(),
        credentials: Arc::new(FakeCredentialService),
        chat: chat.clone(),
    };
    let state = AppState::new(config, backends, None).expect("test state");
    TestApp {
        state: Arc::new(state),
        tickets,
        technicians,
        chat,
    }
}

impl TestApp {
    pub fn router(&self) -> Router {
        crate::api_router::build_router(self.state.clone())
    }

    /// Creates an account whose password is still the default.
    pub async fn add_technician(&self, nome: &str, email: &str, permissao: Permission) -> TechnicianAccount {
        let fields = TechnicianFields::parse(nome, email, permissao).expect("valid fields");
        self.technicians
            .create(fields, FakeCredentialService::hash_of(DEFAULT_PASSWORD))
            .await
            .expect("technician created")
    }

    pub fn token_for(&self, account: &TechnicianAccount) -> String {
        self.state
            .session_keys
            .issue(&Session::for_account(account))
            .expect("token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
