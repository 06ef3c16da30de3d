pub mod attachments;
pub mod controller;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod queue;
pub mod storage;
pub mod types;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::core::middleware::Session;
use crate::core::shared::enums::{AttachmentKind, TicketStatus};
use crate::core::shared::state::AppState;

pub use controller::{TicketService, TransitionResult};
pub use error::TicketsError;
pub use lifecycle::{Outcome, Transition};
pub use storage::{PgTicketStore, TicketStore};
pub use types::{
    Attachment, HistoryEntry, NewAttachment, NewTicket, SortOrder, Ticket, TicketFilter,
};

use attachments::AttachmentView;
use history::TimelineEntry;
use queue::QueueItem;

const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_PAGE_SIZE: i64 = 500;
/// Upper bound for the `dias` list filter (ten years).
const MAX_LIST_PERIOD_DAYS: i64 = 3650;

#[derive(Debug, Default, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<TicketStatus>,
    pub tecnico: Option<i64>,
    pub loja: Option<String>,
    /// Only tickets created in the last `dias` days.
    pub dias: Option<i64>,
    /// First calendar day included (UTC).
    pub desde: Option<NaiveDate>,
    /// Last calendar day included (UTC).
    pub ate: Option<NaiveDate>,
    pub busca: Option<String>,
    pub ordem: Option<SortOrder>,
    pub limite: Option<i64>,
    pub offset: Option<i64>,
}

impl ListTicketsQuery {
    fn into_filter(self) -> Result<TicketFilter, TicketsError> {
        let now = Utc::now();
        let mut created_since = match self.dias {
            None => None,
            Some(d) if (1..=MAX_LIST_PERIOD_DAYS).contains(&d) => Some(now - Duration::days(d)),
            Some(_) => {
                return Err(TicketsError::Validation(format!(
                    "dias deve estar entre 1 e {MAX_LIST_PERIOD_DAYS}"
                )))
            }
        };
        if let Some(desde) = self.desde {
            let start = desde.and_time(NaiveTime::MIN).and_utc();
            created_since = Some(created_since.map_or(start, |since| since.max(start)));
        }
        let created_before = match self.ate {
            Some(ate) => Some(
                ate.succ_opt()
                    .ok_or_else(|| TicketsError::Validation("ate fora do intervalo".into()))?
                    .and_time(NaiveTime::MIN)
                    .and_utc(),
            ),
            None => None,
        };
        if let (Some(desde), Some(ate)) = (self.desde, self.ate) {
            if desde > ate {
                return Err(TicketsError::Validation(
                    "desde deve ser anterior ou igual a ate".into(),
                ));
            }
        }

        Ok(TicketFilter {
            status: self.status,
            assigned_to: self.tecnico,
            loja: self
                .loja
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            created_since,
            created_before,
            search: self.busca.filter(|b| !b.trim().is_empty()),
            order: self.ordem.unwrap_or_default(),
            limit: Some(
                self.limite
                    .unwrap_or(DEFAULT_PAGE_SIZE)
                    .clamp(1, MAX_PAGE_SIZE),
            ),
            offset: self.offset.filter(|o| *o > 0),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimTicketRequest {
    #[serde(default)]
    pub tecnico_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FinishTicketRequest {
    pub status: Outcome,
    #[serde(default)]
    pub solucao_aplicada: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferTicketRequest {
    #[serde(default)]
    pub novo_tecnico_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ObservationRequest {
    #[serde(default)]
    pub texto: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub ordem: Option<SortOrder>,
}

#[derive(Debug, Deserialize)]
pub struct AddAttachmentRequest {
    pub file_path: String,
    pub tipo: AttachmentKind,
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<Ticket>>, TicketsError> {
    let tickets = state.tickets.store().list(query.into_filter()?).await?;
    Ok(Json(tickets))
}

pub async fn list_stores(
    State(state): State<Arc<AppState>>,
    _session: Session,
) -> Result<Json<Vec<String>>, TicketsError> {
    Ok(Json(state.tickets.store().stores().await?))
}

pub async fn open_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), TicketsError> {
    let ticket = state.tickets.open(req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    _session: Session,
) -> Result<Json<Vec<QueueItem>>, TicketsError> {
    let items = queue::load_queue(state.tickets.store().as_ref(), Utc::now()).await?;
    Ok(Json(items))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, TicketsError> {
    Ok(Json(state.tickets.get(id).await?))
}

pub async fn claim_ticket(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i64>,
    body: Option<Json<ClaimTicketRequest>>,
) -> Result<Json<TransitionResult>, TicketsError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let result = state.tickets.claim(&session, id, req.tecnico_id).await?;
    Ok(Json(result))
}

pub async fn finish_ticket(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<FinishTicketRequest>,
) -> Result<Json<TransitionResult>, TicketsError> {
    let result = state
        .tickets
        .finish(&session, id, req.status, req.solucao_aplicada)
        .await?;
    Ok(Json(result))
}

pub async fn transfer_ticket(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<TransferTicketRequest>,
) -> Result<Json<TransitionResult>, TicketsError> {
    let result = state
        .tickets
        .transfer(&session, id, req.novo_tecnico_id)
        .await?;
    Ok(Json(result))
}

pub async fn add_observation(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<ObservationRequest>,
) -> Result<(StatusCode, Json<TransitionResult>), TicketsError> {
    let result = state.tickets.observe(&session, id, req.texto).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TimelineEntry>>, TicketsError> {
    state.tickets.get(id).await?;
    let entries = state
        .tickets
        .store()
        .history(id, query.ordem.unwrap_or_default())
        .await?;
    let now = Utc::now();
    Ok(Json(
        entries
            .into_iter()
            .map(|entry| TimelineEntry::render(entry, now))
            .collect(),
    ))
}

pub async fn list_attachments(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AttachmentView>>, TicketsError> {
    state.tickets.get(id).await?;
    let base = &state.config.storage.public_base_url;
    let attachments = state.tickets.store().attachments(id).await?;
    Ok(Json(
        attachments
            .into_iter()
            .map(|anexo| AttachmentView::new(anexo, base))
            .collect(),
    ))
}

pub async fn add_attachment(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<i64>,
    Json(req): Json<AddAttachmentRequest>,
) -> Result<(StatusCode, Json<AttachmentView>), TicketsError> {
    let created = state
        .tickets
        .add_attachment(NewAttachment {
            id_chamado: id,
            file_path: req.file_path,
            tipo: req.tipo,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AttachmentView::new(
            created,
            &state.config.storage.public_base_url,
        )),
    ))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chamados", get(list_tickets).post(open_ticket))
        .route("/api/chamados/fila", get(get_queue))
        .route("/api/chamados/lojas", get(list_stores))
        .route("/api/chamados/:id", get(get_ticket))
        .route("/api/chamados/:id/assumir", post(claim_ticket))
        .route("/api/chamados/:id/encerrar", post(finish_ticket))
        .route("/api/chamados/:id/transferir", post(transfer_ticket))
        .route("/api/chamados/:id/observacoes", post(add_observation))
        .route("/api/chamados/:id/historico", get(get_history))
        .route(
            "/api/chamados/:id/anexos",
            get(list_attachments).post(add_attachment),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::Permission;
    use crate::core::shared::test_utils::{sample_ticket, test_app};
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_ticket_without_session() {
        let app = test_app();
        let (status, body) = app
            .request(
                Method::POST,
                "/api/chamados",
                None,
                Some(json!({"nome_funcionario": "Paula", "loja": "Loja 9"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "aberto");
        assert!(body["descricao_problema"].is_null());
    }

    #[tokio::test]
    async fn test_technician_routes_require_session() {
        let app = test_app();
        let (status, body) = app.request(Method::GET, "/api/chamados/fila", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_queue_lists_open_tickets_oldest_first() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        let now = Utc::now();
        for (id, minutes_ago, status) in [
            (1, 5, TicketStatus::Open),
            (2, 30, TicketStatus::Open),
            (3, 60, TicketStatus::InService),
            (4, 10, TicketStatus::Open),
        ] {
            let mut t = sample_ticket(id, status);
            t.created_at = now - Duration::minutes(minutes_ago);
            app.tickets.seed(t);
        }
        app.state
            .tickets
            .add_attachment(NewAttachment {
                id_chamado: 2,
                file_path: "chamados/2/tela.png".into(),
                tipo: AttachmentKind::Imagem,
            })
            .await
            .unwrap();

        let (status, body) = app
            .request(Method::GET, "/api/chamados/fila", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        let ids: Vec<i64> = items
            .iter()
            .map(|i| i["id_chamado"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 4, 1]);
        assert!(items.iter().all(|i| i["status"] == "aberto"));
        assert_eq!(items[0]["total_anexos"], 1);
        assert_eq!(items[0]["total_imagens"], 1);
        assert!(items[0]["espera_segundos"].as_i64().unwrap() >= 30 * 60);
    }

    #[tokio::test]
    async fn test_claim_then_finish_flow() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        app.tickets.seed(sample_ticket(7, TicketStatus::Open));

        let (status, body) = app
            .request(Method::POST, "/api/chamados/7/assumir", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chamado"]["status"], "em_atendimento");
        assert_eq!(body["chamado"]["assigned_func_ti_id"], ana.id);
        assert_eq!(body["historico"]["message"], "Atendimento iniciado por Ana");

        let (status, body) = app
            .request(
                Method::POST,
                "/api/chamados/7/encerrar",
                Some(&token),
                Some(json!({"status": "resolvido", "solucao_aplicada": "  "})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(app.tickets.history_of(7).len(), 1);

        let (status, body) = app
            .request(
                Method::POST,
                "/api/chamados/7/encerrar",
                Some(&token),
                Some(json!({"status": "resolvido", "solucao_aplicada": "Cabo trocado"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chamado"]["status"], "resolvido");
        assert_eq!(body["chamado"]["solucao_aplicada"], "Cabo trocado");

        let (status, _) = app
            .request(Method::POST, "/api/chamados/7/assumir", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(app.tickets.history_of(7).len(), 2);
    }

    #[tokio::test]
    async fn test_finish_rejects_non_terminal_target() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        app.tickets.seed(sample_ticket(8, TicketStatus::InService));

        let (status, _) = app
            .request(
                Method::POST,
                "/api/chamados/8/encerrar",
                Some(&token),
                Some(json!({"status": "aberto", "solucao_aplicada": "x"})),
            )
            .await;
        assert!(status.is_client_error());
        assert_eq!(app.tickets.ticket(8).unwrap().status, TicketStatus::InService);
    }

    #[tokio::test]
    async fn test_transfer_endpoint() {
        let app = test_app();
        let a = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let b = app.add_technician("Bruno", "bruno@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&a);
        let mut t = sample_ticket(9, TicketStatus::InService);
        t.assigned_func_ti_id = Some(a.id);
        t.tecnico_responsavel = Some("Ana".into());
        app.tickets.seed(t);

        let (status, _) = app
            .request(
                Method::POST,
                "/api/chamados/9/transferir",
                Some(&token),
                Some(json!({})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .request(
                Method::POST,
                "/api/chamados/9/transferir",
                Some(&token),
                Some(json!({"novo_tecnico_id": b.id})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chamado"]["tecnico_responsavel"], "Bruno");
        assert_eq!(body["historico"]["actor"], "Sistema");
    }

    #[tokio::test]
    async fn test_history_order_and_rendering() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        app.tickets.seed(sample_ticket(20, TicketStatus::Open));
        for texto in ["primeira", "segunda"] {
            let (status, _) = app
                .request(
                    Method::POST,
                    "/api/chamados/20/observacoes",
                    Some(&token),
                    Some(json!({ "texto": texto })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = app
            .request(Method::GET, "/api/chamados/20/historico", Some(&token), None)
            .await;
        let messages: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, vec!["segunda", "primeira"]);
        assert_eq!(body[0]["relativo"], "agora mesmo");
        assert_eq!(body[0]["actor_label"], "Ana");

        let (_, body) = app
            .request(
                Method::GET,
                "/api/chamados/20/historico?ordem=asc",
                Some(&token),
                None,
            )
            .await;
        assert_eq!(body[0]["message"], "primeira");
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_404() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        let (status, _) = app
            .request(Method::GET, "/api/chamados/404/historico", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_attachments_resolve_public_urls() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        app.tickets.seed(sample_ticket(30, TicketStatus::Open));

        let (status, body) = app
            .request(
                Method::POST,
                "/api/chamados/30/anexos",
                Some(&token),
                Some(json!({"file_path": "/chamados/30/nota fiscal.pdf", "tipo": "documento"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body["public_url"],
            "https://files.test/public/chamados/30/nota%20fiscal.pdf"
        );

        let (status, _) = app
            .request(
                Method::POST,
                "/api/chamados/30/anexos",
                Some(&token),
                Some(json!({"file_path": "x.bin", "tipo": "video"})),
            )
            .await;
        assert!(status.is_client_error());

        let (_, body) = app
            .request(Method::GET, "/api/chamados/30/anexos", Some(&token), None)
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["tipo"], "documento");
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        app.tickets.seed(sample_ticket(1, TicketStatus::Open));
        app.tickets.seed(sample_ticket(2, TicketStatus::Resolved));

        let (status, body) = app
            .request(
                Method::GET,
                "/api/chamados?status=resolvido",
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id_chamado"], 2);

        let (status, _) = app
            .request(Method::GET, "/api/chamados?status=pendente", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_rejects_out_of_range_period() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        app.tickets.seed(sample_ticket(1, TicketStatus::Open));

        for uri in [
            "/api/chamados?dias=0",
            "/api/chamados?dias=100000000",
            "/api/chamados?dias=200000000000",
            "/api/chamados?desde=2025-03-10&ate=2025-03-01",
        ] {
            let (status, body) = app.request(Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string());
        }

        let (status, body) = app
            .request(Method::GET, "/api/chamados?dias=3650", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_store_period_and_id() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);

        let mut norte = sample_ticket(7, TicketStatus::Open);
        norte.loja = Some("Loja Norte".into());
        norte.created_at = "2025-03-05T15:00:00Z".parse().unwrap();
        app.tickets.seed(norte);
        let mut centro = sample_ticket(8, TicketStatus::Open);
        centro.created_at = "2025-03-20T09:00:00Z".parse().unwrap();
        app.tickets.seed(centro);

        let (status, body) = app
            .request(Method::GET, "/api/chamados?loja=Loja%20Norte", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id_chamado"], 7);

        let (_, body) = app
            .request(
                Method::GET,
                "/api/chamados?desde=2025-03-01&ate=2025-03-05",
                Some(&token),
                None,
            )
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id_chamado"], 7);

        let (_, body) = app
            .request(Method::GET, "/api/chamados?busca=%208%20", Some(&token), None)
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id_chamado"], 8);
    }

    #[tokio::test]
    async fn test_store_list_is_distinct_and_sorted() {
        let app = test_app();
        let ana = app.add_technician("Ana", "ana@empresa.com", Permission::Padrao).await;
        let token = app.token_for(&ana);
        for (id, loja) in [(1, Some("Loja Sul")), (2, Some("Loja Centro")), (3, Some("Loja Sul")), (4, None)] {
            let mut ticket = sample_ticket(id, TicketStatus::Open);
            ticket.loja = loja.map(Into::into);
            app.tickets.seed(ticket);
        }

        let (status, _) = app.request(Method::GET, "/api/chamados/lojas", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .request(Method::GET, "/api/chamados/lojas", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["Loja Centro", "Loja Sul"]));
    }
}
