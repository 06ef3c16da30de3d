use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::core::middleware::AdminSession;
use crate::core::shared::enums::TicketStatus;
use crate::core::shared::state::AppState;
use crate::tickets::{Ticket, TicketFilter};

use crate::dashboards::error::DashboardsError;
use crate::dashboards::types::{
    DashboardQuery, DashboardReport, RankingEntry, RequesterRankingEntry, DEFAULT_PERIOD_DAYS,
    MAX_PERIOD_DAYS,
};

const UNINFORMED: &str = "Não informado";

pub async fn handle_get_dashboard(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardReport>, DashboardsError> {
    let dias = query.dias.unwrap_or(DEFAULT_PERIOD_DAYS);
    if !(1..=MAX_PERIOD_DAYS).contains(&dias) {
        return Err(DashboardsError::Validation(format!(
            "dias deve estar entre 1 e {MAX_PERIOD_DAYS}"
        )));
    }

    let desde = Utc::now() - Duration::days(dias);
    let tickets = state
        .tickets
        .store()
        .list(TicketFilter {
            created_since: Some(desde),
            ..Default::default()
        })
        .await?;

    debug!(
        "Dashboard for {} days requested by {} ({} tickets)",
        dias,
        session.funcionario_id,
        tickets.len()
    );
    Ok(Json(build_report(&tickets, dias, desde)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn ranking(counts: HashMap<String, usize>) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = counts
        .into_iter()
        .map(|(nome, total)| RankingEntry { nome, total })
        .collect();
    entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.nome.cmp(&b.nome)));
    entries
}

pub fn build_report(tickets: &[Ticket], dias: i64, desde: DateTime<Utc>) -> DashboardReport {
    let mut por_status: BTreeMap<String, usize> = TicketStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut technicians: HashMap<String, usize> = HashMap::new();
    let mut stores: HashMap<String, usize> = HashMap::new();
    let mut requesters: HashMap<(String, String), usize> = HashMap::new();

    for ticket in tickets {
        *por_status.entry(ticket.status.as_str().to_string()).or_default() += 1;

        if ticket.status == TicketStatus::Resolved {
            if let Some(nome) = non_empty(ticket.tecnico_responsavel.as_deref()) {
                *technicians.entry(nome.to_string()).or_default() += 1;
            }
        }
        if let Some(loja) = non_empty(ticket.loja.as_deref()) {
            *stores.entry(loja.to_string()).or_default() += 1;
        }
        if let Some(nome) = non_empty(ticket.nome_funcionario.as_deref()) {
            let departamento = non_empty(ticket.departamento.as_deref()).unwrap_or(UNINFORMED);
            *requesters
                .entry((nome.to_string(), departamento.to_string()))
                .or_default() += 1;
        }
    }

    let mut ranking_solicitantes: Vec<RequesterRankingEntry> = requesters
        .into_iter()
        .map(|((nome, departamento), total)| RequesterRankingEntry {
            nome,
            departamento,
            total,
        })
        .collect();
    ranking_solicitantes.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.nome.cmp(&b.nome)));

    DashboardReport {
        dias,
        desde,
        total_chamados: tickets.len(),
        por_status,
        ranking_tecnicos: ranking(technicians),
        ranking_lojas: ranking(stores),
        ranking_solicitantes,
    }
}
