use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PERIOD_DAYS: i64 = 30;
pub const MAX_PERIOD_DAYS: i64 = 365;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub dias: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    pub nome: String,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequesterRankingEntry {
    pub nome: String,
    pub departamento: String,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub dias: i64,
    pub desde: DateTime<Utc>,
    pub total_chamados: usize,
    /// Every status appears, with zero when absent.
    pub por_status: BTreeMap<String, usize>,
    pub ranking_tecnicos: Vec<RankingEntry>,
    pub ranking_lojas: Vec<RankingEntry>,
    pub ranking_solicitantes: Vec<RequesterRankingEntry>,
}
