//! Realtime change notifications
//!
//! Every committed write is published on a [`ChangeFeed`]. Clients subscribe per table with
//! an optional `column=eq.value` filter over SSE and receive `invalidate` signals (never the
//! row itself) so they re-fetch, plus a periodic `refresh` tick as a polling fallback.

pub mod feed;
pub mod filter;

use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::core::middleware::Session;
use crate::core::shared::state::AppState;

pub use feed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use filter::{ChannelFilter, FilterError};

pub const TICKETS_TABLE: &str = "chamados_ti";
pub const HISTORY_TABLE: &str = "chamados_ti_historico";
pub const ATTACHMENTS_TABLE: &str = "chamados_ti_anexos";
pub const TECHNICIANS_TABLE: &str = "funcionarios_ti";
pub const MESSAGES_TABLE: &str = "mensagens_chat";

const SUBSCRIBABLE_TABLES: &[&str] = &[
    TICKETS_TABLE,
    HISTORY_TABLE,
    ATTACHMENTS_TABLE,
    TECHNICIANS_TABLE,
    MESSAGES_TABLE,
];

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::UnknownTable(_) => StatusCode::NOT_FOUND,
            Self::Filter(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// What a subscriber is told.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeSignal {
    /// A matching row changed; `event` is absent when changes were dropped for lag.
    Invalidate {
        table: String,
        event: Option<ChangeKind>,
    },
    Refresh { table: String },
}

impl RealtimeSignal {
    pub fn to_sse_event(&self) -> Result<Event, serde_json::Error> {
        let event_type = match self {
            Self::Invalidate { .. } => "invalidate",
            Self::Refresh { .. } => "refresh",
        };
        let data = serde_json::to_string(self)?;
        Ok(Event::default().event(event_type).data(data))
    }
}

/// Maps one feed item to the signal a `table`/`filter` subscriber should see, if any.
pub fn signal_for(
    item: Result<ChangeEvent, BroadcastStreamRecvError>,
    table: &str,
    filter: Option<&ChannelFilter>,
) -> Option<RealtimeSignal> {
    match item {
        Ok(event) => {
            if event.table != table || !filter.map_or(true, |f| f.matches(&event)) {
                return None;
            }
            Some(RealtimeSignal::Invalidate {
                table: event.table,
                event: Some(event.event),
            })
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Realtime subscriber on {} lagged by {} events", table, skipped);
            Some(RealtimeSignal::Invalidate {
                table: table.to_string(),
                event: None,
            })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    pub filter: Option<String>,
}

pub async fn subscribe_changes(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(table): Path<String>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RealtimeError> {
    if !SUBSCRIBABLE_TABLES.contains(&table.as_str()) {
        return Err(RealtimeError::UnknownTable(table));
    }
    let filter = query
        .filter
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(ChannelFilter::parse)
        .transpose()?;

    debug!(
        "Technician {} subscribed to {} (filter {:?})",
        session.funcionario_id, table, filter
    );

    let change_table = table.clone();
    let changes = BroadcastStream::new(state.feed.subscribe()).filter_map(move |item| {
        signal_for(item, &change_table, filter.as_ref()).and_then(|s| s.to_sse_event().ok())
    });

    let period = state.config.realtime.poll_interval();
    let ticks = IntervalStream::new(tokio::time::interval_at(
        tokio::time::Instant::now() + period,
        period,
    ))
    .filter_map(move |_| {
        RealtimeSignal::Refresh {
            table: table.clone(),
        }
        .to_sse_event()
        .ok()
    });

    let stream = changes.merge(ticks).map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

pub fn configure_realtime_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/realtime/:table", get(subscribe_changes))
}
