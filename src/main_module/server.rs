use log::{error, info, warn};
use std::sync::Arc;

use crate::api_router::build_router;
use crate::core::config::AppConfig;
use crate::core::shared::state::{AppState, Backends};
use crate::core::shared::utils::{create_conn, run_migrations};
use crate::technicians::ensure_bootstrap_admin;

use super::shutdown_signal;

/// Connects to Postgres, applies pending migrations and serves the API until shutdown.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    if config.auth.uses_default_secret() {
        warn!("auth.jwt_secret is the built-in default; set CHAMADOS_AUTH__JWT_SECRET");
    }

    let pool = create_conn(&config.database)?;
    info!("Database pool ready (max {} connections)", config.database.pool_size);

    let migration_pool = pool.clone();
    tokio::task::spawn_blocking(move || run_migrations(&migration_pool))
        .await?
        .map_err(|e| anyhow::anyhow!(e))?;
    info!("Database migrations applied");

    let addr = config.bind_address();
    let backends = Backends::postgres(&pool);
    let state = Arc::new(AppState::new(config, backends, Some(pool))?);
    if let Some(email) = &state.config.auth.bootstrap_admin_email {
        ensure_bootstrap_admin(
            state.technicians.as_ref(),
            state.credentials.as_ref(),
            &state.config.auth.bootstrap_admin_name,
            email,
        )
        .await?;
    }
    if let Some(webhook) = &state.webhook {
        info!("Chat automation webhook: {}", webhook.url());
    } else {
        info!("No chat webhook configured, messages are stored directly");
    }

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e.into());
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}
