// src/cli/serve.rs — `redraft serve`: run the HTTP API

use std::sync::Arc;

use crate::api::{self, AppState};
use crate::infra::config::Config;
use crate::memory::MemoryManager;

pub async fn run_serve(
    config: &Config,
    host: Option<String>,
    port: Option<u16>,
    no_store: bool,
) -> anyhow::Result<()> {
    let engine = Arc::new(super::build_engine(config)?);

    let store = if no_store {
        None
    } else {
        let db_path = config.store.db_path();
        tracing::info!("Using request store at {}", db_path.display());
        let (handle, _join) = MemoryManager::open(&db_path)?.spawn_server();
        Some(handle)
    };

    if config.api.token.is_none() {
        tracing::warn!("No API token configured; /api/v1 routes are open");
    }

    let state = AppState {
        engine,
        store,
        token: config.api.token.clone(),
    };

    let host = host.unwrap_or_else(|| config.api.host.clone());
    let port = port.unwrap_or(config.api.port);
    eprintln!("redraft API listening on http://{host}:{port}");
    api::start_server(&host, port, state).await
}
