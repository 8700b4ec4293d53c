//! Serves the agent API over HTTP.

#[macro_use]
extern crate tracing;

use std::sync::Arc;

use agent_router::ServiceBuilder;
use agent_router::config::AppConfig;
use agent_router::kb::JsonKnowledgeBase;
use agent_router::server::router;
use agent_router::storage::open_store;
use agent_router_openai_model::OpenAIProvider;
use anyhow::Context as _;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    debug!("configuration: {config:?}");

    let store = open_store(&config.storage)
        .await
        .context("cannot open the record store")?;
    let kb = JsonKnowledgeBase::new(&config.kb_path);
    match kb.entries() {
        Ok(entries) => {
            info!("loaded {} entries from {}", entries.len(), kb.path().display())
        }
        // Searches fail until the file is fixed, the rest keeps working.
        Err(err) => {
            warn!("knowledge base {} unavailable: {err}", kb.path().display())
        }
    }

    let service = ServiceBuilder::with_model_provider(OpenAIProvider::new(
        config.openai.clone(),
    ))
    .with_store(store)
    .with_search_index(Arc::new(kb))
    .with_config(config.orchestrator.clone())
    .with_tool_timeout(config.tool_timeout)
    .build()
    .context("cannot assemble the tool registry")?;

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("cannot listen for ctrl-c: {err}");
        // Never resolve, so the server keeps running.
        std::future::pending::<()>().await;
    }
}
