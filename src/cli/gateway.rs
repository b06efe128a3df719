//! Gateway command handler (webhook server + dispatcher).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use wagate::agent::{ConversationEngine, EngineConfig};
use wagate::bus::MessageBus;
use wagate::channels::{OutboundSender, WhatsAppCloudClient};
use wagate::config::Config;
use wagate::conversation::ConversationService;
use wagate::dispatcher::Dispatcher;
use wagate::gateway::{router, IdempotencyStore, IngestPipeline};
use wagate::providers::{GeminiDriver, ModelDriver, RetryDriver};
use wagate::store::ConversationStore;
use wagate::tools::catalog::{register_catalog_tools, ProductCatalog};
use wagate::tools::ToolRegistry;
use wagate::utils::logging::init_logging;

const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn build_tools(config: &Config) -> Result<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    if let Some(path) = config.catalog_path() {
        let catalog = ProductCatalog::load(&path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?;
        info!(path = %path.display(), products = catalog.len(), "Loaded product catalog");
        register_catalog_tools(&mut tools, Arc::new(catalog));
    } else {
        warn!("No tools.catalog_path configured; the model runs without tools");
    }
    Ok(tools)
}

fn build_driver(config: &Config) -> Result<Arc<dyn ModelDriver>> {
    let gemini = GeminiDriver::with_base_url(
        &config.model.api_key,
        &config.model.api_base,
        &config.model.model,
        Duration::from_secs(config.model.timeout_secs),
    )
    .with_context(|| "Failed to build model client")?;
    info!(
        model = gemini.default_model(),
        max_retries = config.model.max_retries,
        "Model backend ready"
    );
    Ok(Arc::new(
        RetryDriver::new(Box::new(gemini)).with_max_retries(config.model.max_retries),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Start the gateway and block until Ctrl+C.
pub(crate) async fn cmd_gateway(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    init_logging(&config.logging).with_context(|| "Failed to initialize logging")?;
    config.validate().with_context(|| "Invalid configuration")?;

    let store = ConversationStore::open(config.db_path())
        .with_context(|| format!("Failed to open database {}", config.db_path().display()))?;
    let client = Arc::new(
        WhatsAppCloudClient::from_config(&config)
            .with_context(|| "Failed to build WhatsApp client")?,
    );

    let engine = Arc::new(ConversationEngine::new(
        store.clone(),
        build_driver(&config)?,
        Arc::new(build_tools(&config)?),
        EngineConfig::from_config(&config),
    ));
    let service = Arc::new(ConversationService::new(
        engine,
        OutboundSender::new(client.clone(), store),
    ));

    let bus = Arc::new(MessageBus::new());
    let mut pipeline = IngestPipeline::new(Arc::clone(&bus), &config.whatsapp.verify_token)
        .with_media_source(client);
    if config.gateway.dedup_enabled {
        pipeline = pipeline.with_dedup(IdempotencyStore::new(
            Duration::from_secs(config.gateway.dedup_ttl_secs),
            config.gateway.dedup_max_entries,
        ));
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&bus),
        service,
        config.gateway.workers,
    ));
    let dispatcher_task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.start().await })
    };

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        addr = %addr,
        path = %config.gateway.path,
        workers = config.gateway.workers,
        dedup = config.gateway.dedup_enabled,
        "Webhook listening"
    );

    axum::serve(listener, router(Arc::new(pipeline), &config.gateway.path))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "Webhook server failed")?;

    bus.close();
    dispatcher.stop();
    match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "Dispatcher exited with an error"),
        Ok(Err(e)) => error!(error = %e, "Dispatcher task panicked"),
        Err(_) => warn!("Dispatcher did not stop in time"),
    }

    info!("Gateway stopped");
    Ok(())
}
