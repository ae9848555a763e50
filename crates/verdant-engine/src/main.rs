//! Verdant engine host - loads configuration, wires sinks, and idles until
//! shutdown. Transports attach through the library API.

use std::sync::Arc;

use verdant_common::SystemClock;
use verdant_engine::{init_tracing, EngineConfig, EventDispatcher, LendingEngine, TracingSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Verdant engine...");

    let config_path = std::env::var("VERDANT_CONFIG").ok();
    let config = EngineConfig::load(config_path.as_deref())?;

    let boot = LendingEngine::bootstrap(config, Arc::new(SystemClock))?;
    let registry = prometheus::Registry::new();
    boot.engine.metrics().register(&registry)?;

    let dispatcher = EventDispatcher::new().with_sink(Arc::new(TracingSink));
    let dispatch_task = dispatcher.spawn(boot.events);

    // printed once; only its digest is retained
    println!("admin token: {}", boot.admin_token.expose_secret());
    tracing::info!("Verdant engine started successfully");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    drop(boot.engine);
    dispatch_task.await?;
    Ok(())
}
