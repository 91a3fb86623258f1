//! Host wiring: store, engine, registry, dispatchers, synchroniser.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use basalt_core::PluginConfig;
use basalt_cron::CronScheduler;
use basalt_dispatch::{make_cron_handler, DbDispatcher};
use basalt_engine::ScriptEngine;
use basalt_registry::TriggerRegistry;
use basalt_router::HostRouter;
use basalt_state::{CollectionOps, RecordHooks, RecordStore};
use basalt_sync::{Lifecycle, Synchronizer};
use tokio::sync::watch;
use tracing::info;

use crate::admin_api;

/// The assembled host, shared between the daemon and the tests.
pub struct Host {
    pub ops: CollectionOps,
    pub lifecycle: Lifecycle,
    pub router: Arc<HostRouter>,
    pub hooks: Arc<RecordHooks>,
}

/// Wire every subsystem around an opened store.
///
/// Order matters: the database dispatcher and the synchroniser must be
/// subscribed before any mutation traffic is accepted, the registry
/// must be populated from persistence before the scheduler starts, and
/// the router may show up whenever it likes.
pub fn build_host(store: RecordStore, config: PluginConfig) -> Host {
    let hooks = Arc::new(RecordHooks::new());
    let engine = Arc::new(ScriptEngine::new(store.clone(), config));

    let scheduler = Arc::new(CronScheduler::new());
    let registry = Arc::new(TriggerRegistry::new(
        scheduler,
        make_cron_handler(engine.clone()),
    ));

    DbDispatcher::new(registry.clone(), engine.clone()).install(&hooks);

    let sync = Synchronizer::new(store.clone(), registry, engine);
    let lifecycle = Lifecycle::new(sync);
    lifecycle.startup(&hooks);

    let router = Arc::new(HostRouter::new());
    lifecycle.router_available(router.clone());

    Host {
        ops: CollectionOps::new(store, hooks.clone()),
        lifecycle,
        router,
        hooks,
    }
}

/// Run the daemon until ctrl-c.
pub async fn run_serve(
    port: u16,
    admin_port: u16,
    data_dir: PathBuf,
    default_timeout_ms: u64,
) -> anyhow::Result<()> {
    info!("basalt daemon starting");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("basalt.redb");
    let store = RecordStore::open(&db_path)
        .map_err(|e| anyhow::anyhow!("failed to open record store: {e}"))?;
    info!(path = ?db_path, "record store opened");

    let config = PluginConfig {
        default_timeout_ms,
        ..PluginConfig::default()
    };
    let host = build_host(store, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Lambda router listener.
    let lambda_addr = SocketAddr::from(([0, 0, 0, 0], port));
    let lambda_listener = tokio::net::TcpListener::bind(lambda_addr).await?;
    let router_handle = tokio::spawn(
        host.router
            .clone()
            .serve(lambda_listener, shutdown_rx.clone()),
    );

    // Admin API listener.
    let admin_router = admin_api::build_router(host.ops.clone());
    let admin_addr = SocketAddr::from(([0, 0, 0, 0], admin_port));
    info!(%admin_addr, "admin API starting");
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;

    let server = axum::serve(admin_listener, admin_router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    host.lifecycle.shutdown();
    let _ = router_handle.await;

    info!("basalt daemon stopped");
    Ok(())
}
