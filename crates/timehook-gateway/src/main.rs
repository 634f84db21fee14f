use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod app;
mod http;

/// HTTP front end for the one-shot notification scheduler.
#[derive(Debug, Parser)]
#[command(name = "timehook-gateway", version, about)]
struct Cli {
    /// Listen port (overrides gateway.port).
    #[arg(long)]
    port: Option<u16>,

    /// Path to timehook.toml. Falls back to $TIMEHOOK_CONFIG, then
    /// ~/.timehook/timehook.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "timehook_gateway=info,timehook_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    // load config: --config > TIMEHOOK_CONFIG env > ~/.timehook/timehook.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("TIMEHOOK_CONFIG").ok());
    let mut config = timehook_core::TimehookConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            timehook_core::TimehookConfig::default()
        });
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let tasks = Arc::new(timehook_scheduler::TaskManager::new(&config.scheduler)?);
    info!(
        utc_offset_hours = config.scheduler.utc_offset_hours,
        notify_timeout_secs = config.scheduler.notify_timeout_secs,
        "task manager ready"
    );

    // control loop runs until stop() below
    let runner = Arc::clone(&tasks);
    let control = tokio::spawn(async move { runner.start().await });

    let state = Arc::new(app::AppState::new(config, Arc::clone(&tasks)));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("timehook gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.stop();
    if let Err(e) = control.await {
        tracing::warn!("task manager control loop ended abnormally: {e}");
    }
    Ok(())
}

/// Resolve on Ctrl-C. If the handler cannot be installed, never resolve so
/// the server keeps running rather than exiting immediately.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    }
}
