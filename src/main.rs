use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use armenie_console::config::{Cli, Config};
use armenie_console::db::Repository;
use armenie_console::importer::Importer;
use armenie_console::routes;
use armenie_console::state::AppState;
use armenie_console::tasks::{self, SCHEDULER_PERIOD};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    let repo = Arc::new(Repository::new(&config.db_path.to_string_lossy()).await?);
    let importer = Arc::new(Importer::new(repo.clone(), config.clone())?);
    let state = AppState::new(repo.clone(), config.clone(), importer.clone());

    // Background tasks share a watch channel so a single signal stops both.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(tasks::scheduler_loop(
        repo.clone(),
        SCHEDULER_PERIOD,
        shutdown_rx.clone(),
    ));
    let auto_import = tokio::spawn(tasks::auto_import_loop(
        importer,
        repo,
        config.clone(),
        state.last_report.clone(),
        shutdown_rx,
    ));

    let app = routes::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("{} listening on http://{}", armenie_console::config::APP_NAME, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = scheduler.await;
    let _ = auto_import.await;

    Ok(())
}
