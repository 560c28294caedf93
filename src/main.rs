use config::Config;
use db::SqliteConnector;
use http::{router, AppState};
use std::error::Error;
use sync::{control_mailbox, Importer};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

mod config;
mod db;
mod http;
mod sync;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // ensure cache dir exists
    std::fs::create_dir_all(config.cache_dir()).map_err(|e| {
        format!(
            "Failed to create cache directory '{}': {}",
            config.cache_dir().display(),
            e
        )
    })?;

    let connector = SqliteConnector::from_url(&config.database_url)?;
    connector.migrate().await?;

    let importer = Importer::for_location(
        &config.scenes_url,
        config.scenes_gzip,
        config.cache_dir(),
        connector,
    );
    let status = importer.status_handle();
    let (control, mailbox) = control_mailbox();

    info!(
        "Starting scene list ingest loop for {} (gzip: {})",
        config.scenes_url, config.scenes_gzip
    );
    let job = tokio::spawn(importer.schedule(mailbox, config.cadence));

    let app = router(AppState {
        control: control.clone(),
        status,
        status_timeout: config.status_timeout,
    });

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // stop any run in progress, then close the mailbox so the loop exits
    if control.abort().is_err() {
        warn!("Ingest loop already stopped");
    }
    drop(control);
    job.await?;
    info!("Ingest loop stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
