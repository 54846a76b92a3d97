mod api;
mod audio;
mod backend;
mod config;
mod deploy;
mod error;
mod jobs;
mod karaoke;
mod lyrics;
mod projects;
mod sanitize;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::api::{build_router, AppState};
use crate::backend::build_backends;
use crate::config::AppConfig;
use crate::deploy::DeployNotifier;

/// Local karaoke workstation server.
///
/// Everything not listed here is configured through environment variables.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Interface to bind (overrides `HOST`).
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (overrides `PORT`).
    #[arg(long)]
    port: Option<u16>,
    /// Base directory for uploads, stems and static files.
    #[arg(long, env = "WORK_DIR", default_value = ".")]
    work_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "karaoke_stems_server=info,tower_http=info,axum=info".into()
            }),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let mut cfg = AppConfig::from_env_with_work_dir(&cli.work_dir)?;
    if let Some(host) = cli.host {
        cfg.host = host;
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }

    if cfg.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; /lyrics requests will fail");
    }

    let backends = build_backends(&cfg)?;
    let deploy = DeployNotifier::new(cfg.deploy_command.clone());
    let deploy_enabled = deploy.is_enabled();
    let state = Arc::new(AppState::new(cfg.clone(), backends, deploy));
    state.jobs.ensure_roots().await?;

    let app = build_router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        uploads = %cfg.upload_dir.display(),
        output = %cfg.output_dir.display(),
        model = %cfg.gemini_model,
        deploy = deploy_enabled,
        "starting karaoke-stems-server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
