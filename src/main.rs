//! Intervue HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use intervue::bank::QuestionBank;
use intervue::config::Config;
use intervue::gateway::{HandlerState, create_router_with_state};
use intervue::model::{GenaiModel, OfflineModel, QuestionModel};
use intervue::session::{Reaper, SessionOrchestrator};
use intervue::storage::{FsKvStore, KvStore, MemoryKvStore};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        "Intervue starting"
    );

    let store: Arc<dyn KvStore> = match &config.storage_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using file-backed store");
            Arc::new(FsKvStore::open(path.clone())?)
        }
        None => {
            tracing::warn!("No INTERVUE_STORAGE_PATH configured, sessions will not survive a restart");
            Arc::new(MemoryKvStore::new())
        }
    };

    let bank = match &config.question_bank_path {
        Some(path) => QuestionBank::from_path(path)?,
        None => QuestionBank::builtin()?,
    };
    tracing::info!(questions = bank.total_questions(), "Question bank loaded");

    let model: Arc<dyn QuestionModel> = match &config.model {
        Some(name) => Arc::new(GenaiModel::new(name.clone())),
        None => {
            tracing::warn!("No INTERVUE_MODEL configured, running fully offline");
            Arc::new(OfflineModel)
        }
    };

    let orchestrator = SessionOrchestrator::new(config.engine_config(), store, bank, model);

    tracing::info!("Hydrating semantic cache from storage...");
    match orchestrator.hydrate().await {
        Ok(count) => tracing::info!(entries = count, "Hydration complete."),
        Err(e) => tracing::warn!("Failed to hydrate semantic cache: {}. Starting empty.", e),
    }

    let reaper = Arc::new(Reaper::new(orchestrator.clone()));
    reaper.start();

    let state = HandlerState::new(orchestrator, config.storage_path.clone());
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(reaper))
        .await?;

    tracing::info!("Intervue shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("INTERVUE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal(reaper: Arc<Reaper>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    reaper.shutdown();
    tracing::info!("Reaper stopped.");
}
