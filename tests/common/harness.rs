//! Test server harness.

use intervue::bank::QuestionBank;
use intervue::gateway::{HandlerState, create_router_with_state};
use intervue::model::{QuestionModel, ScriptedModel};
use intervue::session::{EngineConfig, SessionOrchestrator};
use intervue::storage::FsKvStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

#[derive(Clone)]
pub struct TestServerConfig {
    pub storage_path: Option<PathBuf>,
    pub engine: EngineConfig,
    pub model: Arc<ScriptedModel>,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            engine: EngineConfig::default(),
            model: Arc::new(ScriptedModel::new()),
        }
    }
}

impl TestServerConfig {
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_model(mut self, model: Arc<ScriptedModel>) -> Self {
        self.model = model;
        self
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub orchestrator: SessionOrchestrator,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _temp_dir: Option<TempDir>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Server startup failed: {0}")]
    StartupFailed(String),
}

/// Spawns a server on an ephemeral port backed by a file store and a scripted model.
///
/// Without an explicit `storage_path` the store lives in a temp dir owned by the
/// returned [`TestServer`]. Pass a path to share one store across several servers
/// (restart scenarios).
pub async fn spawn_test_server(config: TestServerConfig) -> Result<TestServer, ServerStartupError> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let local_addr = listener.local_addr()?;

    let (storage_path, _temp_dir) = if let Some(path) = config.storage_path {
        (path, None)
    } else {
        let temp_dir =
            TempDir::new().map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
        (temp_dir.path().to_path_buf(), Some(temp_dir))
    };

    let store = FsKvStore::open(storage_path.clone())
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    let bank =
        QuestionBank::builtin().map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;

    let orchestrator = SessionOrchestrator::new(
        config.engine,
        Arc::new(store),
        bank,
        config.model as Arc<dyn QuestionModel>,
    );
    orchestrator
        .hydrate()
        .await
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;

    let state = HandlerState::new(orchestrator.clone(), Some(storage_path));
    let app = create_router_with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    wait_for_server_ready(
        local_addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr: local_addr,
        orchestrator,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
        _temp_dir,
    })
}
