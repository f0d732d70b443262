use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tagindex::{Library, SharedUploader, UploadCache};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::platform::{default_reveal, SharedReveal};
use crate::upload::uploader_for;

pub mod api;
pub mod error;
pub mod media;
pub mod socket;

pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    state: Arc<ServerState>,
}

impl Server {
    /// Opens the library and upload table described by `config` and starts serving.
    pub async fn from_config(config: &Config) -> Result<Self, String> {
        let root = config.search_folder.clone();
        let capacity = config.query_cache_capacity;
        let library = tokio::task::spawn_blocking(move || Library::open(root, capacity))
            .await
            .map_err(|error| format!("library scan failed: {error}"))?
            .map_err(|error| format!("failed to open library: {error}"))?;
        let uploads = UploadCache::open(&config.upload_table)
            .await
            .map_err(|error| format!("failed to open upload table: {error}"))?
            .with_hash_memo(library.hashes());
        let uploader = uploader_for(&config.upload_backend, config.upload_timeout)
            .map_err(|error| error.to_string())?;
        tracing::info!(
            root = %config.search_folder.display(),
            backend = %config.upload_backend,
            "library opened"
        );

        let state = ServerState {
            library: Arc::new(library),
            uploads: Arc::new(uploads),
            uploader,
            upload_timeout: config.upload_timeout,
            reveal: default_reveal(),
            static_dir: config.static_dir.clone(),
        };
        Self::start(state, config.bind).await
    }

    /// Serves `state` on `bind`; port 0 picks a free port.
    pub async fn start(state: ServerState, bind: SocketAddr) -> Result<Self, String> {
        let state = Arc::new(state);
        let app = router(state.clone());
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|error| error.to_string())?;
        let addr = listener
            .local_addr()
            .map_err(|error| error.to_string())?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        tracing::info!(%addr, "server listening");

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
            state,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&mut self) -> Result<(), String> {
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .map_err(|_| "failed to send server shutdown signal".to_string())
        } else {
            Ok(())
        }
    }

    pub fn library(&self) -> &Library {
        &self.state.library
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/health", get(health))
        .route("/api/search", get(api::search))
        .route("/api/tags", get(api::tags))
        .route("/api/rename", post(api::rename))
        .route("/api/delete", post(api::delete))
        .route("/api/open", post(api::open))
        .route("/api/upload", post(api::upload))
        .route("/api/catbox", post(api::upload))
        .route("/ws", get(socket::ws_handler))
        .route("/random/redirect/", get(media::missing_tag))
        .route("/random/redirect/:tag", get(media::random_redirect))
        .route("/random/inline/", get(media::missing_tag))
        .route("/random/inline/:tag", get(media::random_inline))
        .nest_service("/media", media::media_service(state.library.root()))
        .nest_service("/static", static_files.clone())
        .fallback_service(static_files)
        .with_state(state)
        .layer(cors)
}

async fn health() -> &'static str {
    "ok"
}

/// Everything a request handler can reach.
pub struct ServerState {
    pub(crate) library: Arc<Library>,
    pub(crate) uploads: Arc<UploadCache>,
    pub(crate) uploader: SharedUploader,
    pub(crate) upload_timeout: Duration,
    pub(crate) reveal: SharedReveal,
    pub(crate) static_dir: PathBuf,
}

impl ServerState {
    pub fn new(
        library: Arc<Library>,
        uploads: Arc<UploadCache>,
        uploader: SharedUploader,
        upload_timeout: Duration,
        reveal: SharedReveal,
        static_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            library,
            uploads,
            uploader,
            upload_timeout,
            reveal,
            static_dir: static_dir.as_ref().to_path_buf(),
        }
    }
}
