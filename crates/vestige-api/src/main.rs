//! vestige API server.
//!
//! Wires the storage, crypto, inference, retrieval, and indexing layers into
//! an axum HTTP service. Identity arrives via the `x-vestige-user` header;
//! every query below this layer is scoped by it.

mod error;
mod handlers;
mod identity;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Request};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use vestige_core::{
    defaults, ArtifactRepository, ChunkRepository, PersonaRepository, SessionRepository,
};
use vestige_crypto::EnvelopeKey;
use vestige_db::blob_store::BlobStore;
use vestige_db::{
    Database, FilesystemBlobStore, PgArtifactRepository, PgChunkRepository, PgPersonaRepository,
    PgSessionRepository, SessionManager,
};
use vestige_inference::OpenAIBackend;
use vestige_jobs::{IndexArtifactHandler, IndexQueue, IndexWorker, IndexWorkerConfig};
use vestige_retrieval::RetrievalAssembler;

use crate::services::ConversationService;

/// Request id maker producing time-ordered UUIDs.
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub blobs: Arc<dyn BlobStore>,
    pub key: EnvelopeKey,
    pub sessions: Arc<SessionManager>,
    pub conversation: Arc<ConversationService>,
    pub index_queue: IndexQueue,
    pub internal_index_secret: Option<String>,
}

/// Initialize tracing from environment variables.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `RUST_LOG` | `vestige_api=debug,tower_http=debug` | Filter directives |
/// | `LOG_FORMAT` | `text` | `json` for structured output |
/// | `LOG_FILE` | unset | Path prefix for daily-rolling log files |
/// | `LOG_ANSI` | `true` | Disable with `false`/`0` for plain output |
///
/// Returns the non-blocking writer guard when logging to a file; it must
/// stay alive for the lifetime of the process.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vestige_api=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let ansi = std::env::var("LOG_ANSI")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true);

    match std::env::var("LOG_FILE").ok() {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            let prefix = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "vestige-api.log".to_string());

            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            if json {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(writer).with_ansi(false))
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .init();
            }
            Some(guard)
        }
        None => {
            if json {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_ansi(ansi))
                    .init();
            }
            None
        }
    }
}

/// Build the CORS layer from `ALLOWED_ORIGINS` (comma-separated).
fn build_cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(identity::USER_HEADER),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting vestige-api");

    // Database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/vestige".to_string());
    let db = Arc::new(Database::connect(&database_url).await?);
    db.migrate().await?;
    info!("Database migrations applied");

    // Blob storage
    let blob_root =
        std::env::var("BLOB_STORAGE_PATH").unwrap_or_else(|_| "./data/blobs".to_string());
    let blob_store = FilesystemBlobStore::new(&blob_root);
    blob_store
        .validate()
        .await
        .map_err(|e| anyhow::anyhow!("blob storage validation failed: {}", e))?;
    let blobs: Arc<dyn BlobStore> = Arc::new(blob_store);
    info!(path = %blob_root, "Blob storage ready");

    // Envelope key and model backend
    let key = EnvelopeKey::from_env()?;
    let backend = Arc::new(OpenAIBackend::from_env()?);

    // Repositories behind trait objects for the service layer
    let pool = db.pool.clone();
    let artifacts: Arc<dyn ArtifactRepository> = Arc::new(PgArtifactRepository::new(pool.clone()));
    let chunks: Arc<dyn ChunkRepository> = Arc::new(PgChunkRepository::new(pool.clone()));
    let personas: Arc<dyn PersonaRepository> = Arc::new(PgPersonaRepository::new(pool.clone()));
    let session_repo: Arc<dyn SessionRepository> = Arc::new(PgSessionRepository::new(pool));
    let sessions = Arc::new(SessionManager::new(session_repo, personas.clone()));

    // Index worker
    let indexer = Arc::new(IndexArtifactHandler::new(
        artifacts,
        chunks.clone(),
        blobs.clone(),
        backend.clone(),
        key.clone(),
    ));
    let (index_queue, worker_handle) =
        IndexWorker::new(indexer, IndexWorkerConfig::from_env()).start();

    // Conversation orchestration
    let assembler = Arc::new(RetrievalAssembler::new(backend.clone(), chunks));
    let conversation = Arc::new(ConversationService::new(
        sessions.clone(),
        personas,
        assembler,
        backend,
    ));

    let internal_index_secret = std::env::var("INTERNAL_INDEX_SECRET")
        .ok()
        .filter(|s| !s.is_empty());
    if internal_index_secret.is_none() {
        warn!("INTERNAL_INDEX_SECRET not set, /internal/index is disabled");
    }

    let state = AppState {
        db,
        blobs,
        key,
        sessions,
        conversation,
        index_queue,
        internal_index_secret,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/relationships",
            post(handlers::relationships::create).get(handlers::relationships::list),
        )
        .route(
            "/api/v1/persona",
            get(handlers::personas::get).post(handlers::personas::upsert),
        )
        .route("/api/v1/artifacts", post(handlers::artifacts::upload))
        .route(
            "/api/v1/artifacts/text",
            post(handlers::artifacts::upload_text),
        )
        .route(
            "/api/v1/artifacts/:id/download",
            get(handlers::artifacts::download),
        )
        .route(
            "/api/v1/sessions",
            post(handlers::sessions::start).delete(handlers::sessions::end),
        )
        .route("/api/v1/chat/stream", post(handlers::chat::stream))
        .route("/internal/index", post(handlers::index_trigger::trigger))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(build_cors_layer())
        .layer(axum::extract::DefaultBodyLimit::max(
            defaults::MAX_BODY_SIZE_BYTES,
        ))
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!(%addr, "vestige-api listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the in-flight indexing job finish before the process exits.
    if let Err(e) = worker_handle.shutdown().await {
        warn!(error_msg = %e, "Index worker did not stop cleanly");
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections"),
        Err(e) => warn!(error_msg = %e, "Failed to listen for shutdown signal"),
    }
}
