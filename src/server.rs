//! JSON HTTP API.
//!
//! Exposes ingestion, question answering and the session history of a
//! single shared session.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/documents` | Processed document ids |
//! | `POST` | `/documents/{filename}` | Upload and ingest a PDF (raw body) |
//! | `POST` | `/ask` | Answer `{"document", "question"}` |
//! | `GET`  | `/history` | Session history and current selection |
//! | `POST` | `/history/{index}/select` | Select a history entry for display |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no index found for document 'x'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `unprocessable` (422), `upstream` (502), `timeout` (504), `internal` (500).
//!
//! Ingestion runs one upload at a time, and questions are serialised through
//! the session lock, so history order matches request completion order.

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::error::QaError;
use crate::files::FileManager;
use crate::ingest::{IngestReport, Ingestor};
use crate::llm::create_completer;
use crate::query::QueryEngine;
use crate::session::{HistoryEntry, Session};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    ingestor: Arc<Ingestor>,
    ingest_lock: Arc<Mutex<()>>,
    engine: Arc<QueryEngine>,
    session: Arc<Mutex<Session>>,
}

impl AppState {
    pub fn new(ingestor: Ingestor, engine: QueryEngine) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            ingest_lock: Arc::new(Mutex::new(())),
            engine: Arc::new(engine),
            session: Arc::new(Mutex::new(Session::new())),
        }
    }
}

/// Build the router with CORS open to all origins.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{filename}", post(handle_upload))
        .route("/ask", post(handle_ask))
        .route("/history", get(handle_history))
        .route("/history/{index}/select", post(handle_select))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the server on `HOST:PORT` with the configured providers.
pub async fn run_server(settings: Arc<Settings>) -> anyhow::Result<()> {
    let files = FileManager::new(&settings.paths.upload_dir, &settings.paths.index_root);
    let index_root = files.indexes().path().display().to_string();
    let embedder = create_embedder(&settings)?;
    let completer = create_completer(&settings)?;
    let engine = QueryEngine::new(
        Arc::new(files.indexes().clone()),
        embedder.clone(),
        completer,
        settings.retrieval.top_k,
    );
    let ingestor = Ingestor::new(settings.clone(), files, embedder);
    let app = router(AppState::new(ingestor, engine));

    let bind_addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        index_root = %index_root,
        "server listening"
    );
    println!("docqa server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        let (status, code) = match &err {
            QaError::EmptyQuestion | QaError::InvalidFileName(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            QaError::IndexNotFound(_) | QaError::HistoryOutOfRange { .. } => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            QaError::AlreadyIndexed(_) | QaError::IndexLocked(_) => {
                (StatusCode::CONFLICT, "conflict")
            }
            QaError::MalformedDocument { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable")
            }
            QaError::EmbeddingProvider(_) | QaError::LanguageModel(_) => {
                (StatusCode::BAD_GATEWAY, "upstream")
            }
            QaError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            QaError::Io(_) | QaError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), error = %err, "request failed");
        } else {
            tracing::warn!(kind = err.kind(), error = %err, "request rejected");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<String>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = state.ingestor.files().list_processed_files()?;
    Ok(Json(DocumentsResponse { documents }))
}

// ============ POST /documents/{filename} ============

async fn handle_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestReport>), AppError> {
    if body.is_empty() {
        return Err(bad_request("request body must contain the PDF bytes"));
    }

    let _guard = state.ingest_lock.lock().await;
    let report = state.ingestor.ingest_upload(&filename, &body).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    document: String,
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    req: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<HistoryEntry>, AppError> {
    let Json(req) = req?;
    let mut session = state.session.lock().await;
    let entry = session
        .ask(&state.engine, &req.document, &req.question)
        .await?;
    Ok(Json(entry.clone()))
}

// ============ GET /history ============

#[derive(Serialize)]
struct HistoryItem<'a> {
    index: usize,
    label: String,
    #[serde(flatten)]
    entry: &'a HistoryEntry,
}

#[derive(Serialize)]
struct HistoryResponse<'a> {
    entries: Vec<HistoryItem<'a>>,
    selected: Option<usize>,
}

async fn handle_history(State(state): State<AppState>) -> Response {
    let session = state.session.lock().await;
    let entries = session
        .history()
        .iter()
        .enumerate()
        .map(|(index, entry)| HistoryItem {
            index,
            label: entry.label(),
            entry,
        })
        .collect();
    Json(HistoryResponse {
        entries,
        selected: session.selected(),
    })
    .into_response()
}

// ============ POST /history/{index}/select ============

async fn handle_select(
    State(state): State<AppState>,
    index: Result<Path<usize>, PathRejection>,
) -> Result<Json<HistoryEntry>, AppError> {
    let Path(index) = index?;
    let mut session = state.session.lock().await;
    let entry = session.select(index)?;
    Ok(Json(entry.clone()))
}
