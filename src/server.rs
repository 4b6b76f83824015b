//! HTTP API server.
//!
//! Exposes the document-upload-and-chat API over axum. Handlers resolve the
//! caller's identity explicitly at the top of each handler (no middleware
//! mutating the request) and receive everything else through [`AppState`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/api/health` | Health check (returns version) |
//! | `GET`    | `/api/user` | Current authenticated user |
//! | `POST`   | `/api/documents/upload` | Upload a PDF/TXT (multipart) |
//! | `GET`    | `/api/documents` | List the caller's documents |
//! | `DELETE` | `/api/documents/{id}` | Delete a document and its data |
//! | `POST`   | `/api/chat/sessions` | Start a chat on a completed document |
//! | `GET`    | `/api/chat/sessions` | List the caller's chat sessions |
//! | `GET`    | `/api/chat/sessions/{id}/messages` | Session message history |
//! | `POST`   | `/api/chat/sessions/{id}/messages` | Send a message, get the AI reply |
//!
//! # Error Contract
//!
//! All error responses are JSON:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Message content is required" } }
//! ```

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::ai::{create_model, ChatModel};
use crate::auth;
use crate::config::Config;
use crate::files::FileStore;
use crate::ingest::{IngestJob, IngestQueue};
use crate::migrate;
use crate::models::{
    now_millis, ChatMessage, Document, MessageRole, NewDocument, NewMessage, ProcessingStatus,
    User, MIME_PDF, MIME_TEXT,
};
use crate::prompt::{build_prompt, recent_history};
use crate::store::{SqliteStore, Store};
use crate::{db, prompt};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub model: Arc<dyn ChatModel>,
    pub files: Arc<FileStore>,
    pub ingest: IngestQueue,
}

/// Starts the HTTP server with production wiring (SQLite store, configured
/// AI provider). Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let model: Arc<dyn ChatModel> = Arc::from(create_model(&config.ai)?);
    let files = Arc::new(FileStore::new(&config.upload.storage_root));
    let ingest = IngestQueue::start(store.clone(), config.chunking.max_chunk_size);

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        model,
        files,
        ingest,
    };

    let app = build_router(state);

    tracing::info!(bind = %bind_addr, "docchat server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Separate from [`run_server`] so tests can drive the
/// API in-process with injected fakes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Multipart bodies carry some framing overhead beyond the file itself.
    let upload_limit = state.config.upload.max_file_size + 64 * 1024;

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/user", get(handle_get_user))
        .route(
            "/api/documents/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/{id}", delete(handle_delete_document))
        .route(
            "/api/chat/sessions",
            post(handle_create_session).get(handle_list_sessions),
        )
        .route(
            "/api/chat/sessions/{id}/messages",
            get(handle_get_messages).post(handle_send_message),
        )
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
pub struct AppError {
    status: StatusCode,
    code: String,
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

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "internal error");
        internal("Internal server error")
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn payload_too_large(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::PAYLOAD_TOO_LARGE,
        code: "payload_too_large".to_string(),
        message: message.into(),
    }
}

fn model_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "model_unavailable".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Authentication ============

/// Resolve the caller into a `User` row, creating it on first sight.
///
/// This is called explicitly at the top of each protected handler; the
/// resulting user is threaded into the handler logic as a plain value.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("No token provided"))?;

    let token = auth::bearer_token(header).map_err(|_| unauthorized("No token provided"))?;
    let principal = auth::decode_token(token).map_err(|_| unauthorized("Invalid token"))?;

    if let Some(user) = state.store.get_user_by_subject(&principal.subject).await? {
        return Ok(user);
    }

    let user = state
        .store
        .create_user(
            &principal.subject,
            &principal.email,
            principal.display_name.as_deref(),
        )
        .await?;
    Ok(user)
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/user ============

async fn handle_get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let user = authenticate(&state, &headers).await?;
    Ok(Json(user))
}

// ============ POST /api/documents/upload ============

struct UploadedFile {
    name: String,
    media_type: String,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .unwrap_or("unnamed")
            .to_string();
        let media_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read upload: {e}")))?;
        return Ok(UploadedFile {
            name,
            media_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(bad_request("No file provided"))
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Document>, AppError> {
    let user = authenticate(&state, &headers).await?;
    let upload = read_upload(multipart).await?;

    if upload.media_type != MIME_PDF && upload.media_type != MIME_TEXT {
        return Err(bad_request("Only PDF and TXT files are allowed"));
    }
    if upload.bytes.len() > state.config.upload.max_file_size {
        return Err(payload_too_large(format!(
            "File exceeds maximum size of {} bytes",
            state.config.upload.max_file_size
        )));
    }

    let storage_path = state
        .files
        .put(&upload.bytes, &upload.name, &user.subject)
        .map_err(AppError::from)?;

    let document = state
        .store
        .create_document(NewDocument {
            user_id: user.id.clone(),
            file_name: format!("{}_{}", now_millis(), upload.name),
            original_name: upload.name.clone(),
            file_type: upload.media_type.clone(),
            file_size: upload.bytes.len() as i64,
            storage_path,
            processing_status: ProcessingStatus::Processing,
        })
        .await?;

    // Ingestion runs in the background; the caller polls processing_status.
    let enqueued = state
        .ingest
        .enqueue(IngestJob {
            document_id: document.id.clone(),
            bytes: upload.bytes,
            media_type: upload.media_type,
        })
        .await;

    if let Err(err) = enqueued {
        tracing::error!(document_id = %document.id, error = %err, "could not enqueue ingestion");
        state
            .store
            .update_document_status(&document.id, ProcessingStatus::Failed, None)
            .await?;
        let document = state
            .store
            .get_document(&document.id)
            .await?
            .ok_or_else(|| internal("Document vanished during upload"))?;
        return Ok(Json(document));
    }

    Ok(Json(document))
}

// ============ GET /api/documents ============

async fn handle_list_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Document>>, AppError> {
    let user = authenticate(&state, &headers).await?;
    let documents = state.store.list_documents(&user.id).await?;
    Ok(Json(documents))
}

// ============ DELETE /api/documents/{id} ============

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let user = authenticate(&state, &headers).await?;

    let document = state
        .store
        .get_document(&id)
        .await?
        .filter(|d| d.user_id == user.id)
        .ok_or_else(|| not_found("Document not found"))?;

    state
        .files
        .delete(&document.storage_path)
        .map_err(AppError::from)?;
    state.store.delete_document(&document.id).await?;

    Ok(Json(DeleteResponse {
        message: "Document deleted successfully".to_string(),
    }))
}

// ============ POST /api/chat/sessions ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    document_id: String,
}

async fn handle_create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<crate::models::ChatSession>, AppError> {
    let user = authenticate(&state, &headers).await?;

    let document = state
        .store
        .get_document(&req.document_id)
        .await?
        .filter(|d| d.user_id == user.id)
        .ok_or_else(|| not_found("Document not found"))?;

    if document.processing_status != ProcessingStatus::Completed {
        return Err(bad_request("Document is still being processed"));
    }

    let session = state.store.create_session(&user.id, &document.id).await?;
    Ok(Json(session))
}

// ============ GET /api/chat/sessions ============

async fn handle_list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<crate::models::ChatSession>>, AppError> {
    let user = authenticate(&state, &headers).await?;
    let sessions = state.store.list_sessions(&user.id).await?;
    Ok(Json(sessions))
}

// ============ GET /api/chat/sessions/{id}/messages ============

async fn handle_get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let user = authenticate(&state, &headers).await?;

    let session = state
        .store
        .get_session(&id)
        .await?
        .filter(|s| s.user_id == user.id)
        .ok_or_else(|| not_found("Chat session not found"))?;

    let messages = state.store.get_messages(&session.id).await?;
    Ok(Json(messages))
}

// ============ POST /api/chat/sessions/{id}/messages ============

#[derive(Deserialize)]
struct SendMessageRequest {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    user_message: ChatMessage,
    ai_message: ChatMessage,
}

async fn handle_send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let user = authenticate(&state, &headers).await?;

    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(bad_request("Message content is required"));
    }

    let session = state
        .store
        .get_session(&id)
        .await?
        .filter(|s| s.user_id == user.id)
        .ok_or_else(|| not_found("Chat session not found"))?;

    // Persist the user message before calling the model, so it survives a
    // model failure. An unanswered question in history is the accepted
    // failure mode; the client may retry.
    let user_message = state
        .store
        .create_message(NewMessage {
            session_id: session.id.clone(),
            role: MessageRole::User,
            content: content.clone(),
        })
        .await?;

    let chunks = state.store.get_chunks(&session.document_id).await?;
    let chunk_contents: Vec<String> = chunks.into_iter().map(|c| c.content).collect();

    let history = state.store.get_messages(&session.id).await?;
    let recent = recent_history(&history);
    debug_assert!(recent.len() <= prompt::HISTORY_LIMIT);

    let prompt_text = build_prompt(&content, &chunk_contents, recent);

    let reply = state.model.complete(&prompt_text).await.map_err(|err| {
        tracing::error!(session_id = %session.id, error = %err, "model call failed");
        model_unavailable("Failed to generate AI response. Please try again later.")
    })?;

    let ai_message = state
        .store
        .create_message(NewMessage {
            session_id: session.id.clone(),
            role: MessageRole::Assistant,
            content: reply,
        })
        .await?;

    Ok(Json(SendMessageResponse {
        user_message,
        ai_message,
    }))
}
