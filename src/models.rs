//! Core data models used throughout docchat.
//!
//! These types represent the users, documents, chunks, and chat records that
//! flow through the ingestion pipeline and the chat API. All timestamps are
//! unix milliseconds (UTC). Field names serialize as camelCase to match the
//! HTTP API surface.

use serde::Serialize;

/// Media types accepted for upload and extraction.
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Lifecycle state of an uploaded document.
///
/// Documents are created in `Processing` and moved exactly once by the
/// ingestion worker to a terminal state (`Completed` or `Failed`).
/// `Pending` exists as the schema default but is never observed once
/// ingestion is wired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "processing" => Some(ProcessingStatus::Processing),
            "completed" => Some(ProcessingStatus::Completed),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// An application user, get-or-created from the identity provider's subject.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Stable subject id from the identity token (`user_id` / `sub` claim).
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: i64,
}

/// An uploaded document and its processing state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub user_id: String,
    /// Stored filename (timestamp-prefixed, collision-safe).
    pub file_name: String,
    /// Filename as uploaded by the user.
    pub original_name: String,
    pub file_type: String,
    pub file_size: i64,
    /// Relative path in the blob store.
    pub storage_path: String,
    /// Full extracted text; non-null iff status is `completed`.
    pub extracted_text: Option<String>,
    pub processing_status: ProcessingStatus,
    pub uploaded_at: i64,
}

/// Insert payload for a new document row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: String,
    pub file_name: String,
    pub original_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub processing_status: ProcessingStatus,
}

/// A bounded slice of a document's extracted text, stored in order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    /// Zero-based, contiguous per document.
    pub chunk_index: i64,
    pub content: String,
    pub word_count: i64,
}

/// Insert payload for a new chunk row.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub word_count: i64,
}

/// A chat conversation scoped to one user and one completed document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub document_id: String,
    pub created_at: i64,
}

/// One message in a chat session. Append-only; ordered by timestamp.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
}

/// Insert payload for a new chat message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
}

/// Current time as unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
