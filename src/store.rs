//! Storage abstraction for docchat.
//!
//! The [`Store`] trait defines every persistence operation the pipeline and
//! the HTTP layer need, enabling pluggable backends. [`SqliteStore`] is the
//! production implementation over a `sqlx` pool; [`MemoryStore`] backs unit
//! tests without touching disk.
//!
//! Construction happens once at process start and the store is passed by
//! `Arc` reference into every component that needs persistence — there are
//! no ambient singletons.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    now_millis, ChatMessage, ChatSession, Document, DocumentChunk, MessageRole, NewChunk,
    NewDocument, NewMessage, ProcessingStatus, User,
};

/// Abstract storage backend.
///
/// All chunk reads are ordered by chunk index; all message reads are ordered
/// by timestamp ascending (insertion order breaks ties), which the chat
/// history truncation depends on.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user_by_subject(&self, subject: &str) -> Result<Option<User>>;
    async fn create_user(
        &self,
        subject: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User>;

    async fn create_document(&self, doc: NewDocument) -> Result<Document>;
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;
    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>>;
    /// Writes the terminal status; `extracted_text` is stored when provided
    /// (the completed transition) and left untouched otherwise.
    async fn update_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        extracted_text: Option<&str>,
    ) -> Result<()>;
    /// Deletes a document together with its chunks, its chat sessions, and
    /// those sessions' messages.
    async fn delete_document(&self, id: &str) -> Result<()>;

    async fn create_chunks(&self, chunks: Vec<NewChunk>) -> Result<Vec<DocumentChunk>>;
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>>;

    async fn create_session(&self, user_id: &str, document_id: &str) -> Result<ChatSession>;
    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>>;
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>>;

    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage>;
    async fn get_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}

// ============ SQLite ============

/// SQLite-backed store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status: String = row.try_get("processing_status")?;
    Ok(Document {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        file_name: row.try_get("file_name")?,
        original_name: row.try_get("original_name")?,
        file_type: row.try_get("file_type")?,
        file_size: row.try_get("file_size")?,
        storage_path: row.try_get("storage_path")?,
        extracted_text: row.try_get("extracted_text")?,
        processing_status: ProcessingStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("invalid processing_status in db: {}", status))?,
        uploaded_at: row.try_get("uploaded_at")?,
    })
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage> {
    let role: String = row.try_get("role")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: MessageRole::parse(&role)
            .ok_or_else(|| anyhow::anyhow!("invalid message role in db: {}", role))?,
        content: row.try_get("content")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_user_by_subject(&self, subject: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, subject, email, display_name, created_at FROM users WHERE subject = ?",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(User {
                id: r.try_get("id")?,
                subject: r.try_get("subject")?,
                email: r.try_get("email")?,
                display_name: r.try_get("display_name")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn create_user(
        &self,
        subject: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            email: email.to_string(),
            display_name: display_name.map(|s| s.to_string()),
            created_at: now_millis(),
        };

        sqlx::query(
            "INSERT INTO users (id, subject, email, display_name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.subject)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_document(&self, doc: NewDocument) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            user_id: doc.user_id,
            file_name: doc.file_name,
            original_name: doc.original_name,
            file_type: doc.file_type,
            file_size: doc.file_size,
            storage_path: doc.storage_path,
            extracted_text: None,
            processing_status: doc.processing_status,
            uploaded_at: now_millis(),
        };

        sqlx::query(
            r#"
            INSERT INTO documents
                (id, user_id, file_name, original_name, file_type, file_size,
                 storage_path, extracted_text, processing_status, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.user_id)
        .bind(&document.file_name)
        .bind(&document.original_name)
        .bind(&document.file_type)
        .bind(document.file_size)
        .bind(&document.storage_path)
        .bind(document.processing_status.as_str())
        .bind(document.uploaded_at)
        .execute(&self.pool)
        .await?;

        Ok(document)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_document(&r)).transpose()
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE user_id = ? ORDER BY uploaded_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn update_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        extracted_text: Option<&str>,
    ) -> Result<()> {
        match extracted_text {
            Some(text) => {
                sqlx::query(
                    "UPDATE documents SET processing_status = ?, extracted_text = ? WHERE id = ?",
                )
                .bind(status.as_str())
                .bind(text)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query("UPDATE documents SET processing_status = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chat_messages WHERE session_id IN \
             (SELECT id FROM chat_sessions WHERE document_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chat_sessions WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn create_chunks(&self, chunks: Vec<NewChunk>) -> Result<Vec<DocumentChunk>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let row = DocumentChunk {
                id: Uuid::new_v4().to_string(),
                document_id: chunk.document_id,
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                word_count: chunk.word_count,
            };

            sqlx::query(
                "INSERT INTO document_chunks (id, document_id, chunk_index, content, word_count) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&row.id)
            .bind(&row.document_id)
            .bind(row.chunk_index)
            .bind(&row.content)
            .bind(row.word_count)
            .execute(&mut *tx)
            .await?;

            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, word_count \
             FROM document_chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(DocumentChunk {
                    id: r.try_get("id")?,
                    document_id: r.try_get("document_id")?,
                    chunk_index: r.try_get("chunk_index")?,
                    content: r.try_get("content")?,
                    word_count: r.try_get("word_count")?,
                })
            })
            .collect()
    }

    async fn create_session(&self, user_id: &str, document_id: &str) -> Result<ChatSession> {
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            document_id: document_id.to_string(),
            created_at: now_millis(),
        };

        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, document_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.document_id)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let row = sqlx::query(
            "SELECT id, user_id, document_id, created_at FROM chat_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(ChatSession {
                id: r.try_get("id")?,
                user_id: r.try_get("user_id")?,
                document_id: r.try_get("document_id")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let rows = sqlx::query(
            "SELECT id, user_id, document_id, created_at FROM chat_sessions \
             WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(ChatSession {
                    id: r.try_get("id")?,
                    user_id: r.try_get("user_id")?,
                    document_id: r.try_get("document_id")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage> {
        let row = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            timestamp: now_millis(),
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, role, content, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.session_id)
        .bind(row.role.as_str())
        .bind(&row.content)
        .bind(row.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        // rowid breaks same-millisecond ties in insertion order.
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, timestamp FROM chat_messages \
             WHERE session_id = ? ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }
}

// ============ In-memory ============

#[derive(Default)]
struct MemoryInner {
    users: HashMap<String, User>,
    documents: HashMap<String, Document>,
    chunks: Vec<DocumentChunk>,
    sessions: HashMap<String, ChatSession>,
    messages: Vec<ChatMessage>,
}

/// In-memory store for tests. Message order is insertion order, which
/// matches the timestamp-ascending contract.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user_by_subject(&self, subject: &str) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.values().find(|u| u.subject == subject).cloned())
    }

    async fn create_user(
        &self,
        subject: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            email: email.to_string(),
            display_name: display_name.map(|s| s.to_string()),
            created_at: now_millis(),
        };
        let mut inner = self.inner.write().unwrap();
        inner.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn create_document(&self, doc: NewDocument) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            user_id: doc.user_id,
            file_name: doc.file_name,
            original_name: doc.original_name,
            file_type: doc.file_type,
            file_size: doc.file_size,
            storage_path: doc.storage_path,
            extracted_text: None,
            processing_status: doc.processing_status,
            uploaded_at: now_millis(),
        };
        let mut inner = self.inner.write().unwrap();
        inner.documents.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.documents.get(id).cloned())
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        let inner = self.inner.read().unwrap();
        let mut docs: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(docs)
    }

    async fn update_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        extracted_text: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let doc = inner
            .documents
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("document not found: {}", id))?;
        doc.processing_status = status;
        if let Some(text) = extracted_text {
            doc.extracted_text = Some(text.to_string());
        }
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.documents.remove(id);
        inner.chunks.retain(|c| c.document_id != id);
        let session_ids: Vec<String> = inner
            .sessions
            .values()
            .filter(|s| s.document_id == id)
            .map(|s| s.id.clone())
            .collect();
        inner
            .messages
            .retain(|m| !session_ids.contains(&m.session_id));
        inner.sessions.retain(|_, s| s.document_id != id);
        Ok(())
    }

    async fn create_chunks(&self, chunks: Vec<NewChunk>) -> Result<Vec<DocumentChunk>> {
        let mut inner = self.inner.write().unwrap();
        let mut created = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let row = DocumentChunk {
                id: Uuid::new_v4().to_string(),
                document_id: chunk.document_id,
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                word_count: chunk.word_count,
            };
            inner.chunks.push(row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let inner = self.inner.read().unwrap();
        let mut chunks: Vec<DocumentChunk> = inner
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn create_session(&self, user_id: &str, document_id: &str) -> Result<ChatSession> {
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            document_id: document_id.to_string(),
            created_at: now_millis(),
        };
        let mut inner = self.inner.write().unwrap();
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.sessions.get(id).cloned())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let inner = self.inner.read().unwrap();
        let mut sessions: Vec<ChatSession> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage> {
        let row = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            timestamp: now_millis(),
        };
        let mut inner = self.inner.write().unwrap();
        inner.messages.push(row.clone());
        Ok(row)
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let inner = self.inner.read().unwrap();
        let mut messages: Vec<ChatMessage> = inner
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for same-millisecond messages.
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_doc(user_id: &str) -> NewDocument {
        NewDocument {
            user_id: user_id.to_string(),
            file_name: "1_test.txt".to_string(),
            original_name: "test.txt".to_string(),
            file_type: "text/plain".to_string(),
            file_size: 42,
            storage_path: "documents/u/1_test.txt".to_string(),
            processing_status: ProcessingStatus::Processing,
        }
    }

    #[tokio::test]
    async fn document_lifecycle() {
        let store = MemoryStore::new();
        let doc = store.create_document(new_doc("u1")).await.unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Processing);
        assert!(doc.extracted_text.is_none());

        store
            .update_document_status(&doc.id, ProcessingStatus::Completed, Some("full text"))
            .await
            .unwrap();

        let fetched = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.processing_status, ProcessingStatus::Completed);
        assert_eq!(fetched.extracted_text.as_deref(), Some("full text"));
    }

    #[tokio::test]
    async fn chunks_come_back_in_index_order() {
        let store = MemoryStore::new();
        let doc = store.create_document(new_doc("u1")).await.unwrap();

        // Insert out of order; reads must sort by index.
        let chunks = vec![
            NewChunk {
                document_id: doc.id.clone(),
                chunk_index: 1,
                content: "second".to_string(),
                word_count: 1,
            },
            NewChunk {
                document_id: doc.id.clone(),
                chunk_index: 0,
                content: "first".to_string(),
                word_count: 1,
            },
        ];
        store.create_chunks(chunks).await.unwrap();

        let fetched = store.get_chunks(&doc.id).await.unwrap();
        let indices: Vec<i64> = fetched.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(fetched[0].content, "first");
    }

    #[tokio::test]
    async fn delete_document_cascades_to_sessions_and_messages() {
        let store = MemoryStore::new();
        let doc = store.create_document(new_doc("u1")).await.unwrap();
        let session = store.create_session("u1", &doc.id).await.unwrap();
        store
            .create_message(NewMessage {
                session_id: session.id.clone(),
                role: MessageRole::User,
                content: "hello".to_string(),
            })
            .await
            .unwrap();

        store.delete_document(&doc.id).await.unwrap();

        assert!(store.get_document(&doc.id).await.unwrap().is_none());
        assert!(store.get_session(&session.id).await.unwrap().is_none());
        assert!(store.get_messages(&session.id).await.unwrap().is_empty());
        assert!(store.get_chunks(&doc.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_ordered_by_time_ascending() {
        let store = MemoryStore::new();
        let session = store.create_session("u1", "d1").await.unwrap();
        for i in 0..5 {
            store
                .create_message(NewMessage {
                    session_id: session.id.clone(),
                    role: if i % 2 == 0 {
                        MessageRole::User
                    } else {
                        MessageRole::Assistant
                    },
                    content: format!("msg {i}"),
                })
                .await
                .unwrap();
        }
        let messages = store.get_messages(&session.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn user_get_or_create_by_subject() {
        let store = MemoryStore::new();
        assert!(store.get_user_by_subject("s1").await.unwrap().is_none());
        let user = store
            .create_user("s1", "a@example.com", Some("Alice"))
            .await
            .unwrap();
        let found = store.get_user_by_subject("s1").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.display_name.as_deref(), Some("Alice"));
    }
}
