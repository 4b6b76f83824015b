//! Document ingestion pipeline.
//!
//! Drives extraction → chunking → persistence → status transition for one
//! uploaded document. Each document is processed exactly once: it is created
//! in `processing` and ends in `completed` or `failed`. No error escapes to
//! the uploader; every observed failure resolves to a `failed` status write.
//!
//! Uploads do not run the pipeline inline. [`IngestQueue`] owns a single
//! worker task fed by a bounded channel; the upload handler enqueues a job
//! and returns immediately, and worker failures are logged rather than
//! silently dropped.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chunk::{chunk_text, count_words};
use crate::extract::extract_text;
use crate::models::{NewChunk, ProcessingStatus};
use crate::store::Store;

/// One pending ingestion, carrying the upload bytes.
pub struct IngestJob {
    pub document_id: String,
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Handle to the background ingestion worker.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<IngestJob>,
}

impl IngestQueue {
    /// Spawn the worker task. Jobs are processed sequentially in arrival
    /// order; a full channel applies backpressure to uploads.
    pub fn start(store: Arc<dyn Store>, max_chunk_size: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<IngestJob>(64);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let status = process_document(
                    store.as_ref(),
                    &job.document_id,
                    &job.bytes,
                    &job.media_type,
                    max_chunk_size,
                )
                .await;
                tracing::info!(
                    document_id = %job.document_id,
                    status = status.as_str(),
                    "document ingestion finished"
                );
            }
        });

        Self { tx }
    }

    /// Hand a job to the worker. Fails only if the worker is gone, in which
    /// case the caller must mark the document failed itself.
    pub async fn enqueue(&self, job: IngestJob) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("ingestion worker is not running"))
    }
}

/// Run the full pipeline for one document and return its terminal status.
///
/// Extraction failures for PDFs never reach this level (they arrive as
/// placeholder text); plain-text decode errors, empty extracted text, and
/// persistence errors all resolve to `Failed`.
pub async fn process_document(
    store: &dyn Store,
    document_id: &str,
    bytes: &[u8],
    media_type: &str,
    max_chunk_size: usize,
) -> ProcessingStatus {
    match run_pipeline(store, document_id, bytes, media_type, max_chunk_size).await {
        Ok(status) => status,
        Err(err) => {
            tracing::error!(document_id, error = %err, "document processing failed");
            if let Err(update_err) = store
                .update_document_status(document_id, ProcessingStatus::Failed, None)
                .await
            {
                // The document may stay in `processing`; visible via status polling.
                tracing::error!(
                    document_id,
                    error = %update_err,
                    "could not record failed status"
                );
            }
            ProcessingStatus::Failed
        }
    }
}

async fn run_pipeline(
    store: &dyn Store,
    document_id: &str,
    bytes: &[u8],
    media_type: &str,
    max_chunk_size: usize,
) -> Result<ProcessingStatus> {
    let extracted = extract_text(bytes, media_type).context("text extraction failed")?;
    if extracted.is_placeholder() {
        tracing::warn!(document_id, "storing extraction placeholder text");
    }
    let text = extracted.into_text();

    if text.trim().is_empty() {
        store
            .update_document_status(document_id, ProcessingStatus::Failed, None)
            .await
            .context("failed to persist failed status")?;
        return Ok(ProcessingStatus::Failed);
    }

    let pieces = chunk_text(&text, max_chunk_size);
    let chunks: Vec<NewChunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| NewChunk {
            document_id: document_id.to_string(),
            chunk_index: index as i64,
            word_count: count_words(&content) as i64,
            content,
        })
        .collect();

    store
        .create_chunks(chunks)
        .await
        .context("failed to persist chunks")?;

    store
        .update_document_status(document_id, ProcessingStatus::Completed, Some(&text))
        .await
        .context("failed to persist completed status")?;

    Ok(ProcessingStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PlaceholderKind;
    use crate::models::{NewDocument, MIME_TEXT};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    async fn seed_document(store: &MemoryStore) -> String {
        store
            .create_document(NewDocument {
                user_id: "u1".to_string(),
                file_name: "1_f.txt".to_string(),
                original_name: "f.txt".to_string(),
                file_type: MIME_TEXT.to_string(),
                file_size: 0,
                storage_path: "documents/u1/1_f.txt".to_string(),
                processing_status: ProcessingStatus::Processing,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn small_text_file_completes_with_one_chunk() {
        let store = MemoryStore::new();
        let doc_id = seed_document(&store).await;

        // 50 characters, 9 words.
        let text = "alpha beta gamma delta epsilon zeta eta theta iota";
        assert_eq!(text.len(), 50);

        let status = process_document(&store, &doc_id, text.as_bytes(), MIME_TEXT, 2000).await;
        assert_eq!(status, ProcessingStatus::Completed);

        let doc = store.get_document(&doc_id).await.unwrap().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Completed);
        assert_eq!(doc.extracted_text.as_deref(), Some(text));

        let chunks = store.get_chunks(&doc_id).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].word_count, 9);
    }

    #[tokio::test]
    async fn empty_text_fails_without_chunks() {
        let store = MemoryStore::new();
        let doc_id = seed_document(&store).await;

        let status = process_document(&store, &doc_id, b"   \n\t ", MIME_TEXT, 2000).await;
        assert_eq!(status, ProcessingStatus::Failed);

        let doc = store.get_document(&doc_id).await.unwrap().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Failed);
        assert!(doc.extracted_text.is_none());
        assert!(store.get_chunks(&doc_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_text_fails() {
        let store = MemoryStore::new();
        let doc_id = seed_document(&store).await;

        let status =
            process_document(&store, &doc_id, &[0xff, 0xfe, 0x00], MIME_TEXT, 2000).await;
        assert_eq!(status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn unparseable_pdf_completes_with_placeholder_text() {
        let store = MemoryStore::new();
        let doc_id = seed_document(&store).await;

        let status = process_document(
            &store,
            &doc_id,
            b"definitely not a pdf",
            "application/pdf",
            2000,
        )
        .await;

        // Placeholder text is non-empty, so the document completes rather
        // than failing — only genuinely empty text fails.
        assert_eq!(status, ProcessingStatus::Completed);
        let doc = store.get_document(&doc_id).await.unwrap().unwrap();
        assert_eq!(
            doc.extracted_text.as_deref(),
            Some(PlaceholderKind::Unreadable.text())
        );
        assert!(!store.get_chunks(&doc_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_text_produces_contiguous_chunks() {
        let store = MemoryStore::new();
        let doc_id = seed_document(&store).await;

        let text = (0..200)
            .map(|i| format!("Sentence number {i} with a little padding text."))
            .collect::<Vec<_>>()
            .join(" ");
        let status = process_document(&store, &doc_id, text.as_bytes(), MIME_TEXT, 500).await;
        assert_eq!(status, ProcessingStatus::Completed);

        let chunks = store.get_chunks(&doc_id).await.unwrap();
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert!(c.word_count >= 1);
        }
    }

    /// Store wrapper whose chunk writes always fail.
    struct BrokenChunkStore(MemoryStore);

    #[async_trait]
    impl Store for BrokenChunkStore {
        async fn get_user_by_subject(&self, s: &str) -> anyhow::Result<Option<crate::models::User>> {
            self.0.get_user_by_subject(s).await
        }
        async fn create_user(
            &self,
            s: &str,
            e: &str,
            d: Option<&str>,
        ) -> anyhow::Result<crate::models::User> {
            self.0.create_user(s, e, d).await
        }
        async fn create_document(
            &self,
            doc: NewDocument,
        ) -> anyhow::Result<crate::models::Document> {
            self.0.create_document(doc).await
        }
        async fn get_document(
            &self,
            id: &str,
        ) -> anyhow::Result<Option<crate::models::Document>> {
            self.0.get_document(id).await
        }
        async fn list_documents(
            &self,
            user_id: &str,
        ) -> anyhow::Result<Vec<crate::models::Document>> {
            self.0.list_documents(user_id).await
        }
        async fn update_document_status(
            &self,
            id: &str,
            status: ProcessingStatus,
            text: Option<&str>,
        ) -> anyhow::Result<()> {
            self.0.update_document_status(id, status, text).await
        }
        async fn delete_document(&self, id: &str) -> anyhow::Result<()> {
            self.0.delete_document(id).await
        }
        async fn create_chunks(
            &self,
            _chunks: Vec<NewChunk>,
        ) -> anyhow::Result<Vec<crate::models::DocumentChunk>> {
            anyhow::bail!("disk full")
        }
        async fn get_chunks(
            &self,
            document_id: &str,
        ) -> anyhow::Result<Vec<crate::models::DocumentChunk>> {
            self.0.get_chunks(document_id).await
        }
        async fn create_session(
            &self,
            u: &str,
            d: &str,
        ) -> anyhow::Result<crate::models::ChatSession> {
            self.0.create_session(u, d).await
        }
        async fn get_session(
            &self,
            id: &str,
        ) -> anyhow::Result<Option<crate::models::ChatSession>> {
            self.0.get_session(id).await
        }
        async fn list_sessions(
            &self,
            u: &str,
        ) -> anyhow::Result<Vec<crate::models::ChatSession>> {
            self.0.list_sessions(u).await
        }
        async fn create_message(
            &self,
            m: crate::models::NewMessage,
        ) -> anyhow::Result<crate::models::ChatMessage> {
            self.0.create_message(m).await
        }
        async fn get_messages(
            &self,
            s: &str,
        ) -> anyhow::Result<Vec<crate::models::ChatMessage>> {
            self.0.get_messages(s).await
        }
    }

    #[tokio::test]
    async fn persistence_failure_marks_document_failed() {
        let store = BrokenChunkStore(MemoryStore::new());
        let doc_id = seed_document(&store.0).await;

        let status =
            process_document(&store, &doc_id, b"some real text here", MIME_TEXT, 2000).await;
        assert_eq!(status, ProcessingStatus::Failed);

        let doc = store.0.get_document(&doc_id).await.unwrap().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn queue_processes_jobs_in_background() {
        let store = Arc::new(MemoryStore::new());
        let doc_id = seed_document(&store).await;

        let queue = IngestQueue::start(store.clone(), 2000);
        queue
            .enqueue(IngestJob {
                document_id: doc_id.clone(),
                bytes: b"queued text body".to_vec(),
                media_type: MIME_TEXT.to_string(),
            })
            .await
            .unwrap();

        // Poll until the worker lands the terminal status.
        for _ in 0..100 {
            let doc = store.get_document(&doc_id).await.unwrap().unwrap();
            if doc.processing_status.is_terminal() {
                assert_eq!(doc.processing_status, ProcessingStatus::Completed);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("document never reached a terminal status");
    }
}
