//! services/wizard/src/adapters/in_memory.rs
//!
//! A self-contained evaluation backend. Job descriptions, document
//! descriptors and batches live in memory; file contents go through a
//! `DocumentStorage`; each batch is scored by a `CandidateScorer` in a
//! background task. The reference server exposes it over HTTP, and tests use
//! it directly as an `EvaluationPipeline`.

use crate::adapters::report::render_report;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use skilllens_core::domain::{Document, DocumentStatus, EvaluationResult, JobDescription};
use skilllens_core::ports::{
    BatchId, CandidateScorer, DocumentStorage, EvaluationPipeline, PortError, PortResult,
    ProcessingPhase, ProcessingStatus, Report, ReportFormat, UploadMetadata,
};
use skilllens_core::validation::UploadPolicy;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
enum BatchState {
    Running,
    Completed(Vec<EvaluationResult>),
    Failed(String),
}

#[derive(Debug, Clone)]
struct Batch {
    job_description_id: Uuid,
    document_ids: Vec<Uuid>,
    progress_pct: f32,
    state: BatchState,
}

/// Batches by id. Finished batches are kept in completion order and the
/// oldest are evicted once more than `retained` have finished.
#[derive(Default)]
struct BatchTable {
    by_id: HashMap<BatchId, Batch>,
    finished: VecDeque<BatchId>,
}

impl BatchTable {
    fn finish(&mut self, batch_id: BatchId, state: BatchState, retained: usize) {
        let Some(batch) = self.by_id.get_mut(&batch_id) else {
            return;
        };
        if matches!(state, BatchState::Completed(_)) {
            batch.progress_pct = 100.0;
        }
        batch.state = state;
        self.finished.push_back(batch_id);
        while self.finished.len() > retained {
            if let Some(evicted) = self.finished.pop_front() {
                self.by_id.remove(&evicted);
                debug!("Evicted finished batch {}", evicted);
            }
        }
    }
}

/// How many finished batches stay queryable by default.
const RETAINED_BATCHES: usize = 100;

struct Inner {
    policy: UploadPolicy,
    storage: Arc<dyn DocumentStorage>,
    scorer: Arc<dyn CandidateScorer>,
    /// Pause before each document is scored, so progress is observable.
    step_delay: Duration,
    retained_batches: usize,
    jobs: RwLock<HashMap<Uuid, JobDescription>>,
    /// Most recently saved job description; batches started without an id use it.
    current_job: RwLock<Option<Uuid>>,
    documents: RwLock<Vec<Document>>,
    batches: RwLock<BatchTable>,
}

/// In-process `EvaluationPipeline`. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InMemoryPipeline {
    inner: Arc<Inner>,
}

impl InMemoryPipeline {
    pub fn new(
        policy: UploadPolicy,
        storage: Arc<dyn DocumentStorage>,
        scorer: Arc<dyn CandidateScorer>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                policy,
                storage,
                scorer,
                step_delay: Duration::ZERO,
                retained_batches: RETAINED_BATCHES,
                jobs: RwLock::new(HashMap::new()),
                current_job: RwLock::new(None),
                documents: RwLock::new(Vec::new()),
                batches: RwLock::new(BatchTable::default()),
            }),
        }
    }

    /// Sets the pause before each document is scored. Call before sharing the pipeline.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.step_delay = delay,
            None => warn!("Step delay ignored: pipeline is already shared"),
        }
        self
    }

    /// Sets how many finished batches stay queryable. Call before sharing the pipeline.
    pub fn with_retained_batches(mut self, retained: usize) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.retained_batches = retained.max(1),
            None => warn!("Batch retention ignored: pipeline is already shared"),
        }
        self
    }

    async fn batch(&self, batch_id: BatchId) -> PortResult<Batch> {
        self.inner
            .batches
            .read()
            .await
            .by_id
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Batch {} not found", batch_id)))
    }
}

impl Inner {
    async fn set_document_status(&self, id: Uuid, status: DocumentStatus, progress: Option<f32>) {
        if let Some(doc) = self.documents.write().await.iter_mut().find(|d| d.id == id) {
            doc.status = status;
            doc.processing_progress = progress;
        }
    }

    async fn finish_batch(&self, batch_id: BatchId, state: BatchState) {
        self.batches
            .write()
            .await
            .finish(batch_id, state, self.retained_batches);
    }

    async fn score_document(
        &self,
        job: &JobDescription,
        id: Uuid,
        position: usize,
    ) -> PortResult<EvaluationResult> {
        let document = self
            .documents
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {} was deleted", id)))?;
        let contents = self.storage.get(&document.path).await?;
        self.scorer
            .evaluate(job, &document, &contents, position)
            .await
    }
}

/// Scores every document of a batch in order, publishing progress as it goes.
async fn run_batch(inner: Arc<Inner>, batch_id: BatchId, job: JobDescription, ids: Vec<Uuid>) {
    let total = ids.len();
    let mut results = Vec::with_capacity(total);

    for (position, id) in ids.iter().copied().enumerate() {
        if !inner.step_delay.is_zero() {
            tokio::time::sleep(inner.step_delay).await;
        }
        match inner.score_document(&job, id, position).await {
            Ok(result) => {
                inner
                    .set_document_status(id, DocumentStatus::Processed, Some(100.0))
                    .await;
                results.push(result);
            }
            Err(e) => {
                error!("Batch {} failed on document {}: {}", batch_id, id, e);
                for id in &ids[position..] {
                    inner.set_document_status(*id, DocumentStatus::Error, None).await;
                }
                inner
                    .finish_batch(batch_id, BatchState::Failed(e.to_string()))
                    .await;
                return;
            }
        }

        // Completion is reported only once the results are published.
        let done = position + 1;
        if done < total {
            if let Some(batch) = inner.batches.write().await.by_id.get_mut(&batch_id) {
                batch.progress_pct = done as f32 / total as f32 * 100.0;
            }
        }
    }

    info!("Batch {} completed with {} results", batch_id, results.len());
    inner
        .finish_batch(batch_id, BatchState::Completed(results))
        .await;
}

#[async_trait]
impl EvaluationPipeline for InMemoryPipeline {
    async fn save_job_description(&self, job: &JobDescription) -> PortResult<JobDescription> {
        if !job.is_complete() {
            return Err(PortError::Validation(
                "Both the public description and the special conditions are required".to_string(),
            ));
        }
        let mut jobs = self.inner.jobs.write().await;
        let mut saved = job.clone();
        if let Some(existing) = jobs.get(&job.id) {
            saved.created_at = existing.created_at;
        }
        jobs.insert(saved.id, saved.clone());
        *self.inner.current_job.write().await = Some(saved.id);
        info!("Saved job description {}", saved.id);
        Ok(saved)
    }

    async fn get_job_description(&self, id: Uuid) -> PortResult<JobDescription> {
        self.inner
            .jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Job description {} not found", id)))
    }

    async fn upload_document(
        &self,
        file_bytes: Bytes,
        original_name: &str,
        metadata: &UploadMetadata,
    ) -> PortResult<Document> {
        let extension = self
            .inner
            .policy
            .check(original_name, file_bytes.len() as u64)
            .map_err(|e| PortError::Validation(e.to_string()))?;

        let id = metadata.document_id;
        if self.inner.documents.read().await.iter().any(|d| d.id == id) {
            return Err(PortError::Conflict(format!("Document {} already exists", id)));
        }

        let document = Document {
            id,
            filename: format!("{}.{}", id, extension),
            original_name: original_name.to_string(),
            size: file_bytes.len() as u64,
            uploaded_at: Utc::now(),
            status: DocumentStatus::Uploaded,
            processing_progress: None,
            path: format!("{}/input", id),
        };
        self.inner.storage.put(&document.path, file_bytes).await?;
        self.inner.documents.write().await.push(document.clone());
        info!(
            "Stored '{}' as {} ({} bytes)",
            original_name, document.filename, document.size
        );
        Ok(document)
    }

    async fn list_documents(&self) -> PortResult<Vec<Document>> {
        Ok(self.inner.documents.read().await.clone())
    }

    async fn get_document(&self, id: Uuid) -> PortResult<Document> {
        self.inner
            .documents
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", id)))
    }

    async fn delete_document(&self, id: Uuid) -> PortResult<()> {
        let removed = {
            let mut documents = self.inner.documents.write().await;
            let index = documents
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| PortError::NotFound(format!("Document {} not found", id)))?;
            if documents[index].status == DocumentStatus::Processing {
                return Err(PortError::Conflict(format!(
                    "Document {} is being processed",
                    id
                )));
            }
            documents.remove(index)
        };
        self.inner.storage.delete(&removed.path).await?;
        info!("Deleted document {}", id);
        Ok(())
    }

    async fn start_processing(
        &self,
        job_description_id: Option<Uuid>,
        document_ids: &[Uuid],
    ) -> PortResult<BatchId> {
        if document_ids.is_empty() {
            return Err(PortError::Validation("No documents to process".to_string()));
        }
        let job_description_id = match job_description_id {
            Some(id) => id,
            None => (*self.inner.current_job.read().await).ok_or_else(|| {
                PortError::Validation("No job description has been saved".to_string())
            })?,
        };
        let job = self.get_job_description(job_description_id).await?;

        {
            let mut documents = self.inner.documents.write().await;
            for id in document_ids {
                let doc = documents
                    .iter()
                    .find(|d| d.id == *id)
                    .ok_or_else(|| PortError::NotFound(format!("Document {} not found", id)))?;
                match doc.status {
                    DocumentStatus::Uploaded | DocumentStatus::Processed => {}
                    DocumentStatus::Processing => {
                        return Err(PortError::Conflict(format!(
                            "Document {} is already being processed",
                            id
                        )))
                    }
                    other => {
                        return Err(PortError::Validation(format!(
                            "Document {} is {}, not uploaded",
                            id, other
                        )))
                    }
                }
            }
            for doc in documents.iter_mut().filter(|d| document_ids.contains(&d.id)) {
                doc.status = DocumentStatus::Processing;
                doc.processing_progress = Some(0.0);
            }
        }

        let batch_id = Uuid::new_v4();
        self.inner.batches.write().await.by_id.insert(
            batch_id,
            Batch {
                job_description_id,
                document_ids: document_ids.to_vec(),
                progress_pct: 0.0,
                state: BatchState::Running,
            },
        );
        info!(
            "Started batch {} ({} documents) for job description {}",
            batch_id,
            document_ids.len(),
            job_description_id
        );

        tokio::spawn(run_batch(
            self.inner.clone(),
            batch_id,
            job,
            document_ids.to_vec(),
        ));
        Ok(batch_id)
    }

    async fn get_processing_status(&self, batch_id: BatchId) -> PortResult<ProcessingStatus> {
        let batch = self.batch(batch_id).await?;
        match batch.state {
            BatchState::Failed(reason) => Err(PortError::Unexpected(format!(
                "Batch {} failed: {}",
                batch_id, reason
            ))),
            state => {
                let is_complete = matches!(state, BatchState::Completed(_));
                Ok(ProcessingStatus {
                    progress_pct: batch.progress_pct,
                    phase: ProcessingPhase::for_progress(batch.progress_pct, is_complete),
                    is_complete,
                })
            }
        }
    }

    async fn get_evaluation_results(&self, batch_id: BatchId) -> PortResult<Vec<EvaluationResult>> {
        match self.batch(batch_id).await?.state {
            BatchState::Completed(results) => Ok(results),
            BatchState::Running => Err(PortError::NotReady(format!(
                "Batch {} is still processing",
                batch_id
            ))),
            BatchState::Failed(reason) => Err(PortError::Unexpected(format!(
                "Batch {} failed: {}",
                batch_id, reason
            ))),
        }
    }

    async fn download_evaluation_report(
        &self,
        batch_id: BatchId,
        format: ReportFormat,
    ) -> PortResult<Report> {
        let batch = self.batch(batch_id).await?;
        let results = self.get_evaluation_results(batch_id).await?;
        let job = self
            .inner
            .jobs
            .read()
            .await
            .get(&batch.job_description_id)
            .cloned();
        info!(
            "Rendering {} report for batch {} ({} documents)",
            format,
            batch_id,
            batch.document_ids.len()
        );
        Ok(render_report(format, job.as_ref(), &results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::keyword_scorer::KeywordScorer;
    use crate::adapters::storage::MemoryStorage;

    fn pipeline() -> InMemoryPipeline {
        InMemoryPipeline::new(
            UploadPolicy::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(KeywordScorer::new().unwrap()),
        )
    }

    fn job() -> JobDescription {
        JobDescription::from_form(None, "Backend Engineer, Rust", "3 years Rust", Utc::now())
    }

    async fn upload(p: &InMemoryPipeline, name: &str, text: &str) -> Document {
        let meta = UploadMetadata {
            document_id: Uuid::new_v4(),
            job_description_id: None,
        };
        p.upload_document(Bytes::from(text.to_string()), name, &meta)
            .await
            .unwrap()
    }

    async fn wait_for_completion(p: &InMemoryPipeline, batch: BatchId) -> ProcessingStatus {
        loop {
            let status = p.get_processing_status(batch).await.unwrap();
            if status.is_complete {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn upload_keeps_the_client_id_and_names_the_file() {
        let p = pipeline();
        let doc = upload(&p, "Jane CV.PDF", "Jane").await;
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert_eq!(doc.filename, format!("{}.pdf", doc.id));
        assert_eq!(doc.path, format!("{}/input", doc.id));
        assert_eq!(p.get_document(doc.id).await.unwrap(), doc);

        let again = UploadMetadata {
            document_id: doc.id,
            job_description_id: None,
        };
        let err = p
            .upload_document(Bytes::from_static(b"x"), "other.pdf", &again)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn upload_rejects_wrong_type_and_oversize() {
        let p = pipeline();
        let meta = UploadMetadata {
            document_id: Uuid::new_v4(),
            job_description_id: None,
        };
        let err = p
            .upload_document(Bytes::from_static(b"x"), "cv.docx", &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        let big = Bytes::from(vec![0u8; 15 * 1024 * 1024]);
        let err = p.upload_document(big, "cv.pdf", &meta).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        assert!(p.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_scores_every_document_and_renders_reports() {
        let p = pipeline();
        let job = p.save_job_description(&job()).await.unwrap();
        let a = upload(&p, "a.pdf", "Ana\n5 years Rust backend engineer").await;
        let b = upload(&p, "b.pdf", "Bo\nBaker").await;

        let batch = p.start_processing(Some(job.id), &[a.id, b.id]).await.unwrap();
        let status = wait_for_completion(&p, batch).await;
        assert_eq!(status.phase, ProcessingPhase::Completed);
        assert_eq!(status.progress_pct, 100.0);

        let results = p.get_evaluation_results(batch).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, a.id);
        assert!(results.iter().all(|r| r.scores_in_range()));
        assert!(results[0].score > results[1].score);
        assert_eq!(
            p.get_document(a.id).await.unwrap().status,
            DocumentStatus::Processed
        );

        let csv = p
            .download_evaluation_report(batch, ReportFormat::Excel)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&csv.bytes).contains("Ana"));
    }

    #[tokio::test]
    async fn start_processing_checks_references() {
        let p = pipeline();
        let doc = upload(&p, "a.pdf", "Ana").await;
        let err = p
            .start_processing(Some(Uuid::new_v4()), &[doc.id])
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));

        let job = p.save_job_description(&job()).await.unwrap();
        let err = p
            .start_processing(Some(job.id), &[Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        let err = p.start_processing(Some(job.id), &[]).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_not_ready_while_running_and_documents_are_locked() {
        let p = pipeline().with_step_delay(Duration::from_secs(1));
        let job = p.save_job_description(&job()).await.unwrap();
        let doc = upload(&p, "a.pdf", "Ana").await;
        let batch = p.start_processing(Some(job.id), &[doc.id]).await.unwrap();

        let status = p.get_processing_status(batch).await.unwrap();
        assert!(!status.is_complete);
        assert_eq!(status.phase, ProcessingPhase::Analyzing);
        assert!(matches!(
            p.get_evaluation_results(batch).await,
            Err(PortError::NotReady(_))
        ));
        assert!(matches!(
            p.delete_document(doc.id).await,
            Err(PortError::Conflict(_))
        ));
        assert!(matches!(
            p.start_processing(Some(job.id), &[doc.id]).await,
            Err(PortError::Conflict(_))
        ));

        wait_for_completion(&p, batch).await;
        p.delete_document(doc.id).await.unwrap();
        assert!(p.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_without_job_id_uses_the_latest_saved_description() {
        let p = pipeline();
        let doc = upload(&p, "a.pdf", "Ana\n5 years Rust backend engineer").await;
        let err = p.start_processing(None, &[doc.id]).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        p.save_job_description(&job()).await.unwrap();
        let latest = p
            .save_job_description(&JobDescription::from_form(
                None,
                "Pastry chef",
                "Croissants",
                Utc::now(),
            ))
            .await
            .unwrap();
        let batch = p.start_processing(None, &[doc.id]).await.unwrap();
        wait_for_completion(&p, batch).await;

        let report = p
            .download_evaluation_report(batch, ReportFormat::Pdf)
            .await
            .unwrap();
        assert_eq!(p.batch(batch).await.unwrap().job_description_id, latest.id);
        assert!(String::from_utf8_lossy(&report.bytes).contains("Position: Pastry chef"));
    }

    #[tokio::test]
    async fn only_the_most_recent_finished_batches_are_kept() {
        let p = pipeline().with_retained_batches(2);
        let job = p.save_job_description(&job()).await.unwrap();
        let doc = upload(&p, "a.pdf", "Ana").await;

        let mut batches = Vec::new();
        for _ in 0..3 {
            let batch = p.start_processing(Some(job.id), &[doc.id]).await.unwrap();
            wait_for_completion(&p, batch).await;
            batches.push(batch);
        }

        assert!(matches!(
            p.get_processing_status(batches[0]).await,
            Err(PortError::NotFound(_))
        ));
        assert_eq!(p.get_evaluation_results(batches[1]).await.unwrap().len(), 1);
        assert_eq!(p.get_evaluation_results(batches[2]).await.unwrap().len(), 1);
        assert_eq!(p.inner.batches.read().await.by_id.len(), 2);
    }

    #[tokio::test]
    async fn job_description_resave_keeps_creation_time() {
        let p = pipeline();
        let first = p.save_job_description(&job()).await.unwrap();
        let edited = JobDescription::from_form(Some(&first), "Senior Rust", "5 years", Utc::now());
        let saved = p.save_job_description(&edited).await.unwrap();
        assert_eq!(saved.id, first.id);
        assert_eq!(saved.created_at, first.created_at);
        assert_eq!(
            p.get_job_description(first.id).await.unwrap().public_description,
            "Senior Rust"
        );
    }
}
