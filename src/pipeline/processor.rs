//! Verification orchestrator.
//!
//! Drives one document through extract → validate → store → anchor and
//! writes the terminal state in a single repository update. Submission only
//! creates the record and enqueues a job; the dispatcher in `queue` calls
//! back into [`VerificationOrchestrator::run_job`].
//!
//! Every collaborator sits behind a trait so tests can inject failures.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{DatabaseError, DocumentRepository};
use crate::models::*;
use crate::pipeline::anchor::LedgerAnchor;
use crate::pipeline::extraction::ContentExtractor;
use crate::pipeline::locks::{DocumentLocks, InFlightGuard};
use crate::pipeline::queue::JobSender;
use crate::pipeline::storage::ContentStore;
use crate::pipeline::validation::{ValidationOutcome, Validator};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Malformed submissions, reported synchronously to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("owner_id is required")]
    MissingOwner,

    #[error("document_type is required")]
    MissingDocumentType,

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("Document body is empty")]
    EmptyPayload,

    #[error("Document is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Failures of the orchestrator's own bookkeeping. Pipeline step failures
/// are never returned: they are written to the document.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job queue closed")]
    QueueClosed,
}

// ---------------------------------------------------------------------------
// Settings and services
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on each external call (extract, store, anchor).
    pub step_timeout: Duration,
    pub max_document_bytes: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
            max_document_bytes: 10 * 1024 * 1024,
        }
    }
}

/// The external collaborators of the pipeline.
#[derive(Clone)]
pub struct PipelineServices {
    pub extractor: Arc<dyn ContentExtractor>,
    pub validator: Validator,
    pub store: Arc<dyn ContentStore>,
    pub ledger: Arc<dyn LedgerAnchor>,
}

/// External call being bounded by the step timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Extraction,
    Storage,
    Anchoring,
}

impl Step {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Storage => "storage",
            Self::Anchoring => "anchoring",
        }
    }

    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Extraction => FailureKind::Extraction,
            Self::Storage => FailureKind::Storage,
            Self::Anchoring => FailureKind::Anchoring,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct VerificationOrchestrator {
    repo: Arc<dyn DocumentRepository>,
    services: PipelineServices,
    settings: PipelineSettings,
    locks: DocumentLocks,
    jobs: JobSender,
}

impl VerificationOrchestrator {
    pub fn new(
        repo: Arc<dyn DocumentRepository>,
        services: PipelineServices,
        settings: PipelineSettings,
        jobs: JobSender,
    ) -> Self {
        Self {
            repo,
            services,
            settings,
            locks: DocumentLocks::new(),
            jobs,
        }
    }

    pub fn repository(&self) -> &Arc<dyn DocumentRepository> {
        &self.repo
    }

    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub(crate) fn locks(&self) -> &DocumentLocks {
        &self.locks
    }

    /// Validate the request, create the document Pending and enqueue it.
    /// Returns as soon as the record exists.
    pub fn submit(
        &self,
        owner_id: &str,
        document_type: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<Document, SubmitError> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(SubmitError::MissingOwner);
        }
        let raw_type = document_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SubmitError::MissingDocumentType)?;
        let document_type = DocumentType::parse_lenient(raw_type)
            .ok_or_else(|| SubmitError::UnknownDocumentType(raw_type.to_string()))?;
        if payload.is_empty() {
            return Err(SubmitError::EmptyPayload);
        }
        if payload.len() > self.settings.max_document_bytes {
            return Err(SubmitError::TooLarge {
                size: payload.len(),
                max: self.settings.max_document_bytes,
            });
        }

        let doc = self.repo.create(&NewDocument {
            owner_id: owner_id.to_string(),
            document_type,
            payload,
        })?;

        tracing::info!(
            document_id = %doc.id,
            document_type = document_type.as_str(),
            size_bytes = doc.size_bytes,
            "Document submitted"
        );

        if let Err(e) = self.enqueue(doc.id) {
            // The record stays Pending and is picked up by startup recovery.
            tracing::error!(document_id = %doc.id, error = %e, "Failed to enqueue document");
        }

        Ok(doc)
    }

    pub(crate) fn enqueue(&self, id: DocumentId) -> Result<(), ProcessingError> {
        self.jobs.send(id).map_err(|_| ProcessingError::QueueClosed)
    }

    /// Re-enqueue every document left Pending (e.g. by a previous process).
    pub fn recover_pending(&self) -> Result<usize, ProcessingError> {
        let pending = self.repo.list_by_status(DocumentStatus::Pending)?;
        for doc in &pending {
            self.enqueue(doc.id)?;
        }
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "Re-enqueued pending documents");
        }
        Ok(pending.len())
    }

    /// Run one job to completion. Holds the document's in-flight slot for
    /// the whole run; jobs for documents that are gone or no longer Pending
    /// are dropped.
    pub async fn run_job(self: Arc<Self>, id: DocumentId) {
        let slot = self.locks.acquire(id).await;

        let doc = match self.repo.get_by_id(id) {
            Ok(Some(doc)) if doc.status == DocumentStatus::Pending => doc,
            Ok(Some(doc)) => {
                tracing::debug!(document_id = %id, status = doc.status.as_str(), "Skipping job: not pending");
                return;
            }
            Ok(None) => {
                tracing::debug!(document_id = %id, "Skipping job: document deleted");
                return;
            }
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to load document for processing");
                return;
            }
        };

        let payload = match self.repo.load_payload(id) {
            Ok(Some(bytes)) => Arc::new(bytes),
            Ok(None) => return,
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to load payload");
                self.finish(
                    &slot,
                    StatusUpdate::error(
                        Failure::new(FailureKind::Internal, "stored payload could not be read"),
                        None,
                    ),
                );
                return;
            }
        };

        tracing::info!(
            document_id = %id,
            attempt = doc.attempts,
            "Processing: starting pipeline"
        );

        // The pipeline runs in its own task so a panic surfaces as a
        // JoinError here, while the slot is still held.
        let this = self.clone();
        let update = match tokio::spawn(async move { this.execute(&doc, payload).await }).await {
            Ok(update) => update,
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Pipeline task failed");
                StatusUpdate::error(
                    Failure::new(FailureKind::Internal, "internal error during processing"),
                    None,
                )
            }
        };

        self.finish(&slot, update);
    }

    /// Persist the terminal state. Requires the document's slot.
    fn finish(&self, slot: &InFlightGuard, update: StatusUpdate) {
        let id = slot.document_id();
        match self.repo.update(id, &update) {
            Ok(doc) => match doc.status {
                DocumentStatus::Verified => tracing::info!(
                    document_id = %id,
                    anchor_reference = doc.anchor_reference.as_deref().unwrap_or_default(),
                    "Document verified"
                ),
                status => tracing::warn!(
                    document_id = %id,
                    status = status.as_str(),
                    failure_kind = doc.failure_kind.map(|k| k.as_str()).unwrap_or_default(),
                    failure = doc.failure_detail.as_deref().unwrap_or_default(),
                    "Document not verified"
                ),
            },
            Err(e) if e.is_not_found() => {
                tracing::info!(document_id = %id, "Document deleted during processing");
            }
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to persist terminal state");
            }
        }
    }

    /// The pipeline proper. Never fails: every outcome is a status update.
    async fn execute(&self, doc: &Document, payload: Arc<Vec<u8>>) -> StatusUpdate {
        let document_type = doc.document_type;

        // Step 1: extract
        let extractor = self.services.extractor.clone();
        let bytes = payload.clone();
        let extracted = match self
            .run_step(Step::Extraction, move || extractor.extract(&bytes, document_type))
            .await
        {
            Ok(extracted) => extracted,
            Err(failure) => return StatusUpdate::error(failure, None),
        };

        tracing::debug!(
            document_id = %doc.id,
            format = extracted.format.as_str(),
            chars = extracted.char_count(),
            "Processing: extraction complete"
        );

        // Step 2: validate
        let canonical = match self.services.validator.validate(&extracted.text, document_type) {
            ValidationOutcome::Valid {
                canonical_document_id,
                identifier_synthesized,
            } => {
                if identifier_synthesized {
                    tracing::warn!(document_id = %doc.id, "Identifier synthesised, document is unverified");
                }
                canonical_document_id
            }
            ValidationOutcome::Invalid {
                reasons,
                canonical_document_id,
            } => return StatusUpdate::invalid(canonical_document_id, reasons),
        };

        // Step 3: store raw bytes
        let store = self.services.store.clone();
        let bytes = payload.clone();
        let address = match self.run_step(Step::Storage, move || store.store(&bytes)).await {
            Ok(address) => address,
            Err(failure) => return StatusUpdate::error(failure, Some(canonical)),
        };

        // Step 4: anchor
        let ledger = self.services.ledger.clone();
        let (anchor_id, anchor_address) = (canonical.clone(), address.clone());
        let reference = match self
            .run_step(Step::Anchoring, move || {
                ledger.anchor(&anchor_id, document_type, &anchor_address)
            })
            .await
        {
            Ok(reference) => reference,
            Err(failure) => return StatusUpdate::error(failure, Some(canonical)),
        };

        StatusUpdate::verified(canonical, address, reference)
    }

    /// Run a blocking external call on the blocking pool, bounded by the
    /// step timeout. A late result of a timed-out call is discarded.
    async fn run_step<T, E, F>(&self, step: Step, call: F) -> Result<T, Failure>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let timeout = self.settings.step_timeout;
        match tokio::time::timeout(timeout, tokio::task::spawn_blocking(call)).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(Failure::new(
                step.failure_kind(),
                format!("{} failed: {e}", step.as_str()),
            )),
            Ok(Err(join)) => {
                tracing::error!(step = step.as_str(), error = %join, "Pipeline step panicked");
                Err(Failure::new(
                    FailureKind::Internal,
                    format!("{} failed: internal error", step.as_str()),
                ))
            }
            Err(_) => Err(Failure::new(
                FailureKind::Timeout,
                format!("{} timed out after {}ms", step.as_str(), timeout.as_millis()),
            )),
        }
    }
}
