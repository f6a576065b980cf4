//! Process-wide application state.
//!
//! `CoreState` owns the document repository, the pipeline services, the
//! orchestrator and the dispatcher. It is built once at startup, wrapped in
//! `Arc` and shared with the HTTP layer. Must be created inside a tokio
//! runtime: construction spawns the dispatcher.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{AppConfig, ConfigError};
use crate::db::{self, DocumentRepository, SqliteDocumentRepository};
use crate::pipeline::anchor::{LedgerAnchor, SimulatedLedger};
use crate::pipeline::extraction::SimulatedOcr;
use crate::pipeline::storage::{ContentStore, DirectoryContentStore, MemoryContentStore, StoreError};
use crate::pipeline::validation::{ValidationMode, Validator};
use crate::pipeline::{
    job_channel, spawn_dispatcher, DispatcherHandle, PipelineServices, PipelineSettings,
    ProcessingError, RetryController, VerificationOrchestrator,
};

pub struct CoreState {
    pub config: AppConfig,
    orchestrator: Arc<VerificationOrchestrator>,
    retry: RetryController,
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn LedgerAnchor>,
    /// Dispatcher handle. Uses tokio Mutex for async shutdown.
    dispatcher: tokio::sync::Mutex<Option<DispatcherHandle>>,
    started_at: Instant,
}

impl CoreState {
    /// Build the default stack from configuration: SQLite repository,
    /// simulated OCR and ledger, directory or in-memory content store.
    pub fn from_config(config: AppConfig) -> Result<Arc<Self>, CoreError> {
        let repo: Arc<dyn DocumentRepository> =
            Arc::new(SqliteDocumentRepository::open(&config.database_path)?);

        let store: Arc<dyn ContentStore> = match &config.content_store_dir {
            Some(dir) => Arc::new(DirectoryContentStore::open(dir)?),
            None => {
                tracing::warn!("No content store directory configured, blobs kept in memory");
                Arc::new(MemoryContentStore::new())
            }
        };

        let mode = if config.relaxed_identifiers {
            tracing::warn!("Relaxed identifier mode enabled: unverifiable documents may pass");
            ValidationMode::Relaxed
        } else {
            ValidationMode::Strict
        };

        let services = PipelineServices {
            extractor: Arc::new(SimulatedOcr::new(
                config.simulated_latency,
                config.simulated_latency / 2,
            )),
            validator: Validator::new(mode),
            store,
            ledger: Arc::new(SimulatedLedger::new(config.simulated_latency)),
        };

        Self::with_services(config, repo, services)
    }

    /// Build with explicit collaborators, start the dispatcher and
    /// re-enqueue documents left Pending by a previous run.
    pub fn with_services(
        config: AppConfig,
        repo: Arc<dyn DocumentRepository>,
        services: PipelineServices,
    ) -> Result<Arc<Self>, CoreError> {
        let settings = PipelineSettings {
            step_timeout: config.step_timeout,
            max_document_bytes: config.max_document_bytes,
        };
        let store = services.store.clone();
        let ledger = services.ledger.clone();

        let (jobs_tx, jobs_rx) = job_channel();
        let orchestrator = Arc::new(VerificationOrchestrator::new(
            repo, services, settings, jobs_tx,
        ));
        let dispatcher =
            spawn_dispatcher(orchestrator.clone(), jobs_rx, config.worker_concurrency);

        let recovered = orchestrator.recover_pending()?;
        if recovered > 0 {
            tracing::info!(recovered, "Startup recovery complete");
        }

        Ok(Arc::new(Self {
            config,
            retry: RetryController::new(orchestrator.clone()),
            orchestrator,
            store,
            ledger,
            dispatcher: tokio::sync::Mutex::new(Some(dispatcher)),
            started_at: Instant::now(),
        }))
    }

    pub fn documents(&self) -> &Arc<dyn DocumentRepository> {
        self.orchestrator.repository()
    }

    pub fn orchestrator(&self) -> &Arc<VerificationOrchestrator> {
        &self.orchestrator
    }

    pub fn retry_controller(&self) -> &RetryController {
        &self.retry
    }

    pub fn content_store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerAnchor> {
        &self.ledger
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Stop the dispatcher, letting running pipelines finish. Idempotent.
    pub async fn shutdown(&self) {
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Content store error: {0}")]
    Store(#[from] StoreError),
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{DocumentStatus, NewDocument, DocumentType};

    fn test_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            database_path: dir.join("test.db"),
            content_store_dir: Some(dir.join("blobs")),
            simulated_latency: Duration::ZERO,
            step_timeout: Duration::from_secs(5),
            ..AppConfig::default()
        }
    }

    async fn wait_for_terminal(state: &CoreState, id: crate::models::DocumentId) -> DocumentStatus {
        for _ in 0..200 {
            let doc = state.documents().get_by_id(id).unwrap().unwrap();
            if doc.status.is_terminal() {
                return doc.status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("document {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn from_config_creates_database_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::from_config(test_config(dir.path())).unwrap();
        assert!(dir.path().join("test.db").exists());
        assert!(dir.path().join("blobs").is_dir());
        state.shutdown().await;
    }

    #[tokio::test]
    async fn verified_document_bytes_retrievable() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::from_config(test_config(dir.path())).unwrap();
        let payload = b"INCOME TAX DEPARTMENT PAN ABCDE1234F".to_vec();

        let doc = state
            .orchestrator()
            .submit("owner-1", Some("tax_id"), payload.clone())
            .unwrap();
        assert_eq!(wait_for_terminal(&state, doc.id).await, DocumentStatus::Verified);

        let doc = state.documents().get_by_id(doc.id).unwrap().unwrap();
        let address = doc.content_address.unwrap();
        assert_eq!(state.content_store().retrieve(&address).unwrap(), payload);

        let entry = state
            .ledger()
            .lookup(doc.anchor_reference.as_deref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(entry.canonical_document_id, "ABCDE1234F");
        assert_eq!(entry.content_address, address);
        state.shutdown().await;
    }

    #[tokio::test]
    async fn pending_documents_recovered_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        // Simulate a crash: a Pending row with no process behind it.
        let id = {
            let repo = SqliteDocumentRepository::open(&config.database_path).unwrap();
            repo.create(&NewDocument {
                owner_id: "owner-1".into(),
                document_type: DocumentType::VoterId,
                payload: b"ELECTION COMMISSION OF INDIA EPIC ABC1234567".to_vec(),
            })
            .unwrap()
            .id
        };

        let state = CoreState::from_config(config).unwrap();
        assert_eq!(wait_for_terminal(&state, id).await, DocumentStatus::Verified);
        state.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::from_config(test_config(dir.path())).unwrap();
        state.shutdown().await;
        state.shutdown().await;
    }
}
