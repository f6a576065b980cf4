//! Explicit retry of a terminal document.
//!
//! The orchestrator never retries on its own; a failed attempt stays failed
//! until a caller asks again through here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::processor::{ProcessingError, VerificationOrchestrator};
use crate::db::DatabaseError;
use crate::models::{DocumentId, StatusUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOutcome {
    /// Reset to Pending and enqueued.
    Accepted,
    /// An attempt is queued or running; nothing was changed.
    AlreadyInFlight,
}

impl RetryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyInFlight => "already_in_flight",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
}

pub struct RetryController {
    orchestrator: Arc<VerificationOrchestrator>,
}

impl RetryController {
    pub fn new(orchestrator: Arc<VerificationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Reset a terminal document to Pending and re-run the full pipeline on
    /// its stored bytes. A running attempt is waited for first, so the reset
    /// always follows that attempt's terminal write.
    pub async fn retry(&self, id: DocumentId) -> Result<RetryOutcome, RetryError> {
        let repo = self.orchestrator.repository();
        if repo.get_by_id(id)?.is_none() {
            return Err(RetryError::NotFound(id));
        }

        let _slot = self.orchestrator.locks().acquire(id).await;

        let doc = repo.get_by_id(id)?.ok_or(RetryError::NotFound(id))?;
        if !doc.status.is_terminal() {
            tracing::debug!(document_id = %id, "Retry ignored: attempt already queued");
            return Ok(RetryOutcome::AlreadyInFlight);
        }

        let previous = doc.status;
        let doc = repo.update(id, &StatusUpdate::pending()).map_err(|e| {
            if e.is_not_found() {
                RetryError::NotFound(id)
            } else {
                e.into()
            }
        })?;
        self.orchestrator.enqueue(id)?;

        tracing::info!(
            document_id = %id,
            from = previous.as_str(),
            attempt = doc.attempts,
            "Retry accepted"
        );
        Ok(RetryOutcome::Accepted)
    }
}
