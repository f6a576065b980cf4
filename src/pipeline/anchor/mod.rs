//! Ledger anchoring: record (canonical id, document type, content address)
//! on an append-only ledger and return the transaction reference.

pub mod ledger;

pub use ledger::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DocumentType;

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger rejected entry: {0}")]
    Rejected(String),

    #[error("Ledger lock poisoned")]
    LockPoisoned,
}

/// One recorded association, as returned by `lookup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub reference: String,
    pub previous_reference: String,
    pub canonical_document_id: String,
    pub document_type: DocumentType,
    pub content_address: String,
    pub recorded_at: DateTime<Utc>,
}

/// Ledger abstraction (allows mocking for tests).
pub trait LedgerAnchor: Send + Sync {
    /// Append an entry. Every call returns a new, unique reference, even for
    /// identical arguments.
    fn anchor(
        &self,
        canonical_document_id: &str,
        document_type: DocumentType,
        content_address: &str,
    ) -> Result<String, AnchorError>;

    fn lookup(&self, reference: &str) -> Result<Option<LedgerEntry>, AnchorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_is_object_safe() {
        fn _assert(_: &dyn LedgerAnchor) {}
    }
}
