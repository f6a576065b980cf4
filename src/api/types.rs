//! Shared types for the HTTP layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_state::CoreState;
use crate::models::{Document, DocumentId, DocumentStatus, DocumentType, FailureKind};

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// `POST /api/documents` body.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub document_type: Option<String>,
    /// Raw base64 or a data URL (`data:image/jpeg;base64,...`).
    #[serde(default)]
    pub content_base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub document_id: DocumentId,
    pub status: DocumentStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetryResponse {
    pub document_id: DocumentId,
    pub outcome: String,
}

/// Client view of a document. Omits the payload; absent fields are null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentView {
    pub document_id: DocumentId,
    pub owner_id: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub canonical_document_id: Option<String>,
    pub content_address: Option<String>,
    pub anchor_reference: Option<String>,
    pub failure_detail: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub failure_reasons: Vec<String>,
    pub size_bytes: u64,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentView {
    fn from(doc: Document) -> Self {
        Self {
            document_id: doc.id,
            owner_id: doc.owner_id,
            document_type: doc.document_type,
            status: doc.status,
            canonical_document_id: doc.canonical_document_id,
            content_address: doc.content_address,
            anchor_reference: doc.anchor_reference,
            failure_detail: doc.failure_detail,
            failure_kind: doc.failure_kind,
            failure_reasons: doc.failure_reasons,
            size_bytes: doc.size_bytes,
            attempts: doc.attempts,
            submitted_at: doc.submitted_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub owner_id: String,
    pub verified_count: u64,
    pub pending_or_failed_count: u64,
    pub approx_storage_used: u64,
}
