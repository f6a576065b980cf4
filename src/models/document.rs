use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{DocumentStatus, DocumentType, FailureKind};

/// Monotonically assigned document identifier (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(DocumentId)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: String,
    pub document_type: DocumentType,
    pub canonical_document_id: Option<String>,
    pub status: DocumentStatus,
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

impl Document {
    /// Whether the transition-owned fields agree with `status`.
    ///
    /// A Verified document carries its canonical id, content address and
    /// anchor reference together; a Pending one carries none of them.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            DocumentStatus::Pending => {
                self.canonical_document_id.is_none()
                    && self.content_address.is_none()
                    && self.anchor_reference.is_none()
                    && self.failure_detail.is_none()
                    && self.failure_kind.is_none()
            }
            DocumentStatus::Verified => {
                self.canonical_document_id.is_some()
                    && self.content_address.is_some()
                    && self.anchor_reference.is_some()
                    && self.failure_detail.is_none()
            }
            DocumentStatus::Invalid | DocumentStatus::Error => {
                self.failure_detail.is_some()
                    && self.content_address.is_none()
                    && self.anchor_reference.is_none()
            }
        }
    }
}

/// Input for creating a document record. The payload is persisted with the
/// record so that a retry re-runs the pipeline on the same bytes.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner_id: String,
    pub document_type: DocumentType,
    pub payload: Vec<u8>,
}

/// Structured failure: the kind drives Invalid vs Error, the reasons are kept
/// as a list so callers can consume every detected defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reasons: Vec<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reasons: vec![reason.into()],
        }
    }

    /// User-visible summary: reasons joined with ", ".
    pub fn detail(&self) -> String {
        self.reasons.join(", ")
    }
}

/// One status transition. Replaces every transition-owned field of the
/// record in a single write; the constructors only build combinations that
/// satisfy [`Document::is_consistent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: DocumentStatus,
    pub canonical_document_id: Option<String>,
    pub content_address: Option<String>,
    pub anchor_reference: Option<String>,
    pub failure: Option<Failure>,
}

impl StatusUpdate {
    /// Reset for a new attempt: everything cleared.
    pub fn pending() -> Self {
        Self {
            status: DocumentStatus::Pending,
            canonical_document_id: None,
            content_address: None,
            anchor_reference: None,
            failure: None,
        }
    }

    pub fn verified(
        canonical_document_id: impl Into<String>,
        content_address: impl Into<String>,
        anchor_reference: impl Into<String>,
    ) -> Self {
        Self {
            status: DocumentStatus::Verified,
            canonical_document_id: Some(canonical_document_id.into()),
            content_address: Some(content_address.into()),
            anchor_reference: Some(anchor_reference.into()),
            failure: None,
        }
    }

    /// Business rejection. `canonical_document_id` is kept when the
    /// identifier was found but another rule failed (e.g. expiry).
    pub fn invalid(canonical_document_id: Option<String>, reasons: Vec<String>) -> Self {
        Self {
            status: DocumentStatus::Invalid,
            canonical_document_id,
            content_address: None,
            anchor_reference: None,
            failure: Some(Failure {
                kind: FailureKind::Validation,
                reasons,
            }),
        }
    }

    /// Infrastructure fault.
    pub fn error(failure: Failure, canonical_document_id: Option<String>) -> Self {
        Self {
            status: DocumentStatus::Error,
            canonical_document_id,
            content_address: None,
            anchor_reference: None,
            failure: Some(failure),
        }
    }
}

/// Aggregate counts for one owner, derived from current rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentStats {
    pub verified_count: u64,
    pub pending_or_failed_count: u64,
    pub approx_storage_used: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_doc() -> Document {
        Document {
            id: DocumentId(1),
            owner_id: "owner-1".into(),
            document_type: DocumentType::Passport,
            canonical_document_id: None,
            status: DocumentStatus::Pending,
            content_address: None,
            anchor_reference: None,
            failure_detail: None,
            failure_kind: None,
            failure_reasons: vec![],
            size_bytes: 10,
            attempts: 1,
            submitted_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_pending_document_is_consistent() {
        assert!(pending_doc().is_consistent());
    }

    #[test]
    fn verified_without_anchor_is_inconsistent() {
        let mut doc = pending_doc();
        doc.status = DocumentStatus::Verified;
        doc.canonical_document_id = Some("A1234567".into());
        doc.content_address = Some("sha256-abc".into());
        assert!(!doc.is_consistent());

        doc.anchor_reference = Some("0xabc".into());
        assert!(doc.is_consistent());
    }

    #[test]
    fn failure_detail_joins_reasons() {
        let failure = Failure {
            kind: FailureKind::Validation,
            reasons: vec!["unreadable content".into(), "document expired".into()],
        };
        assert_eq!(failure.detail(), "unreadable content, document expired");
    }

    #[test]
    fn invalid_update_carries_validation_kind() {
        let update = StatusUpdate::invalid(None, vec!["unreadable content".into()]);
        assert_eq!(update.status, DocumentStatus::Invalid);
        assert_eq!(update.failure.unwrap().kind, FailureKind::Validation);
    }

    #[test]
    fn document_id_parses_and_displays() {
        let id: DocumentId = "42".parse().unwrap();
        assert_eq!(id, DocumentId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<DocumentId>().is_err());
    }
}
