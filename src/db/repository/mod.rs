//! Repository layer: document persistence.
//!
//! `document` holds the plain SQL functions (one per operation, taking a
//! `&Connection`). `DocumentRepository` is the seam the pipeline and the API
//! depend on; `SqliteDocumentRepository` serialises access to one connection.

mod document;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::Connection;

use super::DatabaseError;
use crate::models::*;

pub use document::*;

/// Persistent store of Document records keyed by id.
///
/// Implementations persist exactly what they are given: status transitions
/// are decided by the orchestrator and the retry controller.
pub trait DocumentRepository: Send + Sync {
    /// Insert a new Pending document and return the stored record.
    fn create(&self, doc: &NewDocument) -> Result<Document, DatabaseError>;

    fn get_by_id(&self, id: DocumentId) -> Result<Option<Document>, DatabaseError>;

    /// All documents of one owner, newest first.
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Document>, DatabaseError>;

    /// All documents currently in `status`, oldest first.
    fn list_by_status(&self, status: DocumentStatus) -> Result<Vec<Document>, DatabaseError>;

    /// Raw submitted bytes.
    fn load_payload(&self, id: DocumentId) -> Result<Option<Vec<u8>>, DatabaseError>;

    /// Apply one transition atomically and return the new snapshot.
    fn update(&self, id: DocumentId, update: &StatusUpdate) -> Result<Document, DatabaseError>;

    fn delete(&self, id: DocumentId) -> Result<(), DatabaseError>;

    fn stats(&self, owner_id: &str) -> Result<DocumentStats, DatabaseError>;
}

/// SQLite-backed repository. One connection behind a mutex: every operation
/// (including read-after-write pairs) runs under the lock.
pub struct SqliteDocumentRepository {
    conn: Mutex<Connection>,
}

impl SqliteDocumentRepository {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open (or create) the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(super::sqlite::open_database(path)?))
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(super::sqlite::open_memory_database()?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl DocumentRepository for SqliteDocumentRepository {
    fn create(&self, doc: &NewDocument) -> Result<Document, DatabaseError> {
        let conn = self.conn()?;
        let id = insert_document(&conn, doc, &Utc::now())?;
        get_document(&conn, id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: id.to_string(),
        })
    }

    fn get_by_id(&self, id: DocumentId) -> Result<Option<Document>, DatabaseError> {
        let conn = self.conn()?;
        get_document(&conn, id)
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Document>, DatabaseError> {
        let conn = self.conn()?;
        list_documents_by_owner(&conn, owner_id)
    }

    fn list_by_status(&self, status: DocumentStatus) -> Result<Vec<Document>, DatabaseError> {
        let conn = self.conn()?;
        list_documents_by_status(&conn, status)
    }

    fn load_payload(&self, id: DocumentId) -> Result<Option<Vec<u8>>, DatabaseError> {
        let conn = self.conn()?;
        get_document_payload(&conn, id)
    }

    fn update(&self, id: DocumentId, update: &StatusUpdate) -> Result<Document, DatabaseError> {
        let conn = self.conn()?;
        update_document_status(&conn, id, update, &Utc::now())?;
        get_document(&conn, id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: id.to_string(),
        })
    }

    fn delete(&self, id: DocumentId) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        delete_document(&conn, id)
    }

    fn stats(&self, owner_id: &str) -> Result<DocumentStats, DatabaseError> {
        let conn = self.conn()?;
        document_stats(&conn, owner_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn new_doc(owner: &str) -> NewDocument {
        NewDocument {
            owner_id: owner.into(),
            document_type: DocumentType::TaxId,
            payload: b"INCOME TAX DEPARTMENT ABCDE1234F".to_vec(),
        }
    }

    #[test]
    fn repository_is_object_safe() {
        fn _assert(_: &dyn DocumentRepository) {}
    }

    #[test]
    fn create_returns_persisted_snapshot() {
        let repo = SqliteDocumentRepository::in_memory().unwrap();
        let doc = repo.create(&new_doc("alice")).unwrap();
        assert_eq!(doc.owner_id, "alice");
        assert_eq!(doc.document_type, DocumentType::TaxId);
        assert_eq!(doc.status, DocumentStatus::Pending);
    }

    #[test]
    fn update_returns_new_snapshot() {
        let repo = SqliteDocumentRepository::in_memory().unwrap();
        let doc = repo.create(&new_doc("alice")).unwrap();

        let updated = repo
            .update(doc.id, &StatusUpdate::verified("ABCDE1234F", "sha256-x", "0x1"))
            .unwrap();
        assert_eq!(updated.status, DocumentStatus::Verified);
        assert!(updated.updated_at >= doc.updated_at);
    }

    #[test]
    fn repeated_reads_do_not_mutate() {
        let repo = SqliteDocumentRepository::in_memory().unwrap();
        let doc = repo.create(&new_doc("alice")).unwrap();

        let first = repo.get_by_id(doc.id).unwrap().unwrap();
        for _ in 0..10 {
            let again = repo.get_by_id(doc.id).unwrap().unwrap();
            assert_eq!(again.updated_at, first.updated_at);
            assert_eq!(again.status, first.status);
            assert_eq!(again.attempts, first.attempts);
        }
    }

    #[test]
    fn readers_never_observe_half_written_transition() {
        let repo = Arc::new(SqliteDocumentRepository::in_memory().unwrap());
        let doc = repo.create(&new_doc("alice")).unwrap();
        let id = doc.id;

        let writer = {
            let repo = repo.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    repo.update(
                        id,
                        &StatusUpdate::verified(format!("ID{i}"), format!("addr{i}"), format!("ref{i}")),
                    )
                    .unwrap();
                    repo.update(id, &StatusUpdate::pending()).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let snapshot = repo.get_by_id(id).unwrap().unwrap();
            assert!(snapshot.is_consistent(), "inconsistent snapshot: {snapshot:?}");
        }
        writer.join().unwrap();
    }

    #[test]
    fn every_operation_runs_through_the_shared_connection() {
        let repo = SqliteDocumentRepository::in_memory().unwrap();
        let kept = repo.create(&new_doc("alice")).unwrap();
        let dropped = repo.create(&new_doc("alice")).unwrap();
        repo.create(&new_doc("bob")).unwrap();

        assert_eq!(repo.get_by_id(kept.id).unwrap().unwrap().id, kept.id);
        assert_eq!(repo.list_by_owner("alice").unwrap().len(), 2);
        assert_eq!(repo.list_by_status(DocumentStatus::Pending).unwrap().len(), 3);
        assert_eq!(
            repo.load_payload(kept.id).unwrap().unwrap(),
            b"INCOME TAX DEPARTMENT ABCDE1234F"
        );

        repo.delete(dropped.id).unwrap();
        assert!(repo.get_by_id(dropped.id).unwrap().is_none());
        assert!(repo.load_payload(dropped.id).unwrap().is_none());
        assert!(repo.delete(dropped.id).unwrap_err().is_not_found());

        let stats = repo.stats("alice").unwrap();
        assert_eq!(stats.verified_count, 0);
        assert_eq!(stats.pending_or_failed_count, 1);
    }

    #[test]
    fn on_disk_repository_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.db");

        let id = {
            let repo = SqliteDocumentRepository::open(&path).unwrap();
            repo.create(&new_doc("alice")).unwrap().id
        };

        let repo = SqliteDocumentRepository::open(&path).unwrap();
        let doc = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(doc.owner_id, "alice");
    }
}
