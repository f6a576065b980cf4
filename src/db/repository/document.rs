use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

const DOCUMENT_COLUMNS: &str = "id, owner_id, document_type, canonical_document_id, status,
     content_address, anchor_reference, failure_detail, failure_kind, failure_reasons,
     size_bytes, attempts, submitted_at, updated_at";

/// Fixed-width UTC timestamps so that lexical order equals time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("{field}: {e}")))
}

fn not_found(id: DocumentId) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "Document".into(),
        id: id.to_string(),
    }
}

pub fn insert_document(
    conn: &Connection,
    doc: &NewDocument,
    now: &DateTime<Utc>,
) -> Result<DocumentId, DatabaseError> {
    let ts = format_timestamp(now);
    conn.execute(
        "INSERT INTO documents (owner_id, document_type, status, payload, size_bytes,
         attempts, submitted_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        params![
            doc.owner_id,
            doc.document_type.as_str(),
            DocumentStatus::Pending.as_str(),
            doc.payload,
            doc.payload.len() as i64,
            ts,
        ],
    )?;
    Ok(DocumentId(conn.last_insert_rowid()))
}

pub fn get_document(conn: &Connection, id: DocumentId) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"
    ))?;

    let row = stmt.query_row(params![id.0], read_row).optional()?;
    row.map(document_from_row).transpose()
}

pub fn list_documents_by_owner(
    conn: &Connection,
    owner_id: &str,
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = ?1 ORDER BY id DESC"
    ))?;

    let rows = stmt.query_map(params![owner_id], read_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Get all documents currently in `status`, oldest first.
pub fn list_documents_by_status(
    conn: &Connection,
    status: DocumentStatus,
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = ?1 ORDER BY id ASC"
    ))?;

    let rows = stmt.query_map(params![status.as_str()], read_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Raw submitted bytes for a document.
pub fn get_document_payload(
    conn: &Connection,
    id: DocumentId,
) -> Result<Option<Vec<u8>>, DatabaseError> {
    let payload = conn
        .query_row(
            "SELECT payload FROM documents WHERE id = ?1",
            params![id.0],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()?;
    Ok(payload)
}

/// Apply one status transition as a single UPDATE statement.
///
/// Every transition-owned column is rewritten together, so a concurrent
/// reader sees either the previous snapshot or the new one. `updated_at`
/// never moves backwards. A transition back to Pending starts a new attempt.
pub fn update_document_status(
    conn: &Connection,
    id: DocumentId,
    update: &StatusUpdate,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let (failure_detail, failure_kind, failure_reasons) = match &update.failure {
        Some(failure) => (
            Some(failure.detail()),
            Some(failure.kind.as_str()),
            Some(
                serde_json::to_string(&failure.reasons)
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            ),
        ),
        None => (None, None, None),
    };

    let ts = format_timestamp(now);
    let rows = conn.execute(
        "UPDATE documents SET
            status = ?2,
            canonical_document_id = ?3,
            content_address = ?4,
            anchor_reference = ?5,
            failure_detail = ?6,
            failure_kind = ?7,
            failure_reasons = ?8,
            attempts = attempts + CASE WHEN ?2 = 'pending' THEN 1 ELSE 0 END,
            updated_at = CASE WHEN ?9 > updated_at THEN ?9 ELSE updated_at END
         WHERE id = ?1",
        params![
            id.0,
            update.status.as_str(),
            update.canonical_document_id,
            update.content_address,
            update.anchor_reference,
            failure_detail,
            failure_kind,
            failure_reasons,
            ts,
        ],
    )?;
    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Hard delete. No tombstone is kept.
pub fn delete_document(conn: &Connection, id: DocumentId) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.0])?;
    if deleted == 0 {
        return Err(not_found(id));
    }
    tracing::info!(document_id = %id, "Document deleted");
    Ok(())
}

/// Aggregate counts for one owner, computed from the current rows.
pub fn document_stats(conn: &Connection, owner_id: &str) -> Result<DocumentStats, DatabaseError> {
    let stats = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN status = 'verified' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status != 'verified' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'verified' THEN size_bytes ELSE 0 END), 0)
         FROM documents WHERE owner_id = ?1",
        params![owner_id],
        |row| {
            Ok(DocumentStats {
                verified_count: row.get::<_, i64>(0)? as u64,
                pending_or_failed_count: row.get::<_, i64>(1)? as u64,
                approx_storage_used: row.get::<_, i64>(2)? as u64,
            })
        },
    )?;
    Ok(stats)
}

struct DocumentRow {
    id: i64,
    owner_id: String,
    document_type: String,
    canonical_document_id: Option<String>,
    status: String,
    content_address: Option<String>,
    anchor_reference: Option<String>,
    failure_detail: Option<String>,
    failure_kind: Option<String>,
    failure_reasons: Option<String>,
    size_bytes: i64,
    attempts: i64,
    submitted_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        document_type: row.get(2)?,
        canonical_document_id: row.get(3)?,
        status: row.get(4)?,
        content_address: row.get(5)?,
        anchor_reference: row.get(6)?,
        failure_detail: row.get(7)?,
        failure_kind: row.get(8)?,
        failure_reasons: row.get(9)?,
        size_bytes: row.get(10)?,
        attempts: row.get(11)?,
        submitted_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    let failure_reasons = match row.failure_reasons.as_deref() {
        Some(json) => serde_json::from_str::<Vec<String>>(json)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("failure_reasons: {e}")))?,
        None => Vec::new(),
    };

    Ok(Document {
        id: DocumentId(row.id),
        owner_id: row.owner_id,
        document_type: DocumentType::from_str(&row.document_type)?,
        canonical_document_id: row.canonical_document_id,
        status: DocumentStatus::from_str(&row.status)?,
        content_address: row.content_address,
        anchor_reference: row.anchor_reference,
        failure_detail: row.failure_detail,
        failure_kind: row
            .failure_kind
            .as_deref()
            .map(FailureKind::from_str)
            .transpose()?,
        failure_reasons,
        size_bytes: row.size_bytes.max(0) as u64,
        attempts: row.attempts.max(0) as u32,
        submitted_at: parse_timestamp("submitted_at", &row.submitted_at)?,
        updated_at: parse_timestamp("updated_at", &row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn new_doc(owner: &str, payload: &[u8]) -> NewDocument {
        NewDocument {
            owner_id: owner.into(),
            document_type: DocumentType::NationalId,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let a = insert_document(&conn, &new_doc("o", b"aaa"), &now).unwrap();
        let b = insert_document(&conn, &new_doc("o", b"bbb"), &now).unwrap();
        assert!(b > a);
    }

    #[test]
    fn inserted_document_starts_pending_and_empty() {
        let conn = open_memory_database().unwrap();
        let id = insert_document(&conn, &new_doc("o", b"payload"), &Utc::now()).unwrap();

        let doc = get_document(&conn, id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.size_bytes, 7);
        assert_eq!(doc.attempts, 1);
        assert!(doc.is_consistent());
        assert_eq!(doc.submitted_at, doc.updated_at);
    }

    #[test]
    fn get_missing_document_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_document(&conn, DocumentId(99)).unwrap().is_none());
    }

    #[test]
    fn payload_is_retrievable() {
        let conn = open_memory_database().unwrap();
        let id = insert_document(&conn, &new_doc("o", b"\x89PNG raw"), &Utc::now()).unwrap();
        assert_eq!(
            get_document_payload(&conn, id).unwrap().unwrap(),
            b"\x89PNG raw".to_vec()
        );
    }

    #[test]
    fn verified_update_sets_all_references() {
        let conn = open_memory_database().unwrap();
        let id = insert_document(&conn, &new_doc("o", b"x"), &Utc::now()).unwrap();

        let update = StatusUpdate::verified("1234 5678 9012", "sha256-abc", "0xdef");
        update_document_status(&conn, id, &update, &Utc::now()).unwrap();

        let doc = get_document(&conn, id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Verified);
        assert_eq!(doc.canonical_document_id.as_deref(), Some("1234 5678 9012"));
        assert_eq!(doc.content_address.as_deref(), Some("sha256-abc"));
        assert_eq!(doc.anchor_reference.as_deref(), Some("0xdef"));
        assert!(doc.is_consistent());
    }

    #[test]
    fn invalid_update_keeps_structured_reasons() {
        let conn = open_memory_database().unwrap();
        let id = insert_document(&conn, &new_doc("o", b"x"), &Utc::now()).unwrap();

        let reasons = vec!["unreadable content".to_string(), "document expired".to_string()];
        update_document_status(
            &conn,
            id,
            &StatusUpdate::invalid(None, reasons.clone()),
            &Utc::now(),
        )
        .unwrap();

        let doc = get_document(&conn, id).unwrap().unwrap();
        assert_eq!(doc.failure_reasons, reasons);
        assert_eq!(
            doc.failure_detail.as_deref(),
            Some("unreadable content, document expired")
        );
        assert_eq!(doc.failure_kind, Some(FailureKind::Validation));
    }

    #[test]
    fn pending_reset_clears_failure_and_counts_attempt() {
        let conn = open_memory_database().unwrap();
        let id = insert_document(&conn, &new_doc("o", b"x"), &Utc::now()).unwrap();
        let failure = Failure::new(FailureKind::Storage, "content store unavailable");
        update_document_status(&conn, id, &StatusUpdate::error(failure, None), &Utc::now())
            .unwrap();

        update_document_status(&conn, id, &StatusUpdate::pending(), &Utc::now()).unwrap();

        let doc = get_document(&conn, id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(doc.failure_detail.is_none());
        assert!(doc.failure_reasons.is_empty());
        assert_eq!(doc.attempts, 2);
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let id = insert_document(&conn, &new_doc("o", b"x"), &now).unwrap();

        let earlier = now - Duration::seconds(60);
        update_document_status(
            &conn,
            id,
            &StatusUpdate::invalid(None, vec!["unreadable content".into()]),
            &earlier,
        )
        .unwrap();

        let doc = get_document(&conn, id).unwrap().unwrap();
        assert_eq!(doc.updated_at, doc.submitted_at);
    }

    #[test]
    fn update_unknown_document_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_document_status(&conn, DocumentId(7), &StatusUpdate::pending(), &Utc::now())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_removes_row_and_second_delete_is_not_found() {
        let conn = open_memory_database().unwrap();
        let id = insert_document(&conn, &new_doc("o", b"x"), &Utc::now()).unwrap();

        delete_document(&conn, id).unwrap();
        assert!(get_document(&conn, id).unwrap().is_none());
        assert!(delete_document(&conn, id).unwrap_err().is_not_found());
    }

    #[test]
    fn list_by_owner_filters_and_orders_newest_first() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let first = insert_document(&conn, &new_doc("alice", b"1"), &now).unwrap();
        insert_document(&conn, &new_doc("bob", b"2"), &now).unwrap();
        let third = insert_document(&conn, &new_doc("alice", b"3"), &now).unwrap();

        let docs = list_documents_by_owner(&conn, "alice").unwrap();
        let ids: Vec<DocumentId> = docs.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![third, first]);
    }

    #[test]
    fn list_by_status_returns_only_matching() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let a = insert_document(&conn, &new_doc("o", b"1"), &now).unwrap();
        let b = insert_document(&conn, &new_doc("o", b"2"), &now).unwrap();
        update_document_status(&conn, a, &StatusUpdate::verified("id", "addr", "ref"), &now)
            .unwrap();

        let pending = list_documents_by_status(&conn, DocumentStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);
    }

    #[test]
    fn stats_reflect_current_rows() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let a = insert_document(&conn, &new_doc("o", b"12345"), &now).unwrap();
        let b = insert_document(&conn, &new_doc("o", b"123"), &now).unwrap();
        let c = insert_document(&conn, &new_doc("o", b"1"), &now).unwrap();
        insert_document(&conn, &new_doc("someone-else", b"zz"), &now).unwrap();

        update_document_status(&conn, a, &StatusUpdate::verified("i1", "a1", "r1"), &now)
            .unwrap();
        update_document_status(&conn, b, &StatusUpdate::verified("i2", "a2", "r2"), &now)
            .unwrap();
        update_document_status(
            &conn,
            c,
            &StatusUpdate::invalid(None, vec!["unreadable content".into()]),
            &now,
        )
        .unwrap();

        let stats = document_stats(&conn, "o").unwrap();
        assert_eq!(
            stats,
            DocumentStats {
                verified_count: 2,
                pending_or_failed_count: 1,
                approx_storage_used: 8,
            }
        );

        delete_document(&conn, a).unwrap();
        let stats = document_stats(&conn, "o").unwrap();
        assert_eq!(stats.verified_count, 1);
        assert_eq!(stats.approx_storage_used, 3);
    }

    #[test]
    fn stats_for_unknown_owner_are_zero() {
        let conn = open_memory_database().unwrap();
        assert_eq!(document_stats(&conn, "nobody").unwrap(), DocumentStats::default());
    }
}
