use std::fmt::Write;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{AnchorError, LedgerAnchor, LedgerEntry};
use crate::models::DocumentType;

/// Reference of the (virtual) entry preceding the first one.
pub const GENESIS_REFERENCE: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

struct ChainEntry {
    entry: LedgerEntry,
    nonce: Uuid,
}

/// In-memory hash chain standing in for a distributed ledger.
///
/// Each reference is the SHA-256 of the previous reference, the sequence
/// number, a random nonce and the payload, hex-encoded with a `0x` prefix.
pub struct SimulatedLedger {
    chain: Mutex<Vec<ChainEntry>>,
    latency: Duration,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl SimulatedLedger {
    pub fn new(latency: Duration) -> Self {
        Self {
            chain: Mutex::new(Vec::new()),
            latency,
        }
    }

    pub fn len(&self) -> usize {
        self.chain.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute every link. False if any entry was altered.
    pub fn verify_chain(&self) -> Result<bool, AnchorError> {
        let chain = self.chain.lock().map_err(|_| AnchorError::LockPoisoned)?;
        let mut previous = GENESIS_REFERENCE.to_string();
        for link in chain.iter() {
            let e = &link.entry;
            let expected = chain_hash(
                &previous,
                e.sequence,
                &link.nonce,
                &e.canonical_document_id,
                e.document_type,
                &e.content_address,
            );
            if e.previous_reference != previous || e.reference != expected {
                return Ok(false);
            }
            previous = e.reference.clone();
        }
        Ok(true)
    }
}

fn chain_hash(
    previous: &str,
    sequence: u64,
    nonce: &Uuid,
    canonical_document_id: &str,
    document_type: DocumentType,
    content_address: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous.as_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(canonical_document_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(document_type.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(content_address.as_bytes());

    let digest = hasher.finalize();
    let mut out = String::with_capacity(2 + digest.len() * 2);
    out.push_str("0x");
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

impl LedgerAnchor for SimulatedLedger {
    fn anchor(
        &self,
        canonical_document_id: &str,
        document_type: DocumentType,
        content_address: &str,
    ) -> Result<String, AnchorError> {
        if canonical_document_id.is_empty() || content_address.is_empty() {
            return Err(AnchorError::Rejected("empty identifier or address".into()));
        }

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let mut chain = self.chain.lock().map_err(|_| AnchorError::LockPoisoned)?;
        let previous = chain
            .last()
            .map(|c| c.entry.reference.clone())
            .unwrap_or_else(|| GENESIS_REFERENCE.to_string());
        let sequence = chain.len() as u64;
        let nonce = Uuid::new_v4();
        let reference = chain_hash(
            &previous,
            sequence,
            &nonce,
            canonical_document_id,
            document_type,
            content_address,
        );

        chain.push(ChainEntry {
            entry: LedgerEntry {
                sequence,
                reference: reference.clone(),
                previous_reference: previous,
                canonical_document_id: canonical_document_id.to_string(),
                document_type,
                content_address: content_address.to_string(),
                recorded_at: Utc::now(),
            },
            nonce,
        });

        tracing::debug!(sequence, reference = %reference, "Ledger entry appended");
        Ok(reference)
    }

    fn lookup(&self, reference: &str) -> Result<Option<LedgerEntry>, AnchorError> {
        let chain = self.chain.lock().map_err(|_| AnchorError::LockPoisoned)?;
        Ok(chain
            .iter()
            .find(|c| c.entry.reference == reference)
            .map(|c| c.entry.clone()))
    }
}
