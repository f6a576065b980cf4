//! Validation: extracted text → canonical identifier or a list of reasons.
//!
//! Checks run in a fixed order and every failing check contributes a reason,
//! so a rejected document reports all its defects at once.

pub mod expiry;
pub mod rules;

pub use expiry::*;
pub use rules::*;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::DocumentType;
use crate::pipeline::extraction::sanitize_extracted_text;

/// Below this many characters the text cannot hold a real identity document.
pub const MIN_PLAUSIBLE_CHARS: usize = 20;

pub const REASON_UNREADABLE: &str = "unreadable content";
pub const REASON_EXPIRED: &str = "document expired";

/// Prefix of identifiers synthesised in relaxed mode.
pub const SYNTHETIC_ID_PREFIX: &str = "UNVERIFIED-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid {
        canonical_document_id: String,
        identifier_synthesized: bool,
    },
    /// `canonical_document_id` is kept when the identifier was found but
    /// another check failed.
    Invalid {
        reasons: Vec<String>,
        canonical_document_id: Option<String>,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Missing identifier is a rejection.
    #[default]
    Strict,
    /// Missing identifier is replaced by an `UNVERIFIED-<uuid>` placeholder.
    Relaxed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    mode: ValidationMode,
}

impl Validator {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn validate(&self, text: &str, document_type: DocumentType) -> ValidationOutcome {
        self.validate_on(text, document_type, Utc::now().date_naive())
    }

    /// Validate against an explicit calendar date (expiry checks).
    pub fn validate_on(
        &self,
        text: &str,
        document_type: DocumentType,
        today: NaiveDate,
    ) -> ValidationOutcome {
        let text = sanitize_extracted_text(text);
        let mut reasons = Vec::new();

        if text.chars().count() < MIN_PLAUSIBLE_CHARS {
            reasons.push(REASON_UNREADABLE.to_string());
        }

        let rule = rules::rule_for(document_type);

        let mut identifier_synthesized = false;
        let canonical = match rule.find_identifier(&text) {
            Some(id) => Some(id),
            None if self.mode == ValidationMode::Relaxed => {
                identifier_synthesized = true;
                let placeholder = format!("{SYNTHETIC_ID_PREFIX}{}", Uuid::new_v4());
                tracing::warn!(
                    document_type = document_type.as_str(),
                    placeholder = %placeholder,
                    "No identifier found, synthesised placeholder (relaxed mode)"
                );
                Some(placeholder)
            }
            None => {
                reasons.push(format!("missing identifier for {}", document_type.label()));
                None
            }
        };

        if expiry::is_expired(&text, today) {
            reasons.push(REASON_EXPIRED.to_string());
        }

        for phrase in rule.missing_phrases(&text) {
            reasons.push(format!(
                "missing expected text \"{phrase}\" for {}",
                document_type.label()
            ));
        }

        match canonical {
            Some(canonical_document_id) if reasons.is_empty() => ValidationOutcome::Valid {
                canonical_document_id,
                identifier_synthesized,
            },
            canonical_document_id => ValidationOutcome::Invalid {
                reasons,
                canonical_document_id: canonical_document_id.filter(|_| !identifier_synthesized),
            },
        }
    }
}
