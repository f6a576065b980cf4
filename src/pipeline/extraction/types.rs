use serde::{Deserialize, Serialize};

use super::format::SourceFormat;
use super::ExtractionError;
use crate::models::DocumentType;

/// Normalised text recovered from a document payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub format: SourceFormat,
}

impl ExtractedText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// OCR engine abstraction (allows mocking for tests).
///
/// Must be deterministic for identical inputs and free of side effects
/// beyond reading the input.
pub trait ContentExtractor: Send + Sync {
    fn extract(
        &self,
        bytes: &[u8],
        document_type: DocumentType,
    ) -> Result<ExtractedText, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extractor_is_object_safe() {
        fn _assert(_: &dyn ContentExtractor) {}
    }

    #[test]
    fn char_count_counts_unicode_scalars() {
        let extracted = ExtractedText {
            text: "ÉTAT 12".into(),
            format: SourceFormat::PlainText,
        };
        assert_eq!(extracted.char_count(), 7);
    }
}
