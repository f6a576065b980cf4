use std::time::Duration;

use rand::Rng;

use super::format::{detect_format, SourceFormat};
use super::sanitize::{printable_runs, sanitize_extracted_text, MIN_TEXT_RUN};
use super::types::{ContentExtractor, ExtractedText};
use super::ExtractionError;
use crate::models::DocumentType;

/// Stand-in for an external OCR service.
///
/// Plain-text payloads are read directly; binary payloads (scans, photos,
/// PDFs) yield the text layer embedded in them. The output depends only on
/// the input bytes. `latency` simulates the remote call; `jitter` adds up to
/// that much extra random delay.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOcr {
    latency: Duration,
    jitter: Duration,
}

impl SimulatedOcr {
    pub fn new(latency: Duration, jitter: Duration) -> Self {
        Self { latency, jitter }
    }

    /// No artificial delay (for testing).
    pub fn instant() -> Self {
        Self::default()
    }

    fn simulate_latency(&self) {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        let total = self.latency + extra;
        if !total.is_zero() {
            std::thread::sleep(total);
        }
    }
}

impl ContentExtractor for SimulatedOcr {
    fn extract(
        &self,
        bytes: &[u8],
        document_type: DocumentType,
    ) -> Result<ExtractedText, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        self.simulate_latency();

        let format = detect_format(bytes);
        let raw = match format {
            SourceFormat::PlainText => String::from_utf8_lossy(bytes).into_owned(),
            _ => printable_runs(bytes, MIN_TEXT_RUN).join(" "),
        };
        let text = sanitize_extracted_text(&raw);

        // Blank plain text is left for the validator's plausibility check.
        if text.is_empty() && format.is_binary() {
            return Err(ExtractionError::Unreadable {
                format: format.to_string(),
                reason: "no text layer could be recovered".into(),
            });
        }

        tracing::debug!(
            document_type = document_type.as_str(),
            format = format.as_str(),
            chars = text.chars().count(),
            "Text extracted"
        );

        Ok(ExtractedText { text, format })
    }
}
