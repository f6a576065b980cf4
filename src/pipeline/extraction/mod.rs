//! Content extraction: raw document bytes → normalised text.
//!
//! The OCR engine is an external collaborator behind `ContentExtractor`;
//! `SimulatedOcr` stands in for it by sniffing the format from magic bytes
//! and recovering the text layer embedded in the payload.

pub mod types;
pub mod format;
pub mod sanitize;
pub mod ocr;

pub use types::*;
pub use format::*;
pub use sanitize::*;
pub use ocr::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document is empty")]
    EmptyInput,

    #[error("Unreadable {format} content: {reason}")]
    Unreadable { format: String, reason: String },
}
