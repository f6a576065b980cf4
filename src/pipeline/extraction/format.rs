use serde::{Deserialize, Serialize};

/// Payload formats recognised by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Tiff,
    Heic,
    Pdf,
    PlainText,
    Unknown,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Heic => "heic",
            Self::Pdf => "pdf",
            Self::PlainText => "plain_text",
            Self::Unknown => "unknown",
        }
    }

    /// Formats whose text has to be recovered from an embedded text layer.
    pub fn is_binary(&self) -> bool {
        !matches!(self, Self::PlainText)
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect payload format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> SourceFormat {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => SourceFormat::Pdf,
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => SourceFormat::Jpeg,
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => SourceFormat::Png,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => SourceFormat::Tiff,
        // HEIC/HEIF: "ftyp" at offset 4
        _ if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" => SourceFormat::Heic,
        _ if std::str::from_utf8(bytes).is_ok() => SourceFormat::PlainText,
        _ => SourceFormat::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_image_magic_bytes() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), SourceFormat::Jpeg);
        assert_eq!(
            detect_format(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            SourceFormat::Png
        );
        assert_eq!(detect_format(&[0x49, 0x49, 0x2A, 0x00, 0x08]), SourceFormat::Tiff);
        assert_eq!(detect_format(b"\x00\x00\x00\x18ftypheic0000"), SourceFormat::Heic);
    }

    #[test]
    fn detects_pdf() {
        assert_eq!(detect_format(b"%PDF-1.7\n"), SourceFormat::Pdf);
    }

    #[test]
    fn utf8_is_plain_text() {
        assert_eq!(detect_format("GOVERNMENT OF INDIA".as_bytes()), SourceFormat::PlainText);
        assert_eq!(detect_format(b"xx"), SourceFormat::PlainText);
    }

    #[test]
    fn arbitrary_binary_is_unknown() {
        assert_eq!(detect_format(&[0x00, 0xC3, 0x28, 0xA0]), SourceFormat::Unknown);
    }
}
