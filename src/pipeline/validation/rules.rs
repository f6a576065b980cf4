use std::sync::LazyLock;

use regex::Regex;

use crate::models::DocumentType;

/// Identifier pattern and required boilerplate for one document type.
///
/// `canonical` is a regex replacement template applied to the first match;
/// it rebuilds the identifier in one spelling regardless of the separators
/// present on the scan.
pub struct IdentifierRule {
    pub document_type: DocumentType,
    pub pattern: Regex,
    pub canonical: &'static str,
    pub required_phrases: &'static [&'static str],
}

impl IdentifierRule {
    /// First identifier in `text`, in canonical form.
    pub fn find_identifier(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let mut out = String::new();
        caps.expand(self.canonical, &mut out);
        Some(out)
    }

    /// Required phrases absent from `text`, in table order.
    pub fn missing_phrases<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.required_phrases
            .iter()
            .copied()
            .filter(move |phrase| !text.contains(phrase))
    }
}

/// One row per document type, in `DocumentType::ALL` order.
static RULES: LazyLock<[IdentifierRule; 5]> = LazyLock::new(|| {
    [
        IdentifierRule {
            document_type: DocumentType::NationalId,
            pattern: Regex::new(r"\b([0-9]{4})\s?([0-9]{4})\s?([0-9]{4})\b").unwrap(),
            canonical: "$1 $2 $3",
            required_phrases: &["GOVERNMENT OF INDIA"],
        },
        IdentifierRule {
            document_type: DocumentType::TaxId,
            pattern: Regex::new(r"\b([A-Z]{5}[0-9]{4}[A-Z])\b").unwrap(),
            canonical: "$1",
            required_phrases: &["INCOME TAX DEPARTMENT"],
        },
        IdentifierRule {
            document_type: DocumentType::DrivingPermit,
            pattern: Regex::new(r"\b([A-Z]{2}[0-9]{2})[ -]?([0-9]{11})\b").unwrap(),
            canonical: "$1 $2",
            required_phrases: &["DRIVING LICENCE"],
        },
        IdentifierRule {
            document_type: DocumentType::Passport,
            pattern: Regex::new(r"\b([A-Z][0-9]{7})\b").unwrap(),
            canonical: "$1",
            required_phrases: &["PASSPORT", "REPUBLIC OF INDIA"],
        },
        IdentifierRule {
            document_type: DocumentType::VoterId,
            pattern: Regex::new(r"\b([A-Z]{3}[0-9]{7})\b").unwrap(),
            canonical: "$1",
            required_phrases: &["ELECTION COMMISSION OF INDIA"],
        },
    ]
});

/// Rule for `document_type`. Adding a type means adding a row above.
pub fn rule_for(document_type: DocumentType) -> &'static IdentifierRule {
    let row = match document_type {
        DocumentType::NationalId => 0,
        DocumentType::TaxId => 1,
        DocumentType::DrivingPermit => 2,
        DocumentType::Passport => 3,
        DocumentType::VoterId => 4,
    };
    &RULES[row]
}
