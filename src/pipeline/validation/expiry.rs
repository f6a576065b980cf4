use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// An expiry marker followed by a date. Longer markers come first so that
/// "DATE OF EXPIRY" is not read as a bare "EXPIRY".
static EXPIRY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:DATE OF EXPIRY|EXPIRY DATE|EXPIRY|EXPIRES ON|EXPIRES|VALID (?:UNTIL|TILL|UPTO))\s*[:\-]?\s*(\d{2}[/.\-]\d{2}[/.\-]\d{4}|\d{4}-\d{2}-\d{2})",
    )
    .unwrap()
});

const DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Every parseable expiry date printed in `text`, in order of appearance.
pub fn expiry_dates(text: &str) -> Vec<NaiveDate> {
    EXPIRY_MARKER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| parse_date(m.as_str()))
        .collect()
}

/// True when any printed expiry date lies strictly before `today`.
pub fn is_expired(text: &str, today: NaiveDate) -> bool {
    expiry_dates(text).into_iter().any(|date| date < today)
}
