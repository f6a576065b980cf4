/// Minimum length of a printable run recovered from a binary payload.
/// Shorter runs are almost always noise from compressed image data.
pub const MIN_TEXT_RUN: usize = 4;

/// Sanitize extracted text before passing downstream.
/// Strips control characters, collapses all whitespace to single spaces and
/// uppercases, so identifier patterns see one canonical spelling.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Printable ASCII runs of at least `min_len` bytes embedded in a binary
/// payload (the text layer of a scanned image or PDF).
pub fn printable_runs(bytes: &[u8], min_len: usize) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = Vec::new();

    for &b in bytes {
        if b == b' ' || b.is_ascii_graphic() {
            current.push(b);
        } else {
            flush_run(&mut current, &mut runs, min_len);
        }
    }
    flush_run(&mut current, &mut runs, min_len);
    runs
}

fn flush_run(current: &mut Vec<u8>, runs: &mut Vec<String>, min_len: usize) {
    let trimmed = current.trim_ascii();
    if trimmed.len() >= min_len {
        runs.push(String::from_utf8_lossy(trimmed).into_owned());
    }
    current.clear();
}
