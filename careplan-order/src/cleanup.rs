use regex::Regex;
use std::sync::LazyLock;

static SIGNATURE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Date:\s*\d{4}-\d{2}-\d{2}").unwrap());

/// Conversational filler that models sometimes append after the signature.
const FILLER_MARKERS: [&str; 9] = [
    "this care plan is intended to be used",
    "if you want, i will prepare",
    "if you want, i can",
    "if you need, i will",
    "if you need, i can",
    "would you like me to",
    "let me know if you",
    "i can also create",
    "i will also prepare",
];

/// Cuts trailing conversational text that follows the signature date line.
///
/// Only lines after the last `Date: YYYY-MM-DD` line are scanned. Without a
/// signature nothing is cut and the text is just trimmed.
pub fn clean_care_plan(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let signature = lines
        .iter()
        .rposition(|line| SIGNATURE_DATE_RE.is_match(line))
        .unwrap_or(lines.len().saturating_sub(1));

    for (i, line) in lines.iter().enumerate().skip(signature + 1) {
        let lower = line.trim().to_lowercase();
        if FILLER_MARKERS.iter().any(|m| lower.contains(m)) {
            tracing::debug!(line = i, "Removing conversational ending from care plan");
            return lines[..i].join("\n").trim().to_string();
        }
    }
    text.trim().to_string()
}
