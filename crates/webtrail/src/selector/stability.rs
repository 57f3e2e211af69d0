//! Text stability heuristics.
//!
//! Recorded text that embeds dates, counts, ids, or greetings will not
//! match on the next run. Unstable text is never used as a standalone
//! match key; it may still disambiguate as a filter on a structural
//! selector.

use std::sync::LazyLock;

use regex::Regex;

static UNSTABLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Long digit runs: ids, timestamps, order numbers
        r"\d{4,}",
        // ISO dates
        r"\d{4}-\d{2}-\d{2}",
        // Email addresses
        r"@[\w.]+",
        // Currency amounts
        r"\$[\d,]+\.?\d*",
        // Dynamic counts
        r"(?i)\d+ (item|result|user|order)s?",
        // Personalized greetings
        r"(?i)welcome .+",
        // Transaction identifiers
        r"(?i)(order|invoice|ticket) #?\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid stability pattern {p}: {e}")))
    .collect()
});

/// True when text is safe to use as a match key across runs.
///
/// Anything shorter than two characters is unstable: single glyphs are
/// icons or bullets, not identities.
#[must_use]
pub fn is_stable_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 2 {
        return false;
    }
    !UNSTABLE_PATTERNS.iter().any(|p| p.is_match(trimmed))
}

/// True when an id/class token looks hand-authored rather than generated.
///
/// The same digit-run heuristics apply, plus a rejection of hash-like
/// tokens (css-modules suffixes, build fingerprints).
#[must_use]
pub fn is_stable_token(token: &str) -> bool {
    if token.len() < 2 {
        return false;
    }
    if UNSTABLE_PATTERNS[0].is_match(token) {
        return false;
    }
    // css-modules style: trailing hash segment of 5+ mixed alphanumerics
    if let Some(tail) = token.rsplit(['-', '_']).next() {
        if tail.len() >= 5
            && tail.chars().all(char::is_alphanumeric)
            && tail.chars().any(|c| c.is_ascii_digit())
            && tail.chars().any(char::is_alphabetic)
        {
            return false;
        }
    }
    true
}
