//! Author-time selector ranking.
//!
//! At build time every click target carries a bag of recorded facts
//! (test id, id, role, text, classes, input attributes). The ladder here
//! turns those facts into an ordered candidate list, most durable first:
//! explicit test hooks, then semantic identity, then structure, then
//! text, then whatever the recorder guessed, then bare tags.

use tracing::debug;

use crate::action::Locator;
use crate::telemetry::ElementSelectors;

use super::resolve::role_to_css;
use super::stability::{is_stable_text, is_stable_token};

const GENERIC_TAGS: &[&str] = &["html", "body", "div", "span", "p"];

/// Ordered selector candidates for a recorded element, most durable
/// first. Uniqueness is NOT checked here; the refinement pass validates
/// candidates against the live document.
#[must_use]
pub fn selector_candidates(facts: &ElementSelectors) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    // 1. Explicit test hook
    if let Some(test_id) = facts.test_id.as_deref().filter(|v| !v.is_empty()) {
        push(format!("[data-testid=\"{test_id}\"]"));
    }

    // 2. Hand-authored id
    if let Some(id) = facts.id.as_deref().filter(|v| is_stable_token(v)) {
        push(format!("#{id}"));
    }

    // 3. Role + stable accessible name
    let stable_text = facts
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| is_stable_text(t));
    if let (Some(role), Some(text)) = (facts.role.as_deref(), stable_text) {
        push(format!("role:{role}[name=\"{text}\"]"));
    }

    // 4. aria-label
    if let Some(label) = facts.aria_label.as_deref().filter(|v| is_stable_text(v)) {
        push(format!("[aria-label=\"{label}\"]"));
    }

    // 5. Input identity
    if let Some(tag) = facts.tag_name.as_deref() {
        if matches!(tag, "input" | "select" | "textarea") {
            let mut selector = tag.to_string();
            if let Some(input_type) = facts.input_type.as_deref().filter(|v| !v.is_empty()) {
                selector.push_str(&format!("[type=\"{input_type}\"]"));
            }
            if let Some(name) = facts.input_name.as_deref().filter(|v| !v.is_empty()) {
                selector.push_str(&format!("[name=\"{name}\"]"));
            }
            if selector.len() > tag.len() {
                push(selector);
            }
        }
    }

    // 6. Role-derived CSS, first match
    if let Some(role) = facts.role.as_deref() {
        if let Some(css) = role_to_css(role) {
            push(format!("{css}:first"));
        }
    }

    // 7. Tag + stable classes, optionally narrowed by text
    if let Some(tag) = facts.tag_name.as_deref().filter(|t| !t.is_empty()) {
        let stable_classes: Vec<&str> = facts
            .classes
            .iter()
            .map(String::as_str)
            .filter(|c| is_stable_token(c))
            .collect();
        if !stable_classes.is_empty() {
            let base = format!("{tag}.{}", stable_classes.join("."));
            match stable_text {
                Some(text) => push(format!("{base}:filter-text(\"{text}\")")),
                None => push(format!("{base}:first")),
            }
        }
    }

    // 8. Stable free text
    if let Some(text) = stable_text {
        push(format!("getByText:{text}"));
    }

    // 9. Recorder guesses, validated later
    if !facts.primary.is_empty() {
        push(facts.primary.clone());
    }
    for fallback in &facts.fallbacks {
        push(fallback.clone());
    }

    // 10. Bare tag, then the document itself
    if let Some(tag) = facts.tag_name.as_deref().filter(|t| !t.is_empty()) {
        if !GENERIC_TAGS.contains(&tag) {
            push(format!("{tag}:first"));
        }
    }
    push("body".to_string());

    out
}

/// Build a locator for a recorded click, or None when the capture holds
/// nothing at all to go on.
#[must_use]
pub fn locator_for_click(facts: &ElementSelectors) -> Option<Locator> {
    let mut candidates = selector_candidates(facts);
    // "body" alone means the recorder saw nothing identifying.
    if candidates.len() == 1 && candidates[0] == "body" && facts.tag_name.is_none() {
        debug!("click capture carries no usable element facts");
        return None;
    }
    let primary = candidates.remove(0);
    candidates.truncate(3);
    Some(Locator {
        primary,
        fallbacks: candidates,
        role: facts.role.clone(),
        text: facts
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string),
        tag_name: facts.tag_name.clone(),
        stable_selector: None,
    })
}
