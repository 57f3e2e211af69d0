//! Replay-time selector resolution.
//!
//! Resolution is a ladder, not a lookup: direct CSS first, then typed
//! expression evaluation, then structural decomposition of whatever
//! identifying fragments the selector or locator still carries, and as a
//! last resort the first interactive element on the page. Recordings
//! survive selector drift because each rung tolerates a different kind
//! of rot.

use tracing::{debug, warn};

use crate::action::Locator;
use crate::dom::{collapse_whitespace, Dom, NodeId};

use super::stability::is_stable_text;
use super::{parse, SelectorExpr, SelectorFilter, SelectorIndex};

/// CSS equivalent for the ARIA roles the ladder understands.
///
/// Unknown roles fall through to a plain `[role="…"]` attribute query.
#[must_use]
pub fn role_to_css(role: &str) -> Option<&'static str> {
    Some(match role {
        "button" => "button, [role=\"button\"]",
        "heading" => "h1, h2, h3, h4, h5, h6",
        "link" => "a, [role=\"link\"]",
        "textbox" => {
            "input[type=\"text\"], input[type=\"email\"], input[type=\"password\"], textarea"
        }
        "checkbox" => "input[type=\"checkbox\"]",
        "radio" => "input[type=\"radio\"]",
        "listitem" => "li",
        "list" => "ul, ol",
        "img" => "img",
        "table" => "table",
        "row" => "tr",
        "cell" => "td, th",
        "menu" => "[role=\"menu\"]",
        "menuitem" => "[role=\"menuitem\"]",
        "dialog" => "dialog, [role=\"dialog\"]",
        "alert" => "[role=\"alert\"]",
        "tab" => "[role=\"tab\"]",
        "tabpanel" => "[role=\"tabpanel\"]",
        _ => return None,
    })
}

fn role_css(role: &str) -> String {
    role_to_css(role).map_or_else(|| format!("[role=\"{role}\"]"), ToString::to_string)
}

/// Accessible name approximation: aria-label, label association,
/// placeholder, value/alt/title, then visible text.
fn accessible_name(dom: &dyn Dom, node: NodeId) -> String {
    if let Some(label) = dom.attribute(node, "aria-label") {
        return collapse_whitespace(&label);
    }
    let tag = dom.tag_name(node);
    if matches!(tag.as_str(), "input" | "select" | "textarea") {
        if let Some(id) = dom.attribute(node, "id") {
            for label in dom.query_all("label") {
                if dom.attribute(label, "for").as_deref() == Some(id.as_str()) {
                    return dom.text_content(label);
                }
            }
        }
        let mut parent = dom.parent(node);
        while let Some(p) = parent {
            if dom.tag_name(p) == "label" {
                return dom.text_content(p);
            }
            parent = dom.parent(p);
        }
        if let Some(placeholder) = dom.attribute(node, "placeholder") {
            return collapse_whitespace(&placeholder);
        }
        if let Some(value) = dom.attribute(node, "value") {
            return collapse_whitespace(&value);
        }
    }
    if let Some(alt) = dom.attribute(node, "alt") {
        return collapse_whitespace(&alt);
    }
    let text = dom.text_content(node);
    if text.is_empty() {
        dom.attribute(node, "title")
            .map(|t| collapse_whitespace(&t))
            .unwrap_or_default()
    } else {
        text
    }
}

/// Compile a `/pattern/flags` or bare pattern into a regex.
fn compile_pattern(pattern: &str) -> Option<regex::Regex> {
    let (body, flags) = pattern
        .strip_prefix('/')
        .and_then(|rest| rest.rfind('/').map(|i| (&rest[..i], &rest[i + 1..])))
        .unwrap_or((pattern, ""));
    let prefixed = if flags.contains('i') {
        format!("(?i){body}")
    } else {
        body.to_string()
    };
    match regex::Regex::new(&prefixed) {
        Ok(re) => Some(re),
        Err(e) => {
            debug!(pattern, error = %e, "unusable selector regex");
            None
        }
    }
}

fn doc_position(dom: &dyn Dom) -> impl Fn(NodeId) -> usize {
    let order = dom.all_nodes();
    move |node| order.iter().position(|&n| n == node).unwrap_or(usize::MAX)
}

/// Keep only the deepest elements of a match set: a container whose
/// descendant also matched is noise, the descendant is the real target.
fn deepest_only(dom: &dyn Dom, matches: Vec<NodeId>) -> Vec<NodeId> {
    matches
        .iter()
        .copied()
        .filter(|&node| {
            !matches
                .iter()
                .any(|&other| other != node && dom.is_descendant_of(other, node))
        })
        .collect()
}

fn text_matches(dom: &dyn Dom, needle: &str, exact: bool) -> Vec<NodeId> {
    let needle = collapse_whitespace(needle);
    let candidates: Vec<NodeId> = dom
        .all_nodes()
        .into_iter()
        .filter(|&node| {
            let text = dom.text_content(node);
            if text.is_empty() {
                return false;
            }
            if exact {
                text == needle
            } else {
                // Containers matching by sheer volume are excluded; a
                // text lookup means a label-sized element or a control.
                text.contains(needle.as_str()) && (dom.is_interactive(node) || text.len() <= 100)
            }
        })
        .collect();
    deepest_only(dom, candidates)
}

/// Evaluate an expression tree, document order.
pub(crate) fn eval(dom: &dyn Dom, expr: &SelectorExpr) -> Vec<NodeId> {
    match expr {
        SelectorExpr::Css(css) => dom.query_all(css),
        SelectorExpr::Role {
            role,
            name,
            name_regex,
        } => {
            let mut matches = dom.query_all(&role_css(role));
            if let Some(name) = name {
                let want = collapse_whitespace(name);
                matches.retain(|&n| accessible_name(dom, n) == want);
            } else if let Some(pattern) = name_regex {
                match compile_pattern(pattern) {
                    Some(re) => matches.retain(|&n| re.is_match(&accessible_name(dom, n))),
                    None => matches.clear(),
                }
            }
            matches
        }
        SelectorExpr::Text { text, exact } => text_matches(dom, text, *exact),
        SelectorExpr::TextRegex(pattern) => match compile_pattern(pattern) {
            Some(re) => {
                let candidates: Vec<NodeId> = dom
                    .all_nodes()
                    .into_iter()
                    .filter(|&node| {
                        let text = dom.text_content(node);
                        !text.is_empty()
                            && re.is_match(&text)
                            && (dom.is_interactive(node) || text.len() <= 100)
                    })
                    .collect();
                deepest_only(dom, candidates)
            }
            None => Vec::new(),
        },
        SelectorExpr::TestId(value) => dom.query_all(&format!("[data-testid=\"{value}\"]")),
        SelectorExpr::Label(value) => {
            let want = collapse_whitespace(value);
            let mut out = Vec::new();
            for label in dom.query_all("label") {
                if !dom.text_content(label).contains(want.as_str()) {
                    continue;
                }
                if let Some(target) = dom.attribute(label, "for") {
                    if let Some(node) = dom.query(&format!("#{target}")) {
                        out.push(node);
                        continue;
                    }
                }
                out.extend(dom.query_all("input, select, textarea").into_iter().filter(
                    |&candidate| dom.is_descendant_of(candidate, label),
                ));
            }
            if out.is_empty() {
                out = dom.query_all(&format!("[aria-label=\"{value}\"]"));
            }
            out
        }
        SelectorExpr::Placeholder(value) => dom.query_all(&format!("[placeholder=\"{value}\"]")),
        SelectorExpr::Title(value) => dom.query_all(&format!("[title=\"{value}\"]")),
        SelectorExpr::AltText(value) => dom.query_all(&format!("[alt=\"{value}\"]")),
        SelectorExpr::XPath(expr) => {
            warn!(xpath = expr, "xpath evaluation unsupported, treating as a miss");
            Vec::new()
        }
        SelectorExpr::Filter { base, filter } => {
            let candidates = eval(dom, base);
            match filter {
                SelectorFilter::Text(needle) | SelectorFilter::HasText(needle) => {
                    let needle = collapse_whitespace(needle);
                    candidates
                        .into_iter()
                        .filter(|&n| dom.text_content(n).contains(needle.as_str()))
                        .collect()
                }
                SelectorFilter::Regex(pattern) => match compile_pattern(pattern) {
                    Some(re) => candidates
                        .into_iter()
                        .filter(|&n| re.is_match(&dom.text_content(n)))
                        .collect(),
                    None => Vec::new(),
                },
                SelectorFilter::Has(inner) => {
                    let inner_matches = eval(dom, inner);
                    candidates
                        .into_iter()
                        .filter(|&n| {
                            inner_matches.iter().any(|&m| dom.is_descendant_of(m, n))
                        })
                        .collect()
                }
                SelectorFilter::HasNot(inner) => {
                    let inner_matches = eval(dom, inner);
                    candidates
                        .into_iter()
                        .filter(|&n| {
                            !inner_matches.iter().any(|&m| dom.is_descendant_of(m, n))
                        })
                        .collect()
                }
            }
        }
        SelectorExpr::Index { base, index } => {
            let candidates = eval(dom, base);
            let chosen = match index {
                SelectorIndex::First => candidates.first().copied(),
                SelectorIndex::Last => candidates.last().copied(),
                SelectorIndex::Nth(n) => candidates.get(*n).copied(),
            };
            chosen.into_iter().collect()
        }
        SelectorExpr::And(lhs, rhs) => {
            let right = eval(dom, rhs);
            eval(dom, lhs)
                .into_iter()
                .filter(|n| right.contains(n))
                .collect()
        }
        SelectorExpr::Or(lhs, rhs) => {
            let mut out = eval(dom, lhs);
            for node in eval(dom, rhs) {
                if !out.contains(&node) {
                    out.push(node);
                }
            }
            let position = doc_position(dom);
            out.sort_by_key(|&n| position(n));
            out
        }
        SelectorExpr::Within(scope, target) => {
            let scopes = eval(dom, scope);
            eval(dom, target)
                .into_iter()
                .filter(|&n| scopes.iter().any(|&s| dom.is_descendant_of(n, s)))
                .collect()
        }
    }
}

fn first_visible(dom: &dyn Dom, matches: &[NodeId]) -> Option<NodeId> {
    matches
        .iter()
        .copied()
        .find(|&n| dom.is_visible(n))
        .or_else(|| matches.first().copied())
}

/// Resolve one selector string: direct CSS, then typed evaluation, then
/// structural decomposition of the string's identifying fragments.
#[must_use]
pub fn resolve(dom: &dyn Dom, selector: &str) -> Option<NodeId> {
    // Rung 1: the selector may simply still work.
    let direct = dom.query_all(selector);
    if !direct.is_empty() {
        return first_visible(dom, &direct);
    }

    // Rung 2: typed evaluation.
    match parse(selector) {
        Ok(expr) => {
            let matches = eval(dom, &expr);
            if !matches.is_empty() {
                return first_visible(dom, &matches);
            }
            // Rung 3: the expression missed wholesale; mine it for
            // fragments that may survive on their own.
            resolve_fragments(dom, &expr)
        }
        Err(e) => {
            debug!(selector, error = %e, "selector did not parse, no typed evaluation");
            None
        }
    }
}

/// Try each identifying fragment of a failed expression independently.
fn resolve_fragments(dom: &dyn Dom, expr: &SelectorExpr) -> Option<NodeId> {
    let mut fragments: Vec<String> = Vec::new();
    collect_fragments(expr, &mut fragments);
    for fragment in fragments {
        let matches = dom.query_all(&fragment);
        // A fragment is only trustworthy when it is unambiguous.
        if matches.len() == 1 {
            return Some(matches[0]);
        }
    }
    None
}

fn collect_fragments(expr: &SelectorExpr, out: &mut Vec<String>) {
    match expr {
        SelectorExpr::Css(css) => {
            for piece in css_fragments(css) {
                if !out.contains(&piece) {
                    out.push(piece);
                }
            }
        }
        SelectorExpr::TestId(value) => out.push(format!("[data-testid=\"{value}\"]")),
        SelectorExpr::Role { role, .. } => out.push(role_css(role)),
        SelectorExpr::Filter { base, .. } | SelectorExpr::Index { base, .. } => {
            collect_fragments(base, out);
        }
        SelectorExpr::And(lhs, rhs)
        | SelectorExpr::Or(lhs, rhs)
        | SelectorExpr::Within(lhs, rhs) => {
            collect_fragments(lhs, out);
            collect_fragments(rhs, out);
        }
        _ => {}
    }
}

/// Identifying fragments of a CSS selector: test id and aria-label
/// attributes, ids, then single classes.
fn css_fragments(css: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = css;
    while let Some(open) = rest.find('[') {
        if let Some(close) = rest[open..].find(']') {
            let attr = &rest[open..=open + close];
            if attr.starts_with("[data-testid") || attr.starts_with("[aria-label") {
                out.push(attr.to_string());
            }
            rest = &rest[open + close + 1..];
        } else {
            break;
        }
    }
    let mut chars = css.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '#' || c == '.' {
            let tail: String = css[i + 1..]
                .chars()
                .take_while(|ch| ch.is_alphanumeric() || *ch == '-' || *ch == '_')
                .collect();
            if !tail.is_empty() {
                out.push(format!("{c}{tail}"));
            }
        }
        let _ = i;
    }
    out
}

/// Resolve a full locator: confirmed-stable selector first, then the
/// primary and fallbacks, then the locator's structural hints, then the
/// first interactive element on the page.
#[must_use]
pub fn resolve_locator(dom: &dyn Dom, locator: &Locator) -> Option<NodeId> {
    for candidate in locator.candidates() {
        if let Some(node) = resolve(dom, candidate) {
            return Some(node);
        }
    }

    // Hints survive even when every selector string has rotted.
    if let (Some(role), Some(text)) = (locator.role.as_deref(), locator.text.as_deref()) {
        let expr = SelectorExpr::Role {
            role: role.to_string(),
            name: Some(text.to_string()),
            name_regex: None,
        };
        let matches = eval(dom, &expr);
        if let Some(node) = first_visible(dom, &matches) {
            return Some(node);
        }
    }
    // Free text only counts when it is stable; volatile text ("Order
    // 123456") may narrow a structural match but never stands alone.
    if let Some(text) = locator.text.as_deref() {
        if is_stable_text(text) {
            let matches = text_matches(dom, text, false);
            if let Some(node) = first_visible(dom, &matches) {
                return Some(node);
            }
        }
    }
    if let Some(tag) = locator.tag_name.as_deref() {
        let matches = dom.query_all(tag);
        if matches.len() == 1 {
            return Some(matches[0]);
        }
    }

    debug!(
        primary = locator.primary,
        "locator exhausted, falling back to first interactive element"
    );
    let interactive = dom.query_all("button, a, input, select, textarea");
    first_visible(dom, &interactive)
}
