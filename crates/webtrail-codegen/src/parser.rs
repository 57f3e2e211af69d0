//! Best-effort Playwright test source parser.
//!
//! Line-oriented: each statement the parser recognizes becomes one
//! [`PlaywrightAction`]; anything else is logged and skipped so a
//! hand-edited file with unsupported constructs still yields the
//! actions it does contain. Locator call chains fold back into the
//! persisted selector micro-syntax, so a parsed file replays through
//! the same resolution ladder as a recorded one.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::ast::{ActionType, Expectation, PlaywrightAction};
use crate::error::{CodegenError, Result};

static VAR_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^const\s+(\w+)\s*=\s*(.+)$").expect("static pattern"));
static STRING_LIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^'\\]|\\.)*)'").expect("static pattern"));
static NAME_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name:\s*'((?:[^'\\]|\\.)*)'").expect("static pattern"));
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name:\s*(/(?:[^/\\]|\\.)*/[a-z]*)").expect("static pattern"));
static HAS_TEXT_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"hasText:\s*'((?:[^'\\]|\\.)*)'").expect("static pattern"));
static HAS_TEXT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"hasText:\s*(/(?:[^/\\]|\\.)*/[a-z]*)").expect("static pattern")
});
static HAS_NOT_INNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"hasNot:\s*(.+?)\s*\}$").expect("static pattern"));
static HAS_INNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"has:\s*(.+?)\s*\}$").expect("static pattern"));
static EXACT_TRUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"exact:\s*true").expect("static pattern"));
static VIEWPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"width:\s*(\d+),\s*height:\s*(\d+)").expect("static pattern"));

/// Parse Playwright test source into statements, skipping what it
/// cannot read.
#[must_use]
pub fn parse(source: &str) -> Vec<PlaywrightAction> {
    parse_counting(source).0
}

/// Like [`parse`], but errors when non-trivial source produced no
/// actions at all.
pub fn parse_strict(source: &str) -> Result<Vec<PlaywrightAction>> {
    let (actions, examined) = parse_counting(source);
    if actions.is_empty() {
        return Err(CodegenError::EmptyTest { lines: examined });
    }
    Ok(actions)
}

fn parse_counting(source: &str) -> (Vec<PlaywrightAction>, usize) {
    let mut actions = Vec::new();
    let mut vars: HashMap<String, String> = HashMap::new();
    let mut examined = 0usize;
    let mut lines = source.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let line_number = idx + 1;
        let (stmt, comment) = split_comment(line);
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        examined += 1;
        if is_structural(stmt) {
            continue;
        }

        if stmt == "await Promise.all([" {
            // Collect the bracketed statements, then emit the action
            // before its navigation wait regardless of source order.
            let mut inner: Vec<PlaywrightAction> = Vec::new();
            for (inner_idx, inner_line) in lines.by_ref() {
                let (inner_stmt, inner_comment) = split_comment(inner_line);
                let inner_stmt = inner_stmt.trim();
                if inner_stmt.starts_with("])") {
                    break;
                }
                if inner_stmt.is_empty() {
                    continue;
                }
                examined += 1;
                if let Some(mut action) = parse_statement(inner_stmt, inner_idx + 1, &vars) {
                    action.comment = inner_comment.map(ToString::to_string);
                    inner.push(action);
                } else {
                    warn!(line = inner_idx + 1, "unrecognized statement skipped");
                }
            }
            let (waits, rest): (Vec<_>, Vec<_>) = inner
                .into_iter()
                .partition(|a| a.action_type == ActionType::WaitForUrl);
            actions.extend(rest);
            actions.extend(waits);
            continue;
        }

        if let Some(captures) = VAR_DECL.captures(stmt) {
            let name = captures[1].to_string();
            let chain = captures[2].trim_end_matches(';');
            match fold_chain(chain, &vars) {
                Some(selector) => {
                    vars.insert(name, selector);
                }
                None => warn!(line = line_number, "unresolvable locator binding skipped"),
            }
            continue;
        }

        if let Some(mut action) = parse_statement(stmt, line_number, &vars) {
            action.comment = comment.map(ToString::to_string);
            actions.push(action);
        } else {
            warn!(line = line_number, statement = stmt, "unrecognized statement skipped");
        }
    }
    (actions, examined)
}

fn is_structural(stmt: &str) -> bool {
    stmt.starts_with("import ")
        || stmt.starts_with("test(")
        || stmt.starts_with("test.describe")
        || stmt.starts_with("})")
        || stmt == "}"
}

/// Split a trailing `//` comment off a line, ignoring `//` inside
/// string literals.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        match quote {
            Some(q) => {
                if bytes[i] == b'\\' {
                    i += 1;
                } else if bytes[i] == q {
                    quote = None;
                }
            }
            None => match bytes[i] {
                b'\'' | b'"' => quote = Some(bytes[i]),
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    return (&line[..i], Some(line[i + 2..].trim()));
                }
                _ => {}
            },
        }
        i += 1;
    }
    (line, None)
}

fn parse_statement(
    stmt: &str,
    line_number: usize,
    vars: &HashMap<String, String>,
) -> Option<PlaywrightAction> {
    let stmt = stmt.strip_prefix("await ").unwrap_or(stmt);
    let stmt = stmt
        .trim_end_matches(',')
        .trim_end_matches(';')
        .trim_end_matches(',')
        .trim();

    if let Some(inner) = stmt.strip_prefix("expect(") {
        return parse_expect(inner, line_number, vars);
    }

    let parts = split_calls(stmt);
    let (head, calls) = parts.split_first()?;
    let (method, args) = split_call(calls.last()?)?;

    // Page-level statements have a bare `page` receiver and exactly one
    // call in the chain.
    if *head == "page" && calls.len() == 1 {
        let page_action = match method {
            "goto" => Some((ActionType::Goto, first_string(args))),
            "waitForURL" => Some((ActionType::WaitForUrl, first_string(args))),
            "waitForTimeout" => Some((ActionType::WaitForTimeout, Some(args.trim().to_string()))),
            "waitForLoadState" => Some((ActionType::WaitForLoadState, first_string(args))),
            "setViewportSize" => Some((
                ActionType::SetViewportSize,
                VIEWPORT
                    .captures(args)
                    .map(|c| format!("{}x{}", &c[1], &c[2])),
            )),
            "waitForSelector" => {
                let mut action = PlaywrightAction::new(ActionType::WaitForSelector, line_number);
                action.selector = first_string(args);
                return Some(action);
            }
            _ => None,
        };
        if let Some((action_type, value)) = page_action {
            let mut action = PlaywrightAction::new(action_type, line_number);
            action.value = value;
            return Some(action);
        }
    }

    let action_type = match method {
        "click" => ActionType::Click,
        "fill" => ActionType::Fill,
        "check" => ActionType::Check,
        "uncheck" => ActionType::Uncheck,
        "selectOption" => ActionType::SelectOption,
        "hover" => ActionType::Hover,
        "focus" => ActionType::Focus,
        "blur" => ActionType::Blur,
        "scrollIntoViewIfNeeded" => ActionType::ScrollIntoView,
        "waitFor" => ActionType::WaitFor,
        _ => return None,
    };
    let receiver_end = stmt.len() - calls.last()?.len() - 1;
    let selector = fold_chain(&stmt[..receiver_end], vars)?;
    let mut action = PlaywrightAction::new(action_type, line_number);
    action.selector = Some(selector);
    if matches!(action_type, ActionType::Fill | ActionType::SelectOption) {
        action.value = first_string(args);
    }
    Some(action)
}

/// `inner` is everything after `expect(`, e.g.
/// `page.locator('#x')).toBeVisible()`.
fn parse_expect(
    inner: &str,
    line_number: usize,
    vars: &HashMap<String, String>,
) -> Option<PlaywrightAction> {
    let close = matching_close(inner)?;
    let chain = &inner[..close];
    let mut rest = inner[close + 1..].strip_prefix('.')?;
    let negated = if let Some(stripped) = rest.strip_prefix("not.") {
        rest = stripped;
        true
    } else {
        false
    };
    let (method, args) = split_call(rest)?;
    let expectation = match (method, negated) {
        ("toBeVisible", false) => Expectation::ToBeVisible,
        ("toContainText", false) => Expectation::ToContainText,
        ("toHaveText", false) => Expectation::ToHaveText,
        ("toBeChecked", false) => Expectation::ToBeChecked,
        ("toBeChecked", true) => Expectation::NotToBeChecked,
        ("toHaveCount", false) => Expectation::ToHaveCount,
        _ => {
            debug!(line = line_number, method, negated, "unsupported assertion skipped");
            return None;
        }
    };
    let mut action = PlaywrightAction::new(ActionType::Expect, line_number);
    action.selector = Some(fold_chain(chain, vars)?);
    action.expectation = Some(expectation);
    action.value = match expectation {
        Expectation::ToContainText | Expectation::ToHaveText => first_string(args),
        Expectation::ToHaveCount => Some(args.trim().to_string()),
        _ => None,
    };
    Some(action)
}

/// Index of the `)` closing the paren already opened before `input`.
fn matching_close(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        match quote {
            Some(q) => {
                if bytes[i] == b'\\' {
                    i += 1;
                } else if bytes[i] == q {
                    quote = None;
                }
            }
            None => match bytes[i] {
                b'\'' | b'"' => quote = Some(bytes[i]),
                b'(' => depth += 1,
                b')' => {
                    if depth == 0 {
                        return Some(i);
                    }
                    depth -= 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Split a call chain on `.` at bracket depth zero, outside quotes.
fn split_calls(chain: &str) -> Vec<&str> {
    let bytes = chain.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        match quote {
            Some(q) => {
                if bytes[i] == b'\\' {
                    i += 1;
                } else if bytes[i] == q {
                    quote = None;
                }
            }
            None => match bytes[i] {
                b'\'' | b'"' => quote = Some(bytes[i]),
                b'(' | b'{' | b'[' => depth += 1,
                b')' | b'}' | b']' => depth -= 1,
                b'.' if depth == 0 => {
                    out.push(&chain[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    out.push(&chain[start..]);
    out
}

/// Split `name(args)` into its parts.
fn split_call(call: &str) -> Option<(&str, &str)> {
    let open = call.find('(')?;
    let close = call.rfind(')')?;
    if close < open {
        return None;
    }
    Some((call[..open].trim(), call[open + 1..close].trim()))
}

fn first_string(args: &str) -> Option<String> {
    STRING_LIT.captures(args).map(|c| unescape_js(&c[1]))
}

fn unescape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Fold a locator call chain back into the selector micro-syntax.
///
/// Returns `None` when the chain references an unknown variable or an
/// unsupported call, so the caller can skip the statement whole.
fn fold_chain(chain: &str, vars: &HashMap<String, String>) -> Option<String> {
    let parts = split_calls(chain.trim());
    let (head, calls) = parts.split_first()?;
    let mut selector = match *head {
        "page" => String::new(),
        name => vars.get(name)?.clone(),
    };
    for call in calls {
        let (name, args) = split_call(call)?;
        apply_call(&mut selector, name, args, vars)?;
    }
    if selector.is_empty() {
        None
    } else {
        Some(selector)
    }
}

fn push_segment(selector: &mut String, segment: &str) {
    if selector.is_empty() {
        selector.push_str(segment);
    } else {
        selector.push_str(" >> ");
        selector.push_str(segment);
    }
}

fn apply_call(
    selector: &mut String,
    name: &str,
    args: &str,
    vars: &HashMap<String, String>,
) -> Option<()> {
    match name {
        "locator" => {
            let css = first_string(args)?;
            push_segment(selector, &css);
        }
        "getByRole" => {
            let role = first_string(args)?;
            let mut segment = format!("role:{role}");
            if let Some(captures) = NAME_STRING.captures(args) {
                segment.push_str(&format!("[name=\"{}\"]", unescape_js(&captures[1])));
            } else if let Some(captures) = NAME_REGEX.captures(args) {
                segment.push_str(&format!("[name-regex=\"{}\"]", &captures[1]));
            }
            push_segment(selector, &segment);
        }
        "getByText" => {
            if args.starts_with('/') {
                push_segment(selector, &format!("getByText-regex:{args}"));
            } else {
                let text = first_string(args)?;
                let mut segment = format!("getByText:{text}");
                if EXACT_TRUE.is_match(args) {
                    segment.push_str(":exact");
                }
                push_segment(selector, &segment);
            }
        }
        "getByTestId" => push_segment(selector, &format!("getByTestId:{}", first_string(args)?)),
        "getByLabel" => push_segment(selector, &format!("getByLabel:{}", first_string(args)?)),
        "getByPlaceholder" => {
            push_segment(selector, &format!("getByPlaceholder:{}", first_string(args)?));
        }
        "getByTitle" => push_segment(selector, &format!("getByTitle:{}", first_string(args)?)),
        "getByAltText" => {
            push_segment(selector, &format!("getByAltText:{}", first_string(args)?));
        }
        "filter" => {
            if let Some(captures) = HAS_TEXT_STRING.captures(args) {
                selector.push_str(&format!(":filter-text(\"{}\")", unescape_js(&captures[1])));
            } else if let Some(captures) = HAS_TEXT_REGEX.captures(args) {
                selector.push_str(&format!(":filter-regex(\"{}\")", &captures[1]));
            } else if let Some(captures) = HAS_NOT_INNER.captures(args) {
                let inner = fold_chain(&captures[1], vars)?;
                selector.push_str(&format!(":filter-has-not(\"{inner}\")"));
            } else if let Some(captures) = HAS_INNER.captures(args) {
                let inner = fold_chain(&captures[1], vars)?;
                selector.push_str(&format!(":filter-has(\"{inner}\")"));
            } else {
                return None;
            }
        }
        "first" => selector.push_str(":first"),
        "last" => selector.push_str(":last"),
        "nth" => {
            let n: usize = args.trim().parse().ok()?;
            selector.push_str(&format!(":nth({n})"));
        }
        "and" => {
            let rhs = fold_chain(args, vars)?;
            selector.push_str(&format!(":and(\"{rhs}\")"));
        }
        "or" => {
            let rhs = fold_chain(args, vars)?;
            selector.push_str(&format!(":or(\"{rhs}\")"));
        }
        _ => return None,
    }
    Some(())
}
