//! Selector micro-syntax.
//!
//! Locators persist as strings in one of three shapes: plain CSS, a typed
//! prefix form (`role:button[name="Save"]`, `getByText:Sign in`,
//! `getByTestId:submit`, `xpath=//button`), or a composition built from
//! suffixes (`:filter-text("…")`, `:filter-has("…")`, `:first`, `:last`,
//! `:nth(n)`, `:and("…")`, `:or("…")`, `:exact`, `:has-text("…")`) and
//! the ` >> ` within-combinator. [`parse`] turns a persisted string into
//! a [`SelectorExpr`] tree; [`SelectorExpr`]'s `Display` renders the same
//! syntax back, and the code generator and test parser share that
//! contract.

mod rank;
mod resolve;
mod stability;

pub use rank::{locator_for_click, selector_candidates};
pub use resolve::{resolve, resolve_locator, role_to_css};
pub use stability::{is_stable_text, is_stable_token};

use std::fmt;

use crate::dom::Dom;
use crate::result::{WebtrailError, WebtrailResult};

/// Number of elements a selector string matches, counting direct CSS
/// hits first and typed evaluation otherwise. Unparseable selectors
/// match nothing.
#[must_use]
pub fn match_count(dom: &dyn Dom, selector: &str) -> usize {
    let direct = dom.query_count(selector);
    if direct > 0 {
        return direct;
    }
    parse(selector).map_or(0, |expr| resolve::eval(dom, &expr).len())
}

/// Post-selection filter applied to a candidate set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorFilter {
    /// Keep candidates whose text contains the needle
    Text(String),
    /// Keep candidates whose text matches a regex pattern
    Regex(String),
    /// Keep candidates containing a match for the inner selector
    Has(Box<SelectorExpr>),
    /// Keep candidates NOT containing a match for the inner selector
    HasNot(Box<SelectorExpr>),
    /// `:has-text` form, same semantics as [`SelectorFilter::Text`]
    HasText(String),
}

/// Positional narrowing of a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorIndex {
    /// First candidate in document order
    First,
    /// Last candidate in document order
    Last,
    /// Zero-based index
    Nth(usize),
}

/// Typed selector expression.
///
/// The tree is evaluated by [`resolve`] against a [`crate::Dom`]; its
/// `Display` output is the persisted micro-syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorExpr {
    /// Standards CSS, evaluated by the host's query engine
    Css(String),
    /// ARIA role with optional accessible-name constraint
    Role {
        /// Role name, e.g. `button`
        role: String,
        /// Exact accessible name
        name: Option<String>,
        /// Accessible-name regex in `/pattern/flags` form
        name_regex: Option<String>,
    },
    /// Visible text lookup
    Text {
        /// Needle
        text: String,
        /// Trimmed-equality match instead of substring
        exact: bool,
    },
    /// Visible text lookup by regex pattern
    TextRegex(String),
    /// `data-testid` lookup
    TestId(String),
    /// Form label lookup (label text, `for`/nesting association)
    Label(String),
    /// `placeholder` attribute lookup
    Placeholder(String),
    /// `title` attribute lookup
    Title(String),
    /// `alt` attribute lookup
    AltText(String),
    /// XPath expression; parsed and rendered but not evaluated
    XPath(String),
    /// Base narrowed by a filter
    Filter {
        /// Expression producing candidates
        base: Box<SelectorExpr>,
        /// Filter to apply
        filter: SelectorFilter,
    },
    /// Base narrowed by position
    Index {
        /// Expression producing candidates
        base: Box<SelectorExpr>,
        /// Position to keep
        index: SelectorIndex,
    },
    /// Intersection of two expressions, left order kept
    And(Box<SelectorExpr>, Box<SelectorExpr>),
    /// Union of two expressions, document order
    Or(Box<SelectorExpr>, Box<SelectorExpr>),
    /// Right expression scoped within matches of the left (` >> `)
    Within(Box<SelectorExpr>, Box<SelectorExpr>),
}

impl SelectorExpr {
    /// Convenience CSS leaf.
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }
}

/// Suffix operation, applied left to right after the base parses.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SuffixOp {
    Filter(SelectorFilter),
    Index(SelectorIndex),
    And(SelectorExpr),
    Or(SelectorExpr),
    Exact,
}

fn parse_error(selector: &str, reason: impl Into<String>) -> WebtrailError {
    WebtrailError::SelectorParse {
        selector: selector.to_string(),
        reason: reason.into(),
    }
}

/// Parse a persisted selector string into an expression tree.
pub fn parse(selector: &str) -> WebtrailResult<SelectorExpr> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(parse_error(selector, "empty selector"));
    }
    let segments = split_within(trimmed);
    let mut expr: Option<SelectorExpr> = None;
    for segment in segments {
        let parsed = parse_segment(segment.trim(), selector)?;
        expr = Some(match expr {
            None => parsed,
            Some(prev) => SelectorExpr::Within(Box::new(prev), Box::new(parsed)),
        });
    }
    expr.ok_or_else(|| parse_error(selector, "empty selector"))
}

/// Split on ` >> ` outside quotes.
fn split_within(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = input.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        match quote {
            Some(q) => {
                if bytes[i] == q {
                    quote = None;
                }
                i += 1;
            }
            None => {
                if bytes[i] == b'"' || bytes[i] == b'\'' {
                    quote = Some(bytes[i]);
                    i += 1;
                } else if bytes[i..].starts_with(b" >> ") {
                    out.push(&input[start..i]);
                    i += 4;
                    start = i;
                } else {
                    i += 1;
                }
            }
        }
    }
    out.push(&input[start..]);
    out
}

fn parse_segment(segment: &str, original: &str) -> WebtrailResult<SelectorExpr> {
    let mut rest = segment.to_string();
    let mut ops: Vec<SuffixOp> = Vec::new();
    loop {
        if let Some(stripped) = rest.strip_suffix(":first") {
            rest = stripped.to_string();
            ops.push(SuffixOp::Index(SelectorIndex::First));
        } else if let Some(stripped) = rest.strip_suffix(":last") {
            rest = stripped.to_string();
            ops.push(SuffixOp::Index(SelectorIndex::Last));
        } else if let Some(stripped) = rest.strip_suffix(":exact") {
            rest = stripped.to_string();
            ops.push(SuffixOp::Exact);
        } else if let Some((stripped, n)) = strip_nth(&rest) {
            rest = stripped;
            ops.push(SuffixOp::Index(SelectorIndex::Nth(n)));
        } else if let Some((stripped, payload)) = strip_call(&rest, "filter-text") {
            rest = stripped;
            ops.push(SuffixOp::Filter(SelectorFilter::Text(payload)));
        } else if let Some((stripped, payload)) = strip_call(&rest, "filter-regex") {
            rest = stripped;
            ops.push(SuffixOp::Filter(SelectorFilter::Regex(payload)));
        } else if let Some((stripped, payload)) = strip_call(&rest, "filter-has-not") {
            rest = stripped;
            let inner = parse(&payload)?;
            ops.push(SuffixOp::Filter(SelectorFilter::HasNot(Box::new(inner))));
        } else if let Some((stripped, payload)) = strip_call(&rest, "filter-has") {
            rest = stripped;
            let inner = parse(&payload)?;
            ops.push(SuffixOp::Filter(SelectorFilter::Has(Box::new(inner))));
        } else if let Some((stripped, payload)) = strip_call(&rest, "has-text") {
            rest = stripped;
            ops.push(SuffixOp::Filter(SelectorFilter::HasText(payload)));
        } else if let Some((stripped, payload)) = strip_call(&rest, "and") {
            rest = stripped;
            ops.push(SuffixOp::And(parse(&payload)?));
        } else if let Some((stripped, payload)) = strip_call(&rest, "or") {
            rest = stripped;
            ops.push(SuffixOp::Or(parse(&payload)?));
        } else {
            break;
        }
    }

    if rest.trim().is_empty() {
        return Err(parse_error(original, "suffix without a base selector"));
    }
    let mut expr = parse_base(rest.trim(), original)?;
    // Ops were stripped outermost-first; apply in source order.
    for op in ops.into_iter().rev() {
        expr = apply_op(expr, op);
    }
    Ok(expr)
}

/// Strip a trailing `:name("payload")` call.
///
/// Payloads may not themselves contain `")` followed by end of input;
/// the generator never emits such selectors.
fn strip_call(input: &str, name: &str) -> Option<(String, String)> {
    if !input.ends_with("\")") {
        return None;
    }
    let marker = format!(":{name}(\"");
    let pos = input.rfind(&marker)?;
    let payload = &input[pos + marker.len()..input.len() - 2];
    Some((input[..pos].to_string(), payload.to_string()))
}

fn strip_nth(input: &str) -> Option<(String, usize)> {
    if !input.ends_with(')') {
        return None;
    }
    let pos = input.rfind(":nth(")?;
    let digits = &input[pos + 5..input.len() - 1];
    let n: usize = digits.parse().ok()?;
    Some((input[..pos].to_string(), n))
}

fn apply_op(expr: SelectorExpr, op: SuffixOp) -> SelectorExpr {
    match op {
        SuffixOp::Filter(filter) => SelectorExpr::Filter {
            base: Box::new(expr),
            filter,
        },
        SuffixOp::Index(index) => SelectorExpr::Index {
            base: Box::new(expr),
            index,
        },
        SuffixOp::And(rhs) => SelectorExpr::And(Box::new(expr), Box::new(rhs)),
        SuffixOp::Or(rhs) => SelectorExpr::Or(Box::new(expr), Box::new(rhs)),
        SuffixOp::Exact => match expr {
            SelectorExpr::Text { text, .. } => SelectorExpr::Text { text, exact: true },
            other => {
                tracing::debug!("':exact' on a non-text selector, ignored");
                other
            }
        },
    }
}

fn parse_base(base: &str, original: &str) -> WebtrailResult<SelectorExpr> {
    if let Some(payload) = base.strip_prefix("role:") {
        return parse_role(payload, original);
    }
    if let Some(payload) = base.strip_prefix("getByText-regex:") {
        return non_empty(payload, original).map(|p| SelectorExpr::TextRegex(p.to_string()));
    }
    if let Some(payload) = base.strip_prefix("getByText:") {
        return non_empty(payload, original).map(|p| SelectorExpr::Text {
            text: p.to_string(),
            exact: false,
        });
    }
    if let Some(payload) = base.strip_prefix("getByTestId:") {
        return non_empty(payload, original).map(|p| SelectorExpr::TestId(p.to_string()));
    }
    if let Some(payload) = base.strip_prefix("getByLabel:") {
        return non_empty(payload, original).map(|p| SelectorExpr::Label(p.to_string()));
    }
    if let Some(payload) = base.strip_prefix("getByPlaceholder:") {
        return non_empty(payload, original).map(|p| SelectorExpr::Placeholder(p.to_string()));
    }
    if let Some(payload) = base.strip_prefix("getByTitle:") {
        return non_empty(payload, original).map(|p| SelectorExpr::Title(p.to_string()));
    }
    if let Some(payload) = base.strip_prefix("getByAltText:") {
        return non_empty(payload, original).map(|p| SelectorExpr::AltText(p.to_string()));
    }
    if let Some(payload) = base.strip_prefix("xpath=") {
        return non_empty(payload, original).map(|p| SelectorExpr::XPath(p.to_string()));
    }
    if let Some(payload) = base.strip_prefix("text=") {
        return non_empty(payload, original).map(|p| SelectorExpr::Text {
            text: p.to_string(),
            exact: false,
        });
    }
    Ok(SelectorExpr::Css(base.to_string()))
}

fn non_empty<'a>(payload: &'a str, original: &str) -> WebtrailResult<&'a str> {
    if payload.is_empty() {
        Err(parse_error(original, "empty payload"))
    } else {
        Ok(payload)
    }
}

fn parse_role(payload: &str, original: &str) -> WebtrailResult<SelectorExpr> {
    let (role, constraint) = match payload.find('[') {
        Some(open) => {
            let close = payload
                .rfind(']')
                .ok_or_else(|| parse_error(original, "unterminated role constraint"))?;
            (&payload[..open], Some(&payload[open + 1..close]))
        }
        None => (payload, None),
    };
    if role.is_empty() {
        return Err(parse_error(original, "missing role name"));
    }
    let (mut name, mut name_regex) = (None, None);
    if let Some(inner) = constraint {
        if let Some(value) = inner
            .strip_prefix("name-regex=\"")
            .and_then(|v| v.strip_suffix('"'))
        {
            name_regex = Some(value.to_string());
        } else if let Some(value) = inner
            .strip_prefix("name=\"")
            .and_then(|v| v.strip_suffix('"'))
        {
            name = Some(value.to_string());
        } else {
            return Err(parse_error(original, "unrecognized role constraint"));
        }
    }
    Ok(SelectorExpr::Role {
        role: role.to_string(),
        name,
        name_regex,
    })
}

impl fmt::Display for SelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Role {
                role,
                name,
                name_regex,
            } => {
                write!(f, "role:{role}")?;
                if let Some(name) = name {
                    write!(f, "[name=\"{name}\"]")?;
                } else if let Some(pattern) = name_regex {
                    write!(f, "[name-regex=\"{pattern}\"]")?;
                }
                Ok(())
            }
            Self::Text { text, exact } => {
                write!(f, "getByText:{text}")?;
                if *exact {
                    write!(f, ":exact")?;
                }
                Ok(())
            }
            Self::TextRegex(pattern) => write!(f, "getByText-regex:{pattern}"),
            Self::TestId(value) => write!(f, "getByTestId:{value}"),
            Self::Label(value) => write!(f, "getByLabel:{value}"),
            Self::Placeholder(value) => write!(f, "getByPlaceholder:{value}"),
            Self::Title(value) => write!(f, "getByTitle:{value}"),
            Self::AltText(value) => write!(f, "getByAltText:{value}"),
            Self::XPath(expr) => write!(f, "xpath={expr}"),
            Self::Filter { base, filter } => {
                write!(f, "{base}")?;
                match filter {
                    SelectorFilter::Text(t) => write!(f, ":filter-text(\"{t}\")"),
                    SelectorFilter::Regex(p) => write!(f, ":filter-regex(\"{p}\")"),
                    SelectorFilter::Has(inner) => write!(f, ":filter-has(\"{inner}\")"),
                    SelectorFilter::HasNot(inner) => write!(f, ":filter-has-not(\"{inner}\")"),
                    SelectorFilter::HasText(t) => write!(f, ":has-text(\"{t}\")"),
                }
            }
            Self::Index { base, index } => {
                write!(f, "{base}")?;
                match index {
                    SelectorIndex::First => write!(f, ":first"),
                    SelectorIndex::Last => write!(f, ":last"),
                    SelectorIndex::Nth(n) => write!(f, ":nth({n})"),
                }
            }
            Self::And(lhs, rhs) => write!(f, "{lhs}:and(\"{rhs}\")"),
            Self::Or(lhs, rhs) => write!(f, "{lhs}:or(\"{rhs}\")"),
            Self::Within(lhs, rhs) => write!(f, "{lhs} >> {rhs}"),
        }
    }
}

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn round_trip(input: &str) {
        let expr = parse(input).unwrap();
        assert_eq!(expr.to_string(), input, "display must render the source");
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn plain_css_is_css() {
        assert_eq!(
            parse("#submit").unwrap(),
            SelectorExpr::Css("#submit".to_string())
        );
        round_trip("button.btn-primary[type=\"submit\"]");
    }

    #[test]
    fn role_with_name() {
        let expr = parse("role:button[name=\"Sign in\"]").unwrap();
        assert_eq!(
            expr,
            SelectorExpr::Role {
                role: "button".to_string(),
                name: Some("Sign in".to_string()),
                name_regex: None,
            }
        );
        round_trip("role:button[name=\"Sign in\"]");
        round_trip("role:link");
    }

    #[test]
    fn role_with_name_regex() {
        round_trip("role:heading[name-regex=\"/welcome/i\"]");
    }

    #[test]
    fn text_forms() {
        round_trip("getByText:Sign in");
        round_trip("getByText:Sign in:exact");
        round_trip("getByText-regex:/order \\d+/i");
        // text= parses as a fuzzy text lookup; canonical form differs.
        assert_eq!(
            parse("text=Sign in").unwrap(),
            SelectorExpr::Text {
                text: "Sign in".to_string(),
                exact: false
            }
        );
    }

    #[test]
    fn typed_lookups() {
        round_trip("getByTestId:submit-button");
        round_trip("getByLabel:Email address");
        round_trip("getByPlaceholder:you@example.com");
        round_trip("getByTitle:Close");
        round_trip("getByAltText:Company logo");
        round_trip("xpath=//button[@type='submit']");
    }

    #[test]
    fn filters_and_indexes() {
        round_trip("li.item:filter-text(\"Alpha\")");
        round_trip(".row:filter-has(\"input[type=\"checkbox\"]\")");
        round_trip("button:first");
        round_trip("li:last");
        round_trip("tr:nth(3)");
        round_trip("div.card:filter-text(\"Total\"):first");
    }

    #[test]
    fn and_or_composition() {
        round_trip("button:and(\".primary\")");
        round_trip("#save:or(\"getByText:Save\")");
    }

    #[test]
    fn within_composition() {
        let expr = parse("form#login >> button").unwrap();
        assert_eq!(
            expr,
            SelectorExpr::Within(
                Box::new(SelectorExpr::Css("form#login".to_string())),
                Box::new(SelectorExpr::Css("button".to_string())),
            )
        );
        round_trip("form#login >> button");
        round_trip("nav.top >> getByText:Orders");
    }

    #[test]
    fn suffix_order_applies_left_to_right() {
        let expr = parse("li:filter-text(\"A\"):first").unwrap();
        match expr {
            SelectorExpr::Index { base, index } => {
                assert_eq!(index, SelectorIndex::First);
                assert!(matches!(*base, SelectorExpr::Filter { .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn errors_are_explicit() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("role:").is_err());
        assert!(parse("getByTestId:").is_err());
        assert!(parse(":first").is_err());
        assert!(parse("role:button[name='x']").is_err());
    }
}
