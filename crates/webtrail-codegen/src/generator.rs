//! Playwright test source generation.
//!
//! Renders a canonical action sequence as a runnable test file. Locator
//! strings pass through the typed selector parser so every expression
//! lands as the idiomatic Playwright call (`getByTestId`, `getByRole`,
//! `filter`, …) instead of a raw CSS string.

use tracing::debug;

use webtrail::selector::{self, SelectorExpr, SelectorFilter, SelectorIndex};
use webtrail::{Action, AssertionKind, FormType, Scenario};

use crate::error::{CodegenError, Result};

/// Gap between a click and its navigation under which the two render as
/// one `Promise.all` compound statement.
const COMPOUND_NAV_WINDOW_MS: u64 = 1500;
/// Inter-action wait bounds in generated source.
const WAIT_BOUNDS_MS: (u64, u64) = (100, 5000);
/// Expected text shorter than this is too ambiguous to assert on.
const MIN_ASSERTION_TEXT: usize = 4;

/// Generation options.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Name of the generated `test()` block
    pub test_name: String,
    /// Viewport to set at the top of the test
    pub viewport: Option<(u32, u32)>,
    /// URL to `goto` first when the sequence does not open with a
    /// navigation
    pub base_url: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            test_name: "recorded user flow".to_string(),
            viewport: None,
            base_url: None,
        }
    }
}

/// Escape a string for a single-quoted JS literal.
fn escape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a selector expression as a Playwright locator chain rooted at
/// `receiver` (normally `page`).
fn render_expr(expr: &SelectorExpr, receiver: &str) -> String {
    match expr {
        SelectorExpr::Css(css) => format!("{receiver}.locator('{}')", escape_js(css)),
        SelectorExpr::Role {
            role,
            name,
            name_regex,
        } => match (name, name_regex) {
            (Some(name), _) => format!(
                "{receiver}.getByRole('{role}', {{ name: '{}' }})",
                escape_js(name)
            ),
            (None, Some(pattern)) => {
                format!("{receiver}.getByRole('{role}', {{ name: {pattern} }})")
            }
            (None, None) => format!("{receiver}.getByRole('{role}')"),
        },
        SelectorExpr::Text { text, exact } => {
            if *exact {
                format!(
                    "{receiver}.getByText('{}', {{ exact: true }})",
                    escape_js(text)
                )
            } else {
                format!("{receiver}.getByText('{}')", escape_js(text))
            }
        }
        SelectorExpr::TextRegex(pattern) => format!("{receiver}.getByText({pattern})"),
        SelectorExpr::TestId(value) => {
            format!("{receiver}.getByTestId('{}')", escape_js(value))
        }
        SelectorExpr::Label(value) => format!("{receiver}.getByLabel('{}')", escape_js(value)),
        SelectorExpr::Placeholder(value) => {
            format!("{receiver}.getByPlaceholder('{}')", escape_js(value))
        }
        SelectorExpr::Title(value) => format!("{receiver}.getByTitle('{}')", escape_js(value)),
        SelectorExpr::AltText(value) => {
            format!("{receiver}.getByAltText('{}')", escape_js(value))
        }
        SelectorExpr::XPath(xpath) => {
            format!("{receiver}.locator('xpath={}')", escape_js(xpath))
        }
        SelectorExpr::Filter { base, filter } => {
            let base = render_expr(base, receiver);
            match filter {
                SelectorFilter::Text(t) | SelectorFilter::HasText(t) => {
                    format!("{base}.filter({{ hasText: '{}' }})", escape_js(t))
                }
                SelectorFilter::Regex(pattern) => {
                    format!("{base}.filter({{ hasText: {pattern} }})")
                }
                SelectorFilter::Has(inner) => {
                    format!("{base}.filter({{ has: {} }})", render_expr(inner, "page"))
                }
                SelectorFilter::HasNot(inner) => {
                    format!(
                        "{base}.filter({{ hasNot: {} }})",
                        render_expr(inner, "page")
                    )
                }
            }
        }
        SelectorExpr::Index { base, index } => {
            let base = render_expr(base, receiver);
            match index {
                SelectorIndex::First => format!("{base}.first()"),
                SelectorIndex::Last => format!("{base}.last()"),
                SelectorIndex::Nth(n) => format!("{base}.nth({n})"),
            }
        }
        SelectorExpr::And(lhs, rhs) => format!(
            "{}.and({})",
            render_expr(lhs, receiver),
            render_expr(rhs, "page")
        ),
        SelectorExpr::Or(lhs, rhs) => format!(
            "{}.or({})",
            render_expr(lhs, receiver),
            render_expr(rhs, "page")
        ),
        SelectorExpr::Within(scope, target) => {
            let scope = render_expr(scope, receiver);
            render_expr(target, &scope)
        }
    }
}

/// Render a persisted selector string as a locator chain.
fn locator_chain(selector: &str) -> String {
    match selector::parse(selector) {
        Ok(expr) => render_expr(&expr, "page"),
        Err(e) => {
            debug!(selector, error = %e, "selector did not parse, emitting raw locator");
            format!("page.locator('{}')", escape_js(selector))
        }
    }
}

fn wait_for(delta_ms: u64) -> u64 {
    delta_ms.clamp(WAIT_BOUNDS_MS.0, WAIT_BOUNDS_MS.1)
}

/// Generate a Playwright test from a scenario, taking the viewport and
/// start URL from its metadata.
pub fn generate_from_scenario(scenario: &Scenario, options: &GeneratorOptions) -> Result<String> {
    let mut options = options.clone();
    if options.viewport.is_none() {
        options.viewport = scenario.meta.viewport.map(|v| (v.width, v.height));
    }
    if options.base_url.is_none() {
        options.base_url = scenario.meta.url.clone();
    }
    generate(&scenario.actions, &options)
}

/// Generate a Playwright test from an action sequence.
pub fn generate(actions: &[Action], options: &GeneratorOptions) -> Result<String> {
    if actions.is_empty() {
        return Err(CodegenError::NoActions);
    }

    let mut body: Vec<String> = Vec::new();
    if let Some((width, height)) = options.viewport {
        body.push(format!(
            "await page.setViewportSize({{ width: {width}, height: {height} }});"
        ));
    }
    let opens_with_nav = matches!(actions.first(), Some(Action::Nav { .. }));
    if !opens_with_nav {
        if let Some(base_url) = &options.base_url {
            body.push(format!("await page.goto('{}');", escape_js(base_url)));
        }
    }

    let mut prev_user_ts: Option<u64> = None;
    let mut last_nav: Option<String> = None;
    let mut i = 0;
    while i < actions.len() {
        let action = &actions[i];

        let mut wait_pushed = false;
        if action.is_user_initiated() {
            if let Some(prev) = prev_user_ts {
                let delta = action.timestamp().saturating_sub(prev);
                body.push(format!("await page.waitForTimeout({});", wait_for(delta)));
                wait_pushed = true;
            }
            prev_user_ts = Some(action.timestamp());
        }

        match action {
            Action::Nav {
                url,
                normalized_url,
                ..
            } => {
                // A nav already satisfied by the last goto or awaited
                // URL would reload the page mid-flow. Render nothing,
                // and take back the wait pushed for it.
                if last_nav.as_deref() == Some(normalized_url.as_str()) {
                    if wait_pushed {
                        body.pop();
                    }
                } else {
                    body.push(format!("await page.goto('{}');", escape_js(url)));
                    last_nav = Some(normalized_url.clone());
                }
            }
            Action::Click { locator, .. } => {
                last_nav = None;
                let chain = locator_chain(&locator.primary);
                let compound = actions.get(i + 1).and_then(|next| match next {
                    Action::WaitForUrl {
                        timestamp,
                        expected_url,
                        normalized_url,
                    } if timestamp.saturating_sub(action.timestamp())
                        < COMPOUND_NAV_WINDOW_MS =>
                    {
                        Some((expected_url.clone(), normalized_url.clone()))
                    }
                    _ => None,
                });
                match compound {
                    Some((expected_url, normalized_url)) => {
                        body.push("await Promise.all([".to_string());
                        body.push(format!(
                            "  page.waitForURL('{}'),",
                            escape_js(&expected_url)
                        ));
                        body.push(format!("  {chain}.click(),"));
                        body.push("]);".to_string());
                        // The compound already lands on this URL.
                        last_nav = Some(normalized_url);
                        i += 1;
                    }
                    None => body.push(format!("await {chain}.click();")),
                }
            }
            Action::Input { locator, value, .. } => {
                last_nav = None;
                body.push(format!(
                    "await {}.fill('{}');",
                    locator_chain(&locator.primary),
                    escape_js(value)
                ));
            }
            Action::Form {
                locator,
                form_type,
                value,
                checked,
                ..
            } => {
                last_nav = None;
                let chain = locator_chain(&locator.primary);
                match form_type {
                    FormType::Select => body.push(format!(
                        "await {chain}.selectOption('{}');",
                        escape_js(value.as_deref().unwrap_or_default())
                    )),
                    FormType::Checkbox | FormType::Radio => {
                        if checked.unwrap_or(true) {
                            body.push(format!("await {chain}.check();"));
                        } else {
                            body.push(format!("await {chain}.uncheck();"));
                        }
                    }
                }
            }
            Action::Assertion {
                locator,
                assertion,
                value,
                ..
            } => {
                let chain = locator_chain(&locator.primary);
                match assertion {
                    AssertionKind::HasText => {
                        if value.chars().count() < MIN_ASSERTION_TEXT {
                            debug!(value, "assertion text too short, skipping");
                        } else {
                            body.push(format!(
                                "await expect({chain}).toContainText('{}');",
                                escape_js(value)
                            ));
                        }
                    }
                    AssertionKind::IsVisible => {
                        body.push(format!("await expect({chain}).toBeVisible();"));
                    }
                    AssertionKind::IsChecked => {
                        body.push(format!("await expect({chain}).toBeChecked();"));
                    }
                    AssertionKind::IsNotChecked => {
                        body.push(format!("await expect({chain}).not.toBeChecked();"));
                    }
                }
            }
            Action::WaitForUrl {
                expected_url,
                normalized_url,
                ..
            } => {
                body.push(format!(
                    "await page.waitForURL('{}');",
                    escape_js(expected_url)
                ));
                last_nav = Some(normalized_url.clone());
            }
        }
        i += 1;
    }

    let mut out = String::new();
    out.push_str("import { test, expect } from '@playwright/test';\n\n");
    out.push_str(&format!(
        "test('{}', async ({{ page }}) => {{\n",
        escape_js(&options.test_name)
    ));
    for line in &body {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("});\n");
    Ok(out)
}
