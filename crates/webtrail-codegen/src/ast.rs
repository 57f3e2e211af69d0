//! Flat intermediate representation for parsed test source.
//!
//! One [`PlaywrightAction`] per recognized statement, in source order.
//! This is the shape the parser produces and the shape hosts feed to
//! [`to_actions`] before handing a sequence to the replay engine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use webtrail::{Action, AssertionKind, FormType, Locator};

/// Statement flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    /// `page.goto(url)`
    Goto,
    /// `locator.click()`
    Click,
    /// `locator.fill(value)`
    Fill,
    /// `locator.check()`
    Check,
    /// `locator.uncheck()`
    Uncheck,
    /// `locator.selectOption(value)`
    SelectOption,
    /// `page.waitForTimeout(ms)`
    WaitForTimeout,
    /// `page.waitForSelector(selector)`
    WaitForSelector,
    /// `page.waitForURL(url)`
    WaitForUrl,
    /// `page.waitForLoadState(state)`
    WaitForLoadState,
    /// `page.setViewportSize({...})`
    SetViewportSize,
    /// `expect(locator).<assertion>(...)`
    Expect,
    /// `locator.hover()`
    Hover,
    /// `locator.focus()`
    Focus,
    /// `locator.blur()`
    Blur,
    /// `locator.scrollIntoViewIfNeeded()`
    ScrollIntoView,
    /// `locator.waitFor()`
    WaitFor,
}

/// Assertion flavor on an expect statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expectation {
    /// `toBeVisible()`
    ToBeVisible,
    /// `toContainText(text)`
    ToContainText,
    /// `toHaveText(text)`
    ToHaveText,
    /// `toBeChecked()`
    ToBeChecked,
    /// `not.toBeChecked()`
    NotToBeChecked,
    /// `toHaveCount(n)`
    ToHaveCount,
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaywrightAction {
    /// Statement flavor
    pub action_type: ActionType,
    /// Selector in persisted micro-syntax, when the statement targets
    /// an element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Value argument (fill text, selected option, expected text,
    /// timeout milliseconds, destination URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Assertion flavor for expect statements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation: Option<Expectation>,
    /// Trailing `//` comment on the source line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// 1-based source line
    pub line_number: usize,
}

impl PlaywrightAction {
    /// Statement with just a type and a line number.
    #[must_use]
    pub fn new(action_type: ActionType, line_number: usize) -> Self {
        Self {
            action_type,
            selector: None,
            value: None,
            expectation: None,
            comment: None,
            line_number,
        }
    }
}

/// Milliseconds appended after each emitted action so the synthetic
/// clock stays strictly increasing even without explicit waits.
const SYNTHETIC_TICK_MS: u64 = 1;

/// Convert parsed statements to canonical actions for the replay engine.
///
/// `waitForTimeout` statements advance a synthetic clock instead of
/// emitting actions, so recorded pacing survives the text round trip.
/// Pure rendering directives (hover, viewport, load-state waits) are
/// dropped.
#[must_use]
pub fn to_actions(parsed: &[PlaywrightAction]) -> Vec<Action> {
    let mut out = Vec::new();
    let mut clock: u64 = 0;
    for statement in parsed {
        let locator = statement
            .selector
            .as_deref()
            .map(|s| Locator::css(s.to_string()));
        let action = match statement.action_type {
            ActionType::Goto => statement.value.as_ref().map(|url| Action::Nav {
                timestamp: clock,
                url: url.clone(),
                normalized_url: webtrail::normalize_url(url),
            }),
            ActionType::Click => locator.map(|locator| Action::Click {
                timestamp: clock,
                locator,
            }),
            ActionType::Fill => locator.map(|locator| Action::Input {
                timestamp: clock,
                locator,
                value: statement.value.clone().unwrap_or_default(),
            }),
            ActionType::Check | ActionType::Uncheck => locator.map(|locator| Action::Form {
                timestamp: clock,
                locator,
                form_type: FormType::Checkbox,
                value: None,
                checked: Some(statement.action_type == ActionType::Check),
            }),
            ActionType::SelectOption => locator.map(|locator| Action::Form {
                timestamp: clock,
                locator,
                form_type: FormType::Select,
                value: statement.value.clone(),
                checked: None,
            }),
            ActionType::WaitForUrl => statement.value.as_ref().map(|url| Action::WaitForUrl {
                timestamp: clock,
                expected_url: url.clone(),
                normalized_url: webtrail::normalize_url(url),
            }),
            ActionType::Expect => {
                let kind = match statement.expectation {
                    Some(Expectation::ToBeVisible) => Some(AssertionKind::IsVisible),
                    Some(Expectation::ToContainText | Expectation::ToHaveText) => {
                        Some(AssertionKind::HasText)
                    }
                    Some(Expectation::ToBeChecked) => Some(AssertionKind::IsChecked),
                    Some(Expectation::NotToBeChecked) => Some(AssertionKind::IsNotChecked),
                    Some(Expectation::ToHaveCount) | None => {
                        debug!(line = statement.line_number, "unsupported expectation dropped");
                        None
                    }
                };
                match (kind, locator) {
                    (Some(assertion), Some(locator)) => Some(Action::Assertion {
                        timestamp: clock,
                        locator,
                        assertion,
                        value: statement.value.clone().unwrap_or_default(),
                    }),
                    _ => None,
                }
            }
            ActionType::WaitForTimeout => {
                if let Some(ms) = statement.value.as_deref().and_then(|v| v.parse::<u64>().ok()) {
                    clock += ms;
                }
                None
            }
            ActionType::WaitForSelector
            | ActionType::WaitForLoadState
            | ActionType::SetViewportSize
            | ActionType::Hover
            | ActionType::Focus
            | ActionType::Blur
            | ActionType::ScrollIntoView
            | ActionType::WaitFor => None,
        };
        if let Some(action) = action {
            out.push(action);
            clock += SYNTHETIC_TICK_MS;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use webtrail::ActionKind;

    fn stmt(action_type: ActionType, selector: Option<&str>, value: Option<&str>) -> PlaywrightAction {
        PlaywrightAction {
            action_type,
            selector: selector.map(ToString::to_string),
            value: value.map(ToString::to_string),
            expectation: None,
            comment: None,
            line_number: 1,
        }
    }

    #[test]
    fn waits_advance_the_clock() {
        let parsed = vec![
            stmt(ActionType::Click, Some("#a"), None),
            stmt(ActionType::WaitForTimeout, None, Some("1500")),
            stmt(ActionType::Click, Some("#b"), None),
        ];
        let actions = to_actions(&parsed);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].timestamp() - actions[0].timestamp(), 1501);
    }

    #[test]
    fn rendering_directives_are_dropped() {
        let parsed = vec![
            stmt(ActionType::SetViewportSize, None, None),
            stmt(ActionType::Hover, Some("#menu"), None),
            stmt(ActionType::WaitForLoadState, None, Some("networkidle")),
            stmt(ActionType::Click, Some("#a"), None),
        ];
        let actions = to_actions(&parsed);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind(), ActionKind::Click);
    }

    #[test]
    fn expectations_map_to_assertion_kinds() {
        let mut expect = stmt(ActionType::Expect, Some(".msg"), Some("Saved"));
        expect.expectation = Some(Expectation::ToContainText);
        let actions = to_actions(&[expect]);
        match &actions[0] {
            Action::Assertion {
                assertion, value, ..
            } => {
                assert_eq!(*assertion, AssertionKind::HasText);
                assert_eq!(value, "Saved");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn unsupported_count_expectation_is_dropped() {
        let mut expect = stmt(ActionType::Expect, Some("li"), Some("3"));
        expect.expectation = Some(Expectation::ToHaveCount);
        assert!(to_actions(&[expect]).is_empty());
    }

    #[test]
    fn timestamps_strictly_increase() {
        let parsed = vec![
            stmt(ActionType::Click, Some("#a"), None),
            stmt(ActionType::Click, Some("#b"), None),
            stmt(ActionType::Click, Some("#c"), None),
        ];
        let actions = to_actions(&parsed);
        assert!(actions.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
    }
}
