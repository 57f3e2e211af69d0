//! Canonical action model.
//!
//! Every recorded interaction normalizes into one [`Action`] variant.
//! Consumers match exhaustively; adding a variant is a compile-visible
//! event across the workspace.

use serde::{Deserialize, Serialize};

/// Selector bundle attached to element-directed actions.
///
/// `primary` is validated unique at build time; `fallbacks` (at most two
/// after refinement) are ordered alternatives for replay-time drift. The
/// hint fields survive even when every selector has rotted and feed the
/// structural resolution ladder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Locator {
    /// Best selector at build time
    pub primary: String,
    /// Ordered alternatives, at most two after refinement
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<String>,
    /// ARIA role hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Visible text hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Tag name hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    /// Selector confirmed stable by an earlier successful replay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_selector: Option<String>,
}

impl Locator {
    /// Locator with only a primary selector.
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            primary: selector.into(),
            ..Self::default()
        }
    }

    /// Selectors to try at replay time, most trusted first.
    #[must_use]
    pub fn candidates(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(2 + self.fallbacks.len());
        if let Some(stable) = &self.stable_selector {
            out.push(stable.as_str());
        }
        if !self.primary.is_empty() {
            out.push(self.primary.as_str());
        }
        out.extend(self.fallbacks.iter().map(String::as_str));
        out
    }
}

/// Form control flavor for [`Action::Form`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    /// Checkbox toggle
    Checkbox,
    /// Radio selection
    Radio,
    /// Dropdown option choice
    Select,
}

/// Assertion flavor for [`Action::Assertion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionKind {
    /// Element resolves and is visible
    IsVisible,
    /// Element text contains the expected value
    HasText,
    /// Checkbox/radio is checked
    IsChecked,
    /// Checkbox/radio is not checked
    IsNotChecked,
}

impl Default for AssertionKind {
    fn default() -> Self {
        Self::HasText
    }
}

/// Discriminant of an [`Action`], used for ordering and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Mouse click
    Click,
    /// Text input
    Input,
    /// Form control change
    Form,
    /// Recorded assertion
    Assertion,
    /// Page navigation
    Nav,
    /// Wait for the page URL to change
    WaitForUrl,
}

/// One normalized user interaction.
///
/// Serialized with a `kind` tag so scenario JSON stays self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Action {
    /// Mouse click on an element.
    Click {
        /// Milliseconds since epoch
        timestamp: u64,
        /// Click target
        locator: Locator,
    },
    /// Final text value typed into a field.
    Input {
        /// Milliseconds since epoch
        timestamp: u64,
        /// Edited field
        locator: Locator,
        /// Final value
        value: String,
    },
    /// Checkbox/radio/select change.
    Form {
        /// Milliseconds since epoch
        timestamp: u64,
        /// Changed control
        locator: Locator,
        /// Control flavor
        form_type: FormType,
        /// Selected value, for selects and valued toggles
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        /// Checked state, for toggles
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
    },
    /// Recorded expectation about an element.
    Assertion {
        /// Milliseconds since epoch
        timestamp: u64,
        /// Asserted element
        locator: Locator,
        /// Assertion flavor
        #[serde(default)]
        assertion: AssertionKind,
        /// Expected text, empty for visibility/checked assertions
        #[serde(default)]
        value: String,
    },
    /// Page navigation observed during recording.
    Nav {
        /// Milliseconds since epoch
        timestamp: u64,
        /// Destination URL as observed
        url: String,
        /// Origin + path, query/hash/trailing slash stripped
        normalized_url: String,
    },
    /// Wait for the page URL to reach a destination.
    ///
    /// Inserted by the builder between a click and the navigation it
    /// triggered, timestamped one millisecond before the navigation so
    /// ordering is stable.
    WaitForUrl {
        /// Milliseconds since epoch
        timestamp: u64,
        /// URL the page should reach
        expected_url: String,
        /// Normalized form of `expected_url`
        normalized_url: String,
    },
}

impl Action {
    /// Timestamp in milliseconds since epoch.
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        match self {
            Self::Click { timestamp, .. }
            | Self::Input { timestamp, .. }
            | Self::Form { timestamp, .. }
            | Self::Assertion { timestamp, .. }
            | Self::Nav { timestamp, .. }
            | Self::WaitForUrl { timestamp, .. } => *timestamp,
        }
    }

    /// Discriminant, for reporting and ordering.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Click { .. } => ActionKind::Click,
            Self::Input { .. } => ActionKind::Input,
            Self::Form { .. } => ActionKind::Form,
            Self::Assertion { .. } => ActionKind::Assertion,
            Self::Nav { .. } => ActionKind::Nav,
            Self::WaitForUrl { .. } => ActionKind::WaitForUrl,
        }
    }

    /// Target locator, for element-directed variants.
    #[must_use]
    pub const fn locator(&self) -> Option<&Locator> {
        match self {
            Self::Click { locator, .. }
            | Self::Input { locator, .. }
            | Self::Form { locator, .. }
            | Self::Assertion { locator, .. } => Some(locator),
            Self::Nav { .. } | Self::WaitForUrl { .. } => None,
        }
    }

    /// Mutable target locator, for refinement passes.
    pub fn locator_mut(&mut self) -> Option<&mut Locator> {
        match self {
            Self::Click { locator, .. }
            | Self::Input { locator, .. }
            | Self::Form { locator, .. }
            | Self::Assertion { locator, .. } => Some(locator),
            Self::Nav { .. } | Self::WaitForUrl { .. } => None,
        }
    }

    /// Tiebreak weight when timestamps collide: clicks land before the
    /// waits and navigations they caused.
    #[must_use]
    pub const fn ordering_weight(&self) -> u8 {
        match self {
            Self::Click { .. } => 1,
            Self::WaitForUrl { .. } => 2,
            Self::Nav { .. } => 3,
            Self::Input { .. } | Self::Form { .. } | Self::Assertion { .. } => 4,
        }
    }

    /// True for actions initiated by the user, as opposed to waits and
    /// assertions. These advance the inter-action delay clock during
    /// generation.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::Click { .. } | Self::Input { .. } | Self::Form { .. } | Self::Nav { .. }
        )
    }
}

/// Sort actions by timestamp, breaking ties by kind priority.
///
/// Stable sort, so equal (timestamp, weight) pairs keep capture order.
pub fn sort_actions(actions: &mut [Action]) {
    actions.sort_by_key(|a| (a.timestamp(), a.ordering_weight()));
}

/// Reduce a URL to origin + path.
///
/// Query, fragment, and any trailing slash are dropped. Scheme-relative
/// and path-only inputs normalize the same way. Comparison of normalized
/// forms is how replay decides a navigation "arrived".
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let mut out = without_query.to_string();
    // Keep "https://host/" intact; strip deeper trailing slashes only.
    let path_start = out
        .find("://")
        .map_or(0, |scheme| scheme + 3 + out[scheme + 3..].find('/').map_or(out.len(), |p| p));
    while out.len() > path_start + 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(ts: u64) -> Action {
        Action::Click {
            timestamp: ts,
            locator: Locator::css("#go"),
        }
    }

    #[test]
    fn normalize_strips_query_and_hash() {
        assert_eq!(
            normalize_url("https://app.example.com/orders?page=2#top"),
            "https://app.example.com/orders"
        );
    }

    #[test]
    fn normalize_strips_trailing_slash() {
        assert_eq!(
            normalize_url("https://app.example.com/orders/"),
            "https://app.example.com/orders"
        );
    }

    #[test]
    fn normalize_keeps_origin_root() {
        assert_eq!(
            normalize_url("https://app.example.com/"),
            "https://app.example.com/"
        );
    }

    #[test]
    fn normalize_handles_path_only() {
        assert_eq!(normalize_url("/orders/?q=1"), "/orders");
    }

    #[test]
    fn sort_breaks_timestamp_ties_by_kind() {
        let nav = Action::Nav {
            timestamp: 100,
            url: "https://x.test/a".to_string(),
            normalized_url: "https://x.test/a".to_string(),
        };
        let wait = Action::WaitForUrl {
            timestamp: 100,
            expected_url: "https://x.test/a".to_string(),
            normalized_url: "https://x.test/a".to_string(),
        };
        let mut actions = vec![nav.clone(), wait.clone(), click(100)];
        sort_actions(&mut actions);
        assert_eq!(actions[0].kind(), ActionKind::Click);
        assert_eq!(actions[1].kind(), ActionKind::WaitForUrl);
        assert_eq!(actions[2].kind(), ActionKind::Nav);
    }

    #[test]
    fn sort_is_timestamp_first() {
        let mut actions = vec![click(300), click(100), click(200)];
        sort_actions(&mut actions);
        let stamps: Vec<u64> = actions.iter().map(Action::timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[test]
    fn kind_tag_serialization() {
        let action = Action::Input {
            timestamp: 1,
            locator: Locator::css("#email"),
            value: "a@b.co".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "input");
        assert_eq!(json["locator"]["primary"], "#email");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn assertion_kind_defaults_to_has_text() {
        let json = r#"{"kind":"assertion","timestamp":5,"locator":{"primary":".msg"},"value":"Saved"}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        match action {
            Action::Assertion { assertion, .. } => assert_eq!(assertion, AssertionKind::HasText),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn candidates_order_stable_first() {
        let locator = Locator {
            primary: "#a".to_string(),
            fallbacks: vec![".b".to_string()],
            stable_selector: Some("[data-testid=\"a\"]".to_string()),
            ..Default::default()
        };
        assert_eq!(locator.candidates(), vec!["[data-testid=\"a\"]", "#a", ".b"]);
    }
}
