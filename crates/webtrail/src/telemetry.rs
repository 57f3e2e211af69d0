//! Telemetry record types.
//!
//! A [`TelemetryRecord`] is the raw capture handed to the builder by the
//! recording layer: clicks with pre-extracted element facts, input edits,
//! form element changes, recorded assertions, and page navigations. Raw
//! DOM event capture happens outside this crate; everything here is
//! already element-level.

use serde::{Deserialize, Serialize};

/// Element facts extracted at click time by the recording layer.
///
/// `primary`/`fallbacks` are the recorder's own selector guesses; the
/// ranking ladder in [`crate::selector`] may override them with something
/// more durable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSelectors {
    /// Recorder's best selector guess
    pub primary: String,
    /// Additional selectors, best first
    pub fallbacks: Vec<String>,
    /// Visible text at capture time
    pub text: Option<String>,
    /// `aria-label` attribute
    pub aria_label: Option<String>,
    /// `title` attribute
    pub title: Option<String>,
    /// `data-testid` attribute
    pub test_id: Option<String>,
    /// Element id attribute
    pub id: Option<String>,
    /// ARIA role (explicit or implied)
    pub role: Option<String>,
    /// Lowercase tag name
    pub tag_name: Option<String>,
    /// Class list at capture time
    pub classes: Vec<String>,
    /// `type` attribute for inputs
    pub input_type: Option<String>,
    /// `name` attribute for inputs
    pub input_name: Option<String>,
}

/// A single recorded click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickDetail {
    /// Viewport x at click time
    pub x: i32,
    /// Viewport y at click time
    pub y: i32,
    /// Milliseconds since epoch
    pub timestamp: u64,
    /// Element facts for the click target
    pub selectors: ElementSelectors,
}

/// Click capture block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClickData {
    /// Individual clicks in capture order
    pub click_details: Vec<ClickDetail>,
}

/// Lifecycle tag on an input edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputAction {
    /// Intermediate keystroke snapshot
    Typing,
    /// Final value after the field lost focus
    Complete,
}

/// A recorded text-input edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputChange {
    /// Selector for the edited field
    pub element_selector: String,
    /// Field value at this point
    pub value: String,
    /// Milliseconds since epoch
    pub timestamp: u64,
    /// Edit lifecycle tag; untagged edits count as complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<InputAction>,
}

/// A recorded checkbox/radio/select change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormElementChange {
    /// Selector for the form element
    pub element_selector: String,
    /// One of `checkbox`, `radio`, `select`
    pub form_type: String,
    /// Selected value (select) or value attribute (checkbox/radio)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Checked state for checkbox/radio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Display text of the chosen option, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Milliseconds since epoch
    pub timestamp: u64,
}

/// A recorded assertion (typically from a text selection gesture).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionRecord {
    /// Assertion flavor as recorded, e.g. `hasText`, `isVisible`
    #[serde(rename = "type")]
    pub kind: String,
    /// Selector for the asserted element
    pub selector: String,
    /// Expected text, empty for pure visibility checks
    #[serde(default)]
    pub value: String,
    /// Milliseconds since epoch
    pub timestamp: u64,
}

/// A recorded page navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNavigation {
    /// Destination URL as observed
    pub url: String,
    /// Milliseconds since epoch
    pub timestamp: u64,
}

/// Browser/viewport facts captured at recording start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    /// Page URL at recording start
    pub url: String,
    /// Navigator user agent string
    pub user_agent: String,
    /// Viewport width in CSS pixels
    pub window_width: u32,
    /// Viewport height in CSS pixels
    pub window_height: u32,
}

/// Recording session bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSummary {
    /// Session start, ms since epoch
    pub started_at: u64,
    /// Session end, ms since epoch
    pub completed_at: u64,
}

/// The full capture handed to the action model builder.
///
/// Every block defaults to empty so a partial or malformed capture still
/// deserializes; the builder degrades to whatever survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryRecord {
    /// Recorded clicks
    pub clicks: ClickData,
    /// Recorded text-input edits
    pub input_changes: Vec<InputChange>,
    /// Recorded checkbox/radio/select changes
    pub form_element_changes: Vec<FormElementChange>,
    /// Recorded assertions
    pub assertions: Vec<AssertionRecord>,
    /// Recorded navigations
    pub page_navigation: Vec<PageNavigation>,
    /// Browser facts, when captured
    pub user_info: Option<UserInfo>,
    /// Session bounds, when captured
    pub time: Option<TimeSummary>,
}

/// Tunables for the action model builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackConfig {
    /// Clicks on the same selector within this window collapse to one
    pub multi_click_interval_ms: u64,
    /// Clicks this close to an assertion on an overlapping selector are
    /// treated as recording artifacts and dropped
    pub assertion_click_window_ms: u64,
    /// A navigation this soon after a click earns a wait-for-url action
    pub nav_after_click_window_ms: u64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            multi_click_interval_ms: 300,
            assertion_click_window_ms: 1000,
            nav_after_click_window_ms: 1800,
        }
    }
}

impl TelemetryRecord {
    /// True when no interaction of any kind was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clicks.click_details.is_empty()
            && self.input_changes.is_empty()
            && self.form_element_changes.is_empty()
            && self.assertions.is_empty()
            && self.page_navigation.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_deserializes_from_empty_object() {
        let record: TelemetryRecord = serde_json::from_str("{}").unwrap();
        assert!(record.is_empty());
        assert_eq!(record.clicks.click_details.len(), 0);
    }

    #[test]
    fn partial_record_deserializes() {
        let json = r##"{
            "inputChanges": [
                {"elementSelector": "#email", "value": "a@b.co", "timestamp": 100, "action": "complete"}
            ]
        }"##;
        let record: TelemetryRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_empty());
        assert_eq!(record.input_changes[0].action, Some(InputAction::Complete));
    }

    #[test]
    fn click_detail_round_trips() {
        let detail = ClickDetail {
            x: 10,
            y: 20,
            timestamp: 5000,
            selectors: ElementSelectors {
                primary: "#submit".to_string(),
                text: Some("Submit".to_string()),
                tag_name: Some("button".to_string()),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&detail).unwrap();
        let back: ClickDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(back, detail);
    }

    #[test]
    fn track_config_defaults() {
        let config = TrackConfig::default();
        assert_eq!(config.multi_click_interval_ms, 300);
        assert_eq!(config.assertion_click_window_ms, 1000);
        assert_eq!(config.nav_after_click_window_ms, 1800);
    }

    #[test]
    fn assertion_record_kind_uses_type_key() {
        let json = r#"{"type": "hasText", "selector": ".msg", "value": "Saved", "timestamp": 1}"#;
        let record: AssertionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, "hasText");
    }
}
