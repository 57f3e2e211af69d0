//! Scenario envelope.
//!
//! The versioned, self-describing JSON package for a recorded session:
//! metadata plus the canonical action sequence. Round trips are
//! identity; unknown versions are rejected outright rather than guessed
//! at.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::result::{WebtrailError, WebtrailResult};
use crate::telemetry::TelemetryRecord;

/// Envelope version this build reads and writes.
pub const SCENARIO_VERSION: u32 = 1;

/// Viewport dimensions captured at recording time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

/// Session metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioMeta {
    /// Origin the session was recorded against
    pub base_origin: String,
    /// Session start, ms since epoch
    pub started_at: u64,
    /// Session end, ms since epoch
    pub completed_at: u64,
    /// `completed_at - started_at`, never negative
    pub duration_ms: u64,
    /// Navigator user agent, when captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Viewport, when captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    /// Page URL at recording start, when captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A packaged recording: version, metadata, actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Envelope version, see [`SCENARIO_VERSION`]
    pub version: u32,
    /// Session metadata
    pub meta: ScenarioMeta,
    /// Canonical action sequence
    pub actions: Vec<Action>,
}

fn origin_of(url: &str) -> String {
    url.find("://").map_or_else(
        || url.to_string(),
        |scheme| {
            let after = scheme + 3;
            match url[after..].find('/') {
                Some(slash) => url[..after + slash].to_string(),
                None => url.to_string(),
            }
        },
    )
}

/// Package actions and metadata into a scenario.
///
/// Timestamps fall back gracefully: the recorded time summary first,
/// then the action sequence's own bounds, then the wall clock. A
/// zero-duration scenario (single instantaneous action) is valid.
#[must_use]
pub fn build_scenario(record: &TelemetryRecord, actions: &[Action]) -> Scenario {
    let now = || chrono::Utc::now().timestamp_millis().max(0) as u64;

    let started_at = record
        .time
        .as_ref()
        .map(|t| t.started_at)
        .filter(|&t| t > 0)
        .or_else(|| actions.first().map(Action::timestamp))
        .unwrap_or_else(now);
    let completed_at = record
        .time
        .as_ref()
        .map(|t| t.completed_at)
        .filter(|&t| t > 0)
        .or_else(|| actions.last().map(Action::timestamp))
        .unwrap_or(started_at)
        .max(started_at);

    let meta = ScenarioMeta {
        base_origin: record
            .user_info
            .as_ref()
            .map(|u| origin_of(&u.url))
            .unwrap_or_default(),
        started_at,
        completed_at,
        duration_ms: completed_at - started_at,
        user_agent: record
            .user_info
            .as_ref()
            .map(|u| u.user_agent.clone())
            .filter(|ua| !ua.is_empty()),
        viewport: record.user_info.as_ref().map(|u| Viewport {
            width: u.window_width,
            height: u.window_height,
        }),
        url: record
            .user_info
            .as_ref()
            .map(|u| u.url.clone())
            .filter(|url| !url.is_empty()),
    };

    Scenario {
        version: SCENARIO_VERSION,
        meta,
        actions: actions.to_vec(),
    }
}

impl Scenario {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> WebtrailResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, rejecting unknown versions.
    pub fn from_json(json: &str) -> WebtrailResult<Self> {
        let scenario: Self = serde_json::from_str(json)?;
        if scenario.version != SCENARIO_VERSION {
            return Err(WebtrailError::UnsupportedVersion {
                found: scenario.version,
                supported: SCENARIO_VERSION,
            });
        }
        Ok(scenario)
    }

    /// Write the scenario to a file as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> WebtrailResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a scenario from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> WebtrailResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Locator;
    use crate::telemetry::{TimeSummary, UserInfo};

    fn sample_actions() -> Vec<Action> {
        vec![
            Action::Nav {
                timestamp: 1000,
                url: "https://app.test/".to_string(),
                normalized_url: "https://app.test/".to_string(),
            },
            Action::Click {
                timestamp: 2500,
                locator: Locator::css("#go"),
            },
        ]
    }

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            user_info: Some(UserInfo {
                url: "https://app.test/login?next=%2F".to_string(),
                user_agent: "agent/1.0".to_string(),
                window_width: 1280,
                window_height: 720,
            }),
            time: Some(TimeSummary {
                started_at: 900,
                completed_at: 3000,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn metadata_and_duration() {
        let scenario = build_scenario(&record(), &sample_actions());
        assert_eq!(scenario.version, SCENARIO_VERSION);
        assert_eq!(scenario.meta.base_origin, "https://app.test");
        assert_eq!(scenario.meta.duration_ms, 2100);
        assert_eq!(
            scenario.meta.viewport,
            Some(Viewport {
                width: 1280,
                height: 720
            })
        );
    }

    #[test]
    fn falls_back_to_action_bounds() {
        let scenario = build_scenario(&TelemetryRecord::default(), &sample_actions());
        assert_eq!(scenario.meta.started_at, 1000);
        assert_eq!(scenario.meta.completed_at, 2500);
        assert_eq!(scenario.meta.duration_ms, 1500);
    }

    #[test]
    fn empty_scenario_uses_wall_clock_and_zero_duration() {
        let scenario = build_scenario(&TelemetryRecord::default(), &[]);
        assert!(scenario.meta.started_at > 0);
        assert_eq!(scenario.meta.duration_ms, 0);
    }

    #[test]
    fn json_round_trip_is_identity() {
        let scenario = build_scenario(&record(), &sample_actions());
        let json = scenario.to_json().unwrap();
        let back = Scenario::from_json(&json).unwrap();
        assert_eq!(back, scenario);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut scenario = build_scenario(&record(), &sample_actions());
        scenario.version = 7;
        let json = serde_json::to_string(&scenario).unwrap();
        let err = Scenario::from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            WebtrailError::UnsupportedVersion { found: 7, .. }
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let scenario = build_scenario(&record(), &sample_actions());
        scenario.save(&path).unwrap();
        let back = Scenario::load(&path).unwrap();
        assert_eq!(back, scenario);
    }
}
