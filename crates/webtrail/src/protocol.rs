//! Cross-context message protocol.
//!
//! The host UI and the replay target talk over a fire-and-forget
//! channel (postMessage or equivalent). Envelopes are tagged with a
//! kebab-case `type` so either side can be implemented in any language.
//! Unknown message types are ignored by receivers; a failed send means
//! the peer context is gone and the session is over.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::result::WebtrailResult;

/// Control messages, host to replay target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    /// Begin replaying an action sequence.
    StartReplay {
        /// Actions to replay, already ordered
        actions: Vec<Action>,
        /// Playback speed multiplier
        #[serde(default = "default_speed")]
        speed: f64,
    },
    /// Suspend after the in-flight step settles.
    Pause,
    /// Continue from the paused index.
    Resume,
    /// Abort and reset to idle.
    Stop,
    /// Change playback speed mid-run.
    SetSpeed {
        /// New speed multiplier
        speed: f64,
    },
    /// Liveness probe; always answered with `ready`.
    Ping,
}

fn default_speed() -> f64 {
    1.0
}

/// Status messages, replay target to host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TargetMessage {
    /// Engine is alive and reachable.
    Ready,
    /// An action just executed.
    Progress {
        /// Index of the executed action
        current: usize,
        /// Total actions in the sequence
        total: usize,
        /// The executed action
        action: Action,
    },
    /// The sequence finished.
    Completed,
    /// Pause took effect.
    Paused,
    /// Resume took effect.
    Resumed,
    /// Stop took effect; engine is idle again.
    Stopped,
    /// A per-action failure; the run continues.
    Error {
        /// Human-readable description
        message: String,
        /// Index of the failing action
        action_index: usize,
        /// The failing action, when one was in flight
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<Action>,
    },
}

/// Outbound half of the channel.
///
/// `post` failing is fatal for the session: the engine surfaces it as
/// [`crate::WebtrailError::ChannelUnreachable`] instead of continuing
/// into the void.
pub trait MessageSink {
    /// Send one message to the peer context.
    fn post(&mut self, message: TargetMessage) -> WebtrailResult<()>;
}

/// Sink that records everything it is given. The default sink for tests
/// and headless runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Vec<TargetMessage>,
}

impl RecordingSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything posted so far, in order.
    #[must_use]
    pub fn messages(&self) -> &[TargetMessage] {
        &self.messages
    }
}

impl MessageSink for RecordingSink {
    fn post(&mut self, message: TargetMessage) -> WebtrailResult<()> {
        self.messages.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Locator;

    #[test]
    fn host_messages_use_kebab_type_tags() {
        let json = serde_json::to_value(&HostMessage::SetSpeed { speed: 2.0 }).unwrap();
        assert_eq!(json["type"], "set-speed");
        let json = serde_json::to_value(&HostMessage::Ping).unwrap();
        assert_eq!(json["type"], "ping");
    }

    #[test]
    fn start_replay_defaults_speed() {
        let msg: HostMessage =
            serde_json::from_str(r#"{"type":"start-replay","actions":[]}"#).unwrap();
        match msg {
            HostMessage::StartReplay { speed, actions } => {
                assert!((speed - 1.0).abs() < f64::EPSILON);
                assert!(actions.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn progress_round_trips_with_action() {
        let msg = TargetMessage::Progress {
            current: 2,
            total: 9,
            action: Action::Click {
                timestamp: 10,
                locator: Locator::css("#go"),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: TargetMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn error_omits_absent_action() {
        let json = serde_json::to_value(&TargetMessage::Error {
            message: "boom".to_string(),
            action_index: 3,
            action: None,
        })
        .unwrap();
        assert!(json.get("action").is_none());
    }

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.post(TargetMessage::Ready).unwrap();
        sink.post(TargetMessage::Completed).unwrap();
        assert_eq!(
            sink.messages(),
            &[TargetMessage::Ready, TargetMessage::Completed]
        );
    }
}
