//! Error types for the webtrail core.

use thiserror::Error;

/// Result type alias for core operations.
pub type WebtrailResult<T> = std::result::Result<T, WebtrailError>;

/// Errors that can occur while building, packaging, or replaying an
/// action sequence.
///
/// Per-action replay failures (an element that never resolves, a failed
/// assertion) are deliberately NOT in this enum: the engine reports them
/// over the message channel and keeps going. These variants are the
/// boundary errors that stop an operation outright.
#[derive(Debug, Error)]
pub enum WebtrailError {
    /// A persisted selector string did not parse as the micro-syntax.
    #[error("Invalid selector '{selector}': {reason}")]
    SelectorParse {
        /// The offending selector text
        selector: String,
        /// Why it failed to parse
        reason: String,
    },

    /// A scenario envelope carried a version this build does not speak.
    #[error("Unsupported scenario version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the envelope
        found: u32,
        /// Version this build reads and writes
        supported: u32,
    },

    /// A replay was started with an empty action sequence.
    #[error("Cannot start replay: action sequence is empty")]
    EmptyReplay,

    /// The cross-context message channel is unreachable.
    ///
    /// Posting is fire-and-forget; a send failure means the target
    /// context is gone and the session cannot continue.
    #[error("Message channel unreachable: {0}")]
    ChannelUnreachable(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error during scenario save/load.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
