//! Error types for the codegen crate.

use thiserror::Error;

/// Result type alias for codegen operations.
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Errors that can stop a source transform outright.
///
/// The parser itself is best-effort and never raises these per line;
/// only the boundary conditions below are fatal.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Non-empty test source parsed to zero actions.
    ///
    /// Starting a replay from such a parse would silently do nothing,
    /// so the condition is surfaced instead.
    #[error("Test source yielded no actions ({lines} non-empty lines examined)")]
    EmptyTest {
        /// Non-empty, non-comment lines the parser examined
        lines: usize,
    },

    /// Generation was asked to render an empty action sequence.
    #[error("Cannot generate a test from an empty action sequence")]
    NoActions,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_test_display_carries_line_count() {
        let err = CodegenError::EmptyTest { lines: 12 };
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn no_actions_display() {
        assert!(CodegenError::NoActions.to_string().contains("empty"));
    }
}
