//! Playwright source transform for webtrail action sequences.
//!
//! Two independent, loosely-inverse transforms:
//!
//! - [`generator`] renders a canonical action sequence as a runnable
//!   Playwright test file, choosing locator expressions through the
//!   author-time ranking already baked into each action's locator.
//! - [`parser`] reads Playwright test source (including hand-edited
//!   files) back into a flat [`PlaywrightAction`] list, best-effort,
//!   line by line.
//!
//! The round trip is deliberately lossy: source text carries one
//! locator expression per action, not the fallback chain. The scenario
//! JSON envelope in the core crate is the lossless path.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod ast;
mod error;

/// Action sequence to Playwright test source.
pub mod generator;

/// Playwright test source back to actions.
pub mod parser;

pub use ast::{to_actions, ActionType, Expectation, PlaywrightAction};
pub use error::{CodegenError, Result};
pub use generator::{generate, generate_from_scenario, GeneratorOptions};
pub use parser::{parse, parse_strict};
