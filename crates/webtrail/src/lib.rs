//! Webtrail: browser-side record/replay engine.
//!
//! Captured user-interaction telemetry is normalized into a portable,
//! timestamp-ordered action sequence. From there the workspace offers two
//! independent serializations: a versioned scenario envelope (JSON), and
//! Playwright-style test source (see the `webtrail-codegen` crate). The
//! replay half re-executes an action sequence against a live document,
//! tolerating selector drift through a layered resolution ladder.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐   ┌────────────────┐
//! │ Telemetry     │──►│ Action Model  │──►│ Scenario /     │
//! │ Record        │   │ Builder       │   │ Test Source    │
//! └───────────────┘   └───────────────┘   └───────┬────────┘
//!                                                 │
//!                     ┌───────────────┐   ┌───────▼────────┐
//!                     │ Selector      │◄──│ Replay Engine  │
//!                     │ Resolution    │   │ (state machine)│
//!                     └───────────────┘   └────────────────┘
//! ```
//!
//! The live document and timer loop belong to the embedding host, so the
//! engine is written against three narrow seams: [`Dom`]/[`ReplayPage`]
//! for the document, [`Scheduler`] for timers, and [`MessageSink`] for the
//! cross-context control channel. [`MemoryDom`] implements the document
//! seams for tests and headless hosts.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod action;
mod builder;
mod dom;
mod result;
mod scenario;
mod telemetry;

/// Fault-tolerant replay state machine and retry policy.
pub mod replay;

/// Selector micro-syntax, stability heuristics, and resolution ladders.
pub mod selector;

/// Cross-context control/progress message envelopes.
pub mod protocol;

/// Opt-in tracing subscriber setup for hosts and integration tests.
pub mod tracing_support;

pub use action::{normalize_url, Action, ActionKind, AssertionKind, FormType, Locator};
pub use builder::{refine_locators, results_to_actions};
pub use dom::{
    BoundingBox, Dom, MemoryDom, NodeId, Point, ReplayPage, SyntheticEvent, INTERACTIVE_TAGS,
};
pub use protocol::{HostMessage, MessageSink, RecordingSink, TargetMessage};
pub use replay::{ManualScheduler, ReplayEngine, ReplayStatus, RetryPolicy, Scheduler, TimerId};
pub use result::{WebtrailError, WebtrailResult};
pub use scenario::{build_scenario, Scenario, ScenarioMeta, Viewport, SCENARIO_VERSION};
pub use selector::{SelectorExpr, SelectorFilter, SelectorIndex};
pub use telemetry::{
    AssertionRecord, ClickData, ClickDetail, ElementSelectors, FormElementChange, InputAction,
    InputChange, PageNavigation, TelemetryRecord, TimeSummary, TrackConfig, UserInfo,
};
