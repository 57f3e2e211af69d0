//! Replay engine.
//!
//! A per-session state machine that re-executes an action sequence
//! against a live document. Single logical thread: control messages
//! arrive through [`ReplayEngine::handle`], time arrives through
//! [`ReplayEngine::on_timer`], and every state change happens inside
//! those two entry points. At most one timer is armed at a time.
//!
//! Fault tolerance is per action: an element that never resolves or a
//! failing assertion is reported over the channel and skipped after a
//! recovery delay; the run keeps going. The only fatal conditions are
//! an empty action sequence at start and an unreachable channel.

mod retry;
mod scheduler;

pub use retry::{run_with_retry, RetryPolicy};
pub use scheduler::{ManualScheduler, Scheduler, TimerId};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action::{normalize_url, Action, AssertionKind, FormType};
use crate::dom::{Point, ReplayPage, SyntheticEvent};
use crate::protocol::{HostMessage, MessageSink, TargetMessage};
use crate::result::{WebtrailError, WebtrailResult};
use crate::selector::resolve_locator;

/// Settle delay before the first step, scaled by speed.
const SETTLE_DELAY_MS: u64 = 200;
/// URL polling interval for wait-for-url actions.
const URL_POLL_INTERVAL_MS: u64 = 100;
/// Deadline for wait-for-url actions.
const URL_TIMEOUT_MS: u64 = 8000;
/// Pause after a reported per-action error before moving on.
const RECOVERY_DELAY_MS: u64 = 2000;
/// Ceiling on the speed-scaled wait between actions.
const MAX_STEP_WAIT_MS: u64 = 10_000;
/// Accepted speed multiplier range.
const SPEED_RANGE: (f64, f64) = (0.1, 10.0);

/// Externally visible replay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    /// No session in progress
    Idle,
    /// Stepping through actions
    Playing,
    /// Suspended between actions, position retained
    Paused,
    /// Ran past the last action
    Completed,
}

/// What an armed timer means when it fires.
#[derive(Debug, Clone, PartialEq)]
enum TimerPurpose {
    /// Execute (or re-attempt) the current action
    Step,
    /// Re-check the page URL for the current wait-for-url action
    UrlPoll {
        waited_ms: u64,
        expected: String,
    },
}

/// How executing one action went.
enum StepOutcome {
    /// Done; post progress and move on
    Done,
    /// Element did not resolve; retry or give up per policy
    Unresolved,
    /// Start polling the page URL for this normalized destination
    AwaitUrl(String),
    /// Assertion executed and failed
    AssertionFailed(String),
}

/// Per-session replay state machine, generic over the host seams.
#[derive(Debug)]
pub struct ReplayEngine<P, S, M> {
    page: P,
    scheduler: S,
    sink: M,
    session: Uuid,
    status: ReplayStatus,
    actions: Vec<Action>,
    index: usize,
    speed: f64,
    retry: RetryPolicy,
    attempt: u32,
    pending: Option<(TimerId, TimerPurpose)>,
    error_count: usize,
}

impl<P, S, M> ReplayEngine<P, S, M>
where
    P: ReplayPage,
    S: Scheduler,
    M: MessageSink,
{
    /// Idle engine with a fresh session id.
    pub fn new(page: P, scheduler: S, sink: M) -> Self {
        Self {
            page,
            scheduler,
            sink,
            session: Uuid::new_v4(),
            status: ReplayStatus::Idle,
            actions: Vec::new(),
            index: 0,
            speed: 1.0,
            retry: RetryPolicy::resolver(),
            attempt: 0,
            pending: None,
            error_count: 0,
        }
    }

    /// Session identifier, stable for the engine's lifetime.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> ReplayStatus {
        self.status
    }

    /// Index of the next action to execute.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// (next index, total) progress pair.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        (self.index, self.actions.len())
    }

    /// Current speed multiplier.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Per-action errors reported so far this session.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Document seam, shared.
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Document seam, exclusive (host-side DOM mutation between steps).
    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    /// Message sink, shared.
    pub fn sink(&self) -> &M {
        &self.sink
    }

    /// Scheduler seam, exclusive (tests pump timers through this).
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Process one control message.
    pub fn handle(&mut self, message: HostMessage) -> WebtrailResult<()> {
        match message {
            HostMessage::Ping => self.sink.post(TargetMessage::Ready),
            HostMessage::StartReplay { actions, speed } => self.start(actions, speed),
            HostMessage::Pause => self.pause(),
            HostMessage::Resume => self.resume(),
            HostMessage::Stop => self.stop(),
            HostMessage::SetSpeed { speed } => {
                self.set_speed(speed);
                Ok(())
            }
        }
    }

    /// A previously scheduled timer fired.
    ///
    /// Stale ids (canceled by a pause or stop that raced the host's
    /// timer queue) are ignored.
    pub fn on_timer(&mut self, id: TimerId) -> WebtrailResult<()> {
        let purpose = match &self.pending {
            Some((armed, _)) if *armed == id => {
                let (_, purpose) = self.pending.take().unwrap_or((id, TimerPurpose::Step));
                purpose
            }
            _ => {
                debug!(session = %self.session, timer = id, "ignoring stale timer");
                return Ok(());
            }
        };
        if self.status != ReplayStatus::Playing {
            return Ok(());
        }
        match purpose {
            TimerPurpose::Step => self.step(),
            TimerPurpose::UrlPoll {
                waited_ms,
                expected,
            } => self.poll_url(waited_ms, &expected),
        }
    }

    fn start(&mut self, actions: Vec<Action>, speed: f64) -> WebtrailResult<()> {
        if self.status != ReplayStatus::Idle {
            debug!(session = %self.session, "restarting: discarding previous session state");
            self.reset();
        }
        if actions.is_empty() {
            self.sink.post(TargetMessage::Error {
                message: "replay started with no actions".to_string(),
                action_index: 0,
                action: None,
            })?;
            return Err(WebtrailError::EmptyReplay);
        }
        info!(session = %self.session, total = actions.len(), "replay starting");
        self.actions = actions;
        self.index = 0;
        self.attempt = 0;
        self.error_count = 0;
        self.set_speed(speed);
        self.status = ReplayStatus::Playing;
        self.page.show_cursor();
        self.arm(TimerPurpose::Step, self.scaled(SETTLE_DELAY_MS));
        Ok(())
    }

    fn pause(&mut self) -> WebtrailResult<()> {
        if self.status != ReplayStatus::Playing {
            debug!(session = %self.session, status = ?self.status, "pause ignored");
            return Ok(());
        }
        self.disarm();
        self.status = ReplayStatus::Paused;
        self.sink.post(TargetMessage::Paused)
    }

    fn resume(&mut self) -> WebtrailResult<()> {
        if self.status != ReplayStatus::Paused {
            debug!(session = %self.session, status = ?self.status, "resume ignored");
            return Ok(());
        }
        self.status = ReplayStatus::Playing;
        self.sink.post(TargetMessage::Resumed)?;
        self.arm(TimerPurpose::Step, 0);
        Ok(())
    }

    fn stop(&mut self) -> WebtrailResult<()> {
        self.reset();
        self.sink.post(TargetMessage::Stopped)
    }

    fn reset(&mut self) {
        self.disarm();
        self.status = ReplayStatus::Idle;
        self.index = 0;
        self.attempt = 0;
        self.page.hide_cursor();
        self.page.clear_highlights();
    }

    fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() {
            self.speed = speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        } else {
            warn!(session = %self.session, "non-finite speed ignored");
        }
    }

    fn scaled(&self, delay_ms: u64) -> u64 {
        (delay_ms as f64 / self.speed) as u64
    }

    fn arm(&mut self, purpose: TimerPurpose, delay_ms: u64) {
        self.disarm();
        let id = self.scheduler.schedule(delay_ms);
        self.pending = Some((id, purpose));
    }

    fn disarm(&mut self) {
        if let Some((id, _)) = self.pending.take() {
            self.scheduler.cancel(id);
        }
    }

    fn step(&mut self) -> WebtrailResult<()> {
        if self.index >= self.actions.len() {
            return self.complete();
        }
        let action = self.actions[self.index].clone();
        match self.execute_action(&action) {
            Ok(StepOutcome::Done) => {
                self.post_progress(&action)?;
                self.advance(0)
            }
            Ok(StepOutcome::AwaitUrl(expected)) => {
                self.arm(
                    TimerPurpose::UrlPoll {
                        waited_ms: 0,
                        expected,
                    },
                    URL_POLL_INTERVAL_MS,
                );
                Ok(())
            }
            Ok(StepOutcome::Unresolved) => {
                self.attempt += 1;
                if self.retry.exhausted(self.attempt) {
                    let primary = action
                        .locator()
                        .map_or_else(String::new, |l| l.primary.clone());
                    warn!(
                        session = %self.session,
                        index = self.index,
                        selector = primary,
                        "element never resolved, skipping action"
                    );
                    self.report_error(
                        format!("element not found for selector '{primary}'"),
                        Some(action),
                    )?;
                    self.advance(RECOVERY_DELAY_MS)
                } else {
                    self.arm(TimerPurpose::Step, self.retry.delay_for(self.attempt));
                    Ok(())
                }
            }
            Ok(StepOutcome::AssertionFailed(message)) => {
                self.report_error(message, Some(action))?;
                self.advance(RECOVERY_DELAY_MS)
            }
            Err(WebtrailError::ChannelUnreachable(reason)) => {
                Err(WebtrailError::ChannelUnreachable(reason))
            }
            Err(e) => {
                self.report_error(e.to_string(), Some(action))?;
                self.advance(RECOVERY_DELAY_MS)
            }
        }
    }

    fn execute_action(&mut self, action: &Action) -> WebtrailResult<StepOutcome> {
        match action {
            Action::Click { locator, .. } => {
                let Some(node) = resolve_locator(&self.page, locator) else {
                    return Ok(StepOutcome::Unresolved);
                };
                self.page.scroll_into_view(node);
                self.page.highlight(node);
                let at = self
                    .page
                    .bounding_box(node)
                    .map(|b| b.center())
                    .unwrap_or_default();
                self.page.move_cursor(at);
                self.page.click_ripple(at);
                self.page.dispatch(node, SyntheticEvent::mouse_down(at))?;
                self.page.dispatch(node, SyntheticEvent::mouse_up(at))?;
                self.page.dispatch(node, SyntheticEvent::click(at))?;
                Ok(StepOutcome::Done)
            }
            Action::Input { locator, value, .. } => {
                let Some(node) = resolve_locator(&self.page, locator) else {
                    return Ok(StepOutcome::Unresolved);
                };
                self.focus_at(node)?;
                let mut partial = String::with_capacity(value.len());
                for c in value.chars() {
                    partial.push(c);
                    self.page.set_value(node, &partial)?;
                    self.page.dispatch(node, SyntheticEvent::Input)?;
                }
                self.page.dispatch(node, SyntheticEvent::Change)?;
                Ok(StepOutcome::Done)
            }
            Action::Form {
                locator,
                form_type,
                value,
                checked,
                ..
            } => {
                let Some(node) = resolve_locator(&self.page, locator) else {
                    return Ok(StepOutcome::Unresolved);
                };
                self.focus_at(node)?;
                match form_type {
                    FormType::Select => {
                        self.page
                            .set_value(node, value.as_deref().unwrap_or_default())?;
                    }
                    FormType::Checkbox | FormType::Radio => {
                        self.page.set_checked(node, checked.unwrap_or(true))?;
                    }
                }
                self.page.dispatch(node, SyntheticEvent::Change)?;
                Ok(StepOutcome::Done)
            }
            Action::Assertion {
                locator,
                assertion,
                value,
                ..
            } => {
                let Some(node) = resolve_locator(&self.page, locator) else {
                    return Ok(StepOutcome::AssertionFailed(format!(
                        "assertion target '{}' not found",
                        locator.primary
                    )));
                };
                self.page.highlight(node);
                let failure = match assertion {
                    AssertionKind::IsVisible => {
                        (!self.page.is_visible(node)).then(|| "element is not visible".to_string())
                    }
                    AssertionKind::HasText => {
                        let text = self.page.text_content(node);
                        (!text.contains(value.as_str())).then(|| {
                            format!("expected text containing '{value}', found '{text}'")
                        })
                    }
                    AssertionKind::IsChecked => (!self.page.is_checked(node))
                        .then(|| "expected element to be checked".to_string()),
                    AssertionKind::IsNotChecked => self
                        .page
                        .is_checked(node)
                        .then(|| "expected element to be unchecked".to_string()),
                };
                match failure {
                    Some(message) => Ok(StepOutcome::AssertionFailed(message)),
                    None => Ok(StepOutcome::Done),
                }
            }
            Action::Nav { normalized_url, .. } => {
                let here = normalize_url(&self.page.current_url());
                if here != *normalized_url {
                    // Real navigation belongs to the embedding host.
                    debug!(
                        session = %self.session,
                        expected = normalized_url,
                        current = here,
                        "navigation action noted, host owns the address bar"
                    );
                }
                Ok(StepOutcome::Done)
            }
            Action::WaitForUrl { normalized_url, .. } => {
                if normalize_url(&self.page.current_url()) == *normalized_url {
                    Ok(StepOutcome::Done)
                } else {
                    Ok(StepOutcome::AwaitUrl(normalized_url.clone()))
                }
            }
        }
    }

    fn focus_at(&mut self, node: usize) -> WebtrailResult<()> {
        self.page.scroll_into_view(node);
        self.page.highlight(node);
        if let Some(at) = self.page.bounding_box(node).map(|b| b.center()) {
            self.page.move_cursor(Point { x: at.x, y: at.y });
        }
        self.page.dispatch(node, SyntheticEvent::Focus)
    }

    fn poll_url(&mut self, waited_ms: u64, expected: &str) -> WebtrailResult<()> {
        if normalize_url(&self.page.current_url()) == expected {
            let action = self.actions[self.index].clone();
            self.post_progress(&action)?;
            return self.advance(0);
        }
        let waited_ms = waited_ms + URL_POLL_INTERVAL_MS;
        if waited_ms >= URL_TIMEOUT_MS {
            warn!(session = %self.session, expected, "url wait timed out");
            let action = self.actions[self.index].clone();
            self.report_error(
                format!("timed out waiting for url '{expected}'"),
                Some(action),
            )?;
            return self.advance(RECOVERY_DELAY_MS);
        }
        self.arm(
            TimerPurpose::UrlPoll {
                waited_ms,
                expected: expected.to_string(),
            },
            URL_POLL_INTERVAL_MS,
        );
        Ok(())
    }

    fn post_progress(&mut self, action: &Action) -> WebtrailResult<()> {
        self.sink.post(TargetMessage::Progress {
            current: self.index,
            total: self.actions.len(),
            action: action.clone(),
        })
    }

    fn report_error(&mut self, message: String, action: Option<Action>) -> WebtrailResult<()> {
        self.error_count += 1;
        self.sink.post(TargetMessage::Error {
            message,
            action_index: self.index,
            action,
        })
    }

    /// Move to the next action. `extra_delay_ms` is an unscaled penalty
    /// (error recovery); the regular inter-action wait is the recorded
    /// timestamp delta divided by speed, capped.
    fn advance(&mut self, extra_delay_ms: u64) -> WebtrailResult<()> {
        self.attempt = 0;
        self.index += 1;
        if self.index >= self.actions.len() {
            return self.complete();
        }
        let delta = self.actions[self.index]
            .timestamp()
            .saturating_sub(self.actions[self.index - 1].timestamp());
        let wait = self.scaled(delta).min(MAX_STEP_WAIT_MS) + extra_delay_ms;
        self.arm(TimerPurpose::Step, wait);
        Ok(())
    }

    fn complete(&mut self) -> WebtrailResult<()> {
        info!(session = %self.session, errors = self.error_count, "replay completed");
        self.disarm();
        self.status = ReplayStatus::Completed;
        self.page.hide_cursor();
        self.sink.post(TargetMessage::Completed)
    }
}

#[cfg(test)]
mod engine_tests {
    use super::*;
    use crate::action::Locator;
    use crate::dom::{Dom, MemoryDom};
    use crate::protocol::RecordingSink;

    type TestEngine = ReplayEngine<MemoryDom, ManualScheduler, RecordingSink>;

    fn engine_with(dom: MemoryDom) -> TestEngine {
        ReplayEngine::new(dom, ManualScheduler::new(), RecordingSink::new())
    }

    fn pump(engine: &mut TestEngine) {
        while let Some(id) = engine.scheduler_mut().pop_due() {
            engine.on_timer(id).unwrap();
        }
    }

    fn login_page() -> MemoryDom {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let form = dom.add_element_with(body, "form", &[("id", "login")]);
        dom.add_element_with(form, "input", &[("type", "email"), ("id", "email")]);
        let button = dom.add_element_with(form, "button", &[("id", "submit")]);
        dom.set_text(button, "Sign in");
        dom.set_url("https://app.test/login");
        dom
    }

    fn click(ts: u64, selector: &str) -> Action {
        Action::Click {
            timestamp: ts,
            locator: Locator::css(selector),
        }
    }

    #[test]
    fn empty_start_is_fatal() {
        let mut engine = engine_with(login_page());
        let err = engine
            .handle(HostMessage::StartReplay {
                actions: vec![],
                speed: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, WebtrailError::EmptyReplay));
        assert_eq!(engine.status(), ReplayStatus::Idle);
        assert!(matches!(
            engine.sink().messages()[0],
            TargetMessage::Error { .. }
        ));
    }

    #[test]
    fn ping_answers_ready_in_any_state() {
        let mut engine = engine_with(login_page());
        engine.handle(HostMessage::Ping).unwrap();
        assert_eq!(engine.sink().messages(), &[TargetMessage::Ready]);
    }

    #[test]
    fn full_run_completes_with_effects() {
        let mut engine = engine_with(login_page());
        let actions = vec![
            Action::Input {
                timestamp: 1000,
                locator: Locator::css("#email"),
                value: "jane@example.com".to_string(),
            },
            click(2000, "#submit"),
            Action::Assertion {
                timestamp: 2500,
                locator: Locator::css("#submit"),
                assertion: AssertionKind::HasText,
                value: "Sign in".to_string(),
            },
        ];
        engine
            .handle(HostMessage::StartReplay {
                actions,
                speed: 1.0,
            })
            .unwrap();
        assert_eq!(engine.status(), ReplayStatus::Playing);
        pump(&mut engine);

        assert_eq!(engine.status(), ReplayStatus::Completed);
        assert_eq!(engine.error_count(), 0);
        let email = engine.page().query("#email").unwrap();
        assert_eq!(engine.page().value_of(email), Some("jane@example.com"));
        // mousedown, mouseup, click on the button
        let button = engine.page().query("#submit").unwrap();
        let clicks: Vec<_> = engine
            .page()
            .events()
            .iter()
            .filter(|(node, _)| *node == button)
            .collect();
        assert!(matches!(clicks[0].1, SyntheticEvent::MouseDown { .. }));
        assert!(matches!(clicks[1].1, SyntheticEvent::MouseUp { .. }));
        assert!(matches!(clicks[2].1, SyntheticEvent::Click { .. }));
        let progress = engine
            .sink()
            .messages()
            .iter()
            .filter(|m| matches!(m, TargetMessage::Progress { .. }))
            .count();
        assert_eq!(progress, 3);
        assert!(matches!(
            engine.sink().messages().last(),
            Some(TargetMessage::Completed)
        ));
    }

    #[test]
    fn per_char_typing_then_change() {
        let mut engine = engine_with(login_page());
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![Action::Input {
                    timestamp: 0,
                    locator: Locator::css("#email"),
                    value: "abc".to_string(),
                }],
                speed: 1.0,
            })
            .unwrap();
        pump(&mut engine);
        let email = engine.page().query("#email").unwrap();
        let inputs = engine
            .page()
            .events()
            .iter()
            .filter(|(n, e)| *n == email && *e == SyntheticEvent::Input)
            .count();
        let changes = engine
            .page()
            .events()
            .iter()
            .filter(|(n, e)| *n == email && *e == SyntheticEvent::Change)
            .count();
        assert_eq!(inputs, 3);
        assert_eq!(changes, 1);
    }

    #[test]
    fn pause_cancels_timers_and_resume_continues() {
        let mut engine = engine_with(login_page());
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![click(0, "#submit"), click(5000, "#submit")],
                speed: 1.0,
            })
            .unwrap();
        // Execute the first action only.
        let id = engine.scheduler_mut().pop_due().unwrap();
        engine.on_timer(id).unwrap();
        assert_eq!(engine.current_index(), 1);

        engine.handle(HostMessage::Pause).unwrap();
        assert_eq!(engine.status(), ReplayStatus::Paused);
        assert_eq!(engine.scheduler_mut().armed_count(), 0);

        engine.handle(HostMessage::Resume).unwrap();
        assert_eq!(engine.status(), ReplayStatus::Playing);
        pump(&mut engine);
        assert_eq!(engine.status(), ReplayStatus::Completed);
        assert!(engine
            .sink()
            .messages()
            .iter()
            .any(|m| *m == TargetMessage::Paused));
        assert!(engine
            .sink()
            .messages()
            .iter()
            .any(|m| *m == TargetMessage::Resumed));
    }

    #[test]
    fn stop_resets_to_idle() {
        let mut engine = engine_with(login_page());
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![click(0, "#submit"), click(100, "#submit")],
                speed: 1.0,
            })
            .unwrap();
        assert!(engine.page().cursor_visible());
        engine.handle(HostMessage::Stop).unwrap();
        assert_eq!(engine.status(), ReplayStatus::Idle);
        assert_eq!(engine.current_index(), 0);
        assert!(!engine.page().cursor_visible());
        assert!(engine.page().highlights().is_empty());
        assert_eq!(engine.scheduler_mut().armed_count(), 0);
        assert!(matches!(
            engine.sink().messages().last(),
            Some(TargetMessage::Stopped)
        ));
    }

    #[test]
    fn unresolved_element_retries_then_skips() {
        // A page with no interactive elements defeats every ladder rung.
        let mut dom = MemoryDom::new();
        let body = dom.body();
        dom.add_element(body, "div");
        let mut engine = engine_with(dom);
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![click(0, "#gone"), click(10, "#also-gone")],
                speed: 1.0,
            })
            .unwrap();
        pump(&mut engine);
        assert_eq!(engine.status(), ReplayStatus::Completed);
        assert_eq!(engine.error_count(), 2);
        // Backoff ladder per action: 500, 1000, 1500, 2000 between the
        // five attempts, then the recovery delay.
        let delays = engine.scheduler_mut().scheduled_delays().to_vec();
        assert!(delays.windows(4).any(|w| w == [500, 1000, 1500, 2000]));
        let errors: Vec<usize> = engine
            .sink()
            .messages()
            .iter()
            .filter_map(|m| match m {
                TargetMessage::Error { action_index, .. } => Some(*action_index),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec![0, 1]);
    }

    #[test]
    fn failed_assertion_reports_and_continues() {
        let mut engine = engine_with(login_page());
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![
                    Action::Assertion {
                        timestamp: 0,
                        locator: Locator::css("#submit"),
                        assertion: AssertionKind::HasText,
                        value: "Log out".to_string(),
                    },
                    click(100, "#submit"),
                ],
                speed: 1.0,
            })
            .unwrap();
        pump(&mut engine);
        assert_eq!(engine.status(), ReplayStatus::Completed);
        assert_eq!(engine.error_count(), 1);
        let has_error = engine.sink().messages().iter().any(|m| {
            matches!(m, TargetMessage::Error { message, .. } if message.contains("Log out"))
        });
        assert!(has_error);
    }

    #[test]
    fn wait_for_url_succeeds_when_page_arrives() {
        let mut engine = engine_with(login_page());
        engine.page_mut().set_url("https://app.test/dashboard?tab=1");
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![Action::WaitForUrl {
                    timestamp: 0,
                    expected_url: "https://app.test/dashboard".to_string(),
                    normalized_url: "https://app.test/dashboard".to_string(),
                }],
                speed: 1.0,
            })
            .unwrap();
        pump(&mut engine);
        assert_eq!(engine.status(), ReplayStatus::Completed);
        assert_eq!(engine.error_count(), 0);
    }

    #[test]
    fn wait_for_url_times_out_and_continues() {
        let mut engine = engine_with(login_page());
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![Action::WaitForUrl {
                    timestamp: 0,
                    expected_url: "https://app.test/never".to_string(),
                    normalized_url: "https://app.test/never".to_string(),
                }],
                speed: 1.0,
            })
            .unwrap();
        pump(&mut engine);
        assert_eq!(engine.status(), ReplayStatus::Completed);
        assert_eq!(engine.error_count(), 1);
        // The poll loop burned through the full deadline.
        assert!(engine.scheduler_mut().now() >= URL_TIMEOUT_MS);
    }

    #[test]
    fn inter_action_wait_is_scaled_and_capped() {
        let mut engine = engine_with(login_page());
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![click(0, "#submit"), click(60_000, "#submit")],
                speed: 2.0,
            })
            .unwrap();
        pump(&mut engine);
        let delays = engine.scheduler_mut().scheduled_delays();
        // 60s of recorded gap at 2x would be 30s; the cap holds it to 10s.
        assert!(delays.contains(&MAX_STEP_WAIT_MS));
    }

    #[test]
    fn set_speed_clamps() {
        let mut engine = engine_with(login_page());
        engine.handle(HostMessage::SetSpeed { speed: 99.0 }).unwrap();
        assert!((engine.speed() - SPEED_RANGE.1).abs() < f64::EPSILON);
        engine.handle(HostMessage::SetSpeed { speed: 0.0 }).unwrap();
        assert!((engine.speed() - SPEED_RANGE.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nav_action_is_informational() {
        let mut engine = engine_with(login_page());
        engine
            .handle(HostMessage::StartReplay {
                actions: vec![Action::Nav {
                    timestamp: 0,
                    url: "https://app.test/login".to_string(),
                    normalized_url: "https://app.test/login".to_string(),
                }],
                speed: 1.0,
            })
            .unwrap();
        pump(&mut engine);
        assert_eq!(engine.status(), ReplayStatus::Completed);
        assert_eq!(engine.error_count(), 0);
    }
}
