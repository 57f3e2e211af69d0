//! Action model builder.
//!
//! Turns a raw [`TelemetryRecord`] into the canonical, timestamp-ordered
//! action sequence. Recording artifacts are scrubbed here: double-click
//! bursts collapse, clicks that were really assertion gestures drop, and
//! navigations that follow a click closely earn an explicit wait so the
//! replay engine does not race the page.

use tracing::{debug, warn};

use crate::action::{
    normalize_url, sort_actions, Action, AssertionKind, FormType, Locator,
};
use crate::dom::Dom;
use crate::selector::{locator_for_click, match_count};
use crate::telemetry::{ClickDetail, InputAction, TelemetryRecord, TrackConfig};

/// Bare tags that can never count as "unique" during refinement, no
/// matter what the document currently contains.
const GENERIC_BARE_TAGS: &[&str] = &["html", "body", "div", "span", "p", "button", "input"];

/// Build the canonical action sequence from a telemetry record.
///
/// Degrades, never fails: malformed or empty blocks contribute nothing,
/// clicks without derivable selectors are dropped with a warning.
#[must_use]
pub fn results_to_actions(record: &TelemetryRecord, config: &TrackConfig) -> Vec<Action> {
    let mut actions: Vec<Action> = Vec::new();

    for nav in &record.page_navigation {
        actions.push(Action::Nav {
            timestamp: nav.timestamp,
            url: nav.url.clone(),
            normalized_url: normalize_url(&nav.url),
        });
    }

    let clicks = filtered_clicks(record, config);
    let mut claimed_navs: Vec<usize> = Vec::new();
    for click in &clicks {
        let Some(locator) = locator_for_click(&click.selectors) else {
            warn!(
                x = click.x,
                y = click.y,
                timestamp = click.timestamp,
                "dropping click with no derivable selector"
            );
            continue;
        };
        actions.push(Action::Click {
            timestamp: click.timestamp,
            locator,
        });

        // A navigation shortly after a click was almost certainly caused
        // by it; wait for the URL before moving on.
        let caused_nav = record.page_navigation.iter().enumerate().find(|(i, nav)| {
            !claimed_navs.contains(i)
                && nav.timestamp > click.timestamp
                && nav.timestamp - click.timestamp <= config.nav_after_click_window_ms
        });
        if let Some((i, nav)) = caused_nav {
            claimed_navs.push(i);
            actions.push(Action::WaitForUrl {
                timestamp: nav.timestamp.saturating_sub(1),
                expected_url: nav.url.clone(),
                normalized_url: normalize_url(&nav.url),
            });
        }
    }

    for input in &record.input_changes {
        // Keystroke snapshots are noise; only settled values replay.
        if input.action == Some(InputAction::Typing) {
            continue;
        }
        if input.element_selector.is_empty() {
            debug!(timestamp = input.timestamp, "skipping input edit without selector");
            continue;
        }
        actions.push(Action::Input {
            timestamp: input.timestamp,
            locator: Locator::css(input.element_selector.clone()),
            value: input.value.clone(),
        });
    }

    for change in &record.form_element_changes {
        let form_type = match change.form_type.as_str() {
            "checkbox" => FormType::Checkbox,
            "radio" => FormType::Radio,
            "select" => FormType::Select,
            other => {
                warn!(form_type = other, "skipping unrecognized form change");
                continue;
            }
        };
        if change.element_selector.is_empty() {
            continue;
        }
        actions.push(Action::Form {
            timestamp: change.timestamp,
            locator: Locator::css(change.element_selector.clone()),
            form_type,
            value: change.value.clone(),
            checked: change.checked,
        });
    }

    for assertion in &record.assertions {
        if assertion.selector.is_empty() {
            continue;
        }
        let kind = match assertion.kind.as_str() {
            "isVisible" => AssertionKind::IsVisible,
            "hasText" | "containsText" => AssertionKind::HasText,
            "isChecked" => AssertionKind::IsChecked,
            "isNotChecked" => AssertionKind::IsNotChecked,
            other => {
                debug!(kind = other, "unknown assertion kind, treating as hasText");
                AssertionKind::HasText
            }
        };
        actions.push(Action::Assertion {
            timestamp: assertion.timestamp,
            locator: Locator::css(assertion.selector.clone()),
            assertion: kind,
            value: assertion.value.trim().to_string(),
        });
    }

    sort_actions(&mut actions);
    actions
}

/// Drop assertion-gesture clicks and collapse multi-click bursts.
fn filtered_clicks<'a>(
    record: &'a TelemetryRecord,
    config: &TrackConfig,
) -> Vec<&'a ClickDetail> {
    let mut clicks: Vec<&ClickDetail> = record
        .clicks
        .click_details
        .iter()
        .filter(|click| {
            let near_assertion = record.assertions.iter().any(|a| {
                click.timestamp.abs_diff(a.timestamp) <= config.assertion_click_window_ms
                    && selectors_overlap(&click.selectors.primary, &a.selector)
            });
            if near_assertion {
                debug!(
                    selector = click.selectors.primary,
                    "dropping click adjacent to an assertion on the same element"
                );
            }
            !near_assertion
        })
        .collect();
    clicks.sort_by_key(|c| c.timestamp);

    let mut kept: Vec<&ClickDetail> = Vec::new();
    for click in clicks {
        let burst = kept.last().is_some_and(|last| {
            last.selectors.primary == click.selectors.primary
                && !click.selectors.primary.is_empty()
                && click.timestamp - last.timestamp <= config.multi_click_interval_ms
        });
        if burst {
            debug!(
                selector = click.selectors.primary,
                "collapsing multi-click burst"
            );
        } else {
            kept.push(click);
        }
    }
    kept
}

/// Selector overlap: identical, or one contains the other as a fragment.
fn selectors_overlap(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(b) || b.contains(a)
}

fn is_unique(dom: &dyn Dom, selector: &str) -> bool {
    if GENERIC_BARE_TAGS.contains(&selector) {
        return false;
    }
    match_count(dom, selector) == 1
}

/// Validate and tighten locators against the live document.
///
/// Each locator keeps its document-unique candidates, best first, capped
/// at a primary plus two fallbacks. When two same-kind actions end up
/// sharing a primary, the later one promotes a differing fallback so the
/// generated test does not act on the wrong twin.
pub fn refine_locators(actions: &mut [Action], dom: &dyn Dom) {
    for action in actions.iter_mut() {
        let Some(locator) = action.locator_mut() else {
            continue;
        };
        let mut candidates: Vec<String> = Vec::new();
        candidates.push(locator.primary.clone());
        candidates.extend(locator.fallbacks.iter().cloned());

        let unique: Vec<String> = candidates
            .iter()
            .filter(|c| !c.is_empty() && is_unique(dom, c))
            .cloned()
            .collect();

        if unique.is_empty() {
            // Nothing validates; keep what was recorded, trimmed.
            locator.fallbacks.truncate(2);
            continue;
        }
        locator.primary = unique[0].clone();
        locator.fallbacks = unique[1..].iter().take(2).cloned().collect();
    }

    // Same-kind duplicate pass.
    let len = actions.len();
    for i in 0..len {
        let (earlier, rest) = actions.split_at_mut(i);
        let Some(current) = rest.first_mut() else {
            continue;
        };
        let kind = current.kind();
        let Some(locator) = current.locator_mut() else {
            continue;
        };
        let clash = earlier.iter().any(|prev| {
            prev.kind() == kind
                && prev
                    .locator()
                    .is_some_and(|l| l.primary == locator.primary)
        });
        if clash {
            if let Some(pos) = locator
                .fallbacks
                .iter()
                .position(|f| *f != locator.primary && is_unique(dom, f))
            {
                let promoted = locator.fallbacks.remove(pos);
                let old = std::mem::replace(&mut locator.primary, promoted);
                locator.fallbacks.insert(0, old);
                locator.fallbacks.truncate(2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::dom::MemoryDom;
    use crate::telemetry::{
        AssertionRecord, ClickData, ElementSelectors, FormElementChange, InputChange,
        PageNavigation,
    };

    fn click_at(ts: u64, primary: &str) -> ClickDetail {
        ClickDetail {
            x: 0,
            y: 0,
            timestamp: ts,
            selectors: ElementSelectors {
                primary: primary.to_string(),
                tag_name: Some("button".to_string()),
                ..Default::default()
            },
        }
    }

    fn record_with_clicks(clicks: Vec<ClickDetail>) -> TelemetryRecord {
        TelemetryRecord {
            clicks: ClickData {
                click_details: clicks,
            },
            ..Default::default()
        }
    }

    #[test]
    fn empty_record_builds_empty_sequence() {
        let actions = results_to_actions(&TelemetryRecord::default(), &TrackConfig::default());
        assert!(actions.is_empty());
    }

    #[test]
    fn multi_click_burst_collapses_at_interval() {
        let record = record_with_clicks(vec![
            click_at(1000, "#submit"),
            click_at(1250, "#submit"),
            click_at(1300, "#submit"),
        ]);
        let actions = results_to_actions(&record, &TrackConfig::default());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].timestamp(), 1000);
    }

    #[test]
    fn clicks_beyond_interval_are_kept() {
        let record = record_with_clicks(vec![
            click_at(1000, "#submit"),
            click_at(1400, "#submit"),
        ]);
        let actions = results_to_actions(&record, &TrackConfig::default());
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn distinct_selectors_never_collapse() {
        let record = record_with_clicks(vec![click_at(1000, "#a"), click_at(1050, "#b")]);
        let actions = results_to_actions(&record, &TrackConfig::default());
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn assertion_adjacent_click_is_dropped() {
        let mut record = record_with_clicks(vec![click_at(1000, ".message")]);
        record.assertions.push(AssertionRecord {
            kind: "hasText".to_string(),
            selector: ".message".to_string(),
            value: "Saved".to_string(),
            timestamp: 1600,
        });
        let actions = results_to_actions(&record, &TrackConfig::default());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind(), ActionKind::Assertion);
    }

    #[test]
    fn nav_within_window_earns_wait_for_url() {
        let mut record = record_with_clicks(vec![click_at(1000, "#go")]);
        record.page_navigation.push(PageNavigation {
            url: "https://app.test/orders?page=1".to_string(),
            timestamp: 2000,
        });
        let actions = results_to_actions(&record, &TrackConfig::default());
        let kinds: Vec<ActionKind> = actions.iter().map(Action::kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Click, ActionKind::WaitForUrl, ActionKind::Nav]
        );
        match &actions[1] {
            Action::WaitForUrl {
                timestamp,
                normalized_url,
                ..
            } => {
                assert_eq!(*timestamp, 1999);
                assert_eq!(normalized_url, "https://app.test/orders");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn nav_outside_window_gets_no_wait() {
        let mut record = record_with_clicks(vec![click_at(1000, "#go")]);
        record.page_navigation.push(PageNavigation {
            url: "https://app.test/slow".to_string(),
            timestamp: 3200,
        });
        let actions = results_to_actions(&record, &TrackConfig::default());
        assert!(actions.iter().all(|a| a.kind() != ActionKind::WaitForUrl));
    }

    #[test]
    fn typing_snapshots_are_dropped_final_value_kept() {
        let mut record = TelemetryRecord::default();
        record.input_changes = vec![
            InputChange {
                element_selector: "#email".to_string(),
                value: "ja".to_string(),
                timestamp: 100,
                action: Some(InputAction::Typing),
            },
            InputChange {
                element_selector: "#email".to_string(),
                value: "jane@example.com".to_string(),
                timestamp: 900,
                action: Some(InputAction::Complete),
            },
        ];
        let actions = results_to_actions(&record, &TrackConfig::default());
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Input { value, .. } => assert_eq!(value, "jane@example.com"),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn form_changes_map_by_type() {
        let mut record = TelemetryRecord::default();
        record.form_element_changes = vec![
            FormElementChange {
                element_selector: "#terms".to_string(),
                form_type: "checkbox".to_string(),
                value: None,
                checked: Some(true),
                text: None,
                timestamp: 100,
            },
            FormElementChange {
                element_selector: "#plan".to_string(),
                form_type: "select".to_string(),
                value: Some("pro".to_string()),
                checked: None,
                text: Some("Pro plan".to_string()),
                timestamp: 200,
            },
            FormElementChange {
                element_selector: "#bogus".to_string(),
                form_type: "slider".to_string(),
                value: None,
                checked: None,
                text: None,
                timestamp: 300,
            },
        ];
        let actions = results_to_actions(&record, &TrackConfig::default());
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            actions[0],
            Action::Form {
                form_type: FormType::Checkbox,
                checked: Some(true),
                ..
            }
        ));
        assert!(matches!(
            actions[1],
            Action::Form {
                form_type: FormType::Select,
                ..
            }
        ));
    }

    #[test]
    fn output_is_timestamp_ordered() {
        let mut record = record_with_clicks(vec![click_at(5000, "#late"), click_at(100, "#early")]);
        record.page_navigation.push(PageNavigation {
            url: "https://app.test/".to_string(),
            timestamp: 50,
        });
        let actions = results_to_actions(&record, &TrackConfig::default());
        let stamps: Vec<u64> = actions.iter().map(Action::timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort_unstable();
        assert_eq!(stamps, sorted);
    }

    #[test]
    fn refine_promotes_unique_fallback() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        dom.add_element_with(body, "button", &[("class", "btn")]);
        dom.add_element_with(body, "button", &[("class", "btn"), ("id", "save")]);

        let mut actions = vec![Action::Click {
            timestamp: 1,
            locator: Locator {
                primary: "button.btn".to_string(),
                fallbacks: vec!["#save".to_string()],
                ..Default::default()
            },
        }];
        refine_locators(&mut actions, &dom);
        let locator = actions[0].locator().unwrap();
        assert_eq!(locator.primary, "#save");
    }

    #[test]
    fn refine_caps_fallbacks_at_two() {
        let dom = MemoryDom::new();
        let mut actions = vec![Action::Click {
            timestamp: 1,
            locator: Locator {
                primary: "#gone".to_string(),
                fallbacks: vec![
                    ".a".to_string(),
                    ".b".to_string(),
                    ".c".to_string(),
                    ".d".to_string(),
                ],
                ..Default::default()
            },
        }];
        refine_locators(&mut actions, &dom);
        assert!(actions[0].locator().unwrap().fallbacks.len() <= 2);
    }

    #[test]
    fn refine_disambiguates_same_kind_duplicates() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        dom.add_element_with(body, "button", &[("id", "first"), ("class", "btn")]);
        dom.add_element_with(body, "button", &[("id", "second"), ("class", "btn")]);

        let shared = Locator {
            primary: "button.btn:first".to_string(),
            fallbacks: vec!["#second".to_string()],
            ..Default::default()
        };
        let mut actions = vec![
            Action::Click {
                timestamp: 1,
                locator: Locator {
                    primary: "button.btn:first".to_string(),
                    fallbacks: vec!["#first".to_string()],
                    ..Default::default()
                },
            },
            Action::Click {
                timestamp: 2,
                locator: shared,
            },
        ];
        refine_locators(&mut actions, &dom);
        let first = actions[0].locator().unwrap().primary.clone();
        let second = actions[1].locator().unwrap().primary.clone();
        assert_ne!(first, second);
    }

    mod ordering_property {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn timestamps_never_decrease(stamps in proptest::collection::vec(0u64..100_000, 0..40)) {
                let clicks = stamps
                    .iter()
                    .enumerate()
                    .map(|(i, &ts)| click_at(ts, &format!("#b{i}")))
                    .collect();
                let actions = results_to_actions(&record_with_clicks(clicks), &TrackConfig::default());
                let out: Vec<u64> = actions.iter().map(Action::timestamp).collect();
                let mut sorted = out.clone();
                sorted.sort_unstable();
                prop_assert_eq!(out, sorted);
            }
        }
    }
}
