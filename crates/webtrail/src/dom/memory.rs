//! In-memory document.
//!
//! Backs the resolution and replay tests, and doubles as the document
//! seam for headless hosts. The CSS matcher covers the subset the
//! resolution ladders emit: tag, `#id`, `.class`, `[attr]`, `[attr="v"]`,
//! compounds, descendant and child combinators, and comma groups.
//! Pseudo-classes are not supported and match nothing.

use std::collections::HashMap;

use crate::result::WebtrailResult;

use super::{BoundingBox, Dom, NodeId, Point, ReplayPage, SyntheticEvent};

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutable in-memory document implementing both document seams.
///
/// Replay effects are recorded rather than rendered: dispatched events,
/// value/checked mutations, cursor movement, and highlights all land in
/// inspectable logs.
#[derive(Debug)]
pub struct MemoryDom {
    nodes: Vec<ElementData>,
    url: String,
    values: HashMap<NodeId, String>,
    checked: HashMap<NodeId, bool>,
    events: Vec<(NodeId, SyntheticEvent)>,
    highlights: Vec<NodeId>,
    cursor_visible: bool,
    cursor: Point,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// Fresh document with `html > body` scaffolding.
    #[must_use]
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            url: String::new(),
            values: HashMap::new(),
            checked: HashMap::new(),
            events: Vec::new(),
            highlights: Vec::new(),
            cursor_visible: false,
            cursor: Point::default(),
        };
        let html = dom.push_node("html", None);
        dom.push_node("body", Some(html));
        dom
    }

    fn push_node(&mut self, tag: &str, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            text: String::new(),
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }
        id
    }

    /// The `body` element.
    #[must_use]
    pub fn body(&self) -> NodeId {
        1
    }

    /// Append a child element.
    pub fn add_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push_node(tag, Some(parent))
    }

    /// Append a child element with attributes.
    pub fn add_element_with(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> NodeId {
        let id = self.push_node(tag, Some(parent));
        for (name, value) in attrs {
            self.set_attribute(id, name, value);
        }
        id
    }

    /// Set the element's own text.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node].text = text.to_string();
    }

    /// Set or replace an attribute.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(entry) = self.nodes[node].attrs.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value.to_string();
        } else {
            self.nodes[node].attrs.push((name, value.to_string()));
        }
    }

    /// Remove an attribute.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        self.nodes[node].attrs.retain(|(n, _)| *n != name);
    }

    /// Set the page URL reported by [`ReplayPage::current_url`].
    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    /// Current value of a field, if replay has set one.
    #[must_use]
    pub fn value_of(&self, node: NodeId) -> Option<&str> {
        self.values.get(&node).map(String::as_str)
    }

    /// Events dispatched so far, in order.
    #[must_use]
    pub fn events(&self) -> &[(NodeId, SyntheticEvent)] {
        &self.events
    }

    /// Currently highlighted elements.
    #[must_use]
    pub fn highlights(&self) -> &[NodeId] {
        &self.highlights
    }

    /// Whether the replay cursor is shown.
    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    /// Last cursor position.
    #[must_use]
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    fn matches_compound(&self, node: NodeId, part: &CompoundPart) -> bool {
        let data = &self.nodes[node];
        if let Some(tag) = &part.tag {
            if tag != "*" && *tag != data.tag {
                return false;
            }
        }
        if let Some(id) = &part.id {
            if self.attribute(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !part.classes.is_empty() {
            let class_attr = self.attribute(node, "class").unwrap_or_default();
            let have: Vec<&str> = class_attr.split_whitespace().collect();
            if !part.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        for (name, expected) in &part.attrs {
            match (self.attribute(node, name), expected) {
                (None, _) => return false,
                (Some(_), None) => {}
                (Some(actual), Some(want)) => {
                    if actual != *want {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn matches_complex(&self, node: NodeId, chain: &[(Combinator, CompoundPart)]) -> bool {
        let (_, last) = match chain.last() {
            Some(entry) => entry,
            None => return false,
        };
        if !self.matches_compound(node, last) {
            return false;
        }
        let mut current = node;
        for i in (1..chain.len()).rev() {
            let combinator = &chain[i].0;
            let ancestor_part = &chain[i - 1].1;
            match combinator {
                Combinator::Child => {
                    match self.parent(current) {
                        Some(p) if self.matches_compound(p, ancestor_part) => current = p,
                        _ => return false,
                    }
                }
                Combinator::Descendant => {
                    let mut walker = self.parent(current);
                    loop {
                        match walker {
                            Some(p) if self.matches_compound(p, ancestor_part) => {
                                current = p;
                                break;
                            }
                            Some(p) => walker = self.parent(p),
                            None => return false,
                        }
                    }
                }
            }
        }
        true
    }
}

impl Dom for MemoryDom {
    fn all_nodes(&self) -> Vec<NodeId> {
        // Insertion order is document order for this structure.
        (0..self.nodes.len()).collect()
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.nodes[node].tag.clone()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.nodes[node]
            .attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node].children.clone()
    }

    fn own_text(&self, node: NodeId) -> String {
        self.nodes[node].text.clone()
    }

    fn query_all(&self, css: &str) -> Vec<NodeId> {
        let groups = match parse_selector_list(css) {
            Some(groups) => groups,
            None => {
                tracing::debug!(selector = css, "unsupported css selector");
                return Vec::new();
            }
        };
        self.all_nodes()
            .into_iter()
            .filter(|&node| groups.iter().any(|chain| self.matches_complex(node, chain)))
            .collect()
    }
}

impl ReplayPage for MemoryDom {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn bounding_box(&self, node: NodeId) -> Option<BoundingBox> {
        if !self.is_visible(node) {
            return None;
        }
        // Synthetic layout: a fixed-size row per element keeps click
        // coordinates deterministic for tests.
        Some(BoundingBox::new(0.0, node as f64 * 24.0, 120.0, 24.0))
    }

    fn dispatch(&mut self, node: NodeId, event: SyntheticEvent) -> WebtrailResult<()> {
        self.events.push((node, event));
        Ok(())
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> WebtrailResult<()> {
        self.values.insert(node, value.to_string());
        Ok(())
    }

    fn set_checked(&mut self, node: NodeId, checked: bool) -> WebtrailResult<()> {
        self.checked.insert(node, checked);
        Ok(())
    }

    fn is_checked(&self, node: NodeId) -> bool {
        self.checked
            .get(&node)
            .copied()
            .unwrap_or_else(|| self.attribute(node, "checked").is_some())
    }

    fn scroll_into_view(&mut self, _node: NodeId) {}

    fn show_cursor(&mut self) {
        self.cursor_visible = true;
    }

    fn move_cursor(&mut self, to: Point) {
        self.cursor = to;
    }

    fn click_ripple(&mut self, _at: Point) {}

    fn highlight(&mut self, node: NodeId) {
        self.highlights.push(node);
    }

    fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    fn hide_cursor(&mut self) {
        self.cursor_visible = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default)]
struct CompoundPart {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

/// Split on a separator at nesting depth zero, honoring brackets and
/// both quote styles.
fn split_top_level(input: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in input.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' | '(' => {
                    depth += 1;
                    current.push(c);
                }
                ']' | ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                _ if c == sep && depth == 0 => {
                    out.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    out.push(current);
    out
}

fn parse_selector_list(css: &str) -> Option<Vec<Vec<(Combinator, CompoundPart)>>> {
    let css = css.trim();
    if css.is_empty() {
        return None;
    }
    let mut groups = Vec::new();
    for group in split_top_level(css, ',') {
        let group = group.trim();
        if group.is_empty() {
            return None;
        }
        groups.push(parse_complex(group)?);
    }
    Some(groups)
}

fn parse_complex(group: &str) -> Option<Vec<(Combinator, CompoundPart)>> {
    let mut chain = Vec::new();
    let mut pending = Combinator::Descendant;
    for token in split_top_level(group, ' ') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token == ">" {
            pending = Combinator::Child;
            continue;
        }
        chain.push((pending, parse_compound(token)?));
        pending = Combinator::Descendant;
    }
    if chain.is_empty() {
        None
    } else {
        Some(chain)
    }
}

fn parse_compound(token: &str) -> Option<CompoundPart> {
    let mut part = CompoundPart::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0;

    let take_name = |chars: &[char], start: usize| -> (String, usize) {
        let mut end = start;
        while end < chars.len()
            && (chars[end].is_alphanumeric() || chars[end] == '-' || chars[end] == '_')
        {
            end += 1;
        }
        (chars[start..end].iter().collect(), end)
    };

    if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '*') {
        if chars[i] == '*' {
            part.tag = Some("*".to_string());
            i += 1;
        } else {
            let (name, next) = take_name(&chars, i);
            part.tag = Some(name.to_ascii_lowercase());
            i = next;
        }
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (name, next) = take_name(&chars, i + 1);
                if name.is_empty() {
                    return None;
                }
                part.id = Some(name);
                i = next;
            }
            '.' => {
                let (name, next) = take_name(&chars, i + 1);
                if name.is_empty() {
                    return None;
                }
                part.classes.push(name);
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                let (name, value) = match inner.split_once('=') {
                    Some((n, v)) => {
                        let v = v.trim();
                        let v = v
                            .strip_prefix('"')
                            .and_then(|s| s.strip_suffix('"'))
                            .or_else(|| v.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                            .unwrap_or(v);
                        (n.trim().to_string(), Some(v.to_string()))
                    }
                    None => (inner.trim().to_string(), None),
                };
                if name.is_empty() {
                    return None;
                }
                part.attrs.push((name.to_ascii_lowercase(), value));
                i = close + 1;
            }
            // Pseudo-classes and anything else are out of scope.
            _ => return None,
        }
    }

    if part.tag.is_none() && part.id.is_none() && part.classes.is_empty() && part.attrs.is_empty() {
        return None;
    }
    Some(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> MemoryDom {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let form = dom.add_element_with(body, "form", &[("id", "login")]);
        let email = dom.add_element_with(
            form,
            "input",
            &[("type", "email"), ("name", "email"), ("id", "email")],
        );
        let submit = dom.add_element_with(
            form,
            "button",
            &[("type", "submit"), ("class", "btn btn-primary")],
        );
        dom.set_text(submit, "Sign in");
        let nav = dom.add_element_with(body, "nav", &[("class", "top")]);
        let link = dom.add_element_with(nav, "a", &[("href", "/orders")]);
        dom.set_text(link, "Orders");
        let _ = (email, link);
        dom
    }

    #[test]
    fn query_by_tag() {
        let dom = fixture();
        assert_eq!(dom.query_all("button").len(), 1);
        assert_eq!(dom.query_all("input").len(), 1);
    }

    #[test]
    fn query_by_id_and_class() {
        let dom = fixture();
        assert!(dom.query("#login").is_some());
        assert_eq!(dom.query_all(".btn-primary").len(), 1);
        assert_eq!(dom.query_all("button.btn.btn-primary").len(), 1);
    }

    #[test]
    fn query_by_attribute() {
        let dom = fixture();
        assert_eq!(dom.query_all("[type=\"email\"]").len(), 1);
        assert_eq!(dom.query_all("input[name=\"email\"]").len(), 1);
        assert_eq!(dom.query_all("[href]").len(), 1);
    }

    #[test]
    fn query_descendant_and_child() {
        let dom = fixture();
        assert_eq!(dom.query_all("form button").len(), 1);
        assert_eq!(dom.query_all("body > nav > a").len(), 1);
        assert_eq!(dom.query_all("nav button").len(), 0);
    }

    #[test]
    fn query_comma_groups() {
        let dom = fixture();
        assert_eq!(dom.query_all("button, a, input").len(), 3);
    }

    #[test]
    fn unsupported_pseudo_matches_nothing() {
        let dom = fixture();
        assert!(dom.query_all("li:nth-child(2)").is_empty());
    }

    #[test]
    fn text_content_collapses() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let div = dom.add_element(body, "div");
        dom.set_text(div, "  Hello ");
        let span = dom.add_element(div, "span");
        dom.set_text(span, "\n world ");
        assert_eq!(dom.text_content(div), "Hello world");
    }

    #[test]
    fn visibility_respects_ancestors() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let wrap = dom.add_element_with(body, "div", &[("style", "display: none")]);
        let button = dom.add_element(wrap, "button");
        assert!(!dom.is_visible(button));
        assert!(dom.bounding_box(button).is_none());
    }

    #[test]
    fn replay_effects_are_recorded() {
        let mut dom = fixture();
        let button = dom.query("button").unwrap();
        dom.show_cursor();
        dom.dispatch(button, SyntheticEvent::click(Point { x: 1.0, y: 2.0 }))
            .unwrap();
        dom.set_checked(button, true).unwrap();
        assert!(dom.cursor_visible());
        assert_eq!(dom.events().len(), 1);
        assert!(dom.is_checked(button));
    }

    #[test]
    fn attribute_value_with_comma_survives_group_split() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        dom.add_element_with(body, "div", &[("data-tags", "a,b")]);
        assert_eq!(dom.query_all("[data-tags=\"a,b\"]").len(), 1);
    }
}
