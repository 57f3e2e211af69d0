//! Document seams.
//!
//! The live document belongs to the embedding host, so the engine is
//! written against two traits: [`Dom`] for read-only queries and
//! [`ReplayPage`] for mutation effects (synthetic events, cursor overlay,
//! highlighting). [`MemoryDom`] implements both for tests and headless
//! hosts.

mod memory;

pub use memory::MemoryDom;

use serde::{Deserialize, Serialize};

use crate::result::WebtrailResult;

/// Opaque element handle, valid for the lifetime of the document snapshot
/// that produced it.
pub type NodeId = usize;

/// Tags considered interactive by the resolution ladder's last-resort
/// fallback and by text-candidate filtering.
pub const INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea", "label"];

/// A point in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X in CSS pixels
    pub x: f64,
    /// Y in CSS pixels
    pub y: f64,
}

/// Element bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width in CSS pixels
    pub width: f64,
    /// Height in CSS pixels
    pub height: f64,
}

impl BoundingBox {
    /// Construct a box.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point, where synthetic clicks land.
    #[must_use]
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

/// Synthetic DOM event dispatched during replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SyntheticEvent {
    /// Mouse press at viewport coordinates
    MouseDown {
        /// X in CSS pixels
        x: f64,
        /// Y in CSS pixels
        y: f64,
    },
    /// Mouse release at viewport coordinates
    MouseUp {
        /// X in CSS pixels
        x: f64,
        /// Y in CSS pixels
        y: f64,
    },
    /// Click at viewport coordinates
    Click {
        /// X in CSS pixels
        x: f64,
        /// Y in CSS pixels
        y: f64,
    },
    /// Input event after a value mutation
    Input,
    /// Change event after editing settles
    Change,
    /// Focus gained
    Focus,
    /// Focus lost
    Blur,
}

impl SyntheticEvent {
    /// Mouse press at a point.
    #[must_use]
    pub const fn mouse_down(at: Point) -> Self {
        Self::MouseDown { x: at.x, y: at.y }
    }

    /// Mouse release at a point.
    #[must_use]
    pub const fn mouse_up(at: Point) -> Self {
        Self::MouseUp { x: at.x, y: at.y }
    }

    /// Click at a point.
    #[must_use]
    pub const fn click(at: Point) -> Self {
        Self::Click { x: at.x, y: at.y }
    }
}

/// Read-only document queries.
///
/// `query_all` takes standards CSS (the subset the host supports); the
/// typed selector forms are evaluated on top of these primitives by
/// [`crate::selector::resolve`].
pub trait Dom {
    /// Every element in document order.
    fn all_nodes(&self) -> Vec<NodeId>;

    /// Lowercase tag name.
    fn tag_name(&self, node: NodeId) -> String;

    /// Attribute value, if present.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Parent element, None for the root.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child elements in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Text owned directly by this element, not including descendants.
    fn own_text(&self, node: NodeId) -> String;

    /// All elements matching a CSS selector, document order.
    ///
    /// Unsupported selector syntax yields an empty result, never an
    /// error; resolution ladders treat that as a miss and move on.
    fn query_all(&self, css: &str) -> Vec<NodeId>;

    /// First element matching a CSS selector.
    fn query(&self, css: &str) -> Option<NodeId> {
        self.query_all(css).into_iter().next()
    }

    /// Number of elements matching a CSS selector.
    fn query_count(&self, css: &str) -> usize {
        self.query_all(css).len()
    }

    /// Text of this element and all descendants, whitespace collapsed.
    fn text_content(&self, node: NodeId) -> String {
        let mut parts = vec![self.own_text(node)];
        let mut stack = self.children(node);
        stack.reverse();
        while let Some(child) = stack.pop() {
            parts.push(self.own_text(child));
            let mut kids = self.children(child);
            kids.reverse();
            stack.extend(kids);
        }
        collapse_whitespace(&parts.join(" "))
    }

    /// Visibility check: the element and every ancestor must be free of
    /// `hidden` and `display: none`.
    fn is_visible(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.attribute(id, "hidden").is_some() {
                return false;
            }
            if let Some(style) = self.attribute(id, "style") {
                let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
                if compact.contains("display:none") || compact.contains("visibility:hidden") {
                    return false;
                }
            }
            current = self.parent(id);
        }
        true
    }

    /// True when `node` sits inside `ancestor`'s subtree.
    fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// True for elements a user can plausibly interact with.
    fn is_interactive(&self, node: NodeId) -> bool {
        let tag = self.tag_name(node);
        if INTERACTIVE_TAGS.contains(&tag.as_str()) {
            return true;
        }
        if self.attribute(node, "onclick").is_some() {
            return true;
        }
        matches!(
            self.attribute(node, "role").as_deref(),
            Some("button" | "link" | "menuitem" | "tab" | "checkbox" | "radio")
        )
    }
}

/// Mutation effects the replay engine drives.
///
/// Everything here is best-effort presentation or event plumbing; a host
/// that cannot render a cursor implements those methods as no-ops.
pub trait ReplayPage: Dom {
    /// Current page URL.
    fn current_url(&self) -> String;

    /// Viewport bounding box, None for detached or unrendered elements.
    fn bounding_box(&self, node: NodeId) -> Option<BoundingBox>;

    /// Dispatch a synthetic event at an element.
    fn dispatch(&mut self, node: NodeId, event: SyntheticEvent) -> WebtrailResult<()>;

    /// Set an input/select value without firing events.
    fn set_value(&mut self, node: NodeId, value: &str) -> WebtrailResult<()>;

    /// Set checkbox/radio checked state without firing events.
    fn set_checked(&mut self, node: NodeId, checked: bool) -> WebtrailResult<()>;

    /// Current checked state of a toggle.
    fn is_checked(&self, node: NodeId) -> bool {
        self.attribute(node, "checked").is_some()
    }

    /// Scroll the element into the viewport.
    fn scroll_into_view(&mut self, node: NodeId);

    /// Show the replay cursor overlay.
    fn show_cursor(&mut self);

    /// Move the replay cursor.
    fn move_cursor(&mut self, to: Point);

    /// Render a click ripple at a point.
    fn click_ripple(&mut self, at: Point);

    /// Outline the element about to be acted on.
    fn highlight(&mut self, node: NodeId);

    /// Remove all replay highlights.
    fn clear_highlights(&mut self);

    /// Hide the replay cursor overlay.
    fn hide_cursor(&mut self);
}

/// Collapse runs of whitespace to single spaces and trim.
#[must_use]
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
