//! Content tree data model.
//!
//! A [`Content`] value is the declarative, already-compiled description of
//! what to render: elements, text, comments, raw markup, sequences, and
//! references to dynamic regions ([`crate::engine::view`]). It is produced by
//! a template layer (out of scope here) or built directly with the helpers in
//! this module, and consumed by the materializer.
//!
//! # Example
//!
//! ```ignore
//! use reflow_dom::content::{element, text};
//!
//! let tree = element("div", &[("class", "a")], vec![text("hi")]);
//! ```

use std::rc::Rc;

use crate::engine::view::ViewId;

/// A renderable content node.
#[derive(Clone)]
pub enum Content {
    /// Renders nothing.
    None,
    /// A text node; the value is escaped on serialization.
    Text(String),
    /// A character reference: `html` is the entity form (`&amp;`), `text` the
    /// resolved string (`&`). Materializes as a text node of `text`.
    CharRef { html: String, text: String },
    /// A comment node. The value is sanitized so it cannot terminate the
    /// comment early.
    Comment(String),
    /// Raw markup, parsed by the host-installed markup parser at
    /// materialization time and emitted verbatim on serialization.
    Raw(String),
    /// An ordered sequence of content nodes.
    Fragment(Vec<Content>),
    /// An element with attributes and children.
    Element {
        tag: String,
        attrs: AttrSource,
        children: Vec<Content>,
    },
    /// A dynamic region. The region must be freshly constructed; a region
    /// instance cannot occupy two structural positions.
    View(ViewId),
}

/// Attribute source for an element.
#[derive(Clone)]
pub enum AttrSource {
    /// No attributes.
    None,
    /// A fixed name/value list, applied once.
    Static(Vec<(String, String)>),
    /// Re-evaluated inside a reactive computation; the element's attributes
    /// are re-reconciled on every dependency change.
    Dynamic(Rc<dyn Fn() -> Vec<(String, String)>>),
}

impl AttrSource {
    pub fn is_none(&self) -> bool {
        matches!(self, AttrSource::None)
    }
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::None => write!(f, "None"),
            Content::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Content::CharRef { html, text } => f
                .debug_struct("CharRef")
                .field("html", html)
                .field("text", text)
                .finish(),
            Content::Comment(s) => f.debug_tuple("Comment").field(s).finish(),
            Content::Raw(s) => f.debug_tuple("Raw").field(s).finish(),
            Content::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            Content::Element { tag, children, .. } => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("children", children)
                .finish(),
            Content::View(v) => f.debug_tuple("View").field(v).finish(),
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

/// A text node. Numbers and booleans convert through [`From`] impls.
pub fn text(s: impl Into<String>) -> Content {
    Content::Text(s.into())
}

pub fn comment(s: impl Into<String>) -> Content {
    Content::Comment(s.into())
}

pub fn raw(s: impl Into<String>) -> Content {
    Content::Raw(s.into())
}

pub fn char_ref(html: impl Into<String>, resolved: impl Into<String>) -> Content {
    Content::CharRef {
        html: html.into(),
        text: resolved.into(),
    }
}

pub fn fragment(children: Vec<Content>) -> Content {
    Content::Fragment(children)
}

/// An element with static attributes.
pub fn element(tag: &str, attrs: &[(&str, &str)], children: Vec<Content>) -> Content {
    let attrs = if attrs.is_empty() {
        AttrSource::None
    } else {
        AttrSource::Static(
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    };
    Content::Element {
        tag: tag.to_string(),
        attrs,
        children,
    }
}

/// An element whose attributes are recomputed reactively.
pub fn element_dyn(
    tag: &str,
    attrs: impl Fn() -> Vec<(String, String)> + 'static,
    children: Vec<Content>,
) -> Content {
    Content::Element {
        tag: tag.to_string(),
        attrs: AttrSource::Dynamic(Rc::new(attrs)),
        children,
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<i64> for Content {
    fn from(n: i64) -> Self {
        Content::Text(n.to_string())
    }
}

impl From<f64> for Content {
    fn from(n: f64) -> Self {
        Content::Text(n.to_string())
    }
}

impl From<bool> for Content {
    fn from(b: bool) -> Self {
        Content::Text(b.to_string())
    }
}

impl From<ViewId> for Content {
    fn from(v: ViewId) -> Self {
        Content::View(v)
    }
}

// =============================================================================
// Shallow Equality
// =============================================================================

/// The deliberately shallow equality used by the re-render short-circuit:
/// empty/empty, equal text, equal raw markup, and identical region handles
/// compare equal; structured content always compares unequal, so element
/// trees trigger a full members replace even when structurally identical.
pub fn content_equal(a: &Content, b: &Content) -> bool {
    match (a, b) {
        (Content::None, Content::None) => true,
        (Content::Text(x), Content::Text(y)) => x == y,
        (Content::Raw(x), Content::Raw(y)) => x == y,
        (Content::View(x), Content::View(y)) => x == y,
        _ => false,
    }
}
