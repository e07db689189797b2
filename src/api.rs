//! Top-level operations: mounting content into the document, removing it,
//! string rendering, and region lookup by element.

use std::cell::RefCell;

use crate::UiError;
use crate::content::{AttrSource, Content};
use crate::dom::{self, NodeId, html};
use crate::engine::materialize::{materialize, sanitize_comment};
use crate::engine::range::{self, RangeId};
use crate::engine::view::{self, ViewId};
use crate::tracker;

/// Mount `content` at the end of `parent`. Non-region content is wrapped in a
/// generated region so the whole mount is reactive and removable as a unit.
/// Returns the root region.
pub fn render(content: impl Into<Content>, parent: NodeId) -> Result<ViewId, UiError> {
    render_before(content, parent, None)
}

/// Mount `content` under `parent`, immediately before `next`.
pub fn render_before(
    content: impl Into<Content>,
    parent: NodeId,
    next: Option<NodeId>,
) -> Result<ViewId, UiError> {
    let root = match content.into() {
        Content::View(v) => v,
        other => {
            let template = RefCell::new(other);
            view::generated_view(move || template.borrow().clone())
        }
    };

    let members = materialize(Content::View(root), None);
    for member in members {
        match member {
            range::Member::Range(r) => range::attach(r, parent, next)?,
            range::Member::Node(n) => dom::insert_before(n, parent, next),
        }
    }
    Ok(root)
}

/// Detach and destroy a mounted region (and any generated wrapper above it).
pub fn remove(view_id: ViewId) -> Result<(), UiError> {
    let mut cur = Some(view_id);
    while let Some(v) = cur {
        if !view::is_destroyed(v) {
            match view::view_range(v) {
                Some(r) => {
                    if range::is_attached(r) && range::parent_range(r).is_none() {
                        range::detach(r)?;
                    }
                    range::destroy_range(r, false);
                }
                None => view::destroy_view(v, false),
            }
        }
        cur = view::parent_view(v).filter(|&p| view::is_generated(p));
    }
    Ok(())
}

// =============================================================================
// String Rendering
// =============================================================================

/// Render `content` to markup without touching the document. Regions are
/// rendered once, nonreactively, and destroyed; dynamic attribute sources are
/// evaluated once.
pub fn render_to_string(content: impl Into<Content>) -> String {
    let content = content.into();
    let mut out = String::new();
    tracker::nonreactive(|| write_content(&content, None, &mut out));
    out
}

fn write_content(content: &Content, parent: Option<ViewId>, out: &mut String) {
    match content {
        Content::None => {}
        Content::Text(s) => out.push_str(&html::escape_text(s)),
        Content::CharRef { html, .. } => out.push_str(html),
        Content::Comment(s) => {
            out.push_str("<!--");
            out.push_str(&sanitize_comment(s));
            out.push_str("-->");
        }
        Content::Raw(s) => out.push_str(s),
        Content::Fragment(children) => {
            for child in children {
                write_content(child, parent, out);
            }
        }
        Content::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            let resolved = match attrs {
                AttrSource::None => Vec::new(),
                AttrSource::Static(list) => list.clone(),
                AttrSource::Dynamic(f) => f(),
            };
            for (name, value) in resolved {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                out.push_str(&html::escape_attribute(&value));
                out.push('"');
            }
            out.push('>');
            if !html::is_void_element(tag) {
                for child in children {
                    write_content(child, parent, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        Content::View(v) => {
            view::create_view(*v, parent);
            let inner = view::call_render(*v);
            write_content(&inner, Some(*v), out);
            view::destroy_view(*v, true);
        }
    }
}

// =============================================================================
// Region Lookup
// =============================================================================

/// The innermost region whose content contains `elem`, if any.
pub fn view_for_element(elem: NodeId) -> Option<ViewId> {
    let mut cur = Some(elem);
    while let Some(n) = cur {
        if let Some(found) = range_chain_view(range::node_range(n)) {
            return Some(found);
        }
        cur = dom::parent_node(n);
    }
    None
}

fn range_chain_view(start: Option<RangeId>) -> Option<ViewId> {
    let mut cur = start;
    while let Some(r) = cur {
        if let Some(v) = range::view_of(r) {
            return Some(v);
        }
        cur = range::parent_range(r);
    }
    None
}

/// The nearest enclosing region (starting from `view` itself) with the given
/// name.
pub fn view_named(view_id: ViewId, name: &str) -> Option<ViewId> {
    let mut cur = Some(view_id);
    while let Some(v) = cur {
        if view::view_name(v) == name {
            return Some(v);
        }
        cur = view::parent_view(v);
    }
    None
}

// =============================================================================
// Tests
// =============================================================================
