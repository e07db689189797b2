//! Turning content trees into live DOM.
//!
//! Materialization is driven by an explicit LIFO work stack rather than by
//! recursion, so content depth never translates into call depth. Each task
//! appends the members it produces and may push further tasks: element tasks
//! push an attach step below their children's tasks, so a subtree is always
//! complete before it is wired to its parent.
//!
//! Dynamic regions ([`crate::engine::view`]) materialize inside a reactive
//! computation. The first run shares the caller's work stack; re-runs
//! materialize on a fresh stack during flush and swap the region's members in
//! place.

use std::cell::RefCell;
use std::rc::Rc;

use crate::content::{AttrSource, Content, content_equal};
use crate::dom::{self, NodeId};
use crate::engine::attrs::ElementAttrsUpdater;
use crate::engine::range::{self, Member, RangeId};
use crate::engine::view::{self, ViewId};
use crate::tracker;

// =============================================================================
// Work Stack
// =============================================================================

type Task = Box<dyn FnOnce(&WorkStack)>;

/// Shared LIFO task stack. Pushing is allowed from inside a running task.
#[derive(Clone, Default)]
pub(crate) struct WorkStack {
    tasks: Rc<RefCell<Vec<Task>>>,
}

impl WorkStack {
    fn push(&self, task: impl FnOnce(&WorkStack) + 'static) {
        self.tasks.borrow_mut().push(Box::new(task));
    }

    fn drain(&self) {
        loop {
            let task = self.tasks.borrow_mut().pop();
            match task {
                Some(task) => task(self),
                None => break,
            }
        }
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Materialize `content` to completion and return the resulting members.
pub(crate) fn materialize(content: Content, parent_view: Option<ViewId>) -> Vec<Member> {
    let out: Rc<RefCell<Vec<Member>>> = Rc::default();
    let stack = WorkStack::default();
    push_task(content, out.clone(), parent_view, &stack);
    stack.drain();
    out.take()
}

/// Schedule one content node. Its members land in `out` in sibling order once
/// the stack drains down to it.
fn push_task(
    content: Content,
    out: Rc<RefCell<Vec<Member>>>,
    parent_view: Option<ViewId>,
    stack: &WorkStack,
) {
    stack.push(move |stack| materialize_one(content, &out, parent_view, stack));
}

fn materialize_one(
    content: Content,
    out: &Rc<RefCell<Vec<Member>>>,
    parent_view: Option<ViewId>,
    stack: &WorkStack,
) {
    match content {
        Content::None => {}
        Content::Text(s) => {
            out.borrow_mut().push(Member::Node(dom::create_text_node(&s)));
        }
        Content::CharRef { text, .. } => {
            out.borrow_mut()
                .push(Member::Node(dom::create_text_node(&text)));
        }
        Content::Comment(s) => {
            out.borrow_mut()
                .push(Member::Node(dom::create_comment(&sanitize_comment(&s))));
        }
        Content::Raw(markup) => {
            let nodes = dom::html::parse_markup(&markup);
            out.borrow_mut()
                .extend(nodes.into_iter().map(Member::Node));
        }
        Content::Fragment(children) => {
            for child in children.into_iter().rev() {
                push_task(child, out.clone(), parent_view, stack);
            }
        }
        Content::Element {
            tag,
            attrs,
            children,
        } => {
            let elem = materialize_element(&tag, attrs, children, parent_view, stack);
            out.borrow_mut().push(Member::Node(elem));
        }
        Content::View(v) => {
            let range = materialize_view(v, parent_view, stack);
            out.borrow_mut().push(Member::Range(range));
        }
    }
}

// =============================================================================
// Elements
// =============================================================================

const SVG_TAGS: &[&str] = &[
    "svg", "circle", "clipPath", "defs", "ellipse", "foreignObject", "g", "line",
    "linearGradient", "marker", "mask", "path", "pattern", "polygon", "polyline",
    "radialGradient", "rect", "stop", "symbol", "tspan", "use",
];

/// `<a>` is both an HTML and an SVG tag; an `xlink:href` attribute marks the
/// SVG reading.
fn element_namespace(tag: &str, attrs: &AttrSource) -> Option<&'static str> {
    if SVG_TAGS.contains(&tag) {
        return Some(dom::SVG_NS);
    }
    if tag == "a" {
        if let AttrSource::Static(list) = attrs {
            if list.iter().any(|(name, _)| name.starts_with("xlink:")) {
                return Some(dom::SVG_NS);
            }
        }
    }
    None
}

fn materialize_element(
    tag: &str,
    attrs: AttrSource,
    children: Vec<Content>,
    parent_view: Option<ViewId>,
    stack: &WorkStack,
) -> NodeId {
    let elem = match element_namespace(tag, &attrs) {
        Some(ns) => dom::create_element_ns(tag, ns),
        None => dom::create_element(tag),
    };

    if tag == "textarea" {
        // The body of a textarea is its initial value, not child nodes.
        let mut value = String::new();
        fold_textarea(&children, &mut value);
        install_attrs(elem, tag, attrs, parent_view);
        dom::set_value_property(elem, Some(&value));
        return elem;
    }

    install_attrs(elem, tag, attrs, parent_view);

    if !children.is_empty() {
        let child_out: Rc<RefCell<Vec<Member>>> = Rc::default();
        // Pushed first so it runs after every child task has completed.
        let attach_out = child_out.clone();
        stack.push(move |_| {
            for member in attach_out.take() {
                match member {
                    Member::Node(n) => dom::insert_before(n, elem, None),
                    Member::Range(r) => {
                        if let Err(e) = range::attach(r, elem, None) {
                            tracing::error!(error = %e, "attaching child region failed");
                        }
                    }
                }
            }
        });
        for child in children.into_iter().rev() {
            push_task(child, child_out.clone(), parent_view, stack);
        }
    }
    elem
}

fn fold_textarea(children: &[Content], out: &mut String) {
    for child in children {
        match child {
            Content::None => {}
            Content::Text(s) => out.push_str(s),
            Content::CharRef { text, .. } => out.push_str(text),
            Content::Fragment(inner) => fold_textarea(inner, out),
            _ => panic!("textarea content must be literal text"),
        }
    }
}

fn install_attrs(elem: NodeId, tag: &str, attrs: AttrSource, parent_view: Option<ViewId>) {
    match attrs {
        AttrSource::None => {}
        AttrSource::Static(list) => {
            let mut updater = ElementAttrsUpdater::new(elem, tag);
            updater.update(list);
        }
        AttrSource::Dynamic(f) => match parent_view {
            Some(v) => {
                let updater = RefCell::new(ElementAttrsUpdater::new(elem, tag));
                let comp = view::view_autorun(v, move |_| {
                    updater.borrow_mut().update(f());
                });
                dom::on_teardown(elem, move || comp.stop());
            }
            None => {
                let mut updater = ElementAttrsUpdater::new(elem, tag);
                updater.update(f());
            }
        },
    }
}

/// A comment body must not be able to terminate the comment: runs of dashes
/// collapse to one, and a trailing dash is dropped.
pub(crate) fn sanitize_comment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dash = false;
    for c in s.chars() {
        if c == '-' {
            if prev_dash {
                continue;
            }
            prev_dash = true;
        } else {
            prev_dash = false;
        }
        out.push(c);
    }
    if out.ends_with('-') {
        out.pop();
    }
    out
}

// =============================================================================
// Views
// =============================================================================

/// Materialize a dynamic region: create its range and view, run the render
/// function reactively, and finalize once the first render's content tasks
/// have drained.
pub(crate) fn materialize_view(
    v: ViewId,
    parent_view: Option<ViewId>,
    stack: &WorkStack,
) -> RangeId {
    let range = range::new_range(Vec::new());
    view::create_view(v, parent_view);
    view::set_range(v, range);

    let first_out: Rc<RefCell<Vec<Member>>> = Rc::default();

    // Runs after the first render's content tasks, which the render
    // computation pushes above it.
    {
        let first_out = first_out.clone();
        stack.push(move |_| {
            if let Err(e) = range::set_members(range, first_out.take()) {
                tracing::error!(error = %e, "installing first render failed");
            }
            view::mark_rendered(v);
            range::on_attached(range, move |parent_elem| {
                view::mark_attached(v);
                dom::on_teardown(parent_elem, move || view::destroy_view(v, true));
            });
        });
    }

    let last_content: Rc<RefCell<Option<Content>>> = Rc::default();
    let first_stack = stack.clone();
    view::view_autorun(v, move |c| {
        let new_content = view::call_render(v);
        if c.first_run() {
            push_task(new_content.clone(), first_out.clone(), Some(v), &first_stack);
        } else {
            let changed = last_content
                .borrow()
                .as_ref()
                .map(|old| !content_equal(old, &new_content))
                .unwrap_or(true);
            if changed {
                tracker::nonreactive(|| {
                    let members = materialize(new_content.clone(), Some(v));
                    if let Err(e) = range::set_members(range, members) {
                        tracing::error!(error = %e, "installing re-render failed");
                    }
                    view::mark_rendered(v);
                });
            }
        }
        *last_content.borrow_mut() = Some(new_content);

        // Old content is torn down the moment a dependency changes, before
        // the re-run produces its replacement.
        c.on_invalidate(move || {
            if !view::is_destroyed(v) {
                range::destroy_members(range, false);
            }
        });
    });

    range
}

// =============================================================================
// Tests
// =============================================================================
