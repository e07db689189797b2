//! Reactive DOM reconciliation engine.
//!
//! `reflow-dom` keeps a live document in sync with declarative content trees.
//! Content ([`content::Content`]) describes what should exist; the engine
//! materializes it into DOM nodes and then maintains it through fine-grained
//! updates driven by the [`tracker`] dependency system:
//!
//! - [`engine::range`]: contiguous, trackable spans of sibling nodes that can
//!   be edited structurally without disturbing neighbors
//! - [`engine::materialize`]: content-tree to DOM, via an explicit work stack
//! - [`engine::view`]: dynamic regions with a created / rendered / attached /
//!   destroyed lifecycle and scoped name bindings
//! - [`engine::attrs`]: per-attribute diffing that respects out-of-band edits
//! - [`engine::events`]: delegated event maps with runtime bubbling detection
//! - [`engine::each`]: sequence regions driven by an observed list
//!
//! The DOM itself is an in-memory arena ([`dom`]) with a synthetic event
//! dispatcher, so the whole engine is testable without a browser.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use reflow_dom::{content::text, dom, render, tracker::ReactiveVar, view};
//!
//! let name = Rc::new(ReactiveVar::new("world".to_string()));
//! let body = dom::create_element("body");
//!
//! let name_render = name.clone();
//! let root = render(view("hello", move || text(format!("hello {}", name_render.get()))), body)?;
//!
//! name.set("there".to_string());
//! assert_eq!(dom::text_content(body), "hello there");
//! # Ok::<(), reflow_dom::UiError>(())
//! ```

pub mod api;
pub mod content;
pub mod dom;
pub mod engine;
pub mod tracker;

pub use api::{remove, render, render_before, render_to_string, view_for_element, view_named};
pub use content::Content;
pub use engine::attrs::allow_javascript_urls;
pub use engine::each::{ObserveHandle, SequenceObserver, each_view, each_view_or_else};
pub use engine::events::{EventMap, attach_event_map};
pub use engine::range::{Member, RangeId};
pub use engine::view::{
    BindingValue, ViewId, current_view, get_binding, on_created, on_destroyed, on_rendered,
    set_binding, view, view_autorun,
};

/// Errors from structural operations on ranges and regions.
#[derive(thiserror::Error, Clone, Copy, PartialEq, Eq, Debug)]
pub enum UiError {
    /// A member index was outside the range's member list.
    #[error("member index {index} out of bounds (member count {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The operation needs an attached range.
    #[error("range is not attached to a parent element")]
    NotAttached,

    /// The range is already attached somewhere.
    #[error("range is already attached")]
    AlreadyAttached,

    /// The region has not produced content yet.
    #[error("view has no rendered content yet")]
    NotRendered,
}
