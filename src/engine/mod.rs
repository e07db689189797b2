//! The reconciliation engine: live ranges over the DOM, the content
//! materializer, dynamic region lifecycle, attribute diffing, delegated
//! events, and the sequence reconciler.

pub mod attrs;
pub mod each;
pub mod events;
pub mod materialize;
pub mod range;
pub mod view;
