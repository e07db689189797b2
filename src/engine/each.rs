//! Sequence regions: one item view per element of an observed list.
//!
//! [`each_view`] builds a region whose members track an external ordered
//! sequence. The caller supplies an observe function that wires the data
//! source to a [`SequenceObserver`] and returns a stop handle; the engine
//! applies each change as a minimal member edit. Item views receive their
//! datum through a reactive cell, so an in-place change re-renders only that
//! item, and an `@index` binding that is renumbered as neighbors come and go.
//!
//! Observer callbacks run outside any enclosing computation: a structural
//! list edit must never register as a dependency of whatever computation
//! happened to deliver it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::content::Content;
use crate::engine::materialize::materialize;
use crate::engine::range;
use crate::engine::view::{self, ViewId};
use crate::tracker::{self, ReactiveVar};

/// Stop handle returned by an observe function.
pub struct ObserveHandle {
    stop: Option<Box<dyn FnOnce()>>,
}

impl ObserveHandle {
    pub fn new(stop: impl FnOnce() + 'static) -> Self {
        ObserveHandle {
            stop: Some(Box::new(stop)),
        }
    }

    fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

/// Change feed for one sequence region. Clone freely; all clones drive the
/// same region.
pub struct SequenceObserver<T> {
    state: Rc<EachState<T>>,
}

impl<T> Clone for SequenceObserver<T> {
    fn clone(&self) -> Self {
        SequenceObserver {
            state: self.state.clone(),
        }
    }
}

struct EachState<T> {
    view: ViewId,
    item_fn: Box<dyn Fn(Rc<ReactiveVar<T>>) -> ViewId>,
    else_fn: Option<Box<dyn Fn() -> ViewId>>,
    item_vars: RefCell<Vec<Rc<ReactiveVar<T>>>>,
    item_views: RefCell<Vec<ViewId>>,
    else_shown: Cell<bool>,
}

/// Build a sequence region with no fallback content.
pub fn each_view<T, O, F>(observe: O, item: F) -> ViewId
where
    T: Clone + PartialEq + 'static,
    O: FnOnce(SequenceObserver<T>) -> ObserveHandle + 'static,
    F: Fn(Rc<ReactiveVar<T>>) -> ViewId + 'static,
{
    build(observe, item, None)
}

/// Build a sequence region that shows `else_fn`'s view while the sequence is
/// empty.
pub fn each_view_or_else<T, O, F, E>(observe: O, item: F, else_fn: E) -> ViewId
where
    T: Clone + PartialEq + 'static,
    O: FnOnce(SequenceObserver<T>) -> ObserveHandle + 'static,
    F: Fn(Rc<ReactiveVar<T>>) -> ViewId + 'static,
    E: Fn() -> ViewId + 'static,
{
    build(observe, item, Some(Box::new(else_fn)))
}

fn build<T, O, F>(observe: O, item: F, else_fn: Option<Box<dyn Fn() -> ViewId>>) -> ViewId
where
    T: Clone + PartialEq + 'static,
    O: FnOnce(SequenceObserver<T>) -> ObserveHandle + 'static,
    F: Fn(Rc<ReactiveVar<T>>) -> ViewId + 'static,
{
    let each = view::view("each", || Content::None);
    let state = Rc::new(EachState {
        view: each,
        item_fn: Box::new(item),
        else_fn,
        item_vars: RefCell::new(Vec::new()),
        item_views: RefCell::new(Vec::new()),
        else_shown: Cell::new(false),
    });

    // Wired once, on the first render, when the region's range exists to
    // receive members.
    let pending = RefCell::new(Some(observe));
    let handle: Rc<RefCell<Option<ObserveHandle>>> = Rc::default();

    let wire_state = state.clone();
    let wire_handle = handle.clone();
    view::on_rendered(each, move || {
        let Some(observe) = pending.borrow_mut().take() else {
            return;
        };
        let observer = SequenceObserver {
            state: wire_state.clone(),
        };
        let stop = observe(observer);
        *wire_handle.borrow_mut() = Some(stop);
        if wire_state.item_views.borrow().is_empty() {
            wire_state.show_else();
        }
    });

    view::on_destroyed(each, move || {
        if let Some(h) = handle.borrow_mut().take() {
            h.stop();
        }
    });
    each
}

impl<T: Clone + PartialEq + 'static> SequenceObserver<T> {
    /// A value was inserted at `index`.
    pub fn added_at(&self, value: T, index: usize) {
        let state = &self.state;
        tracker::nonreactive(|| {
            state.hide_else();

            let var = Rc::new(ReactiveVar::new(value));
            let item_view = (state.item_fn)(var.clone());
            view::set_binding(item_view, "@index", index as i64);

            let members = materialize(Content::View(item_view), Some(state.view));
            let member = members[0];
            range::add_member(state.range(), member, index)
                .expect("sequence insert index out of bounds");

            state.item_vars.borrow_mut().insert(index, var);
            state.item_views.borrow_mut().insert(index, item_view);
            state.renumber(index + 1);
        });
    }

    /// The value at `index` was removed.
    pub fn removed_at(&self, index: usize) {
        let state = &self.state;
        tracker::nonreactive(|| {
            range::remove_member(state.range(), index)
                .expect("sequence remove index out of bounds");
            state.item_vars.borrow_mut().remove(index);
            state.item_views.borrow_mut().remove(index);
            state.renumber(index);

            if state.item_views.borrow().is_empty() {
                state.show_else();
            }
        });
    }

    /// The value at `index` was replaced in place. Only that item re-renders,
    /// and only if the value actually differs.
    pub fn changed_at(&self, value: T, index: usize) {
        let state = &self.state;
        tracker::nonreactive(|| {
            let var = state.item_vars.borrow()[index].clone();
            var.set(value);
        });
    }

    /// The value at `old_index` now lives at `new_index` (positions after the
    /// removal). The item view moves without re-rendering.
    pub fn moved_to(&self, old_index: usize, new_index: usize) {
        if old_index == new_index {
            return;
        }
        let state = &self.state;
        tracker::nonreactive(|| {
            range::move_member(state.range(), old_index, new_index)
                .expect("sequence move index out of bounds");
            {
                let mut vars = state.item_vars.borrow_mut();
                let var = vars.remove(old_index);
                vars.insert(new_index, var);
            }
            {
                let mut views = state.item_views.borrow_mut();
                let v = views.remove(old_index);
                views.insert(new_index, v);
            }
            state.renumber(old_index.min(new_index));
        });
    }
}

impl<T> EachState<T> {
    fn range(&self) -> range::RangeId {
        view::view_range(self.view).expect("sequence region is rendered before edits arrive")
    }

    fn renumber(&self, from: usize) {
        let views = self.item_views.borrow();
        for (i, &v) in views.iter().enumerate().skip(from) {
            view::set_binding(v, "@index", i as i64);
        }
    }

    fn show_else(&self) {
        if self.else_shown.get() {
            return;
        }
        if let Some(else_fn) = &self.else_fn {
            let else_view = else_fn();
            let members = materialize(Content::View(else_view), Some(self.view));
            range::add_member(self.range(), members[0], 0)
                .expect("fallback insert into empty region");
            self.else_shown.set(true);
        }
    }

    fn hide_else(&self) {
        if self.else_shown.get() {
            range::remove_member(self.range(), 0).expect("fallback member present");
            self.else_shown.set(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{element, text};
    use crate::dom::{self, NodeId};
    use crate::engine::range::Member;

    fn mount(v: ViewId) -> NodeId {
        let parent = dom::create_element("div");
        let members = materialize(Content::View(v), None);
        let r = range::new_range(members);
        range::attach(r, parent, None).unwrap();
        parent
    }

    fn item_view(var: Rc<ReactiveVar<String>>) -> ViewId {
        view::view("item", move || {
            element("li", &[], vec![text(var.get())])
        })
    }

    fn manual_observer() -> (
        impl FnOnce(SequenceObserver<String>) -> ObserveHandle,
        Rc<RefCell<Option<SequenceObserver<String>>>>,
    ) {
        let slot: Rc<RefCell<Option<SequenceObserver<String>>>> = Rc::default();
        let slot_clone = slot.clone();
        let observe = move |obs: SequenceObserver<String>| {
            *slot_clone.borrow_mut() = Some(obs);
            ObserveHandle::new(|| {})
        };
        (observe, slot)
    }

    fn texts(parent: NodeId) -> Vec<String> {
        dom::child_nodes(parent)
            .iter()
            .filter(|&&n| dom::is_element(n))
            .map(|&n| dom::text_content(n))
            .collect()
    }

    #[test]
    fn test_add_remove_move_keep_order() {
        let (observe, slot) = manual_observer();
        let v = each_view(observe, item_view);
        let parent = mount(v);
        let obs = slot.borrow().clone().unwrap();

        obs.added_at("a".into(), 0);
        obs.added_at("c".into(), 1);
        obs.added_at("b".into(), 1);
        assert_eq!(texts(parent), vec!["a", "b", "c"]);

        obs.moved_to(2, 0);
        assert_eq!(texts(parent), vec!["c", "a", "b"]);

        obs.removed_at(1);
        assert_eq!(texts(parent), vec!["c", "b"]);
    }

    #[test]
    fn test_changed_rerenders_one_item_in_place() {
        let (observe, slot) = manual_observer();
        let v = each_view(observe, item_view);
        let parent = mount(v);
        let obs = slot.borrow().clone().unwrap();

        obs.added_at("x".into(), 0);
        obs.added_at("y".into(), 1);
        let y_range = match range::get_member(view::view_range(v).unwrap(), 1).unwrap() {
            Member::Range(r) => r,
            other => panic!("expected an item region, got {:?}", other),
        };
        let y_view = range::view_of(y_range).unwrap();

        obs.changed_at("Y".into(), 1);
        assert_eq!(texts(parent), vec!["x", "Y"]);
        assert_eq!(
            range::view_of(view::view_range(v).and_then(|r| match range::get_member(r, 1) {
                Ok(Member::Range(sub)) => Some(sub),
                _ => None,
            }).unwrap()),
            Some(y_view),
            "the item view is reused, not rebuilt"
        );

        obs.changed_at("Y".into(), 1);
        assert_eq!(texts(parent), vec!["x", "Y"], "equal value is a no-op");
    }

    #[test]
    fn test_index_binding_renumbers() {
        let indexed_item = |var: Rc<ReactiveVar<String>>| {
            view::view("item", move || {
                let me = view::current_view().expect("render runs with a current view");
                let idx = match view::get_binding(me, "@index") {
                    Some(view::BindingValue::Int(i)) => i,
                    other => panic!("missing @index binding: {:?}", other),
                };
                element("li", &[], vec![text(format!("{}:{}", idx, var.get()))])
            })
        };

        let (observe, slot) = manual_observer();
        let v = each_view(observe, indexed_item);
        let parent = mount(v);
        let obs = slot.borrow().clone().unwrap();

        obs.added_at("a".into(), 0);
        obs.added_at("b".into(), 1);
        assert_eq!(texts(parent), vec!["0:a", "1:b"]);

        obs.removed_at(0);
        assert_eq!(texts(parent), vec!["0:b"], "surviving item is renumbered");
    }

    #[test]
    fn test_else_view_tracks_emptiness() {
        let (observe, slot) = manual_observer();
        let v = each_view_or_else(observe, item_view, || {
            view::view("empty", || element("p", &[], vec![text("nothing")]))
        });
        let parent = mount(v);
        let obs = slot.borrow().clone().unwrap();

        assert_eq!(texts(parent), vec!["nothing"], "fallback shows initially");

        obs.added_at("a".into(), 0);
        assert_eq!(texts(parent), vec!["a"], "fallback leaves when items arrive");

        obs.removed_at(0);
        assert_eq!(texts(parent), vec!["nothing"], "fallback returns when emptied");
    }

    #[test]
    fn test_destroy_stops_observer() {
        let stopped = Rc::new(Cell::new(false));
        let stopped_clone = stopped.clone();
        let slot: Rc<RefCell<Option<SequenceObserver<String>>>> = Rc::default();
        let slot_clone = slot.clone();
        let v = each_view(
            move |obs: SequenceObserver<String>| {
                *slot_clone.borrow_mut() = Some(obs);
                ObserveHandle::new(move || stopped_clone.set(true))
            },
            item_view,
        );
        mount(v);
        view::destroy_view(v, false);
        assert!(stopped.get(), "destroying the region stops the observation");
    }
}
