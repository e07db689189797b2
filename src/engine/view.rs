//! Dynamic regions and their lifecycle.
//!
//! A view is a region of the document driven by a render function. It moves
//! through a one-way lifecycle: constructed, created (claimed by the
//! materializer), rendered (content produced and installed), attached (its
//! range placed under a parent element), destroyed. A view instance is
//! single-use; rendering the same view twice is a programmer error.
//!
//! Reactive computations started with [`view_autorun`] belong to the view and
//! are stopped when it is destroyed. Render functions run with the view as
//! the ambient current view, which is how nested content and name bindings
//! find their enclosing region.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;

use crate::content::Content;
use crate::engine::range::{self, RangeId};
use crate::tracker::{self, Computation, ReactiveVar};

// =============================================================================
// Arena
// =============================================================================

thread_local! {
    static VIEWS: RefCell<Vec<ViewState>> = const { RefCell::new(Vec::new()) };
    static CURRENT_VIEW: Cell<Option<ViewId>> = const { Cell::new(None) };
}

/// Handle to a view in the thread-local arena. Slots are not recycled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ViewId(u32);

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    struct ViewFlags: u8 {
        const CREATED = 1 << 0;
        const RENDERED = 1 << 1;
        const ATTACHED = 1 << 2;
        const DESTROYED = 1 << 3;
        const IN_RENDER = 1 << 4;
    }
}

/// A scoped name binding value visible to a view and its descendants.
#[derive(Clone, PartialEq, Debug)]
pub enum BindingValue {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl From<i64> for BindingValue {
    fn from(n: i64) -> Self {
        BindingValue::Int(n)
    }
}

impl From<&str> for BindingValue {
    fn from(s: &str) -> Self {
        BindingValue::Str(s.to_string())
    }
}

impl From<String> for BindingValue {
    fn from(s: String) -> Self {
        BindingValue::Str(s)
    }
}

impl From<bool> for BindingValue {
    fn from(b: bool) -> Self {
        BindingValue::Bool(b)
    }
}

struct ViewState {
    name: String,
    render_fn: Option<Box<dyn FnMut() -> Content>>,
    parent: Option<ViewId>,
    flags: ViewFlags,
    computations: Vec<Computation>,
    range: Option<RangeId>,
    created_cbs: Vec<Rc<dyn Fn()>>,
    rendered_cbs: Vec<Rc<dyn Fn()>>,
    destroyed_cbs: Vec<Rc<dyn Fn()>>,
    bindings: HashMap<String, Rc<ReactiveVar<BindingValue>>>,
    generated: bool,
}

fn with_view<R>(id: ViewId, f: impl FnOnce(&mut ViewState) -> R) -> R {
    VIEWS.with(|v| f(&mut v.borrow_mut()[id.0 as usize]))
}

// =============================================================================
// Construction
// =============================================================================

/// Construct a view. Nothing runs until the materializer claims it.
pub fn view(name: &str, render: impl FnMut() -> Content + 'static) -> ViewId {
    new_view(name, render, false)
}

/// Construct an unnamed wrapper view generated by the engine itself.
pub(crate) fn generated_view(render: impl FnMut() -> Content + 'static) -> ViewId {
    new_view("", render, true)
}

fn new_view(name: &str, render: impl FnMut() -> Content + 'static, generated: bool) -> ViewId {
    VIEWS.with(|v| {
        let mut v = v.borrow_mut();
        let id = ViewId(v.len() as u32);
        v.push(ViewState {
            name: name.to_string(),
            render_fn: Some(Box::new(render)),
            parent: None,
            flags: ViewFlags::empty(),
            computations: Vec::new(),
            range: None,
            created_cbs: Vec::new(),
            rendered_cbs: Vec::new(),
            destroyed_cbs: Vec::new(),
            bindings: HashMap::new(),
            generated,
        });
        id
    })
}

// =============================================================================
// Accessors
// =============================================================================

pub fn view_name(view: ViewId) -> String {
    with_view(view, |v| v.name.clone())
}

pub fn parent_view(view: ViewId) -> Option<ViewId> {
    with_view(view, |v| v.parent)
}

/// The range holding this view's content, once rendered.
pub fn view_range(view: ViewId) -> Option<RangeId> {
    with_view(view, |v| v.range)
}

pub fn is_created(view: ViewId) -> bool {
    with_view(view, |v| v.flags.contains(ViewFlags::CREATED))
}

pub fn is_rendered(view: ViewId) -> bool {
    with_view(view, |v| v.flags.contains(ViewFlags::RENDERED))
}

pub fn is_attached(view: ViewId) -> bool {
    with_view(view, |v| v.flags.contains(ViewFlags::ATTACHED))
}

pub fn is_destroyed(view: ViewId) -> bool {
    with_view(view, |v| v.flags.contains(ViewFlags::DESTROYED))
}

pub(crate) fn is_generated(view: ViewId) -> bool {
    with_view(view, |v| v.generated)
}

/// The view whose render function or lifecycle callback is currently running.
pub fn current_view() -> Option<ViewId> {
    CURRENT_VIEW.with(|c| c.get())
}

// =============================================================================
// Lifecycle Callbacks
// =============================================================================

pub fn on_created(view: ViewId, cb: impl Fn() + 'static) {
    with_view(view, |v| v.created_cbs.push(Rc::new(cb)));
}

pub fn on_rendered(view: ViewId, cb: impl Fn() + 'static) {
    with_view(view, |v| v.rendered_cbs.push(Rc::new(cb)));
}

pub fn on_destroyed(view: ViewId, cb: impl Fn() + 'static) {
    with_view(view, |v| v.destroyed_cbs.push(Rc::new(cb)));
}

enum Callbacks {
    Created,
    Rendered,
    Destroyed,
}

fn fire_callbacks(view: ViewId, which: Callbacks) {
    let cbs = with_view(view, |v| match which {
        Callbacks::Created => v.created_cbs.clone(),
        Callbacks::Rendered => v.rendered_cbs.clone(),
        Callbacks::Destroyed => v.destroyed_cbs.clone(),
    });
    let _guard = CurrentViewGuard::enter(Some(view));
    for cb in cbs {
        cb();
    }
}

// =============================================================================
// Current-View Context
// =============================================================================

pub(crate) struct CurrentViewGuard {
    prev: Option<ViewId>,
}

impl CurrentViewGuard {
    pub(crate) fn enter(view: Option<ViewId>) -> Self {
        let prev = CURRENT_VIEW.with(|c| c.replace(view));
        CurrentViewGuard { prev }
    }
}

impl Drop for CurrentViewGuard {
    fn drop(&mut self) {
        let prev = self.prev;
        CURRENT_VIEW.with(|c| c.set(prev));
    }
}

// =============================================================================
// Creation and Rendering (driven by the materializer)
// =============================================================================

/// Claim the view: record its parent, mark it created, fire `created`
/// callbacks.
///
/// # Panics
///
/// If the view was already created. View instances are single-use.
pub(crate) fn create_view(view: ViewId, parent: Option<ViewId>) {
    with_view(view, |v| {
        assert!(
            !v.flags.contains(ViewFlags::CREATED),
            "a view instance can only be rendered once; construct a fresh one"
        );
        v.parent = parent;
        v.flags.insert(ViewFlags::CREATED);
    });
    fire_callbacks(view, Callbacks::Created);
}

struct InRenderGuard {
    view: ViewId,
}

impl Drop for InRenderGuard {
    fn drop(&mut self) {
        with_view(self.view, |v| v.flags.remove(ViewFlags::IN_RENDER));
    }
}

/// Run the view's render function with the view current and the in-render
/// flag set.
///
/// # Panics
///
/// If the view's render function is already running; re-entrant rendering
/// is a programmer error.
pub(crate) fn call_render(view: ViewId) -> Content {
    let Some(mut f) = with_view(view, |v| {
        assert!(
            !v.flags.contains(ViewFlags::IN_RENDER),
            "a view's render function cannot be invoked re-entrantly"
        );
        v.flags.insert(ViewFlags::IN_RENDER);
        v.render_fn.take()
    }) else {
        // Destroyed views have no render function left.
        with_view(view, |v| v.flags.remove(ViewFlags::IN_RENDER));
        return Content::None;
    };
    let content = {
        let _current = CurrentViewGuard::enter(Some(view));
        let _in_render = InRenderGuard { view };
        f()
    };
    with_view(view, |v| {
        if !v.flags.contains(ViewFlags::DESTROYED) {
            v.render_fn = Some(f);
        }
    });
    content
}

pub(crate) fn set_range(view: ViewId, range: RangeId) {
    with_view(view, |v| v.range = Some(range));
    range::set_view(range, view);
}

pub(crate) fn mark_rendered(view: ViewId) {
    with_view(view, |v| v.flags.insert(ViewFlags::RENDERED));
    fire_callbacks(view, Callbacks::Rendered);
}

pub(crate) fn mark_attached(view: ViewId) {
    with_view(view, |v| v.flags.insert(ViewFlags::ATTACHED));
}

// =============================================================================
// View Computations
// =============================================================================

/// Start a reactive computation owned by the view. It is detached from any
/// enclosing computation (the view's destruction, not an outer invalidation,
/// decides its lifetime) and runs with the view current.
///
/// # Panics
///
/// If the view has not been created yet, has been destroyed, or if called
/// from inside the view's own render function.
pub fn view_autorun(view: ViewId, mut f: impl FnMut(&Computation) + 'static) -> Computation {
    with_view(view, |v| {
        assert!(
            v.flags.contains(ViewFlags::CREATED),
            "view_autorun needs a created view; call it from the created callback at the earliest"
        );
        assert!(
            !v.flags.contains(ViewFlags::DESTROYED),
            "view_autorun on a destroyed view"
        );
        assert!(
            !v.flags.contains(ViewFlags::IN_RENDER),
            "can't start a view computation from inside render; use the created or rendered callback"
        );
    });

    let comp = tracker::nonreactive(|| {
        tracker::autorun(move |c| {
            let _guard = CurrentViewGuard::enter(Some(view));
            f(c);
        })
    });
    with_view(view, |v| v.computations.push(comp));
    comp
}

// =============================================================================
// Bindings
// =============================================================================

/// Set (or create) a binding on the view. Descendant reads through
/// [`get_binding`] see the change reactively.
pub fn set_binding(view: ViewId, name: &str, value: impl Into<BindingValue>) {
    let value = value.into();
    let var = with_view(view, |v| v.bindings.get(name).cloned());
    match var {
        Some(var) => var.set(value),
        None => {
            let var = Rc::new(ReactiveVar::new(value));
            with_view(view, |v| v.bindings.insert(name.to_string(), var));
        }
    }
}

/// Reactive binding lookup, walking the view and its ancestors.
pub fn get_binding(view: ViewId, name: &str) -> Option<BindingValue> {
    let mut cur = Some(view);
    while let Some(v) = cur {
        if let Some(var) = with_view(v, |s| s.bindings.get(name).cloned()) {
            return Some(var.get());
        }
        cur = parent_view(v);
    }
    None
}

// =============================================================================
// Destruction
// =============================================================================

/// Destroy the view: fire `destroyed` callbacks, stop its computations, and
/// destroy its content. `skip_nodes` suppresses element teardown when an
/// ancestor subtree teardown already covers the nodes. Idempotent.
pub fn destroy_view(view: ViewId, skip_nodes: bool) {
    let already = with_view(view, |v| {
        let already = v.flags.contains(ViewFlags::DESTROYED);
        v.flags.insert(ViewFlags::DESTROYED);
        already
    });
    if already {
        return;
    }
    tracing::trace!(view = view.0, name = %view_name(view), "destroying view");

    fire_callbacks(view, Callbacks::Destroyed);

    let (comps, range) = with_view(view, |v| {
        v.render_fn = None;
        v.created_cbs.clear();
        v.rendered_cbs.clear();
        v.destroyed_cbs.clear();
        (std::mem::take(&mut v.computations), v.range)
    });
    for comp in comps {
        comp.stop();
    }
    if let Some(range) = range {
        range::destroy_members(range, skip_nodes);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::text;
    use std::cell::Cell;

    #[test]
    fn test_created_fires_with_view_current() {
        let v = view("demo", || text("x"));
        let seen = Rc::new(Cell::new(None));
        let seen_clone = seen.clone();
        on_created(v, move || seen_clone.set(current_view()));

        assert!(!is_created(v));
        create_view(v, None);
        assert!(is_created(v));
        assert_eq!(seen.get(), Some(v), "created callback sees the view current");
        assert_eq!(current_view(), None, "current view restored afterwards");
    }

    #[test]
    #[should_panic(expected = "only be rendered once")]
    fn test_create_twice_panics() {
        let v = view("demo", || text("x"));
        create_view(v, None);
        create_view(v, None);
    }

    #[test]
    #[should_panic(expected = "re-entrantly")]
    fn test_reentrant_render_panics() {
        let v = view("demo", move || {
            let me = current_view().unwrap();
            call_render(me)
        });
        create_view(v, None);
        call_render(v);
    }

    #[test]
    #[should_panic(expected = "inside render")]
    fn test_autorun_inside_render_panics() {
        let v = view("demo", move || {
            let me = current_view().unwrap();
            view_autorun(me, |_| {});
            text("x")
        });
        create_view(v, None);
        call_render(v);
    }

    #[test]
    fn test_destroy_stops_computations_and_is_idempotent() {
        let v = view("demo", || text("x"));
        create_view(v, None);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let dep = crate::tracker::Dependency::new();
        let dep_clone = dep.clone();
        view_autorun(v, move |_| {
            dep_clone.depend();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        let destroys = Rc::new(Cell::new(0));
        let destroys_clone = destroys.clone();
        on_destroyed(v, move || destroys_clone.set(destroys_clone.get() + 1));

        destroy_view(v, false);
        destroy_view(v, false);
        assert_eq!(destroys.get(), 1, "destroyed fires exactly once");

        dep.changed();
        assert_eq!(runs.get(), 1, "view computations stop at destroy");
    }

    #[test]
    fn test_binding_lookup_walks_parents() {
        let parent = view("outer", || text(""));
        let child = view("inner", || text(""));
        create_view(parent, None);
        create_view(child, Some(parent));

        set_binding(parent, "label", "from-outer");
        assert_eq!(
            get_binding(child, "label"),
            Some(BindingValue::Str("from-outer".into()))
        );

        set_binding(child, "label", "shadowed");
        assert_eq!(
            get_binding(child, "label"),
            Some(BindingValue::Str("shadowed".into()))
        );
        assert_eq!(get_binding(parent, "missing"), None);
    }

    #[test]
    fn test_binding_is_reactive() {
        let v = view("demo", || text(""));
        create_view(v, None);
        set_binding(v, "n", 0i64);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let comp = crate::tracker::autorun(move |_| {
            seen_clone.borrow_mut().push(get_binding(v, "n"));
        });
        set_binding(v, "n", 1i64);
        assert_eq!(
            *seen.borrow(),
            vec![Some(BindingValue::Int(0)), Some(BindingValue::Int(1))]
        );
        comp.stop();
    }

    #[test]
    fn test_view_computation_survives_outer_invalidation() {
        let dep = crate::tracker::Dependency::new();
        let inner_runs = Rc::new(Cell::new(0));

        let v = view("demo", || text(""));
        create_view(v, None);

        let dep_clone = dep.clone();
        let inner_runs_clone = inner_runs.clone();
        let outer = crate::tracker::autorun(move |c| {
            dep_clone.depend();
            if c.first_run() {
                let runs = inner_runs_clone.clone();
                view_autorun(v, move |_| runs.set(runs.get() + 1));
            }
        });

        assert_eq!(inner_runs.get(), 1);
        dep.changed();
        // An ordinary nested computation would have been stopped here.
        let inner_comp = with_view(v, |s| s.computations[0]);
        assert!(
            !inner_comp.stopped(),
            "view computations are owned by the view, not the enclosing computation"
        );
        outer.stop();
    }
}
