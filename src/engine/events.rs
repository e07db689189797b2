//! Delegated event maps for dynamic regions.
//!
//! Handlers are declared as `"type selector"` clauses on a view and bound
//! once on the range's parent element when the range attaches. Dispatch then
//! finds matching descendants at event time, innermost first, scoped to the
//! view's range so sibling regions under the same parent never see each
//! other's events.
//!
//! Whether an event type bubbles is learned at runtime: well-known bubbling
//! types delegate straight away, while unknown types are bound for both the
//! capture and bubble phases and the first observed event decides. A
//! non-bubbling type keeps the capture-phase binding so delegation still
//! works for it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::UiError;
use crate::dom::{self, NodeId};
use crate::dom::events::{Event, ListenerId, add_listener, remove_listener};
use crate::dom::selector;
use crate::engine::range::{self, RangeId};
use crate::engine::view::{self, ViewId};

/// Event types known to bubble; these skip the runtime probe.
const BUBBLING_EVENTS: &[&str] = &[
    "click", "dblclick", "mousedown", "mouseup", "mousemove", "mouseover", "mouseout",
    "contextmenu", "wheel", "keydown", "keypress", "keyup", "input", "change", "submit",
    "reset", "select", "touchstart", "touchmove", "touchend", "pointerdown", "pointerup",
    "pointermove", "focusin", "focusout", "drag", "dragstart", "dragend", "dragover",
    "dragenter", "dragleave", "drop", "copy", "cut", "paste",
];

type Handler = Rc<dyn Fn(&mut Event, ViewId)>;

/// A set of `"type selector"` clauses mapped to handlers.
///
/// # Example
///
/// ```ignore
/// use reflow_dom::engine::events::EventMap;
///
/// let map = EventMap::new()
///     .on("click .save", |_evt, _view| { /* persist */ })
///     .on("keydown input.title, change input.title", |_evt, _view| {});
/// ```
#[derive(Default)]
pub struct EventMap {
    entries: Vec<(String, Handler)>,
}

impl EventMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for one or more comma-separated clauses. Each clause is
    /// an event type optionally followed by a descendant selector.
    pub fn on(mut self, spec: &str, handler: impl Fn(&mut Event, ViewId) + 'static) -> Self {
        self.entries.push((spec.to_string(), Rc::new(handler)));
        self
    }
}

// =============================================================================
// Handler Records
// =============================================================================

#[derive(Clone, Copy, PartialEq, Debug)]
enum Mode {
    Unknown,
    Bubbling,
    Capturing,
}

struct HandlerRecord {
    elem: NodeId,
    event_type: String,
    selector: Option<String>,
    range: RangeId,
    view: ViewId,
    handler: Handler,
    mode: Cell<Mode>,
    capture_id: Cell<Option<ListenerId>>,
    bubble_id: Cell<Option<ListenerId>>,
}

thread_local! {
    static ELEM_RECORDS: RefCell<HashMap<NodeId, Vec<Rc<HandlerRecord>>>> =
        RefCell::new(HashMap::new());
}

/// Bind the view's event map. The view must have been rendered; listeners go
/// live when (and each time) its range attaches, and are removed when the
/// view is destroyed.
pub fn attach_event_map(view_id: ViewId, map: EventMap) -> Result<(), UiError> {
    let range_id = view::view_range(view_id).ok_or(UiError::NotRendered)?;

    let mut parsed: Vec<(String, Option<String>, Handler)> = Vec::new();
    for (spec, handler) in map.entries {
        for clause in spec.split(',') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let (event_type, sel) = match clause.split_once(char::is_whitespace) {
                Some((ty, rest)) => (ty.to_string(), Some(rest.trim().to_string())),
                None => (clause.to_string(), None),
            };
            parsed.push((event_type, sel, handler.clone()));
        }
    }

    let bound: Rc<RefCell<Vec<Rc<HandlerRecord>>>> = Rc::default();

    let bound_attach = bound.clone();
    range::on_attached(range_id, move |parent| {
        // A detach/attach cycle rebinds on the new parent.
        for record in bound_attach.borrow_mut().drain(..) {
            unbind(&record);
        }
        for (event_type, sel, handler) in &parsed {
            let record = Rc::new(HandlerRecord {
                elem: parent,
                event_type: event_type.clone(),
                selector: sel.clone(),
                range: range_id,
                view: view_id,
                handler: handler.clone(),
                mode: Cell::new(Mode::Unknown),
                capture_id: Cell::new(None),
                bubble_id: Cell::new(None),
            });
            bind(&record);
            bound_attach.borrow_mut().push(record);
        }
    });

    view::on_destroyed(view_id, move || {
        for record in bound.borrow_mut().drain(..) {
            unbind(&record);
        }
    });
    Ok(())
}

// =============================================================================
// Binding
// =============================================================================

fn bind(record: &Rc<HandlerRecord>) {
    if BUBBLING_EVENTS.contains(&record.event_type.as_str()) {
        record.mode.set(Mode::Bubbling);
    }
    match record.mode.get() {
        Mode::Bubbling => bind_bubble(record),
        Mode::Capturing => bind_capture(record),
        Mode::Unknown => {
            bind_capture(record);
            bind_bubble(record);
        }
    }

    // Handlers of enclosing regions on the same element are rebound so a
    // nested region's handlers run first.
    let to_rebind: Vec<Rc<HandlerRecord>> = ELEM_RECORDS.with(|m| {
        m.borrow()
            .get(&record.elem)
            .map(|records| {
                records
                    .iter()
                    .filter(|other| {
                        other.event_type == record.event_type
                            && other.range != record.range
                            && range::contains_range(other.range, record.range)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    });
    register(record);
    for other in to_rebind {
        unbind_listeners(&other);
        match other.mode.get() {
            Mode::Bubbling => bind_bubble(&other),
            Mode::Capturing => bind_capture(&other),
            Mode::Unknown => {
                bind_capture(&other);
                bind_bubble(&other);
            }
        }
    }
}

fn register(record: &Rc<HandlerRecord>) {
    ELEM_RECORDS.with(|m| {
        m.borrow_mut()
            .entry(record.elem)
            .or_default()
            .push(record.clone());
    });
}

fn unbind(record: &Rc<HandlerRecord>) {
    unbind_listeners(record);
    ELEM_RECORDS.with(|m| {
        if let Some(records) = m.borrow_mut().get_mut(&record.elem) {
            records.retain(|r| !Rc::ptr_eq(r, record));
        }
    });
}

fn unbind_listeners(record: &HandlerRecord) {
    if let Some(id) = record.capture_id.take() {
        remove_listener(record.elem, id);
    }
    if let Some(id) = record.bubble_id.take() {
        remove_listener(record.elem, id);
    }
}

fn bind_capture(record: &Rc<HandlerRecord>) {
    let rec = record.clone();
    let cb = Rc::new(move |evt: &mut Event| match rec.mode.get() {
        Mode::Unknown => {
            if evt.bubbles {
                // The bubble-phase listener will handle this event; the
                // capture probe has served its purpose.
                rec.mode.set(Mode::Bubbling);
                if let Some(id) = rec.capture_id.take() {
                    remove_listener(rec.elem, id);
                }
            } else {
                rec.mode.set(Mode::Capturing);
                if let Some(id) = rec.bubble_id.take() {
                    remove_listener(rec.elem, id);
                }
                deliver(&rec, evt);
            }
        }
        Mode::Capturing => deliver(&rec, evt),
        Mode::Bubbling => {}
    });
    record
        .capture_id
        .set(Some(add_listener(record.elem, &record.event_type, true, cb)));
}

fn bind_bubble(record: &Rc<HandlerRecord>) {
    let rec = record.clone();
    let cb = Rc::new(move |evt: &mut Event| match rec.mode.get() {
        Mode::Unknown => {
            rec.mode.set(Mode::Bubbling);
            if let Some(id) = rec.capture_id.take() {
                remove_listener(rec.elem, id);
            }
            deliver(&rec, evt);
        }
        Mode::Bubbling => deliver(&rec, evt),
        Mode::Capturing => {}
    });
    record
        .bubble_id
        .set(Some(add_listener(record.elem, &record.event_type, false, cb)));
}

// =============================================================================
// Delivery
// =============================================================================

fn deliver(rec: &HandlerRecord, evt: &mut Event) {
    let start = if dom::is_element(evt.target) {
        evt.target
    } else {
        match dom::parent_node(evt.target) {
            Some(p) => p,
            None => return,
        }
    };

    match &rec.selector {
        None => {
            if range::contains_element(rec.range, start) {
                evt.current_target = Some(rec.elem);
                (rec.handler)(evt, rec.view);
            }
        }
        Some(sel) => {
            // Matching ancestors, innermost first, stopping at the
            // delegation root.
            let mut chain = Vec::new();
            let mut cur = Some(start);
            while let Some(n) = cur {
                if n == rec.elem {
                    break;
                }
                chain.push(n);
                cur = dom::parent_node(n);
            }
            for elem in chain {
                if evt.propagation_stopped() {
                    break;
                }
                if selector::matches(elem, sel) && range::contains_element(rec.range, elem) {
                    evt.current_target = Some(elem);
                    (rec.handler)(evt, rec.view);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Content, element, fragment, text};
    use crate::dom::events::dispatch;
    use crate::engine::materialize::materialize;

    fn mount_view(v: ViewId) -> NodeId {
        let parent = dom::create_element("div");
        let members = materialize(Content::View(v), None);
        let r = range::new_range(members);
        range::attach(r, parent, None).unwrap();
        parent
    }

    fn find(parent: NodeId, sel: &str) -> NodeId {
        fn walk(n: NodeId, sel: &str, out: &mut Option<NodeId>) {
            if out.is_some() {
                return;
            }
            if dom::is_element(n) && selector::matches(n, sel) {
                *out = Some(n);
                return;
            }
            for c in dom::child_nodes(n) {
                walk(c, sel, out);
            }
        }
        let mut out = None;
        walk(parent, sel, &mut out);
        out.expect("selector should match something")
    }

    #[test]
    fn test_delegated_click_matches_selector() {
        let v = view::view("demo", || {
            element(
                "ul",
                &[],
                vec![
                    element("li", &[("class", "item"), ("id", "first")], vec![text("a")]),
                    element("li", &[("class", "other")], vec![text("b")]),
                ],
            )
        });
        let parent = mount_view(v);

        let hits = Rc::new(RefCell::new(Vec::new()));
        let hits_clone = hits.clone();
        attach_event_map(
            v,
            EventMap::new().on("click .item", move |evt, _| {
                let id = dom::get_attribute(evt.current_target.unwrap(), "id");
                hits_clone.borrow_mut().push(id.unwrap_or_default());
            }),
        )
        .unwrap();

        dispatch(find(parent, ".item"), "click", true);
        dispatch(find(parent, ".other"), "click", true);
        assert_eq!(*hits.borrow(), vec!["first"], "only matching targets fire");
    }

    #[test]
    fn test_inner_match_fires_before_outer() {
        let v = view::view("demo", || {
            element(
                "div",
                &[("class", "hot"), ("id", "outer")],
                vec![element(
                    "div",
                    &[("class", "hot"), ("id", "inner")],
                    vec![element("b", &[("id", "leaf")], vec![])],
                )],
            )
        });
        let parent = mount_view(v);

        let order = Rc::new(RefCell::new(Vec::new()));
        let order_clone = order.clone();
        attach_event_map(
            v,
            EventMap::new().on("click .hot", move |evt, _| {
                order_clone
                    .borrow_mut()
                    .push(dom::get_attribute(evt.current_target.unwrap(), "id").unwrap());
            }),
        )
        .unwrap();

        dispatch(find(parent, "#leaf"), "click", true);
        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_nested_region_handlers_fire_before_enclosing() {
        let inner = view::view("inner", || element("b", &[("class", "leaf")], vec![]));
        let inner_cell = RefCell::new(Some(inner));
        let outer = view::view("outer", move || {
            Content::View(inner_cell.borrow_mut().take().unwrap())
        });
        let parent = mount_view(outer);

        let order = Rc::new(RefCell::new(Vec::new()));

        // The enclosing region binds first; its listener must still run
        // after the nested region's.
        let order_outer = order.clone();
        attach_event_map(
            outer,
            EventMap::new().on("click .leaf", move |_, _| {
                order_outer.borrow_mut().push("outer")
            }),
        )
        .unwrap();
        let order_inner = order.clone();
        attach_event_map(
            inner,
            EventMap::new().on("click .leaf", move |_, _| {
                order_inner.borrow_mut().push("inner")
            }),
        )
        .unwrap();

        dispatch(find(parent, ".leaf"), "click", true);
        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_events_scoped_to_region() {
        let render_item = |label: &'static str| {
            move || element("button", &[("class", "go")], vec![text(label)])
        };
        let v1 = view::view("one", render_item("1"));
        let v2 = view::view("two", render_item("2"));

        let parent = dom::create_element("div");
        let members = materialize(fragment(vec![Content::View(v1), Content::View(v2)]), None);
        let r = range::new_range(members);
        range::attach(r, parent, None).unwrap();

        let hits = Rc::new(RefCell::new(Vec::new()));
        let hits_clone = hits.clone();
        attach_event_map(
            v1,
            EventMap::new().on("click .go", move |_, _| hits_clone.borrow_mut().push("v1")),
        )
        .unwrap();
        let hits_clone = hits.clone();
        attach_event_map(
            v2,
            EventMap::new().on("click .go", move |_, _| hits_clone.borrow_mut().push("v2")),
        )
        .unwrap();

        let buttons = dom::child_nodes(parent);
        dispatch(buttons[1], "click", true);
        assert_eq!(
            *hits.borrow(),
            vec!["v2"],
            "a sibling region's handler must not fire"
        );
    }

    #[test]
    fn test_unknown_type_learns_bubbling() {
        let v = view::view("demo", || element("span", &[("class", "t")], vec![]));
        let parent = mount_view(v);

        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        attach_event_map(
            v,
            EventMap::new().on("custom-toggle .t", move |_, _| {
                hits_clone.set(hits_clone.get() + 1)
            }),
        )
        .unwrap();

        let target = find(parent, ".t");
        dispatch(target, "custom-toggle", true);
        assert_eq!(hits.get(), 1, "first bubbling event fires exactly once");
        dispatch(target, "custom-toggle", true);
        assert_eq!(hits.get(), 2, "later events keep firing once each");
    }

    #[test]
    fn test_non_bubbling_type_uses_capture_fallback() {
        let v = view::view("demo", || element("input", &[("class", "f")], vec![]));
        let parent = mount_view(v);

        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        attach_event_map(
            v,
            EventMap::new().on("focus .f", move |_, _| hits_clone.set(hits_clone.get() + 1)),
        )
        .unwrap();

        let target = find(parent, ".f");
        dispatch(target, "focus", false);
        assert_eq!(hits.get(), 1, "non-bubbling event delivered via capture");
        dispatch(target, "focus", false);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_destroy_unbinds_handlers() {
        let v = view::view("demo", || element("b", &[("class", "x")], vec![]));
        let parent = mount_view(v);

        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        attach_event_map(
            v,
            EventMap::new().on("click .x", move |_, _| hits_clone.set(hits_clone.get() + 1)),
        )
        .unwrap();

        let target = find(parent, ".x");
        dispatch(target, "click", true);
        view::destroy_view(v, false);
        dispatch(target, "click", true);
        assert_eq!(hits.get(), 1, "destroyed view's handlers are gone");
    }

    #[test]
    fn test_attach_before_render_errors() {
        let v = view::view("demo", || text(""));
        assert!(matches!(
            attach_event_map(v, EventMap::new().on("click", |_, _| {})),
            Err(UiError::NotRendered)
        ));
    }
}
