//! Synthetic event listeners and dispatch.
//!
//! Listeners are registered per element for either the capture or the bubble
//! phase. [`dispatch`] walks the standard three phases: capture from the root
//! down to the target's parent, the target itself (capture listeners first),
//! then (for bubbling events) back up to the root. Non-bubbling events
//! still traverse the capture phase, which is what the delegation layer's
//! capture fallback relies on.

use std::rc::Rc;

use super::{NodeId, with_doc};

/// Identifies one listener registration on one element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ListenerId(u32);

pub(crate) struct Listener {
    id: u32,
    event_type: String,
    capture: bool,
    cb: Rc<dyn Fn(&mut Event)>,
}

/// A dispatched event instance.
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
    /// Whether this concrete event instance participates in the bubble phase.
    pub bubbles: bool,
    /// The element whose listener is currently being invoked.
    pub current_target: Option<NodeId>,
    propagation_stopped: bool,
}

impl Event {
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Register a listener. `capture` selects the phase it observes.
pub fn add_listener(
    elem: NodeId,
    event_type: &str,
    capture: bool,
    cb: Rc<dyn Fn(&mut Event)>,
) -> ListenerId {
    with_doc(|d| {
        let e = d
            .element_mut(elem)
            .expect("add_listener: node is not an element");
        let id = e.next_listener_id;
        e.next_listener_id += 1;
        e.listeners.push(Listener {
            id,
            event_type: event_type.to_string(),
            capture,
            cb,
        });
        ListenerId(id)
    })
}

pub fn remove_listener(elem: NodeId, listener: ListenerId) {
    with_doc(|d| {
        if let Some(e) = d.element_mut(elem) {
            e.listeners.retain(|l| l.id != listener.0);
        }
    });
}

/// Dispatch an event of `event_type` at `target` and return the final event
/// state. `bubbles` controls whether the bubble phase runs.
pub fn dispatch(target: NodeId, event_type: &str, bubbles: bool) -> Event {
    let mut evt = Event {
        event_type: event_type.to_string(),
        target,
        bubbles,
        current_target: None,
        propagation_stopped: false,
    };

    // Ancestor chain, target first.
    let mut chain = vec![target];
    let mut cur = target;
    while let Some(p) = super::parent_node(cur) {
        chain.push(p);
        cur = p;
    }

    // Capture: root down to the target's parent.
    for &elem in chain.iter().skip(1).rev() {
        if evt.propagation_stopped {
            return evt;
        }
        run_listeners(elem, &mut evt, Some(true));
    }

    // Target phase: both kinds, capture listeners first.
    if !evt.propagation_stopped {
        run_listeners(target, &mut evt, None);
    }

    // Bubble: target's parent up to the root.
    if evt.bubbles {
        for &elem in chain.iter().skip(1) {
            if evt.propagation_stopped {
                return evt;
            }
            run_listeners(elem, &mut evt, Some(false));
        }
    }

    evt
}

fn run_listeners(elem: NodeId, evt: &mut Event, phase_capture: Option<bool>) {
    let matching: Vec<Rc<dyn Fn(&mut Event)>> = with_doc(|d| {
        let Some(e) = d.element(elem) else {
            return Vec::new();
        };
        let mut capture: Vec<_> = Vec::new();
        let mut bubble: Vec<_> = Vec::new();
        for l in &e.listeners {
            if l.event_type != evt.event_type {
                continue;
            }
            match phase_capture {
                Some(want) if l.capture != want => continue,
                _ => {}
            }
            if l.capture {
                capture.push(Rc::clone(&l.cb));
            } else {
                bubble.push(Rc::clone(&l.cb));
            }
        }
        capture.extend(bubble);
        capture
    });

    evt.current_target = Some(elem);
    for cb in matching {
        cb(evt);
    }
    evt.current_target = None;
}
