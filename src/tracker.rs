//! Reactive dependency tracking and invalidation scheduling.
//!
//! This is the scheduler the rest of the crate runs on. The model:
//!
//! - [`autorun`] runs a function immediately inside a [`Computation`] and
//!   re-runs it whenever a [`Dependency`] it read is `changed()`.
//! - Invalidation is eager: `on_invalidate` callbacks fire the moment a
//!   computation is invalidated (or stopped), *before* the re-run. The view
//!   layer relies on this to tear down soon-to-be-replaced content.
//! - Re-runs are batched on a flush queue. A `changed()` call from plain
//!   (non-reactive, non-flushing) code drains the queue synchronously before
//!   returning; a `changed()` call during a flush or inside a computation is
//!   deferred to the already-running unit of work.
//! - [`nonreactive`] runs a closure with no current computation, so reads
//!   establish no dependencies.
//!
//! Errors thrown by the first run of a computation propagate to the
//! [`autorun`] caller (after stopping the computation). Errors in later
//! re-runs are caught at the flush boundary and reported, so one broken
//! computation cannot corrupt unrelated ones mid-flush.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

// =============================================================================
// Scheduler State
// =============================================================================

thread_local! {
    static TRACKER: RefCell<TrackerState> = RefCell::new(TrackerState {
        computations: HashMap::new(),
        next_id: 1,
        current: None,
        queue: VecDeque::new(),
        in_flush: false,
    });
}

struct TrackerState {
    computations: HashMap<u64, CompState>,
    next_id: u64,
    current: Option<u64>,
    queue: VecDeque<u64>,
    in_flush: bool,
}

// A computation's entry is removed on stop; "no entry" reads as stopped.
struct CompState {
    func: Option<Rc<RefCell<dyn FnMut(&Computation)>>>,
    invalidated: bool,
    first_run: bool,
    queued: bool,
    on_invalidate: Vec<Box<dyn FnOnce()>>,
}

/// Handle to a reactive computation created by [`autorun`].
///
/// Copyable; all state lives in the thread-local scheduler. Operations on a
/// stopped computation are no-ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Computation {
    id: u64,
}

impl Computation {
    /// True while the computation's function is executing for the first time.
    pub fn first_run(&self) -> bool {
        TRACKER.with(|t| {
            t.borrow()
                .computations
                .get(&self.id)
                .map(|c| c.first_run)
                .unwrap_or(false)
        })
    }

    /// True once [`Computation::stop`] has been called.
    pub fn stopped(&self) -> bool {
        TRACKER.with(|t| !t.borrow().computations.contains_key(&self.id))
    }

    /// Register a callback to fire at the next invalidation (or stop) of this
    /// computation. If the computation is already invalidated or stopped, the
    /// callback fires immediately.
    pub fn on_invalidate(&self, cb: impl FnOnce() + 'static) {
        let mut cb: Option<Box<dyn FnOnce()>> = Some(Box::new(cb));
        TRACKER.with(|t| {
            let mut t = t.borrow_mut();
            if let Some(c) = t.computations.get_mut(&self.id) {
                if !c.invalidated {
                    c.on_invalidate.push(cb.take().unwrap());
                }
            }
        });
        if let Some(cb) = cb {
            cb();
        }
    }

    /// Invalidate the computation: fires `on_invalidate` callbacks now and
    /// schedules a re-run (unless stopped).
    pub fn invalidate(&self) {
        invalidate_comp(self.id);
        maybe_flush();
    }

    /// Permanently stop the computation. It will never re-run; pending
    /// `on_invalidate` callbacks fire once. Idempotent.
    ///
    /// The scheduler entry is released here; a missing entry reads as
    /// stopped everywhere else.
    pub fn stop(&self) {
        let cbs = TRACKER.with(|t| {
            let mut t = t.borrow_mut();
            match t.computations.remove(&self.id) {
                Some(c) if !c.invalidated => c.on_invalidate,
                _ => Vec::new(),
            }
        });
        for cb in cbs {
            cb();
        }
    }
}

// =============================================================================
// Autorun
// =============================================================================

/// Run `f` now and re-run it whenever a dependency it reads changes.
///
/// The first run happens synchronously before `autorun` returns; a panic in
/// it stops the computation and propagates to the caller. When called from
/// inside another computation, the new computation is stopped when the
/// enclosing one is invalidated.
pub fn autorun(f: impl FnMut(&Computation) + 'static) -> Computation {
    let id = TRACKER.with(|t| {
        let mut t = t.borrow_mut();
        let id = t.next_id;
        t.next_id += 1;
        t.computations.insert(
            id,
            CompState {
                func: Some(Rc::new(RefCell::new(f))),
                invalidated: false,
                first_run: true,
                queued: false,
                on_invalidate: Vec::new(),
            },
        );
        id
    });
    let comp = Computation { id };

    if let Some(parent) = current_computation() {
        parent.on_invalidate(move || comp.stop());
    }

    if let Err(e) = catch_unwind(AssertUnwindSafe(|| run_computation(id))) {
        comp.stop();
        resume_unwind(e);
    }
    maybe_flush();
    comp
}

fn run_computation(id: u64) {
    let func = TRACKER.with(|t| {
        let mut t = t.borrow_mut();
        match t.computations.get_mut(&id) {
            Some(c) => {
                c.invalidated = false;
                c.func.clone()
            }
            None => None,
        }
    });
    let Some(func) = func else { return };

    {
        let _guard = CurrentGuard::enter(Some(id));
        (func.borrow_mut())(&Computation { id });
    }

    TRACKER.with(|t| {
        if let Some(c) = t.borrow_mut().computations.get_mut(&id) {
            c.first_run = false;
        }
    });
}

// =============================================================================
// Current-Computation Context
// =============================================================================

struct CurrentGuard {
    prev: Option<u64>,
}

impl CurrentGuard {
    fn enter(current: Option<u64>) -> Self {
        let prev = TRACKER.with(|t| {
            let mut t = t.borrow_mut();
            std::mem::replace(&mut t.current, current)
        });
        CurrentGuard { prev }
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        TRACKER.with(|t| t.borrow_mut().current = self.prev);
    }
}

/// True when a computation is currently running (and not suspended by
/// [`nonreactive`]).
pub fn active() -> bool {
    TRACKER.with(|t| t.borrow().current.is_some())
}

/// The currently running computation, if any.
pub fn current_computation() -> Option<Computation> {
    TRACKER.with(|t| t.borrow().current.map(|id| Computation { id }))
}

/// Run `f` with no current computation: reads inside establish no
/// dependencies. The previous context is restored even if `f` panics.
pub fn nonreactive<R>(f: impl FnOnce() -> R) -> R {
    let _guard = CurrentGuard::enter(None);
    f()
}

// =============================================================================
// Invalidation and Flush
// =============================================================================

fn invalidate_comp(id: u64) {
    let cbs = TRACKER.with(|t| {
        let mut t = t.borrow_mut();
        match t.computations.get_mut(&id) {
            Some(c) if !c.invalidated => {
                c.invalidated = true;
                let cbs = std::mem::take(&mut c.on_invalidate);
                if !c.queued {
                    c.queued = true;
                    t.queue.push_back(id);
                }
                cbs
            }
            _ => Vec::new(),
        }
    });
    for cb in cbs {
        cb();
    }
}

/// Process all pending re-runs now.
///
/// Calling this while a flush is in progress, or from inside a computation,
/// is a programmer error and panics.
pub fn flush() {
    TRACKER.with(|t| {
        let t = t.borrow();
        if t.in_flush {
            panic!("can't call flush while flushing");
        }
        if t.current.is_some() {
            panic!("can't call flush inside a reactive computation");
        }
    });
    flush_inner();
}

fn maybe_flush() {
    let idle = TRACKER.with(|t| {
        let t = t.borrow();
        !t.in_flush && t.current.is_none() && !t.queue.is_empty()
    });
    if idle {
        flush_inner();
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        TRACKER.with(|t| t.borrow_mut().in_flush = false);
    }
}

fn flush_inner() {
    TRACKER.with(|t| t.borrow_mut().in_flush = true);
    let _guard = FlushGuard;

    loop {
        let next = TRACKER.with(|t| {
            let mut t = t.borrow_mut();
            let id = t.queue.pop_front();
            if let Some(id) = id {
                match t.computations.get_mut(&id) {
                    Some(c) => {
                        c.queued = false;
                        if !c.invalidated {
                            return Some(None);
                        }
                    }
                    // Stopped after it was queued; its state is gone.
                    None => return Some(None),
                }
            }
            id.map(Some)
        });
        let id = match next {
            None => break,
            Some(None) => continue,
            Some(Some(id)) => id,
        };

        if let Err(e) = catch_unwind(AssertUnwindSafe(|| run_computation(id))) {
            tracing::error!(
                computation = id,
                error = panic_message(&e),
                "exception from reactive re-run"
            );
        }

        // A computation that invalidated itself during its own run goes back
        // on the queue.
        TRACKER.with(|t| {
            let mut t = t.borrow_mut();
            if let Some(c) = t.computations.get_mut(&id) {
                if c.invalidated && !c.queued {
                    c.queued = true;
                    t.queue.push_back(id);
                }
            }
        });
    }
}

fn panic_message(e: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = e.downcast_ref::<&str>() {
        s
    } else if let Some(s) = e.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// =============================================================================
// Dependency
// =============================================================================

/// A dependency cell: the read side calls [`Dependency::depend`] from inside
/// a computation, the write side calls [`Dependency::changed`] to invalidate
/// every dependent.
#[derive(Clone, Default)]
pub struct Dependency {
    dependents: Rc<RefCell<HashSet<u64>>>,
}

impl Dependency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current computation as a dependent. Returns true if this
    /// established a new edge, false if there was no current computation or
    /// the edge already existed.
    pub fn depend(&self) -> bool {
        let Some(comp) = current_computation() else {
            return false;
        };
        let id = comp.id;
        let inserted = self.dependents.borrow_mut().insert(id);
        if inserted {
            let dependents = Rc::clone(&self.dependents);
            comp.on_invalidate(move || {
                dependents.borrow_mut().remove(&id);
            });
        }
        inserted
    }

    /// Invalidate all dependents and flush (unless already inside a flush or
    /// a computation, in which case re-runs are deferred to that unit of
    /// work).
    pub fn changed(&self) {
        let ids: Vec<u64> = self.dependents.borrow().iter().copied().collect();
        for id in ids {
            invalidate_comp(id);
        }
        maybe_flush();
    }

    pub fn has_dependents(&self) -> bool {
        !self.dependents.borrow().is_empty()
    }
}

// =============================================================================
// ReactiveVar
// =============================================================================

/// An equality-gated reactive cell: `get` inside a computation establishes a
/// dependency, `set` with a different value invalidates dependents.
pub struct ReactiveVar<T> {
    value: RefCell<T>,
    dep: Dependency,
}

impl<T: Clone + PartialEq> ReactiveVar<T> {
    pub fn new(value: T) -> Self {
        ReactiveVar {
            value: RefCell::new(value),
            dep: Dependency::new(),
        }
    }

    pub fn get(&self) -> T {
        self.dep.depend();
        self.value.borrow().clone()
    }

    /// Read without establishing a dependency.
    pub fn get_nonreactive(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        {
            let mut slot = self.value.borrow_mut();
            if *slot == value {
                return;
            }
            *slot = value;
        }
        self.dep.changed();
    }
}

// =============================================================================
// Tests
// =============================================================================
