//! Reconciled ranges: contiguous, trackable spans of sibling DOM content.
//!
//! A range owns an ordered list of members, each either a plain DOM node or a
//! nested range. Attached to a parent element, the members' nodes appear as a
//! contiguous run of siblings; an empty attached range holds its position with
//! a placeholder comment node. All structural edits go through the range so
//! sibling content and enclosing ranges are never disturbed.
//!
//! Ranges form a containment tree through nested membership, used by
//! [`contains_element`] and [`contains_range`] to scope event delegation and
//! to find the region owning an arbitrary element.
//!
//! Structural edits consult the parent element's [`crate::dom::UiHooks`]
//! before touching the DOM, so a host can intercept insertions, removals, and
//! moves.

use std::cell::RefCell;
use std::rc::Rc;

use crate::UiError;
use crate::dom::{self, NodeId};
use crate::engine::view::{self, ViewId};

// =============================================================================
// Arena
// =============================================================================

thread_local! {
    static RANGES: RefCell<Vec<RangeState>> = const { RefCell::new(Vec::new()) };
    static NODE_RANGE: RefCell<std::collections::HashMap<NodeId, RangeId>> =
        RefCell::new(std::collections::HashMap::new());
}

/// Handle to a range in the thread-local arena. Slots are not recycled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RangeId(u32);

/// One entry in a range's member list.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Member {
    Node(NodeId),
    Range(RangeId),
}

struct RangeState {
    members: Vec<Member>,
    attached: bool,
    parent_elem: Option<NodeId>,
    placeholder: Option<NodeId>,
    parent_range: Option<RangeId>,
    view: Option<ViewId>,
    attached_cbs: Vec<Rc<dyn Fn(NodeId)>>,
    detached_cbs: Vec<Rc<dyn Fn()>>,
    destroyed: bool,
}

fn with_range<R>(id: RangeId, f: impl FnOnce(&mut RangeState) -> R) -> R {
    RANGES.with(|r| f(&mut r.borrow_mut()[id.0 as usize]))
}

/// Create a range over `members`. Each member is registered as belonging to
/// the new range.
pub fn new_range(members: Vec<Member>) -> RangeId {
    let id = RANGES.with(|r| {
        let mut r = r.borrow_mut();
        let id = RangeId(r.len() as u32);
        r.push(RangeState {
            members: Vec::new(),
            attached: false,
            parent_elem: None,
            placeholder: None,
            parent_range: None,
            view: None,
            attached_cbs: Vec::new(),
            detached_cbs: Vec::new(),
            destroyed: false,
        });
        id
    });
    for &m in &members {
        member_in(m, id);
    }
    with_range(id, |r| r.members = members);
    id
}

// =============================================================================
// Accessors
// =============================================================================

pub fn is_attached(range: RangeId) -> bool {
    with_range(range, |r| r.attached)
}

pub fn parent_element(range: RangeId) -> Option<NodeId> {
    with_range(range, |r| r.parent_elem)
}

pub fn parent_range(range: RangeId) -> Option<RangeId> {
    with_range(range, |r| r.parent_range)
}

pub fn member_count(range: RangeId) -> usize {
    with_range(range, |r| r.members.len())
}

pub fn get_member(range: RangeId, index: usize) -> Result<Member, UiError> {
    with_range(range, |r| {
        r.members
            .get(index)
            .copied()
            .ok_or(UiError::IndexOutOfBounds {
                index,
                len: r.members.len(),
            })
    })
}

/// The dynamic region that owns this range, if any.
pub fn view_of(range: RangeId) -> Option<ViewId> {
    with_range(range, |r| r.view)
}

pub(crate) fn set_view(range: RangeId, view: ViewId) {
    with_range(range, |r| r.view = Some(view));
}

/// The innermost range holding `node` as a direct member.
pub(crate) fn node_range(node: NodeId) -> Option<RangeId> {
    NODE_RANGE.with(|m| m.borrow().get(&node).copied())
}

/// First DOM node of the range, in sibling order. An empty attached range
/// reports its placeholder.
pub fn first_node(range: RangeId) -> Result<NodeId, UiError> {
    let (attached, first, placeholder) = with_range(range, |r| {
        (r.attached, r.members.first().copied(), r.placeholder)
    });
    if !attached {
        return Err(UiError::NotAttached);
    }
    match first {
        None => Ok(placeholder.expect("attached empty range must hold a placeholder")),
        Some(Member::Node(n)) => Ok(n),
        Some(Member::Range(sub)) => first_node(sub),
    }
}

/// Last DOM node of the range, in sibling order.
pub fn last_node(range: RangeId) -> Result<NodeId, UiError> {
    let (attached, last, placeholder) = with_range(range, |r| {
        (r.attached, r.members.last().copied(), r.placeholder)
    });
    if !attached {
        return Err(UiError::NotAttached);
    }
    match last {
        None => Ok(placeholder.expect("attached empty range must hold a placeholder")),
        Some(Member::Node(n)) => Ok(n),
        Some(Member::Range(sub)) => last_node(sub),
    }
}

// =============================================================================
// Attach / Detach
// =============================================================================

/// Insert the range's content under `parent`, before `next` (append when
/// `None`), and fire attachment callbacks.
pub fn attach(range: RangeId, parent: NodeId, next: Option<NodeId>) -> Result<(), UiError> {
    attach_inner(range, parent, next, false, false)
}

fn attach_inner(
    range: RangeId,
    parent: NodeId,
    next: Option<NodeId>,
    is_move: bool,
    is_replace: bool,
) -> Result<(), UiError> {
    let (attached, members) = with_range(range, |r| (r.attached, r.members.clone()));
    if attached {
        return Err(UiError::AlreadyAttached);
    }

    if members.is_empty() {
        let ph = dom::create_comment("");
        dom::insert_before(ph, parent, next);
        with_range(range, |r| r.placeholder = Some(ph));
    } else {
        for m in members {
            insert_member_nodes(m, parent, next, is_move)?;
        }
    }

    let cbs = with_range(range, |r| {
        r.attached = true;
        r.parent_elem = Some(parent);
        if is_move || is_replace {
            Vec::new()
        } else {
            r.attached_cbs.clone()
        }
    });
    for cb in cbs {
        cb(parent);
    }
    Ok(())
}

/// Remove the range's content from the DOM without destroying it, and fire
/// detachment callbacks. The range can be attached again later.
pub fn detach(range: RangeId) -> Result<(), UiError> {
    detach_inner(range, false, false)
}

fn detach_inner(range: RangeId, is_move: bool, is_replace: bool) -> Result<(), UiError> {
    let (attached, members, placeholder) = with_range(range, |r| {
        (r.attached, r.members.clone(), r.placeholder.take())
    });
    if !attached {
        return Err(UiError::NotAttached);
    }
    match placeholder {
        Some(ph) => dom::remove_node(ph),
        None => {
            for m in members {
                detach_member_nodes(m, is_move)?;
            }
        }
    }
    let cbs = with_range(range, |r| {
        r.attached = false;
        if is_move || is_replace {
            Vec::new()
        } else {
            r.detached_cbs.clone()
        }
    });
    for cb in cbs {
        cb();
    }
    Ok(())
}

/// Register a callback for when the range is attached to a parent element.
/// Fires immediately if the range is already attached. Moves and in-place
/// member replacement do not re-fire it.
pub fn on_attached(range: RangeId, cb: impl Fn(NodeId) + 'static) {
    let cb = Rc::new(cb);
    let fire_now = with_range(range, |r| {
        if r.attached {
            r.parent_elem
        } else {
            r.attached_cbs.push(cb.clone());
            None
        }
    });
    if let Some(parent) = fire_now {
        cb(parent);
    }
}

/// Register a callback for when the range's content leaves the DOM through
/// [`detach`]. Moves and in-place member replacement do not fire it.
pub fn on_detached(range: RangeId, cb: impl Fn() + 'static) {
    with_range(range, |r| r.detached_cbs.push(Rc::new(cb)));
}

/// Register a paired attach/detach hook in one call.
pub fn on_attached_detached(
    range: RangeId,
    attached_cb: impl Fn(NodeId) + 'static,
    detached_cb: impl Fn() + 'static,
) {
    on_attached(range, attached_cb);
    on_detached(range, detached_cb);
}

// =============================================================================
// Member Edits
// =============================================================================

/// Replace the entire member list in place, preserving the range's position
/// among its siblings. Old members are not destroyed; ownership of their
/// teardown stays with the caller.
pub fn set_members(range: RangeId, new_members: Vec<Member>) -> Result<(), UiError> {
    let (attached, old_empty) = with_range(range, |r| (r.attached, r.members.is_empty()));

    if !attached {
        for &m in &new_members {
            member_in(m, range);
        }
        with_range(range, |r| r.members = new_members);
        return Ok(());
    }

    // Both empty: the placeholder already marks the position.
    if old_empty && new_members.is_empty() {
        return Ok(());
    }

    let next = dom::next_sibling(last_node(range)?);
    let parent = with_range(range, |r| r.parent_elem)
        .expect("attached range must have a parent element");

    detach_inner(range, false, true)?;
    for &m in &new_members {
        member_in(m, range);
    }
    with_range(range, |r| r.members = new_members);
    attach_inner(range, parent, next, false, true)
}

/// Insert a member at `index`, shifting later members right.
pub fn add_member(range: RangeId, member: Member, index: usize) -> Result<(), UiError> {
    add_member_inner(range, member, index, false)
}

fn add_member_inner(
    range: RangeId,
    member: Member,
    index: usize,
    is_move: bool,
) -> Result<(), UiError> {
    let (attached, len) = with_range(range, |r| (r.attached, r.members.len()));
    if index > len {
        return Err(UiError::IndexOutOfBounds { index, len });
    }
    if !is_move {
        member_in(member, range);
    }

    if attached {
        if len == 0 {
            // The new member takes over the placeholder's position.
            let ph = with_range(range, |r| r.placeholder.take())
                .expect("attached empty range must hold a placeholder");
            let next = dom::next_sibling(ph);
            dom::remove_node(ph);
            let parent = with_range(range, |r| r.parent_elem).expect("attached range has parent");
            insert_member_nodes(member, parent, next, is_move)?;
        } else {
            let before = if index == len {
                dom::next_sibling(last_node(range)?)
            } else {
                Some(member_first_node(get_member(range, index)?)?)
            };
            let parent = with_range(range, |r| r.parent_elem).expect("attached range has parent");
            insert_member_nodes(member, parent, before, is_move)?;
        }
    }
    with_range(range, |r| r.members.insert(index, member));
    Ok(())
}

/// Remove and destroy the member at `index`, shifting later members left. An
/// attached range left empty regains a placeholder.
pub fn remove_member(range: RangeId, index: usize) -> Result<(), UiError> {
    remove_member_inner(range, index, false).map(|_| ())
}

fn remove_member_inner(
    range: RangeId,
    index: usize,
    is_move: bool,
) -> Result<Member, UiError> {
    let (attached, len) = with_range(range, |r| (r.attached, r.members.len()));
    if index >= len {
        return Err(UiError::IndexOutOfBounds { index, len });
    }
    let member = with_range(range, |r| r.members[index]);

    if attached {
        let last_removed = len == 1;
        let next_after = if last_removed {
            dom::next_sibling(last_node(range)?)
        } else {
            None
        };
        detach_member_nodes(member, is_move)?;
        with_range(range, |r| {
            r.members.remove(index);
        });
        if last_removed {
            let parent = with_range(range, |r| r.parent_elem).expect("attached range has parent");
            let ph = dom::create_comment("");
            dom::insert_before(ph, parent, next_after);
            with_range(range, |r| r.placeholder = Some(ph));
        }
    } else {
        with_range(range, |r| {
            r.members.remove(index);
        });
    }

    if !is_move {
        member_out(member, false);
    }
    Ok(member)
}

/// Move the member at `old_index` so it ends up at `new_index` (interpreted
/// after the removal). No teardown or attachment callbacks fire.
pub fn move_member(range: RangeId, old_index: usize, new_index: usize) -> Result<(), UiError> {
    let member = remove_member_inner(range, old_index, true)?;
    add_member_inner(range, member, new_index, true)
}

// =============================================================================
// Containment
// =============================================================================

/// True if `elem` sits inside this range: it descends from the range's parent
/// element and its top-level ancestor at that level belongs to this range or
/// a range nested within it.
pub fn contains_element(range: RangeId, elem: NodeId) -> bool {
    let (attached, parent) = with_range(range, |r| (r.attached, r.parent_elem));
    let Some(parent) = parent else { return false };
    if !attached || elem == parent || !dom::contains(parent, elem) {
        return false;
    }

    // Climb to the direct child of the parent element.
    let mut top = elem;
    while dom::parent_node(top) != Some(parent) {
        match dom::parent_node(top) {
            Some(p) => top = p,
            None => return false,
        }
    }

    // Walk the range chain that owns that child.
    let mut cur = node_range(top);
    while let Some(r) = cur {
        if r == range {
            return true;
        }
        cur = parent_range(r);
    }
    false
}

/// True if `other` is this range or nested anywhere within it.
pub fn contains_range(range: RangeId, other: RangeId) -> bool {
    let mut cur = Some(other);
    while let Some(r) = cur {
        if r == range {
            return true;
        }
        cur = parent_range(r);
    }
    false
}

// =============================================================================
// Destruction
// =============================================================================

/// Destroy the range and everything it owns: nested ranges recursively, and
/// teardown for member elements (skipped when `skip_nodes` is set because an
/// ancestor subtree teardown already covers them). Idempotent.
pub fn destroy_range(range: RangeId, skip_nodes: bool) {
    let (already, view) = with_range(range, |r| {
        let already = r.destroyed;
        r.destroyed = true;
        (already, r.view)
    });
    if already {
        return;
    }
    tracing::trace!(range = range.0, "destroying range");
    match view {
        Some(v) => view::destroy_view(v, skip_nodes),
        None => destroy_members(range, skip_nodes),
    }
}

/// Destroy every member without detaching the range itself.
pub fn destroy_members(range: RangeId, skip_nodes: bool) {
    let members = with_range(range, |r| r.members.clone());
    for m in members {
        member_out(m, skip_nodes);
    }
}

// =============================================================================
// Member Plumbing
// =============================================================================

fn member_in(member: Member, range: RangeId) {
    match member {
        Member::Node(n) => {
            NODE_RANGE.with(|m| m.borrow_mut().insert(n, range));
        }
        Member::Range(sub) => {
            with_range(sub, |r| r.parent_range = Some(range));
        }
    }
}

fn member_out(member: Member, skip_nodes: bool) {
    match member {
        Member::Node(n) => {
            NODE_RANGE.with(|m| m.borrow_mut().remove(&n));
            if !skip_nodes {
                dom::tear_down(n);
            }
        }
        Member::Range(sub) => destroy_range(sub, skip_nodes),
    }
}

fn member_first_node(member: Member) -> Result<NodeId, UiError> {
    match member {
        Member::Node(n) => Ok(n),
        Member::Range(sub) => first_node(sub),
    }
}

fn insert_member_nodes(
    member: Member,
    parent: NodeId,
    before: Option<NodeId>,
    is_move: bool,
) -> Result<(), UiError> {
    match member {
        Member::Node(n) => {
            insert_node(n, parent, before, is_move);
            Ok(())
        }
        Member::Range(sub) => attach_inner(sub, parent, before, is_move, false),
    }
}

fn detach_member_nodes(member: Member, is_move: bool) -> Result<(), UiError> {
    match member {
        Member::Node(n) => {
            remove_node(n, is_move);
            Ok(())
        }
        Member::Range(sub) => detach_inner(sub, is_move, false),
    }
}

fn insert_node(node: NodeId, parent: NodeId, before: Option<NodeId>, is_move: bool) {
    if dom::is_element(node) {
        if let Some(hooks) = dom::ui_hooks(parent) {
            let hook = if is_move {
                hooks.move_element.as_ref()
            } else {
                hooks.insert_element.as_ref()
            };
            if let Some(f) = hook {
                f(node, parent, before);
                return;
            }
        }
    }
    dom::insert_before(node, parent, before);
}

fn remove_node(node: NodeId, is_move: bool) {
    if !is_move && dom::is_element(node) {
        if let Some(parent) = dom::parent_node(node) {
            if let Some(hooks) = dom::ui_hooks(parent) {
                if let Some(f) = hooks.remove_element.as_ref() {
                    f(node, parent);
                    return;
                }
            }
        }
    }
    dom::remove_node(node);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{
        child_nodes, create_element, create_text_node, node_text, on_teardown, tag_name,
    };
    use std::cell::Cell;

    fn text_member(s: &str) -> Member {
        Member::Node(create_text_node(s))
    }

    fn sibling_texts(parent: NodeId) -> Vec<String> {
        child_nodes(parent)
            .into_iter()
            .map(|n| node_text(n).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_empty_range_holds_placeholder() {
        let parent = create_element("div");
        let range = new_range(Vec::new());
        attach(range, parent, None).unwrap();

        let kids = child_nodes(parent);
        assert_eq!(kids.len(), 1, "empty attached range inserts a placeholder");
        assert_eq!(first_node(range).unwrap(), kids[0]);
        assert_eq!(last_node(range).unwrap(), kids[0]);

        add_member(range, text_member("a"), 0).unwrap();
        assert_eq!(sibling_texts(parent), vec!["a"], "placeholder is replaced");

        remove_member(range, 0).unwrap();
        assert_eq!(
            child_nodes(parent).len(),
            1,
            "removing the last member restores a placeholder"
        );
        assert!(node_text(child_nodes(parent)[0]).is_some());
    }

    #[test]
    fn test_member_order_matches_sibling_order() {
        let parent = create_element("div");
        let range = new_range(vec![text_member("a"), text_member("c")]);
        attach(range, parent, None).unwrap();
        add_member(range, text_member("b"), 1).unwrap();
        assert_eq!(sibling_texts(parent), vec!["a", "b", "c"]);

        move_member(range, 0, 2).unwrap();
        assert_eq!(sibling_texts(parent), vec!["b", "c", "a"]);

        remove_member(range, 1).unwrap();
        assert_eq!(sibling_texts(parent), vec!["b", "a"]);
    }

    #[test]
    fn test_edits_do_not_disturb_siblings() {
        let parent = create_element("div");
        let before = create_text_node("<");
        let after = create_text_node(">");
        crate::dom::insert_before(before, parent, None);
        crate::dom::insert_before(after, parent, None);

        let range = new_range(vec![text_member("x")]);
        attach(range, parent, Some(after)).unwrap();
        assert_eq!(sibling_texts(parent), vec!["<", "x", ">"]);

        set_members(range, vec![text_member("y"), text_member("z")]).unwrap();
        assert_eq!(sibling_texts(parent), vec!["<", "y", "z", ">"]);

        set_members(range, Vec::new()).unwrap();
        assert_eq!(sibling_texts(parent)[0], "<");
        assert_eq!(sibling_texts(parent)[2], ">");
        assert_eq!(child_nodes(parent).len(), 3, "placeholder keeps the position");

        set_members(range, vec![text_member("w")]).unwrap();
        assert_eq!(sibling_texts(parent), vec!["<", "w", ">"]);
    }

    #[test]
    fn test_detach_and_reattach() {
        let p1 = create_element("div");
        let p2 = create_element("div");
        let range = new_range(vec![text_member("a"), text_member("b")]);
        attach(range, p1, None).unwrap();
        detach(range).unwrap();
        assert!(child_nodes(p1).is_empty());
        assert!(!is_attached(range));

        attach(range, p2, None).unwrap();
        assert_eq!(sibling_texts(p2), vec!["a", "b"]);
    }

    #[test]
    fn test_attach_twice_errors() {
        let parent = create_element("div");
        let range = new_range(Vec::new());
        attach(range, parent, None).unwrap();
        assert_eq!(attach(range, parent, None), Err(UiError::AlreadyAttached));
        detach(range).unwrap();
        assert_eq!(detach(range), Err(UiError::NotAttached));
    }

    #[test]
    fn test_index_bounds() {
        let range = new_range(vec![text_member("a")]);
        assert_eq!(
            add_member(range, text_member("b"), 5),
            Err(UiError::IndexOutOfBounds { index: 5, len: 1 })
        );
        assert_eq!(
            remove_member(range, 1),
            Err(UiError::IndexOutOfBounds { index: 1, len: 1 })
        );
        assert_eq!(
            get_member(range, 3),
            Err(UiError::IndexOutOfBounds { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_nested_range_spans() {
        let parent = create_element("div");
        let inner = new_range(vec![text_member("b"), text_member("c")]);
        let outer = new_range(vec![text_member("a"), Member::Range(inner), text_member("d")]);
        attach(outer, parent, None).unwrap();
        assert_eq!(sibling_texts(parent), vec!["a", "b", "c", "d"]);
        assert_eq!(node_text(first_node(inner).unwrap()).unwrap(), "b");
        assert_eq!(node_text(last_node(outer).unwrap()).unwrap(), "d");
        assert!(contains_range(outer, inner));
        assert!(!contains_range(inner, outer));
    }

    #[test]
    fn test_contains_element() {
        let parent = create_element("div");
        let member_elem = create_element("span");
        let deep = create_element("b");
        crate::dom::insert_before(deep, member_elem, None);

        let inner = new_range(vec![Member::Node(member_elem)]);
        let outer = new_range(vec![Member::Range(inner)]);
        attach(outer, parent, None).unwrap();

        assert!(contains_element(inner, member_elem));
        assert!(contains_element(inner, deep));
        assert!(contains_element(outer, deep));
        assert!(!contains_element(inner, parent));

        let stranger = create_element("i");
        crate::dom::insert_before(stranger, parent, None);
        assert!(
            !contains_element(inner, stranger),
            "sibling content outside the range is not contained"
        );
    }

    #[test]
    fn test_paired_attach_detach_hooks() {
        let parent = create_element("div");
        let range = new_range(vec![text_member("a")]);

        let log = Rc::new(RefCell::new(Vec::new()));
        let log_attach = log.clone();
        let log_detach = log.clone();
        on_attached_detached(
            range,
            move |_| log_attach.borrow_mut().push("attached"),
            move || log_detach.borrow_mut().push("detached"),
        );

        attach(range, parent, None).unwrap();
        set_members(range, vec![text_member("b"), text_member("c")]).unwrap();
        move_member(range, 0, 1).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["attached"],
            "replacement and moves fire neither hook"
        );

        detach(range).unwrap();
        assert_eq!(*log.borrow(), vec!["attached", "detached"]);

        attach(range, parent, None).unwrap();
        assert_eq!(*log.borrow(), vec!["attached", "detached", "attached"]);
    }

    #[test]
    fn test_on_attached_fires_immediately_when_attached() {
        let parent = create_element("div");
        let range = new_range(vec![text_member("a")]);
        attach(range, parent, None).unwrap();

        let seen = Rc::new(Cell::new(None));
        let seen_cb = seen.clone();
        on_attached(range, move |p| seen_cb.set(Some(p)));
        assert_eq!(seen.get(), Some(parent), "already-attached range fires at once");
    }

    #[test]
    fn test_move_fires_no_teardown() {
        let parent = create_element("div");
        let elem = create_element("span");
        let torn = std::rc::Rc::new(Cell::new(false));
        let torn_clone = torn.clone();
        on_teardown(elem, move || torn_clone.set(true));

        let range = new_range(vec![Member::Node(elem), text_member("x")]);
        attach(range, parent, None).unwrap();
        move_member(range, 0, 1).unwrap();
        assert!(!torn.get(), "moving a member must not tear it down");
        assert_eq!(tag_name(child_nodes(parent)[1]).as_deref(), Some("span"));

        remove_member(range, 1).unwrap();
        assert!(torn.get(), "removal destroys the member");
    }

    #[test]
    fn test_destroy_is_idempotent_and_recursive() {
        let parent = create_element("div");
        let elem = create_element("span");
        let count = std::rc::Rc::new(Cell::new(0));
        let count_clone = count.clone();
        on_teardown(elem, move || count_clone.set(count_clone.get() + 1));

        let inner = new_range(vec![Member::Node(elem)]);
        let outer = new_range(vec![Member::Range(inner)]);
        attach(outer, parent, None).unwrap();

        destroy_range(outer, false);
        assert_eq!(count.get(), 1, "nested member element torn down");
        destroy_range(outer, false);
        destroy_range(inner, false);
        assert_eq!(count.get(), 1, "destruction is idempotent");
    }

    #[test]
    fn test_ui_hooks_intercept_element_edits() {
        let parent = create_element("div");
        let inserts = std::rc::Rc::new(Cell::new(0));
        let inserts_clone = inserts.clone();
        crate::dom::set_ui_hooks(
            parent,
            crate::dom::UiHooks {
                insert_element: Some(Box::new(move |node, parent, before| {
                    inserts_clone.set(inserts_clone.get() + 1);
                    crate::dom::insert_before(node, parent, before);
                })),
                ..Default::default()
            },
        );

        let range = new_range(vec![Member::Node(create_element("span")), text_member("t")]);
        attach(range, parent, None).unwrap();
        assert_eq!(inserts.get(), 1, "hook sees elements but not text nodes");
        assert_eq!(child_nodes(parent).len(), 2);
    }
}
