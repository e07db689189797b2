//! In-memory DOM backend.
//!
//! The engine talks to the DOM through this module only: an arena document
//! keyed by copyable [`NodeId`] handles, with free functions over a
//! thread-local registry. It covers the backend contract the reconciliation
//! engine needs:
//!
//! - element / text / comment creation, plain and namespaced
//! - attribute get/set/remove, plain and namespaced
//! - boolean DOM properties (`checked`, `selected`) and the live `value`
//!   property, kept separate from string attributes
//! - child insertion and removal
//! - per-parent override hooks ([`UiHooks`]) consulted by structural range
//!   edits, for external virtualization backends
//! - element-teardown notification, firing once per element no matter how it
//!   leaves the tree
//! - capture/bubble event listeners with a synthetic dispatcher ([`events`])
//! - a compound-selector matcher ([`selector`]) and an HTML serializer plus
//!   pluggable markup parser ([`html`])

pub mod events;
pub mod html;
pub mod selector;

use std::cell::RefCell;
use std::rc::Rc;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

// =============================================================================
// Arena
// =============================================================================

thread_local! {
    static DOC: RefCell<Document> = RefCell::new(Document { nodes: Vec::new() });
}

/// Handle to a node in the thread-local document arena.
///
/// Slots are never recycled within a session, so a stale handle refers to a
/// torn-down node rather than an unrelated live one.
// TODO: generational handles so long-lived sessions can reclaim slots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

pub(crate) struct Document {
    nodes: Vec<Node>,
}

pub(crate) struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

pub(crate) enum NodeData {
    Element(ElementData),
    Text(String),
    Comment(String),
}

pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) ns: Option<String>,
    pub(crate) attrs: Vec<Attr>,
    pub(crate) checked: bool,
    pub(crate) selected: bool,
    pub(crate) value: Option<String>,
    hooks: Option<Rc<UiHooks>>,
    pub(crate) listeners: Vec<events::Listener>,
    pub(crate) next_listener_id: u32,
    teardown: Vec<Box<dyn FnOnce()>>,
}

/// A single attribute, optionally namespaced. `name` is the qualified name
/// (`xlink:href`), `ns` the namespace URI if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
    pub name: String,
    pub ns: Option<String>,
    pub value: String,
}

/// Per-parent overrides for structural edits made by the range layer. When a
/// hook is present it is responsible for performing (or suppressing) the DOM
/// mutation itself.
#[derive(Default)]
pub struct UiHooks {
    /// `(node, parent, before)`
    pub insert_element: Option<Box<dyn Fn(NodeId, NodeId, Option<NodeId>)>>,
    /// `(node, parent)`
    pub remove_element: Option<Box<dyn Fn(NodeId, NodeId)>>,
    /// `(node, parent, before)`
    pub move_element: Option<Box<dyn Fn(NodeId, NodeId, Option<NodeId>)>>,
}

pub(crate) fn with_doc<R>(f: impl FnOnce(&mut Document) -> R) -> R {
    DOC.with(|d| f(&mut d.borrow_mut()))
}

impl Document {
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }
}

fn element_data(tag: &str, ns: Option<String>) -> NodeData {
    NodeData::Element(ElementData {
        tag: tag.to_string(),
        ns,
        attrs: Vec::new(),
        checked: false,
        selected: false,
        value: None,
        hooks: None,
        listeners: Vec::new(),
        next_listener_id: 0,
        teardown: Vec::new(),
    })
}

// =============================================================================
// Node Creation
// =============================================================================

pub fn create_element(tag: &str) -> NodeId {
    with_doc(|d| d.push(element_data(tag, None)))
}

pub fn create_element_ns(tag: &str, ns: &str) -> NodeId {
    with_doc(|d| d.push(element_data(tag, Some(ns.to_string()))))
}

pub fn create_text_node(text: &str) -> NodeId {
    with_doc(|d| d.push(NodeData::Text(text.to_string())))
}

pub fn create_comment(text: &str) -> NodeId {
    with_doc(|d| d.push(NodeData::Comment(text.to_string())))
}

// =============================================================================
// Tree Structure
// =============================================================================

pub fn parent_node(node: NodeId) -> Option<NodeId> {
    with_doc(|d| d.node(node).parent)
}

pub fn child_nodes(node: NodeId) -> Vec<NodeId> {
    with_doc(|d| d.node(node).children.clone())
}

pub fn next_sibling(node: NodeId) -> Option<NodeId> {
    with_doc(|d| {
        let parent = d.node(node).parent?;
        let siblings = &d.node(parent).children;
        let pos = siblings.iter().position(|&c| c == node)?;
        siblings.get(pos + 1).copied()
    })
}

/// Insert `node` under `parent`, immediately before `before` (append when
/// `before` is `None`). Reparents the node if it is already in a tree.
///
/// # Panics
///
/// If `parent` is not an element or `before` is not a child of `parent`.
pub fn insert_before(node: NodeId, parent: NodeId, before: Option<NodeId>) {
    with_doc(|d| {
        assert!(
            matches!(d.node(parent).data, NodeData::Element(_)),
            "insert_before: parent must be an element"
        );
        if let Some(old_parent) = d.node(node).parent {
            let children = &mut d.node_mut(old_parent).children;
            children.retain(|&c| c != node);
        }
        let pos = match before {
            Some(b) => d
                .node(parent)
                .children
                .iter()
                .position(|&c| c == b)
                .expect("insert_before: reference node is not a child of parent"),
            None => d.node(parent).children.len(),
        };
        d.node_mut(parent).children.insert(pos, node);
        d.node_mut(node).parent = Some(parent);
    });
}

/// Detach `node` from its parent, if any. No teardown is performed.
pub fn remove_node(node: NodeId) {
    with_doc(|d| {
        if let Some(parent) = d.node(node).parent {
            d.node_mut(parent).children.retain(|&c| c != node);
        }
        d.node_mut(node).parent = None;
    });
}

/// True if `node` is `ancestor` or a descendant of it.
pub fn contains(ancestor: NodeId, node: NodeId) -> bool {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if n == ancestor {
            return true;
        }
        cur = parent_node(n);
    }
    false
}

// =============================================================================
// Node Inspection
// =============================================================================

pub fn is_element(node: NodeId) -> bool {
    with_doc(|d| matches!(d.node(node).data, NodeData::Element(_)))
}

pub fn tag_name(node: NodeId) -> Option<String> {
    with_doc(|d| d.element(node).map(|e| e.tag.clone()))
}

pub fn namespace(node: NodeId) -> Option<String> {
    with_doc(|d| d.element(node).and_then(|e| e.ns.clone()))
}

/// The character data of a text or comment node.
pub fn node_text(node: NodeId) -> Option<String> {
    with_doc(|d| match &d.node(node).data {
        NodeData::Text(s) | NodeData::Comment(s) => Some(s.clone()),
        NodeData::Element(_) => None,
    })
}

/// Concatenated text of the node and its descendants.
pub fn text_content(node: NodeId) -> String {
    fn walk(d: &Document, node: NodeId, out: &mut String) {
        match &d.node(node).data {
            NodeData::Text(s) => out.push_str(s),
            NodeData::Comment(_) => {}
            NodeData::Element(_) => {
                for &c in &d.node(node).children {
                    walk(d, c, out);
                }
            }
        }
    }
    with_doc(|d| {
        let mut out = String::new();
        walk(d, node, &mut out);
        out
    })
}

// =============================================================================
// Attributes
// =============================================================================

pub fn get_attribute(elem: NodeId, name: &str) -> Option<String> {
    with_doc(|d| {
        d.element(elem).and_then(|e| {
            e.attrs
                .iter()
                .find(|a| a.name == name && a.ns.is_none())
                .map(|a| a.value.clone())
        })
    })
}

pub fn set_attribute(elem: NodeId, name: &str, value: &str) {
    set_attr_inner(elem, name, None, value);
}

pub fn remove_attribute(elem: NodeId, name: &str) {
    remove_attr_inner(elem, name, None);
}

pub fn get_attribute_ns(elem: NodeId, ns: &str, name: &str) -> Option<String> {
    with_doc(|d| {
        d.element(elem).and_then(|e| {
            e.attrs
                .iter()
                .find(|a| a.name == name && a.ns.as_deref() == Some(ns))
                .map(|a| a.value.clone())
        })
    })
}

pub fn set_attribute_ns(elem: NodeId, ns: &str, name: &str, value: &str) {
    set_attr_inner(elem, name, Some(ns), value);
}

pub fn remove_attribute_ns(elem: NodeId, ns: &str, name: &str) {
    remove_attr_inner(elem, name, Some(ns));
}

fn set_attr_inner(elem: NodeId, name: &str, ns: Option<&str>, value: &str) {
    with_doc(|d| {
        let e = d
            .element_mut(elem)
            .expect("set_attribute: node is not an element");
        match e
            .attrs
            .iter_mut()
            .find(|a| a.name == name && a.ns.as_deref() == ns)
        {
            Some(a) => a.value = value.to_string(),
            None => e.attrs.push(Attr {
                name: name.to_string(),
                ns: ns.map(str::to_string),
                value: value.to_string(),
            }),
        }
    });
}

fn remove_attr_inner(elem: NodeId, name: &str, ns: Option<&str>) {
    with_doc(|d| {
        if let Some(e) = d.element_mut(elem) {
            e.attrs
                .retain(|a| !(a.name == name && a.ns.as_deref() == ns));
        }
    });
}

/// Snapshot of the element's attributes in insertion order.
pub fn attributes(elem: NodeId) -> Vec<Attr> {
    with_doc(|d| d.element(elem).map(|e| e.attrs.clone()).unwrap_or_default())
}

// =============================================================================
// DOM Properties
// =============================================================================

pub fn set_checked(elem: NodeId, on: bool) {
    with_doc(|d| {
        if let Some(e) = d.element_mut(elem) {
            e.checked = on;
        }
    });
}

pub fn checked(elem: NodeId) -> bool {
    with_doc(|d| d.element(elem).map(|e| e.checked).unwrap_or(false))
}

pub fn set_selected(elem: NodeId, on: bool) {
    with_doc(|d| {
        if let Some(e) = d.element_mut(elem) {
            e.selected = on;
        }
    });
}

pub fn selected(elem: NodeId) -> bool {
    with_doc(|d| d.element(elem).map(|e| e.selected).unwrap_or(false))
}

/// Set the live `value` property (not the attribute).
pub fn set_value_property(elem: NodeId, value: Option<&str>) {
    with_doc(|d| {
        if let Some(e) = d.element_mut(elem) {
            e.value = value.map(str::to_string);
        }
    });
}

pub fn value_property(elem: NodeId) -> Option<String> {
    with_doc(|d| d.element(elem).and_then(|e| e.value.clone()))
}

// =============================================================================
// UI Hooks
// =============================================================================

pub fn set_ui_hooks(elem: NodeId, hooks: UiHooks) {
    with_doc(|d| {
        if let Some(e) = d.element_mut(elem) {
            e.hooks = Some(Rc::new(hooks));
        }
    });
}

pub fn ui_hooks(elem: NodeId) -> Option<Rc<UiHooks>> {
    with_doc(|d| d.element(elem).and_then(|e| e.hooks.clone()))
}

// =============================================================================
// Teardown
// =============================================================================

/// Register a callback to fire once when the element is torn down, however
/// that happens (explicit [`tear_down`], range destruction, or subtree
/// teardown of an ancestor).
pub fn on_teardown(elem: NodeId, cb: impl FnOnce() + 'static) {
    with_doc(|d| {
        let e = d
            .element_mut(elem)
            .expect("on_teardown: node is not an element");
        e.teardown.push(Box::new(cb));
    });
}

/// Tear down an element subtree: fires teardown callbacks depth-first and
/// drops all listeners. Does not remove nodes from the tree; detachment is a
/// separate concern. Idempotent.
pub fn tear_down(node: NodeId) {
    let mut callbacks = Vec::new();
    let mut stack = vec![node];
    with_doc(|d| {
        while let Some(n) = stack.pop() {
            stack.extend(d.node(n).children.iter().copied());
            if let Some(e) = d.element_mut(n) {
                e.listeners.clear();
                callbacks.append(&mut e.teardown);
            }
        }
    });
    for cb in callbacks {
        cb();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_insert_and_sibling_order() {
        let parent = create_element("div");
        let a = create_text_node("a");
        let b = create_text_node("b");
        let c = create_text_node("c");
        insert_before(a, parent, None);
        insert_before(c, parent, None);
        insert_before(b, parent, Some(c));
        assert_eq!(child_nodes(parent), vec![a, b, c]);
        assert_eq!(next_sibling(a), Some(b));
        assert_eq!(next_sibling(c), None);
    }

    #[test]
    fn test_reparenting_moves_node() {
        let p1 = create_element("div");
        let p2 = create_element("div");
        let n = create_text_node("x");
        insert_before(n, p1, None);
        insert_before(n, p2, None);
        assert!(child_nodes(p1).is_empty());
        assert_eq!(child_nodes(p2), vec![n]);
        assert_eq!(parent_node(n), Some(p2));
    }

    #[test]
    fn test_attributes_roundtrip() {
        let e = create_element("img");
        set_attribute(e, "src", "x.png");
        assert_eq!(get_attribute(e, "src").as_deref(), Some("x.png"));
        set_attribute(e, "src", "y.png");
        assert_eq!(get_attribute(e, "src").as_deref(), Some("y.png"));
        remove_attribute(e, "src");
        assert_eq!(get_attribute(e, "src"), None);
    }

    #[test]
    fn test_namespaced_attributes_are_distinct() {
        let e = create_element_ns("a", SVG_NS);
        set_attribute_ns(e, XLINK_NS, "xlink:href", "#target");
        assert_eq!(get_attribute(e, "xlink:href"), None);
        assert_eq!(
            get_attribute_ns(e, XLINK_NS, "xlink:href").as_deref(),
            Some("#target")
        );
    }

    #[test]
    fn test_properties_are_not_attributes() {
        let e = create_element("input");
        set_checked(e, true);
        set_value_property(e, Some("hello"));
        assert!(checked(e));
        assert_eq!(value_property(e).as_deref(), Some("hello"));
        assert_eq!(get_attribute(e, "checked"), None);
        assert_eq!(get_attribute(e, "value"), None);
    }

    #[test]
    fn test_teardown_fires_once_depth_first_registration() {
        let outer = create_element("div");
        let inner = create_element("span");
        insert_before(inner, outer, None);

        let count = std::rc::Rc::new(Cell::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        on_teardown(outer, move || c1.set(c1.get() + 1));
        on_teardown(inner, move || c2.set(c2.get() + 10));

        tear_down(outer);
        assert_eq!(count.get(), 11, "both elements torn down");
        tear_down(outer);
        assert_eq!(count.get(), 11, "teardown is idempotent");
    }

    #[test]
    fn test_text_content() {
        let div = create_element("div");
        let span = create_element("span");
        insert_before(create_text_node("a"), div, None);
        insert_before(span, div, None);
        insert_before(create_text_node("b"), span, None);
        assert_eq!(text_content(div), "ab");
    }
}
