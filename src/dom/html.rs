//! HTML serialization and the pluggable markup parser.
//!
//! Raw-markup content needs a real HTML parser, which is a host capability:
//! install one with [`set_markup_parser`] before materializing any
//! [`crate::content::Content::Raw`]. Materializing raw markup with no parser
//! installed is a fatal precondition error. [`simple_parser`] is a
//! deliberately small well-formed-markup parser for hosts and tests that do
//! not bring their own.

use std::cell::RefCell;
use std::rc::Rc;

use super::{NodeData, NodeId, with_doc};

thread_local! {
    static PARSER: RefCell<Option<Rc<dyn Fn(&str) -> Vec<NodeId>>>> = const { RefCell::new(None) };
}

/// Install the host markup parser: a function from an HTML string to the
/// parsed top-level nodes, created in the document arena.
pub fn set_markup_parser(f: impl Fn(&str) -> Vec<NodeId> + 'static) {
    PARSER.with(|p| *p.borrow_mut() = Some(Rc::new(f)));
}

/// Parse markup through the installed parser.
///
/// # Panics
///
/// If no parser has been installed. This is a missing host capability, fatal
/// by design.
pub fn parse_markup(markup: &str) -> Vec<NodeId> {
    let parser = PARSER.with(|p| p.borrow().clone());
    match parser {
        Some(p) => p(markup),
        None => panic!(
            "no markup parser installed; call dom::html::set_markup_parser \
             (dom::html::simple_parser works for well-formed markup)"
        ),
    }
}

// =============================================================================
// Serialization
// =============================================================================

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serialize a node subtree to markup.
pub fn serialize(node: NodeId) -> String {
    let mut out = String::new();
    serialize_into(node, &mut out);
    out
}

/// Serialize only the children of `node`.
pub fn serialize_children(node: NodeId) -> String {
    let mut out = String::new();
    for child in super::child_nodes(node) {
        serialize_into(child, &mut out);
    }
    out
}

fn serialize_into(node: NodeId, out: &mut String) {
    enum Piece {
        Text(String),
        Comment(String),
        Element {
            tag: String,
            attrs: Vec<(String, String)>,
            children: Vec<NodeId>,
            void: bool,
        },
    }
    let piece = with_doc(|d| match &d.node(node).data {
        NodeData::Text(s) => Piece::Text(s.clone()),
        NodeData::Comment(s) => Piece::Comment(s.clone()),
        NodeData::Element(e) => Piece::Element {
            tag: e.tag.clone(),
            attrs: e
                .attrs
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            children: d.node(node).children.clone(),
            void: e.ns.is_none() && VOID_ELEMENTS.contains(&e.tag.as_str()),
        },
    });
    match piece {
        Piece::Text(s) => out.push_str(&escape_text(&s)),
        Piece::Comment(s) => {
            out.push_str("<!--");
            out.push_str(&s);
            out.push_str("-->");
        }
        Piece::Element {
            tag,
            attrs,
            children,
            void,
        } => {
            out.push('<');
            out.push_str(&tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(&value));
                out.push('"');
            }
            out.push('>');
            if !void {
                for child in children {
                    serialize_into(child, out);
                }
                out.push_str("</");
                out.push_str(&tag);
                out.push('>');
            }
        }
    }
}

// =============================================================================
// Simple Parser
// =============================================================================

/// A minimal parser for well-formed markup: elements with quoted attributes,
/// text, comments, void and self-closing tags, and the four basic character
/// entities. Not a real HTML parser; hosts with messy input should install
/// one.
pub fn simple_parser(input: &str) -> Vec<NodeId> {
    let mut parser = SimpleParser {
        input: input.as_bytes(),
        pos: 0,
    };
    parser.parse_nodes(None)
}

struct SimpleParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl SimpleParser<'_> {
    fn parse_nodes(&mut self, closing_tag: Option<&str>) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.input.len() {
                return nodes;
            }
            if self.starts_with("</") {
                if let Some(tag) = closing_tag {
                    let save = self.pos;
                    self.pos += 2;
                    let name = self.read_name();
                    self.skip_whitespace();
                    self.expect(b'>');
                    if name.eq_ignore_ascii_case(tag) {
                        return nodes;
                    }
                    // Mismatched close tag: treat as closing the current
                    // element anyway.
                    self.pos = save;
                    return nodes;
                }
                // Stray close tag at top level: skip it.
                self.pos += 2;
                while self.pos < self.input.len() && self.input[self.pos] != b'>' {
                    self.pos += 1;
                }
                self.pos += 1;
                continue;
            }
            if self.starts_with("<!--") {
                nodes.push(self.parse_comment());
            } else if self.starts_with("<") {
                nodes.push(self.parse_element());
            } else {
                nodes.push(self.parse_text());
            }
        }
    }

    fn parse_comment(&mut self) -> NodeId {
        self.pos += 4;
        let start = self.pos;
        while self.pos < self.input.len() && !self.starts_with("-->") {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.pos = (self.pos + 3).min(self.input.len());
        super::create_comment(&text)
    }

    fn parse_element(&mut self) -> NodeId {
        self.pos += 1;
        let tag = self.read_name();
        let elem = super::create_element(&tag);

        loop {
            self.skip_whitespace();
            if self.starts_with("/>") {
                self.pos += 2;
                return elem;
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.pos >= self.input.len() {
                return elem;
            }
            let name = self.read_name();
            self.skip_whitespace();
            let value = if self.starts_with("=") {
                self.pos += 1;
                self.skip_whitespace();
                self.read_attr_value()
            } else {
                String::new()
            };
            if !name.is_empty() {
                super::set_attribute(elem, &name, &value);
            } else {
                self.pos += 1;
            }
        }

        if VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
            return elem;
        }
        for child in self.parse_nodes(Some(&tag)) {
            super::insert_before(child, elem, None);
        }
        elem
    }

    fn parse_text(&mut self) -> NodeId {
        let start = self.pos;
        while self.pos < self.input.len() && self.input[self.pos] != b'<' {
            self.pos += 1;
        }
        let raw = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        super::create_text_node(&decode_entities(&raw))
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn read_attr_value(&mut self) -> String {
        if self.starts_with("\"") || self.starts_with("'") {
            let quote = self.input[self.pos];
            self.pos += 1;
            let start = self.pos;
            while self.pos < self.input.len() && self.input[self.pos] != quote {
                self.pos += 1;
            }
            let v = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
            self.pos = (self.pos + 1).min(self.input.len());
            decode_entities(&v)
        } else {
            let start = self.pos;
            while self.pos < self.input.len()
                && !self.input[self.pos].is_ascii_whitespace()
                && self.input[self.pos] != b'>'
            {
                self.pos += 1;
            }
            String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, b: u8) {
        if self.pos < self.input.len() && self.input[self.pos] == b {
            self.pos += 1;
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s.as_bytes())
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
