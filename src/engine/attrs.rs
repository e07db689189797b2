//! Per-element attribute reconciliation.
//!
//! An [`ElementAttrsUpdater`] is created once per element and fed the full
//! attribute list on every recompute. It applies only what changed, and each
//! attribute name gets a handler suited to its meaning: `class` and `style`
//! merge token diffs into the live attribute value so out-of-band edits
//! survive, `checked`/`selected`/`value` drive DOM properties instead of
//! attributes, `xlink:*` names go into the XLink namespace, and URL-bearing
//! attributes are checked for script schemes before they are written.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dom::{self, NodeId, XLINK_NS};

static ALLOW_JS_URLS: AtomicBool = AtomicBool::new(false);

/// Process-wide opt-in for `javascript:` and `vbscript:` URLs in URL-bearing
/// attributes. Off by default; such values are dropped with a warning.
pub fn allow_javascript_urls() {
    ALLOW_JS_URLS.store(true, Ordering::Relaxed);
}

/// Attributes whose values are URLs the browser will follow.
const URL_ATTRS: &[(&str, &str)] = &[
    ("a", "href"),
    ("area", "href"),
    ("link", "href"),
    ("img", "src"),
    ("source", "src"),
    ("iframe", "src"),
    ("script", "src"),
    ("embed", "src"),
    ("video", "src"),
    ("audio", "src"),
    ("object", "data"),
    ("form", "action"),
    ("input", "formaction"),
    ("button", "formaction"),
];

#[derive(Clone, Copy, PartialEq, Debug)]
enum HandlerKind {
    Plain,
    Class,
    Style,
    Checked,
    Selected,
    Value,
    Xlink,
    Url,
}

fn classify(tag: &str, name: &str) -> HandlerKind {
    if name.starts_with("xlink:") {
        return HandlerKind::Xlink;
    }
    match name {
        "class" => HandlerKind::Class,
        "style" => HandlerKind::Style,
        "checked" if tag == "input" => HandlerKind::Checked,
        "selected" if tag == "option" => HandlerKind::Selected,
        "value" if tag == "input" || tag == "textarea" => HandlerKind::Value,
        _ if URL_ATTRS.contains(&(tag, name)) => HandlerKind::Url,
        _ => HandlerKind::Plain,
    }
}

struct AttributeHandler {
    kind: HandlerKind,
    last: Option<String>,
}

/// Reconciles one element's attributes across recomputes.
pub struct ElementAttrsUpdater {
    elem: NodeId,
    tag: String,
    handlers: HashMap<String, AttributeHandler>,
}

impl ElementAttrsUpdater {
    pub fn new(elem: NodeId, tag: &str) -> Self {
        ElementAttrsUpdater {
            elem,
            tag: tag.to_string(),
            handlers: HashMap::new(),
        }
    }

    /// Apply a freshly computed attribute list, diffing against the previous
    /// one.
    pub fn update(&mut self, attrs: Vec<(String, String)>) {
        let new: HashMap<&str, &str> = attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        // Names that disappeared are torn down through their handler.
        let gone: Vec<String> = self
            .handlers
            .keys()
            .filter(|name| !new.contains_key(name.as_str()))
            .cloned()
            .collect();
        for name in gone {
            let handler = self.handlers.remove(&name).expect("handler just listed");
            apply(
                handler.kind,
                self.elem,
                &name,
                handler.last.as_deref(),
                None,
            );
        }

        for (name, value) in &attrs {
            let handler = self
                .handlers
                .entry(name.clone())
                .or_insert_with(|| AttributeHandler {
                    kind: classify(&self.tag, name),
                    last: None,
                });
            if handler.last.as_deref() == Some(value.as_str()) {
                continue;
            }
            apply(
                handler.kind,
                self.elem,
                name,
                handler.last.as_deref(),
                Some(value),
            );
            handler.last = Some(value.clone());
        }
    }
}

fn apply(kind: HandlerKind, elem: NodeId, name: &str, old: Option<&str>, new: Option<&str>) {
    match kind {
        HandlerKind::Plain => match new {
            Some(v) => dom::set_attribute(elem, name, v),
            None => dom::remove_attribute(elem, name),
        },
        HandlerKind::Class => merge_tokens(elem, name, old, new, ' '),
        HandlerKind::Style => merge_tokens(elem, name, old, new, ';'),
        HandlerKind::Checked => dom::set_checked(elem, truthy(new)),
        HandlerKind::Selected => dom::set_selected(elem, truthy(new)),
        HandlerKind::Value => dom::set_value_property(elem, new),
        HandlerKind::Xlink => match new {
            Some(v) => dom::set_attribute_ns(elem, XLINK_NS, name, v),
            None => dom::remove_attribute_ns(elem, XLINK_NS, name),
        },
        HandlerKind::Url => match new {
            Some(v) if !url_allowed(v) => {
                tracing::warn!(
                    attribute = name,
                    value = v,
                    "script-scheme URL suppressed; call allow_javascript_urls to permit"
                );
                dom::remove_attribute(elem, name);
            }
            Some(v) => dom::set_attribute(elem, name, v),
            None => dom::remove_attribute(elem, name),
        },
    }
}

fn truthy(value: Option<&str>) -> bool {
    value.is_some()
}

fn url_allowed(value: &str) -> bool {
    if ALLOW_JS_URLS.load(Ordering::Relaxed) {
        return true;
    }
    match url::Url::parse(value) {
        Ok(u) => !matches!(u.scheme(), "javascript" | "vbscript"),
        // Relative or otherwise unparseable values carry no scheme to abuse.
        Err(_) => true,
    }
}

/// Merge a token-list attribute: tokens we previously wrote and no longer
/// want are removed, new tokens are appended, and tokens added from outside
/// this updater are left alone. Style declarations are identified by their
/// property name, so `color: blue` replaces any existing `color` declaration
/// rather than coexisting with it.
fn merge_tokens(elem: NodeId, name: &str, old: Option<&str>, new: Option<&str>, sep: char) {
    let tokens = |s: Option<&str>| -> Vec<String> {
        s.unwrap_or_default()
            .split(sep)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };
    let key = |t: &str| -> String {
        if sep == ';' {
            t.split(':').next().unwrap_or(t).trim().to_ascii_lowercase()
        } else {
            t.to_string()
        }
    };
    let old_tokens = tokens(old);
    let new_tokens = tokens(new);
    let old_keys: Vec<String> = old_tokens.iter().map(|t| key(t)).collect();
    let new_keys: Vec<String> = new_tokens.iter().map(|t| key(t)).collect();

    let mut live = tokens(dom::get_attribute(elem, name).as_deref());
    live.retain(|t| {
        let k = key(t);
        !old_keys.contains(&k) && !new_keys.contains(&k)
    });
    for t in &new_tokens {
        if !live.contains(t) {
            live.push(t.clone());
        }
    }

    if live.is_empty() {
        dom::remove_attribute(elem, name);
    } else {
        let joined = if sep == ';' {
            live.join("; ")
        } else {
            live.join(" ")
        };
        dom::set_attribute(elem, name, &joined);
    }
}
