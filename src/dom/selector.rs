//! Compound-selector matching for event delegation.
//!
//! Supports the subset event maps actually use: a comma-separated list of
//! compound simple selectors, each an optional tag name (or `*`) followed by
//! any number of `#id` and `.class` qualifiers. No combinators.

use super::NodeId;

/// True if `elem` matches any alternative in `selector`.
pub fn matches(elem: NodeId, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .any(|s| matches_compound(elem, s))
}

fn matches_compound(elem: NodeId, selector: &str) -> bool {
    if !super::is_element(elem) {
        return false;
    }
    let (tag, rest) = split_tag(selector);
    if let Some(tag) = tag {
        if tag != "*" {
            let elem_tag = super::tag_name(elem).unwrap_or_default();
            if !tag.eq_ignore_ascii_case(&elem_tag) {
                return false;
            }
        }
    }
    for qualifier in parse_qualifiers(rest) {
        match qualifier {
            Qualifier::Id(id) => {
                if super::get_attribute(elem, "id").as_deref() != Some(id) {
                    return false;
                }
            }
            Qualifier::Class(class) => {
                let classes = super::get_attribute(elem, "class").unwrap_or_default();
                if !classes.split_ascii_whitespace().any(|c| c == class) {
                    return false;
                }
            }
        }
    }
    true
}

enum Qualifier<'a> {
    Id(&'a str),
    Class(&'a str),
}

fn split_tag(selector: &str) -> (Option<&str>, &str) {
    let pos = selector
        .find(['#', '.'])
        .unwrap_or(selector.len());
    if pos == 0 {
        (None, selector)
    } else {
        (Some(&selector[..pos]), &selector[pos..])
    }
}

fn parse_qualifiers(mut rest: &str) -> Vec<Qualifier<'_>> {
    let mut out = Vec::new();
    while !rest.is_empty() {
        let kind = rest.as_bytes()[0];
        rest = &rest[1..];
        let end = rest.find(['#', '.']).unwrap_or(rest.len());
        let name = &rest[..end];
        rest = &rest[end..];
        match kind {
            b'#' => out.push(Qualifier::Id(name)),
            b'.' => out.push(Qualifier::Class(name)),
            _ => {}
        }
    }
    out
}
