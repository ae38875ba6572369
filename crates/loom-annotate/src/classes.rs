//! Class-attribute helpers used to recognise and rewrite markers.
//!
//! A class attribute is treated as a whitespace-separated token list. The
//! optional "similar class" pattern is matched against each token, so a
//! family such as `color-red`/`color-blue` can be swapped in one step.

use loom_dom::ElementData;
use regex::Regex;

/// Whether `class_attr` carries `class_name`.
///
/// With a pattern, the *last* matching token decides: an element carrying
/// several classes of the same family counts as the one written last.
pub fn has_class(class_attr: &str, class_name: &str, pattern: Option<&Regex>) -> bool {
    match pattern {
        Some(pattern) => class_attr
            .split_whitespace()
            .flat_map(|token| pattern.find_iter(token))
            .last()
            .is_some_and(|m| m.as_str() == class_name),
        None => class_attr.split_whitespace().any(|token| token == class_name),
    }
}

/// Add `class_name`, first dropping every class of the same family.
pub fn add_class(element: &mut ElementData, class_name: &str, pattern: Option<&Regex>) {
    if element.class_name().is_empty() {
        element.set_class_name(class_name);
        return;
    }
    remove_class(element, class_name, pattern);
    let mut tokens: Vec<&str> = element.class_name().split_whitespace().collect();
    tokens.push(class_name);
    let joined = tokens.join(" ");
    element.set_class_name(&joined);
}

/// Remove `class_name`, or with a pattern every class of its family.
///
/// Tokens left empty by the pattern are dropped and the remainder is
/// re-joined with single spaces. An empty result removes the attribute.
pub fn remove_class(element: &mut ElementData, class_name: &str, pattern: Option<&Regex>) {
    let current = element.class_name();
    if current.is_empty() {
        return;
    }
    let kept: Vec<String> = current
        .split_whitespace()
        .map(|token| match pattern {
            Some(pattern) => pattern.replace_all(token, "").into_owned(),
            None if token == class_name => String::new(),
            None => token.to_string(),
        })
        .filter(|token| !token.is_empty())
        .collect();
    element.set_class_name(&kept.join(" "));
}

/// Same set of class tokens, ignoring order and spacing.
pub fn have_same_classes(a: &ElementData, b: &ElementData) -> bool {
    let mut left: Vec<&str> = a.class_name().split_whitespace().collect();
    let mut right: Vec<&str> = b.class_name().split_whitespace().collect();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}

/// Same attributes, apart from `class`, with the same values.
pub fn have_same_non_class_attributes(a: &ElementData, b: &ElementData) -> bool {
    if a.non_class_attributes().count() != b.non_class_attributes().count() {
        return false;
    }
    a.non_class_attributes()
        .all(|attr| b.attribute(&attr.name) == Some(attr.value.as_str()))
}
