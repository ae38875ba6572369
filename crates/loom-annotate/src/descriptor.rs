//! What counts as a marker for one annotation command.

use loom_dom::{Document, ElementData, NodeId};
use regex::Regex;
use smol_str::SmolStr;

use crate::classes::{have_same_classes, have_same_non_class_attributes, has_class};

/// Tag used for new markers when a descriptor is given no tag names.
pub const DEFAULT_TAG_NAME: &str = "span";

/// Recognises markers by tag name and class, independently of how they
/// were produced: `<b>` and `<strong>` can describe the same annotation.
///
/// The first tag name is used when creating new markers. An empty class
/// name matches any element of the tag set.
#[derive(Debug, Clone)]
pub struct AnnotationDescriptor {
    tag_names: Vec<SmolStr>,
    class_name: SmolStr,
    similar_class_pattern: Option<Regex>,
}

impl AnnotationDescriptor {
    pub fn new<I, S>(tag_names: I, class_name: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tag_names: Vec<SmolStr> = tag_names
            .into_iter()
            .map(|name| SmolStr::new(name.as_ref().to_ascii_lowercase()))
            .collect();
        if tag_names.is_empty() {
            tag_names.push(SmolStr::new_static(DEFAULT_TAG_NAME));
        }
        Self {
            tag_names,
            class_name: SmolStr::new(class_name.trim()),
            similar_class_pattern: None,
        }
    }

    /// Treat every class token matching `pattern` as a variant of this
    /// annotation: applying replaces them, removing strips them.
    pub fn with_similar_classes(mut self, pattern: Regex) -> Self {
        self.similar_class_pattern = Some(pattern);
        self
    }

    pub fn tag_names(&self) -> &[SmolStr] {
        &self.tag_names
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn similar_class_pattern(&self) -> Option<&Regex> {
        self.similar_class_pattern.as_ref()
    }

    pub fn has_tag(&self, element: &ElementData) -> bool {
        self.tag_names.iter().any(|name| *name == element.name)
    }

    /// Whether `node` is a marker of this annotation.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.element(node).is_some_and(|element| {
            self.has_tag(element)
                && (self.class_name.is_empty()
                    || has_class(
                        element.class_name(),
                        &self.class_name,
                        self.similar_class_pattern(),
                    ))
        })
    }

    /// A fresh, detached marker element.
    pub fn create_marker(&self, doc: &mut Document) -> NodeId {
        let marker = doc.create_element(&self.tag_names[0]);
        if !self.class_name.is_empty()
            && let Some(element) = doc.element_mut(marker)
        {
            element.set_class_name(&self.class_name);
        }
        marker
    }

    /// Whether an element would carry no information once unwrapped.
    pub fn is_removable(&self, element: &ElementData) -> bool {
        let class_name = element.class_name().trim();
        self.has_tag(element)
            && (class_name.is_empty() || class_name == self.class_name)
            && element.non_class_attributes().next().is_none()
    }

    /// Two markers that can be fused into one without changing meaning.
    pub fn are_elements_mergeable(&self, doc: &Document, a: NodeId, b: NodeId) -> bool {
        match (doc.element(a), doc.element(b)) {
            (Some(a), Some(b)) => {
                self.has_tag(a)
                    && self.has_tag(b)
                    && have_same_classes(a, b)
                    && have_same_non_class_attributes(a, b)
            }
            _ => false,
        }
    }
}
