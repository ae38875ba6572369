//! Applying and removing inline annotations over ranges.
//!
//! An annotation is carried by marker elements (see
//! [`AnnotationDescriptor`]). Applying wraps every selected text node that
//! isn't already marked; removing strips the class from the enclosing
//! markers, splitting them first so only the selected slice changes.
//!
//! Both directions finish by merging adjacent equivalent markers and text
//! nodes, so that repeated toggling doesn't fragment the tree.

use loom_dom::markup::is_void_element;
use loom_dom::{Document, DomError, DomResult, NodeId};
use loom_range::{BoundaryPoint, Range, SelectionHost};

use crate::classes::{add_class, remove_class};
use crate::config::ApplierOptions;
use crate::descriptor::AnnotationDescriptor;

/// Zero-width no-break space, used to give an empty marker or caret
/// position something to sit in.
pub const INVISIBLE_SPACE: &str = "\u{feff}";

/// Applies one annotation, described by an [`AnnotationDescriptor`].
#[derive(Debug, Clone)]
pub struct Applier {
    descriptor: AnnotationDescriptor,
    options: ApplierOptions,
}

impl Applier {
    pub fn new(descriptor: AnnotationDescriptor) -> Self {
        Self::with_options(descriptor, ApplierOptions::default())
    }

    pub fn with_options(descriptor: AnnotationDescriptor, options: ApplierOptions) -> Self {
        Self {
            descriptor,
            options,
        }
    }

    pub fn descriptor(&self) -> &AnnotationDescriptor {
        &self.descriptor
    }

    pub fn options(&self) -> &ApplierOptions {
        &self.options
    }

    /// Nearest inclusive ancestor of `node` that is a marker of this annotation.
    ///
    /// Fails with `WrongDocument` if `node` was not created by `doc`.
    pub fn ancestor_with_class(&self, doc: &Document, node: NodeId) -> DomResult<Option<NodeId>> {
        doc.ensure(node)?;
        Ok(self.marker_ancestor(doc, node))
    }

    fn marker_ancestor(&self, doc: &Document, node: NodeId) -> Option<NodeId> {
        doc.find_ancestor(node, self.options.max_ancestor_depth, |doc, candidate| {
            self.descriptor.matches(doc, candidate)
        })
    }

    // === Queries ===

    /// The markers covering the range, or `None` if some selected text is unmarked.
    ///
    /// Text nodes the range touches without selecting any of their text are
    /// ignored. When no text is selected at all, the start container decides.
    pub fn is_applied_to_range(&self, doc: &Document, range: &Range) -> DomResult<Option<Vec<NodeId>>> {
        let mut ancestors = Vec::new();
        let mut any_selected = false;
        for text in range.text_nodes(doc)? {
            if selected_text(doc, text, range)?.is_empty() {
                continue;
            }
            any_selected = true;
            match self.marker_ancestor(doc, text) {
                Some(ancestor) => {
                    if !ancestors.contains(&ancestor) {
                        ancestors.push(ancestor);
                    }
                }
                None => return Ok(None),
            }
        }
        if !any_selected {
            let start = range.start_container()?;
            return Ok(self.marker_ancestor(doc, start).map(|ancestor| vec![ancestor]));
        }
        Ok(Some(ancestors))
    }

    // === Apply ===

    /// Mark the selected text.
    ///
    /// A range with no text is wrapped in a single new marker holding the
    /// caret, unless it already sits inside one. Otherwise every unmarked
    /// text node is wrapped and the range is re-anchored on the first and
    /// last text node.
    pub fn apply_to_range(&self, doc: &mut Document, range: &mut Range) -> DomResult<()> {
        if range.text_nodes(doc)?.is_empty() {
            if self.marker_ancestor(doc, range.start_container()?).is_some() {
                return Ok(());
            }
            if range.can_surround_contents(doc)? {
                let marker = self.descriptor.create_marker(doc);
                range.surround_contents(doc, marker)?;
                self.select_node(doc, range, marker)?;
                tracing::debug!(target: "loom::annotate", ?marker, "wrapped empty range in marker");
                return Ok(());
            }
        }

        range.split_boundaries(doc)?;
        let text_nodes = effective_text_nodes(doc, range)?;
        let (Some(&first), Some(&last)) = (text_nodes.first(), text_nodes.last()) else {
            return Ok(());
        };
        for &text in &text_nodes {
            if self.marker_ancestor(doc, text).is_none() {
                self.apply_to_text_node(doc, text)?;
            }
        }
        range.set_start_and_end(
            doc,
            BoundaryPoint::new(first, 0),
            BoundaryPoint::new(last, doc.node_length(last)),
        )?;
        tracing::debug!(
            target: "loom::annotate",
            class = self.descriptor.class_name(),
            nodes = text_nodes.len(),
            "applied annotation"
        );
        if self.options.normalize {
            self.post_apply(doc, &text_nodes, range, false)?;
        }
        Ok(())
    }

    fn apply_to_text_node(&self, doc: &mut Document, text: NodeId) -> DomResult<()> {
        let parent = doc
            .parent(text)
            .ok_or_else(|| DomError::not_found("text node has no parent"))?;
        let reuse = doc.child_count(parent) == 1
            && doc
                .element(parent)
                .is_some_and(|element| self.descriptor.has_tag(element));
        if reuse {
            let class_name = self.descriptor.class_name();
            if !class_name.is_empty()
                && let Some(element) = doc.element_mut(parent)
            {
                add_class(element, class_name, self.descriptor.similar_class_pattern());
            }
            return Ok(());
        }

        let marker = self.descriptor.create_marker(doc);
        doc.insert_before(parent, marker, Some(text))?;
        doc.append_child(marker, text)?;
        tracing::trace!(target: "loom::annotate", ?text, ?marker, "wrapped text node");
        Ok(())
    }

    // === Undo ===

    /// Remove the annotation from the selected text.
    ///
    /// Markers that extend past the range are split at its boundaries
    /// first. A range with no text gets an invisible-space text node so the
    /// caret can be moved out of the marker.
    ///
    /// The selection is tracked as the span from the start of the first text
    /// node to the end of the last one. Those nodes survive every split and
    /// unwrap below, while element offsets do not.
    pub fn undo_to_range(&self, doc: &mut Document, range: &mut Range) -> DomResult<()> {
        let (text_nodes, caret) = if range.text_nodes(doc)?.is_empty() {
            let caret = doc.create_text(INVISIBLE_SPACE);
            range.insert_node(doc, caret)?;
            range.select_node(doc, caret)?;
            (vec![caret], Some(caret))
        } else {
            range.split_boundaries(doc)?;
            (effective_text_nodes(doc, range)?, None)
        };

        let (Some(&first), Some(&last)) = (text_nodes.first(), text_nodes.last()) else {
            return Ok(());
        };
        let start = BoundaryPoint::new(first, 0);
        let end = BoundaryPoint::new(last, doc.node_length(last));
        for &text in &text_nodes {
            if let Some(ancestor) = self.marker_ancestor(doc, text) {
                self.undo_to_text_node(doc, start, end, ancestor)?;
            }
        }

        if let Some(caret) = caret {
            return self.select_node(doc, range, caret);
        }
        range.set_start_and_end(doc, start, end)?;
        tracing::debug!(
            target: "loom::annotate",
            class = self.descriptor.class_name(),
            nodes = text_nodes.len(),
            "removed annotation"
        );
        if self.options.normalize {
            self.post_apply(doc, &text_nodes, range, true)?;
        }
        Ok(())
    }

    /// Strip the class from `ancestor`, first splitting off the parts of it
    /// that lie outside `start..end`.
    fn undo_to_text_node(
        &self,
        doc: &mut Document,
        start: BoundaryPoint,
        end: BoundaryPoint,
        ancestor: NodeId,
    ) -> DomResult<()> {
        let mut ancestor = ancestor;
        let selected = Range::from_points(doc, start, end)?;
        if !selected.contains_node(doc, ancestor, false)? {
            let mut ancestor_range = selected;
            ancestor_range.select_node(doc, ancestor)?;

            if ancestor_range.is_point_in_range(doc, end.node, end.offset)?
                && is_split_point(doc, end.node, end.offset)
            {
                split_node_at(doc, ancestor, end.node, end.offset)?;
            }
            if ancestor_range.is_point_in_range(doc, start.node, start.offset)?
                && is_split_point(doc, start.node, start.offset)
            {
                ancestor = split_node_at(doc, ancestor, start.node, start.offset)?;
            }
        }

        let removable = match doc.element_mut(ancestor) {
            Some(element) => {
                remove_class(
                    element,
                    self.descriptor.class_name(),
                    self.descriptor.similar_class_pattern(),
                );
                self.descriptor.is_removable(element)
            }
            None => false,
        };
        if removable {
            doc.replace_with_own_children(ancestor)?;
            tracing::trace!(target: "loom::annotate", marker = ?ancestor, "unwrapped marker");
        }
        Ok(())
    }

    /// `undo_to_range` if the annotation covers the range, else `apply_to_range`.
    pub fn toggle_range(&self, doc: &mut Document, range: &mut Range) -> DomResult<()> {
        if self.is_applied_to_range(doc, range)?.is_some() {
            self.undo_to_range(doc, range)
        } else {
            self.apply_to_range(doc, range)
        }
    }

    // === Selection wrappers ===

    /// Markers covering every range of the selection, or `None`.
    pub fn is_applied_to_selection<S: SelectionHost>(
        &self,
        doc: &Document,
        selection: &S,
    ) -> DomResult<Option<Vec<NodeId>>> {
        let ranges = selection.ranges();
        if ranges.is_empty() {
            return Ok(None);
        }
        let mut ancestors = Vec::new();
        for range in &ranges {
            match self.is_applied_to_range(doc, range)? {
                Some(found) => ancestors.extend(found),
                None => return Ok(None),
            }
        }
        Ok(Some(ancestors))
    }

    pub fn apply_to_selection<S: SelectionHost>(&self, doc: &mut Document, selection: &mut S) -> DomResult<()> {
        self.each_selected_range(doc, selection, |applier, doc, range| {
            applier.apply_to_range(doc, range)
        })
    }

    pub fn undo_to_selection<S: SelectionHost>(&self, doc: &mut Document, selection: &mut S) -> DomResult<()> {
        self.each_selected_range(doc, selection, |applier, doc, range| {
            applier.undo_to_range(doc, range)
        })
    }

    pub fn toggle_selection<S: SelectionHost>(&self, doc: &mut Document, selection: &mut S) -> DomResult<()> {
        if self.is_applied_to_selection(doc, selection)?.is_some() {
            self.undo_to_selection(doc, selection)
        } else {
            self.apply_to_selection(doc, selection)
        }
    }

    /// Run `op` on every selected range, last first, then hand the updated
    /// ranges back to the host.
    fn each_selected_range<S, F>(&self, doc: &mut Document, selection: &mut S, mut op: F) -> DomResult<()>
    where
        S: SelectionHost,
        F: FnMut(&Self, &mut Document, &mut Range) -> DomResult<()>,
    {
        let backwards = selection.is_backwards();
        let mut ranges = selection.ranges();
        for range in ranges.iter_mut().rev() {
            op(self, doc, range)?;
        }
        selection.set_ranges(ranges, backwards);
        Ok(())
    }

    // === Normalization ===

    /// Merge the touched text nodes with mergeable neighbours and re-anchor
    /// the range on the merged nodes.
    ///
    /// After an apply, neighbouring equivalent markers are fused as well;
    /// after an undo only bare adjacent text nodes are joined.
    fn post_apply(&self, doc: &mut Document, text_nodes: &[NodeId], range: &mut Range, undo: bool) -> DomResult<()> {
        let (Some(&first), Some(&last)) = (text_nodes.first(), text_nodes.last()) else {
            return Ok(());
        };
        let check_parent = !undo;
        let mut merges: Vec<Merge> = Vec::new();
        let mut current: Option<usize> = None;
        let mut start = BoundaryPoint::new(first, 0);
        let mut end = BoundaryPoint::new(last, doc.node_length(last));

        for &text in text_nodes {
            let Some(preceding) = self.adjacent_mergeable_text(doc, text, false, check_parent) else {
                current = None;
                continue;
            };
            let index = *current.get_or_insert_with(|| {
                merges.push(Merge::new(preceding));
                merges.len() - 1
            });
            let merge = &mut merges[index];
            merge.text_nodes.push(text);
            if text == first {
                let head = merge.first();
                start = BoundaryPoint::new(head, doc.node_length(head));
            }
            if text == last {
                end = BoundaryPoint::new(merge.first(), merge.length(doc));
            }
        }

        if let Some(next) = self.adjacent_mergeable_text(doc, last, true, check_parent) {
            let index = match current {
                Some(index) => index,
                None => {
                    merges.push(Merge::new(last));
                    merges.len() - 1
                }
            };
            merges[index].text_nodes.push(next);
        }

        if merges.is_empty() {
            return Ok(());
        }
        for merge in &merges {
            merge.apply(doc)?;
        }
        tracing::trace!(target: "loom::annotate", merges = merges.len(), "merged adjacent text");
        range.set_start_and_end(doc, start, end)
    }

    /// Text node that `text` can be merged with in the given direction.
    ///
    /// A direct text sibling always qualifies. At the edge of its parent,
    /// and only when `check_parent` is set, the outermost text of an
    /// equivalent neighbouring marker does too.
    fn adjacent_mergeable_text(
        &self,
        doc: &Document,
        text: NodeId,
        forward: bool,
        check_parent: bool,
    ) -> Option<NodeId> {
        let sibling = |node: NodeId| {
            if forward {
                doc.next_sibling(node)
            } else {
                doc.previous_sibling(node)
            }
        };
        if let Some(adjacent) = sibling(text) {
            return doc.is_text(adjacent).then_some(adjacent);
        }
        if !check_parent {
            return None;
        }
        let parent = doc.parent(text)?;
        let neighbour = sibling(parent)?;
        if !self.descriptor.are_elements_mergeable(doc, parent, neighbour) {
            return None;
        }
        let edge = if forward {
            doc.first_child(neighbour)
        } else {
            doc.last_child(neighbour)
        }?;
        doc.is_text(edge).then_some(edge)
    }

    // === Caret placement ===

    /// Select `node`, keeping the caret visible when it has no content.
    ///
    /// An empty element is filled with an invisible space and the range
    /// collapses at its end; an empty text node is stepped over.
    fn select_node(&self, doc: &mut Document, range: &mut Range, node: NodeId) -> DomResult<()> {
        let element_name = doc.element(node).map(|element| element.name.clone());
        let content = match element_name {
            Some(_) => doc.inner_html(node),
            None => doc.character_data(node).unwrap_or_default().to_string(),
        };
        let is_empty = content.is_empty() || content == INVISIBLE_SPACE;

        if let Some(name) = &element_name
            && is_empty
            && !is_void_element(name)
        {
            for child in doc.children(node).to_vec() {
                doc.remove(child);
            }
            let filler = doc.create_text(INVISIBLE_SPACE);
            doc.append_child(node, filler)?;
        }

        range.select_node_contents(doc, node)?;
        if is_empty && element_name.is_some() {
            range.collapse(false)?;
        } else if is_empty {
            range.set_start_after(doc, node)?;
            range.set_end_after(doc, node)?;
        }
        Ok(())
    }
}

/// A run of text nodes to be joined into the first one.
///
/// Every other node is detached, along with any parent it leaves empty.
#[derive(Debug)]
struct Merge {
    text_nodes: Vec<NodeId>,
}

impl Merge {
    fn new(first: NodeId) -> Self {
        Self {
            text_nodes: vec![first],
        }
    }

    fn first(&self) -> NodeId {
        self.text_nodes[0]
    }

    fn length(&self, doc: &Document) -> usize {
        self.text_nodes
            .iter()
            .map(|text| doc.node_length(*text))
            .sum()
    }

    fn apply(&self, doc: &mut Document) -> DomResult<()> {
        let mut combined = String::new();
        for (i, &text) in self.text_nodes.iter().enumerate() {
            combined.push_str(doc.character_data(text).unwrap_or_default());
            if i == 0 {
                continue;
            }
            let parent = doc.parent(text);
            doc.remove(text);
            if let Some(parent) = parent
                && !doc.has_children(parent)
            {
                doc.remove(parent);
            }
        }
        doc.set_data(self.first(), combined)
    }
}

/// Text of `text` that lies inside `range`.
fn selected_text(doc: &Document, text: NodeId, range: &Range) -> DomResult<String> {
    let whole = Range::from_node_contents(doc, text)?;
    match whole.intersection(doc, range)? {
        Some(overlap) => overlap.text(doc),
        None => Ok(String::new()),
    }
}

/// Text nodes swept by the range, minus those at either end that the
/// range only touches.
fn effective_text_nodes(doc: &Document, range: &Range) -> DomResult<Vec<NodeId>> {
    let nodes = range.text_nodes(doc)?;
    let mut start = 0;
    while start < nodes.len() && selected_text(doc, nodes[start], range)?.is_empty() {
        start += 1;
    }
    let mut end = nodes.len();
    while end > start && selected_text(doc, nodes[end - 1], range)?.is_empty() {
        end -= 1;
    }
    Ok(nodes[start..end].to_vec())
}

/// Whether splitting at `(node, offset)` would leave content on both sides.
pub fn is_split_point(doc: &Document, node: NodeId, offset: usize) -> bool {
    if doc.is_character_data(node) {
        if offset == 0 {
            doc.previous_sibling(node).is_some()
        } else if offset == doc.node_length(node) {
            doc.next_sibling(node).is_some()
        } else {
            true
        }
    } else {
        offset > 0 && offset < doc.child_count(node)
    }
}

/// Split every node from `(node, offset)` up to and including `ancestor`.
///
/// Each level is cut in two: the node keeps what precedes the split
/// point, a shallow copy inserted after it takes the rest. Returns the
/// copy made of `ancestor`.
///
/// Fails without touching the tree unless `node` is an inclusive
/// descendant of `ancestor`.
pub fn split_node_at(doc: &mut Document, ancestor: NodeId, node: NodeId, offset: usize) -> DomResult<NodeId> {
    doc.ensure(ancestor)?;
    doc.ensure(node)?;
    if !doc.is_ancestor_of(ancestor, node, true) {
        return Err(DomError::hierarchy("split point is outside the ancestor"));
    }
    if offset > doc.node_length(node) {
        return Err(DomError::IndexSize {
            offset,
            length: doc.node_length(node),
        });
    }
    let (mut node, mut offset) = (node, offset);
    loop {
        let mut split = None;
        if doc.is_character_data(node) {
            let length = doc.node_length(node);
            if offset == 0 || offset == length {
                let parent = doc
                    .parent(node)
                    .ok_or_else(|| DomError::not_found("split point has no parent"))?;
                offset = doc.index_of(node) + usize::from(offset == length && length > 0);
                node = parent;
            } else {
                split = Some(doc.split_data(node, offset)?);
            }
        }

        let split = match split {
            Some(split) => split,
            None => {
                let copy = doc.clone_node(node, false);
                if let Some(element) = doc.element_mut(copy) {
                    element.remove_attribute("id");
                }
                let moving = doc
                    .children(node)
                    .get(offset..)
                    .map(<[NodeId]>::to_vec)
                    .unwrap_or_default();
                for child in moving {
                    doc.append_child(copy, child)?;
                }
                doc.insert_after(copy, node)?;
                copy
            }
        };
        tracing::trace!(target: "loom::annotate", ?node, offset, ?split, "split node");

        if node == ancestor {
            return Ok(split);
        }
        node = doc
            .parent(split)
            .ok_or_else(|| DomError::not_found("split reached the root before the ancestor"))?;
        offset = doc.index_of(split);
    }
}
