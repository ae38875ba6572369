//! Partial-selection iteration over the nodes a range touches.
//!
//! A `RangeIterator` walks the children of the range's common ancestor that
//! lie between the two boundaries. A child that contains a boundary
//! container is *partially selected*: callers ask for a
//! [`subtree_iterator`](RangeIterator::subtree_iterator) narrowed to the
//! overlap and recurse. Every other child is wholly inside the range and can
//! be walked depth-first without consulting the comparator again.

use std::ops::ControlFlow;

use loom_dom::{Document, DomError, DomResult, NodeId, NodeKind};

use crate::boundary::BoundaryPoint;
use crate::range::{Bounds, Range};

/// Sibling walk between the boundaries of a range, one node of lookahead.
#[derive(Debug, Clone)]
pub struct RangeIterator {
    start: BoundaryPoint,
    end: BoundaryPoint,
    single_character_data: bool,
    first: Option<NodeId>,
    last: Option<NodeId>,
    current: Option<NodeId>,
    next: Option<NodeId>,
}

impl RangeIterator {
    /// Iterator over a valid range.
    pub fn new(doc: &Document, range: &Range) -> DomResult<Self> {
        let bounds = range.assert_valid(doc)?;
        Ok(Self::from_bounds(doc, bounds))
    }

    pub(crate) fn from_bounds(doc: &Document, bounds: Bounds) -> Self {
        let Bounds {
            start,
            end,
            common_ancestor: root,
        } = bounds;
        let mut iter = Self {
            start,
            end,
            single_character_data: false,
            first: None,
            last: None,
            current: None,
            next: None,
        };
        if start == end {
            return iter;
        }

        if start.node == end.node && doc.is_character_data(start.node) {
            iter.single_character_data = true;
            iter.first = Some(start.node);
            iter.last = Some(start.node);
        } else {
            iter.first = if start.node == root && !doc.is_character_data(start.node) {
                doc.child_at(start.node, start.offset)
            } else {
                doc.closest_ancestor_in(start.node, root, true)
            };
            iter.last = if end.node == root && !doc.is_character_data(end.node) {
                end.offset
                    .checked_sub(1)
                    .and_then(|index| doc.child_at(end.node, index))
            } else {
                doc.closest_ancestor_in(end.node, root, true)
            };
        }
        iter.next = iter.first;
        iter
    }

    /// Restart at the first node.
    pub fn reset(&mut self) {
        self.current = None;
        self.next = self.first;
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Node most recently returned by [`next`](Self::next).
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn start(&self) -> BoundaryPoint {
        self.start
    }

    pub fn end(&self) -> BoundaryPoint {
        self.end
    }

    /// Advance to the next sibling, stopping after the last selected one.
    ///
    /// The sibling link is read before the caller gets the node, so the
    /// current node may be removed from the tree without derailing the walk.
    pub fn next(&mut self, doc: &Document) -> Option<NodeId> {
        self.current = self.next;
        let current = self.current?;
        self.next = if Some(current) == self.last {
            None
        } else {
            doc.next_sibling(current)
        };
        Some(current)
    }

    /// Whether the current node is a non-character node holding a boundary container.
    pub fn is_partially_selected_subtree(&self, doc: &Document) -> bool {
        self.current
            .is_some_and(|node| is_partially_selected(doc, node, self.start, self.end))
    }

    /// Iterator over the part of the current node that lies inside the range.
    pub fn subtree_iterator(&self, doc: &Document) -> RangeIterator {
        let current = match self.current {
            Some(current) if !self.single_character_data => current,
            _ => {
                let collapsed = Bounds {
                    start: self.end,
                    end: self.end,
                    common_ancestor: self.end.node,
                };
                return RangeIterator::from_bounds(doc, collapsed);
            }
        };

        let mut start = BoundaryPoint::new(current, 0);
        let mut end = BoundaryPoint::new(current, doc.node_length(current));
        if doc.is_ancestor_of(current, self.start.node, true) {
            start = self.start;
        }
        if doc.is_ancestor_of(current, self.end.node, true) {
            end = self.end;
        }
        let common_ancestor = doc.common_ancestor(start.node, end.node).unwrap_or(current);
        RangeIterator::from_bounds(
            doc,
            Bounds {
                start,
                end,
                common_ancestor,
            },
        )
    }

    /// Selected slice `(from, to)` of a character-data node, in chars.
    pub fn selected_span(&self, doc: &Document, node: NodeId) -> (usize, usize) {
        let from = if node == self.start.node {
            self.start.offset
        } else {
            0
        };
        let to = if node == self.end.node {
            self.end.offset
        } else {
            doc.node_length(node)
        };
        (from, to.max(from))
    }

    /// Copy the current node as it should appear in a fragment of the range.
    ///
    /// Boundary character data is trimmed to its selected slice.
    pub fn clone_current(&self, doc: &mut Document, deep: bool) -> DomResult<NodeId> {
        let current = self
            .current
            .ok_or_else(|| DomError::invalid_state("iterator has no current node"))?;
        let copy = doc.clone_node(current, deep);
        if doc.is_character_data(current) {
            let (from, to) = self.selected_span(doc, current);
            let length = doc.node_length(copy);
            doc.delete_data(copy, to.min(length), length.saturating_sub(to))?;
            doc.delete_data(copy, 0, from)?;
        }
        Ok(copy)
    }

    /// Remove the current node from the tree.
    ///
    /// A boundary character-data node only loses its selected slice.
    pub fn remove(&mut self, doc: &mut Document) -> DomResult<()> {
        let Some(current) = self.current else {
            return Ok(());
        };
        if doc.is_character_data(current)
            && (current == self.start.node || current == self.end.node)
        {
            let (from, to) = self.selected_span(doc, current);
            if from != to {
                doc.delete_data(current, from, to - from)?;
            }
        } else {
            doc.remove(current);
        }
        Ok(())
    }

    /// Drop all node references; the iterator yields nothing afterwards.
    pub fn detach(&mut self) {
        self.first = None;
        self.last = None;
        self.current = None;
        self.next = None;
    }
}

/// A node whose children are not all selected: a non-character ancestor
/// (or the container itself) of either boundary.
pub(crate) fn is_partially_selected(
    doc: &Document,
    node: NodeId,
    start: BoundaryPoint,
    end: BoundaryPoint,
) -> bool {
    !doc.is_character_data(node)
        && (doc.is_ancestor_of(node, start.node, true) || doc.is_ancestor_of(node, end.node, true))
}

/// Visit every node touched by the iterator, in document order.
///
/// Partially selected subtrees are visited themselves and then narrowed
/// recursively; fully selected subtrees are walked depth-first.
pub fn iterate_subtree<F>(doc: &Document, iter: &mut RangeIterator, visit: &mut F) -> ControlFlow<()>
where
    F: FnMut(&Document, NodeId) -> ControlFlow<()>,
{
    while let Some(node) = iter.next(doc) {
        if iter.is_partially_selected_subtree(doc) {
            if visit(doc, node).is_break() {
                return ControlFlow::Break(());
            }
            let mut sub = iter.subtree_iterator(doc);
            if iterate_subtree(doc, &mut sub, visit).is_break() {
                return ControlFlow::Break(());
            }
        } else {
            for descendant in doc.descendants(node) {
                if visit(doc, descendant).is_break() {
                    return ControlFlow::Break(());
                }
            }
        }
    }
    ControlFlow::Continue(())
}

pub(crate) fn clone_subtree(doc: &mut Document, iter: &mut RangeIterator) -> DomResult<NodeId> {
    let fragment = doc.create_fragment();
    while let Some(node) = iter.next(doc) {
        reject_doctype(doc, node)?;
        let partial = iter.is_partially_selected_subtree(doc);
        let copy = iter.clone_current(doc, !partial)?;
        if partial {
            let mut sub = iter.subtree_iterator(doc);
            let inner = clone_subtree(doc, &mut sub)?;
            doc.append_child(copy, inner)?;
        }
        doc.append_child(fragment, copy)?;
    }
    Ok(fragment)
}

pub(crate) fn extract_subtree(doc: &mut Document, iter: &mut RangeIterator) -> DomResult<NodeId> {
    let fragment = doc.create_fragment();
    while let Some(node) = iter.next(doc) {
        reject_doctype(doc, node)?;
        let piece = if iter.is_partially_selected_subtree(doc) {
            let shell = doc.clone_node(node, false);
            let mut sub = iter.subtree_iterator(doc);
            let inner = extract_subtree(doc, &mut sub)?;
            doc.append_child(shell, inner)?;
            shell
        } else if doc.is_character_data(node)
            && (node == iter.start.node || node == iter.end.node)
        {
            let copy = iter.clone_current(doc, false)?;
            iter.remove(doc)?;
            copy
        } else {
            iter.remove(doc)?;
            node
        };
        doc.append_child(fragment, piece)?;
    }
    Ok(fragment)
}

pub(crate) fn delete_subtree(doc: &mut Document, iter: &mut RangeIterator) -> DomResult<()> {
    while iter.next(doc).is_some() {
        if iter.is_partially_selected_subtree(doc) {
            let mut sub = iter.subtree_iterator(doc);
            delete_subtree(doc, &mut sub)?;
        } else {
            iter.remove(doc)?;
        }
    }
    Ok(())
}

fn reject_doctype(doc: &Document, node: NodeId) -> DomResult<()> {
    if doc.kind(node) == NodeKind::DocType {
        Err(DomError::hierarchy("a doctype cannot be moved into a fragment"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Document, NodeId) {
        let doc = Document::from_markup("<div>ab<span>cd<i>x</i></span>ef</div>").unwrap();
        let div = doc.first_child(doc.root()).unwrap();
        (doc, div)
    }

    fn visited(doc: &Document, range: &Range) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut iter = RangeIterator::new(doc, range).unwrap();
        let flow = iterate_subtree(doc, &mut iter, &mut |_, node| {
            out.push(node);
            ControlFlow::Continue(())
        });
        assert!(flow.is_continue());
        out
    }

    #[test]
    fn test_whole_contents_match_depth_first_walk() {
        let (doc, div) = fixture();
        let mut range = Range::new(&doc);
        range.select_node_contents(&doc, div).unwrap();

        let expected: Vec<_> = doc.descendants(div).skip(1).collect();
        assert_eq!(visited(&doc, &range), expected);
    }

    #[test]
    fn test_partial_subtree_is_narrowed() {
        let (doc, div) = fixture();
        let ab = doc.child_at(div, 0).unwrap();
        let span = doc.child_at(div, 1).unwrap();
        let cd = doc.first_child(span).unwrap();
        let italic = doc.child_at(span, 1).unwrap();

        // From inside "ab" to inside "cd": span is partially selected and
        // only "cd" is reached inside it.
        let mut range = Range::new(&doc);
        range.set_start(&doc, ab, 1).unwrap();
        range.set_end(&doc, cd, 1).unwrap();

        let mut iter = RangeIterator::new(&doc, &range).unwrap();
        assert_eq!(iter.next(&doc), Some(ab));
        assert!(!iter.is_partially_selected_subtree(&doc));
        assert_eq!(iter.next(&doc), Some(span));
        assert!(iter.is_partially_selected_subtree(&doc));

        let mut sub = iter.subtree_iterator(&doc);
        assert_eq!(sub.next(&doc), Some(cd));
        assert_eq!(sub.next(&doc), None);
        assert_eq!(iter.next(&doc), None);

        assert_eq!(visited(&doc, &range), vec![ab, span, cd]);
        assert!(!visited(&doc, &range).contains(&italic));
    }

    #[test]
    fn test_reset_and_detach() {
        let (doc, div) = fixture();
        let mut range = Range::new(&doc);
        range.select_node_contents(&doc, div).unwrap();
        let mut iter = RangeIterator::new(&doc, &range).unwrap();

        let first = iter.next(&doc);
        iter.next(&doc);
        iter.reset();
        assert_eq!(iter.current(), None);
        assert_eq!(iter.next(&doc), first);

        iter.detach();
        assert!(!iter.has_next());
        assert_eq!(iter.next(&doc), None);
    }

    #[test]
    fn test_collapsed_range_yields_nothing() {
        let (doc, div) = fixture();
        let mut range = Range::new(&doc);
        range.set_start(&doc, div, 1).unwrap();
        range.collapse(true).unwrap();
        assert!(visited(&doc, &range).is_empty());
    }

    #[test]
    fn test_visitor_can_stop_early() {
        let (doc, div) = fixture();
        let mut range = Range::new(&doc);
        range.select_node_contents(&doc, div).unwrap();
        let mut iter = RangeIterator::new(&doc, &range).unwrap();
        let mut seen = 0;
        let flow = iterate_subtree(&doc, &mut iter, &mut |_, _| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(flow.is_break());
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_remove_trims_boundary_text() {
        let (mut doc, div) = fixture();
        let ab = doc.child_at(div, 0).unwrap();
        let mut range = Range::new(&doc);
        range.set_start(&doc, ab, 1).unwrap();
        range.set_end(&doc, div, 1).unwrap();

        let mut iter = RangeIterator::new(&doc, &range).unwrap();
        assert_eq!(iter.next(&doc), Some(ab));
        iter.remove(&mut doc).unwrap();
        assert_eq!(doc.character_data(ab), Some("a"));
        assert_eq!(doc.parent(ab), Some(div));
    }
}
