//! Live ranges over a [`Document`].
//!
//! A `Range` is a pair of boundary points plus their cached common ancestor.
//! It does not borrow the document: every operation takes the document it
//! was created for and re-validates the cached points first, so a range left
//! behind by an unrelated mutation fails loudly instead of reading garbage.
//!
//! Mutating operations (`insert_node`, `extract_contents`, `delete_contents`,
//! `surround_contents`, `split_boundaries`, `normalize_boundaries`) repair
//! the range's own boundaries afterwards. Other ranges over the same tree are
//! not tracked and must be re-established by the caller.

use std::cmp::Ordering;
use std::ops::ControlFlow;

use loom_dom::{Document, DocumentId, DomError, DomResult, NodeData, NodeId, NodeKind};

use crate::boundary::{BoundaryPoint, compare_points};
use crate::iter::{
    RangeIterator, clone_subtree, delete_subtree, extract_subtree, is_partially_selected,
    iterate_subtree,
};

/// Which boundary of each range `compare_boundary_points` looks at.
///
/// The first half of the name is the boundary of the *other* range, the
/// second half the boundary of `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum How {
    StartToStart,
    StartToEnd,
    EndToEnd,
    EndToStart,
}

/// Where a node sits relative to a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePosition {
    /// Starts before the range and ends inside it.
    Before,
    /// Starts inside the range and ends after it.
    After,
    /// Starts before and ends after the range.
    BeforeAndAfter,
    /// Entirely within the range.
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub(crate) start: BoundaryPoint,
    pub(crate) end: BoundaryPoint,
    pub(crate) common_ancestor: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    document: DocumentId,
    bounds: Option<Bounds>,
}

impl Range {
    /// A collapsed range at the start of the document.
    pub fn new(doc: &Document) -> Self {
        let root = doc.root();
        Self {
            document: doc.id(),
            bounds: Some(Bounds {
                start: BoundaryPoint::new(root, 0),
                end: BoundaryPoint::new(root, 0),
                common_ancestor: root,
            }),
        }
    }

    /// A range spanning `start..end`.
    pub fn from_points(
        doc: &Document,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<Self> {
        let mut range = Self::new(doc);
        range.set_start_and_end(doc, start, end)?;
        Ok(range)
    }

    /// A range selecting all of `node`'s contents.
    pub fn from_node_contents(doc: &Document, node: NodeId) -> DomResult<Self> {
        let mut range = Self::new(doc);
        range.select_node_contents(doc, node)?;
        Ok(range)
    }

    // === Accessors ===

    pub fn document(&self) -> DocumentId {
        self.document
    }

    pub fn is_detached(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn start(&self) -> DomResult<BoundaryPoint> {
        Ok(self.bounds()?.start)
    }

    pub fn end(&self) -> DomResult<BoundaryPoint> {
        Ok(self.bounds()?.end)
    }

    pub fn start_container(&self) -> DomResult<NodeId> {
        Ok(self.bounds()?.start.node)
    }

    pub fn start_offset(&self) -> DomResult<usize> {
        Ok(self.bounds()?.start.offset)
    }

    pub fn end_container(&self) -> DomResult<NodeId> {
        Ok(self.bounds()?.end.node)
    }

    pub fn end_offset(&self) -> DomResult<usize> {
        Ok(self.bounds()?.end.offset)
    }

    /// Deepest node containing both boundaries.
    pub fn common_ancestor(&self) -> DomResult<NodeId> {
        Ok(self.bounds()?.common_ancestor)
    }

    /// Whether both boundaries are the same point. A detached range is never collapsed.
    pub fn is_collapsed(&self) -> bool {
        self.bounds.is_some_and(|b| b.start == b.end)
    }

    // === Validity ===

    fn bounds(&self) -> DomResult<Bounds> {
        self.bounds
            .ok_or_else(|| DomError::invalid_state("range has been detached"))
    }

    /// The cached boundaries, provided they still make sense in `doc`.
    pub(crate) fn assert_valid(&self, doc: &Document) -> DomResult<Bounds> {
        if self.document != doc.id() {
            return Err(DomError::WrongDocument);
        }
        let bounds = self.bounds()?;
        for point in [bounds.start, bounds.end] {
            doc.ensure(point.node)?;
            if doc.is_orphan(point.node) {
                return Err(DomError::invalid_state(
                    "range boundary is no longer attached to a document or fragment",
                ));
            }
            if point.offset > doc.node_length(point.node) {
                return Err(DomError::invalid_state(
                    "range boundary offset exceeds its container",
                ));
            }
        }
        if doc.root_container(bounds.start.node) != doc.root_container(bounds.end.node) {
            return Err(DomError::invalid_state("range boundaries live in different trees"));
        }
        Ok(bounds)
    }

    /// Whether every cached boundary is still usable with `doc`.
    pub fn is_valid(&self, doc: &Document) -> bool {
        self.assert_valid(doc).is_ok()
    }

    fn assert_node(&self, doc: &Document, node: NodeId) -> DomResult<()> {
        if self.document != doc.id() {
            return Err(DomError::WrongDocument);
        }
        doc.ensure(node)
    }

    fn assert_same_tree(&self, doc: &Document, bounds: &Bounds, node: NodeId) -> DomResult<()> {
        self.assert_node(doc, node)?;
        if doc.root_container(node) != doc.root_container(bounds.start.node) {
            return Err(DomError::WrongDocument);
        }
        Ok(())
    }

    fn checked_point(&self, doc: &Document, node: NodeId, offset: usize) -> DomResult<BoundaryPoint> {
        self.assert_node(doc, node)?;
        if doc.has_doctype_ancestor(node) {
            return Err(DomError::InvalidNodeType);
        }
        let length = doc.node_length(node);
        if offset > length {
            return Err(DomError::IndexSize { offset, length });
        }
        Ok(BoundaryPoint::new(node, offset))
    }

    fn update(&mut self, doc: &Document, start: BoundaryPoint, end: BoundaryPoint) -> DomResult<()> {
        let common_ancestor = doc
            .common_ancestor(start.node, end.node)
            .ok_or_else(|| DomError::hierarchy("range boundaries share no common ancestor"))?;
        self.bounds = Some(Bounds {
            start,
            end,
            common_ancestor,
        });
        tracing::trace!(target: "loom::range", range = %self.inspect(doc), "boundaries updated");
        Ok(())
    }

    // === Boundary setters ===

    /// Move the start. If the end would end up before it, or in another
    /// tree, the range collapses to the new start.
    fn set_start_point(&mut self, doc: &Document, point: BoundaryPoint) -> DomResult<()> {
        let bounds = self.bounds()?;
        let mut end = bounds.end;
        if doc.root_container(point.node) != doc.root_container(end.node)
            || compare_points(doc, point, end)? == Ordering::Greater
        {
            end = point;
        }
        self.update(doc, point, end)
    }

    /// Mirror of [`set_start_point`](Self::set_start_point).
    fn set_end_point(&mut self, doc: &Document, point: BoundaryPoint) -> DomResult<()> {
        let bounds = self.bounds()?;
        let mut start = bounds.start;
        if doc.root_container(point.node) != doc.root_container(start.node)
            || compare_points(doc, point, start)? == Ordering::Less
        {
            start = point;
        }
        self.update(doc, start, point)
    }

    pub fn set_start(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        let point = self.checked_point(doc, node, offset)?;
        self.set_start_point(doc, point)
    }

    pub fn set_end(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        let point = self.checked_point(doc, node, offset)?;
        self.set_end_point(doc, point)
    }

    /// Set both boundaries at once. An inverted pair collapses to `end`.
    pub fn set_start_and_end(
        &mut self,
        doc: &Document,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<()> {
        let start = self.checked_point(doc, start.node, start.offset)?;
        let end = self.checked_point(doc, end.node, end.offset)?;
        self.bounds()?;
        if doc.root_container(start.node) != doc.root_container(end.node)
            || compare_points(doc, start, end)? == Ordering::Greater
        {
            return self.update(doc, end, end);
        }
        self.update(doc, start, end)
    }

    fn point_beside(&self, doc: &Document, node: NodeId, after: bool) -> DomResult<BoundaryPoint> {
        self.assert_node(doc, node)?;
        if matches!(doc.kind(node), NodeKind::Document | NodeKind::Fragment) {
            return Err(DomError::InvalidNodeType);
        }
        if after {
            BoundaryPoint::after(doc, node)
        } else {
            BoundaryPoint::before(doc, node)
        }
    }

    pub fn set_start_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let point = self.point_beside(doc, node, false)?;
        self.set_start_point(doc, point)
    }

    pub fn set_start_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let point = self.point_beside(doc, node, true)?;
        self.set_start_point(doc, point)
    }

    pub fn set_end_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let point = self.point_beside(doc, node, false)?;
        self.set_end_point(doc, point)
    }

    pub fn set_end_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let point = self.point_beside(doc, node, true)?;
        self.set_end_point(doc, point)
    }

    /// Collapse onto one of the current boundaries.
    pub fn collapse(&mut self, to_start: bool) -> DomResult<()> {
        let bounds = self.bounds()?;
        let point = if to_start { bounds.start } else { bounds.end };
        self.bounds = Some(Bounds {
            start: point,
            end: point,
            common_ancestor: point.node,
        });
        Ok(())
    }

    /// Collapse onto an arbitrary point.
    pub fn collapse_to_point(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        let point = self.checked_point(doc, node, offset)?;
        self.bounds()?;
        self.update(doc, point, point)
    }

    /// Collapse to the point just before `node`.
    pub fn collapse_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_end_before(doc, node)?;
        self.collapse(false)
    }

    /// Collapse to the point just after `node`.
    pub fn collapse_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_start_after(doc, node)?;
        self.collapse(true)
    }

    /// Select `node` itself, as a child of its parent.
    pub fn select_node(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let start = self.point_beside(doc, node, false)?;
        let end = BoundaryPoint::after(doc, node)?;
        self.bounds()?;
        self.update(doc, start, end)
    }

    /// Select everything inside `node`.
    pub fn select_node_contents(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.assert_node(doc, node)?;
        if doc.has_doctype_ancestor(node) {
            return Err(DomError::InvalidNodeType);
        }
        self.bounds()?;
        self.update(
            doc,
            BoundaryPoint::new(node, 0),
            BoundaryPoint::new(node, doc.node_length(node)),
        )
    }

    /// Drop the boundaries. Every later operation except `detach` fails.
    pub fn detach(&mut self) {
        if self.bounds.take().is_some() {
            tracing::trace!(target: "loom::range", "range detached");
        }
    }

    // === Comparison ===

    /// Compare one boundary of `self` with one boundary of `other`.
    pub fn compare_boundary_points(
        &self,
        doc: &Document,
        how: How,
        other: &Range,
    ) -> DomResult<Ordering> {
        let ours = self.assert_valid(doc)?;
        let theirs = other.assert_valid(doc)?;
        if doc.root_container(ours.start.node) != doc.root_container(theirs.start.node) {
            return Err(DomError::WrongDocument);
        }
        let (a, b) = match how {
            How::StartToStart => (ours.start, theirs.start),
            How::StartToEnd => (ours.end, theirs.start),
            How::EndToEnd => (ours.end, theirs.end),
            How::EndToStart => (ours.start, theirs.end),
        };
        compare_points(doc, a, b)
    }

    /// `Less` before the range, `Greater` after it, `Equal` inside or on a boundary.
    pub fn compare_point(&self, doc: &Document, node: NodeId, offset: usize) -> DomResult<Ordering> {
        let bounds = self.assert_valid(doc)?;
        self.assert_same_tree(doc, &bounds, node)?;
        let length = doc.node_length(node);
        if offset > length {
            return Err(DomError::IndexSize { offset, length });
        }
        let point = BoundaryPoint::new(node, offset);
        if compare_points(doc, point, bounds.start)? == Ordering::Less {
            Ok(Ordering::Less)
        } else if compare_points(doc, point, bounds.end)? == Ordering::Greater {
            Ok(Ordering::Greater)
        } else {
            Ok(Ordering::Equal)
        }
    }

    pub fn is_point_in_range(&self, doc: &Document, node: NodeId, offset: usize) -> DomResult<bool> {
        Ok(self.compare_point(doc, node, offset)? == Ordering::Equal)
    }

    /// Position of `node` relative to the range.
    pub fn compare_node(&self, doc: &Document, node: NodeId) -> DomResult<NodePosition> {
        let bounds = self.assert_valid(doc)?;
        self.assert_same_tree(doc, &bounds, node)?;
        let parent = doc
            .parent(node)
            .ok_or_else(|| DomError::not_found("node has no parent"))?;
        let index = doc.index_of(node);
        let starts_before = self.compare_point(doc, parent, index)? == Ordering::Less;
        let ends_after = self.compare_point(doc, parent, index + 1)? == Ordering::Greater;
        Ok(match (starts_before, ends_after) {
            (true, true) => NodePosition::BeforeAndAfter,
            (true, false) => NodePosition::Before,
            (false, true) => NodePosition::After,
            (false, false) => NodePosition::Inside,
        })
    }

    /// Whether the ranges overlap. With `touching`, sharing a boundary counts.
    pub fn intersects_range(&self, doc: &Document, other: &Range, touching: bool) -> DomResult<bool> {
        let ours = self.assert_valid(doc)?;
        let theirs = other.assert_valid(doc)?;
        if other.document != self.document {
            return Err(DomError::WrongDocument);
        }
        let start_cmp = compare_points(doc, ours.start, theirs.end)?;
        let end_cmp = compare_points(doc, ours.end, theirs.start)?;
        Ok(if touching {
            start_cmp != Ordering::Greater && end_cmp != Ordering::Less
        } else {
            start_cmp == Ordering::Less && end_cmp == Ordering::Greater
        })
    }

    /// The overlap of two ranges, or `None` if they don't strictly intersect.
    pub fn intersection(&self, doc: &Document, other: &Range) -> DomResult<Option<Range>> {
        if !self.intersects_range(doc, other, false)? {
            return Ok(None);
        }
        let ours = self.assert_valid(doc)?;
        let theirs = other.assert_valid(doc)?;
        let mut result = self.clone();
        if compare_points(doc, ours.start, theirs.start)? == Ordering::Less {
            result.set_start_point(doc, theirs.start)?;
        }
        if compare_points(doc, ours.end, theirs.end)? == Ordering::Greater {
            result.set_end_point(doc, theirs.end)?;
        }
        Ok(Some(result))
    }

    /// The smallest range covering both, or `None` if they neither overlap nor touch.
    pub fn union(&self, doc: &Document, other: &Range) -> DomResult<Option<Range>> {
        if !self.intersects_range(doc, other, true)? {
            return Ok(None);
        }
        let ours = self.assert_valid(doc)?;
        let theirs = other.assert_valid(doc)?;
        let mut result = self.clone();
        if compare_points(doc, theirs.start, ours.start)? == Ordering::Less {
            result.set_start_point(doc, theirs.start)?;
        }
        if compare_points(doc, theirs.end, ours.end)? == Ordering::Greater {
            result.set_end_point(doc, theirs.end)?;
        }
        Ok(Some(result))
    }

    /// Whether any part of `node` lies within the range.
    ///
    /// A node from another tree never intersects.
    pub fn intersects_node(&self, doc: &Document, node: NodeId, touching: bool) -> DomResult<bool> {
        let bounds = self.assert_valid(doc)?;
        if !doc.contains(node) || doc.root_container(node) != doc.root_container(bounds.start.node) {
            return Ok(false);
        }
        let parent = doc
            .parent(node)
            .ok_or_else(|| DomError::not_found("node has no parent"))?;
        let index = doc.index_of(node);
        let start_cmp = compare_points(doc, BoundaryPoint::new(parent, index), bounds.end)?;
        let end_cmp = compare_points(doc, BoundaryPoint::new(parent, index + 1), bounds.start)?;
        Ok(if touching {
            start_cmp != Ordering::Greater && end_cmp != Ordering::Less
        } else {
            start_cmp == Ordering::Less && end_cmp == Ordering::Greater
        })
    }

    /// Whether `node` is inside the range; with `allow_partial`, any overlap counts.
    pub fn contains_node(&self, doc: &Document, node: NodeId, allow_partial: bool) -> DomResult<bool> {
        if allow_partial {
            self.intersects_node(doc, node, false)
        } else {
            Ok(self.compare_node(doc, node)? == NodePosition::Inside)
        }
    }

    /// Whether all of `node`'s contents are inside the range.
    pub fn contains_node_contents(&self, doc: &Document, node: NodeId) -> DomResult<bool> {
        Ok(self.compare_point(doc, node, 0)? != Ordering::Less
            && self.compare_point(doc, node, doc.node_length(node))? != Ordering::Greater)
    }

    /// Whether `other` lies entirely within this range.
    pub fn contains_range(&self, doc: &Document, other: &Range) -> DomResult<bool> {
        Ok(self
            .intersection(doc, other)?
            .is_some_and(|overlap| overlap == *other))
    }

    /// Whether every text node under `node` is fully inside the range.
    ///
    /// Falls back to `contains_node` when `node` holds no text.
    pub fn contains_node_text(&self, doc: &Document, node: NodeId) -> DomResult<bool> {
        let mut text_nodes = doc.descendants(node).filter(|n| doc.is_text(*n));
        match text_nodes.next() {
            Some(first) => {
                let last = text_nodes.last().unwrap_or(first);
                let mut whole = Range::new(doc);
                whole.set_start(doc, first, 0)?;
                whole.set_end(doc, last, doc.node_length(last))?;
                self.contains_range(doc, &whole)
            }
            None => self.contains_node(doc, node, true),
        }
    }

    // === Traversal ===

    pub fn iter(&self, doc: &Document) -> DomResult<RangeIterator> {
        RangeIterator::new(doc, self)
    }

    /// Every node touched by the range that passes `filter`, in document order.
    pub fn nodes(
        &self,
        doc: &Document,
        mut filter: impl FnMut(&Document, NodeId) -> bool,
    ) -> DomResult<Vec<NodeId>> {
        let mut iter = self.iter(doc)?;
        let mut nodes = Vec::new();
        let _ = iterate_subtree(doc, &mut iter, &mut |doc, node| {
            if filter(doc, node) {
                nodes.push(node);
            }
            ControlFlow::Continue(())
        });
        Ok(nodes)
    }

    pub fn text_nodes(&self, doc: &Document) -> DomResult<Vec<NodeId>> {
        self.nodes(doc, |doc, node| doc.is_text(node))
    }

    /// The selected text. Only text nodes contribute.
    pub fn text(&self, doc: &Document) -> DomResult<String> {
        let mut iter = self.iter(doc)?;
        let spans = iter.clone();
        let mut out = String::new();
        let _ = iterate_subtree(doc, &mut iter, &mut |doc, node| {
            if let NodeData::Text(data) = doc.data(node) {
                let (from, to) = spans.selected_span(doc, node);
                out.extend(data.chars().skip(from).take(to - from));
            }
            ControlFlow::Continue(())
        });
        Ok(out)
    }

    /// Serialized copy of the range contents.
    ///
    /// The copy is made in `doc`'s arena and left detached.
    pub fn to_html(&self, doc: &mut Document) -> DomResult<String> {
        let fragment = self.clone_contents(doc)?;
        Ok(doc.inner_html(fragment))
    }

    /// Short human-readable description, for logs and assertion messages.
    pub fn inspect(&self, doc: &Document) -> String {
        let Some(bounds) = self.bounds else {
            return "Range[detached]".to_string();
        };
        if self.document != doc.id()
            || !bounds.start.is_within_bounds(doc)
            || !bounds.end.is_within_bounds(doc)
        {
            return "Range[invalid]".to_string();
        }
        format!(
            "Range[{}:{}, {}:{}]",
            describe_node(doc, bounds.start.node),
            bounds.start.offset,
            describe_node(doc, bounds.end.node),
            bounds.end.offset
        )
    }

    // === Content mutation ===

    /// Deep copy of the selected content into a new fragment.
    ///
    /// Partially selected ancestors are copied shallowly and boundary
    /// character data is trimmed. The document tree is left untouched.
    pub fn clone_contents(&self, doc: &mut Document) -> DomResult<NodeId> {
        let bounds = self.assert_valid(doc)?;
        let mut iter = RangeIterator::from_bounds(doc, bounds);
        clone_subtree(doc, &mut iter)
    }

    /// Move the selected content into a new fragment and collapse the range
    /// where the content used to be.
    pub fn extract_contents(&mut self, doc: &mut Document) -> DomResult<NodeId> {
        let fragment = self.remove_contents(doc, true)?;
        fragment.ok_or_else(|| DomError::invalid_state("extraction produced no fragment"))
    }

    /// Remove the selected content and collapse the range.
    pub fn delete_contents(&mut self, doc: &mut Document) -> DomResult<()> {
        self.remove_contents(doc, false).map(|_| ())
    }

    fn remove_contents(&mut self, doc: &mut Document, extract: bool) -> DomResult<Option<NodeId>> {
        let bounds = self.assert_valid(doc)?;
        let root = bounds.common_ancestor;

        // The range collapses just after the start's top-level ancestor under
        // the common ancestor, which always survives the removal.
        let mut collapse_to = bounds.start;
        if bounds.start.node != root
            && let Some(top) = doc.closest_ancestor_in(bounds.start.node, root, true)
        {
            collapse_to = BoundaryPoint::after(doc, top)?;
        }

        let mut iter = RangeIterator::from_bounds(doc, bounds);
        let mut read_only = None;
        let _ = iterate_subtree(doc, &mut iter, &mut |doc, node| {
            if doc.readonly_ancestor(node).is_some() {
                read_only = Some(node);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        if let Some(node) = read_only {
            tracing::debug!(target: "loom::range", ?node, "refusing to remove read-only content");
            return Err(DomError::NoModification);
        }
        iter.reset();

        let fragment = if extract {
            Some(extract_subtree(doc, &mut iter)?)
        } else {
            delete_subtree(doc, &mut iter)?;
            None
        };
        tracing::debug!(target: "loom::range", extract, ?collapse_to, "removed range contents");
        self.update(doc, collapse_to, collapse_to)?;
        Ok(fragment)
    }

    /// Insert `node` at the start of the range.
    ///
    /// Character data at the start is split when the start falls inside it.
    /// Afterwards the range starts just before the inserted content; a
    /// collapsed range grows to cover it.
    pub fn insert_node(&mut self, doc: &mut Document, node: NodeId) -> DomResult<()> {
        let bounds = self.assert_valid(doc)?;
        doc.ensure(node)?;
        if doc.kind(node) == NodeKind::Document {
            return Err(DomError::InvalidNodeType);
        }
        assert_not_read_only(doc, bounds.start.node)?;
        if doc.is_ancestor_of(node, bounds.start.node, true) {
            return Err(DomError::hierarchy("cannot insert a node inside itself"));
        }

        let collapsed = bounds.start == bounds.end;
        let end_anchor = Anchor::of(doc, bounds.end);
        let Some(inserted) = insert_at_point(doc, node, bounds.start)? else {
            return Ok(());
        };

        let start = BoundaryPoint::before(doc, inserted.first)?;
        let after_last = BoundaryPoint::after(doc, inserted.last)?;
        let end = if collapsed {
            after_last
        } else {
            let resolved = match (end_anchor, inserted.split_tail) {
                (Anchor::Data(point), Some(tail)) if point.node == bounds.start.node => Some(
                    BoundaryPoint::new(tail, point.offset.saturating_sub(bounds.start.offset)),
                ),
                (anchor, _) => anchor.resolve(doc),
            };
            match resolved {
                Some(end) if compare_points(doc, start, end)? != Ordering::Greater => end,
                _ => after_last,
            }
        };
        tracing::debug!(target: "loom::range", ?node, "inserted node at range start");
        self.update(doc, start, end)
    }

    /// Whether no non-text node is partially selected, so the contents can
    /// be wrapped in a single element.
    pub fn can_surround_contents(&self, doc: &Document) -> DomResult<bool> {
        let bounds = self.assert_valid(doc)?;
        assert_not_read_only(doc, bounds.start.node)?;
        assert_not_read_only(doc, bounds.end.node)?;
        let mut iter = RangeIterator::from_bounds(doc, bounds);
        let partial =
            |node: NodeId| is_partially_selected(doc, node, bounds.start, bounds.end);
        let mut first = true;
        let mut last = None;
        while let Some(node) = iter.next(doc) {
            if first && partial(node) {
                return Ok(false);
            }
            first = false;
            last = Some(node);
        }
        Ok(!last.is_some_and(partial))
    }

    /// Move the contents into `wrapper` and put `wrapper` where they were.
    ///
    /// Any existing children of `wrapper` are dropped. Afterwards the range
    /// selects `wrapper`.
    pub fn surround_contents(&mut self, doc: &mut Document, wrapper: NodeId) -> DomResult<()> {
        self.assert_node(doc, wrapper)?;
        if matches!(
            doc.kind(wrapper),
            NodeKind::Document | NodeKind::DocType | NodeKind::Fragment
        ) {
            return Err(DomError::InvalidNodeType);
        }
        if !self.can_surround_contents(doc)? {
            return Err(DomError::BadBoundaryPoints);
        }

        let contents = self.extract_contents(doc)?;
        for child in doc.children(wrapper).to_vec() {
            doc.remove(child);
        }
        let point = self.bounds()?.start;
        insert_at_point(doc, wrapper, point)?;
        doc.append_child(wrapper, contents)?;
        self.select_node(doc, wrapper)
    }

    /// Split character data at both boundaries so each boundary sits at an
    /// edge of a text node.
    pub fn split_boundaries(&mut self, doc: &mut Document) -> DomResult<()> {
        let bounds = self.assert_valid(doc)?;
        let BoundaryPoint {
            node: mut sc,
            offset: mut so,
        } = bounds.start;
        let BoundaryPoint {
            node: mut ec,
            offset: mut eo,
        } = bounds.end;
        let same_container = sc == ec;

        if doc.is_character_data(ec) && eo > 0 && eo < doc.node_length(ec) {
            doc.split_data(ec, eo)?;
        }
        if doc.is_character_data(sc) && so > 0 && so < doc.node_length(sc) {
            let tail = doc.split_data(sc, so)?;
            if same_container {
                eo -= so;
                ec = tail;
            } else if doc.parent(tail) == Some(ec) && eo >= doc.index_of(tail) {
                eo += 1;
            }
            sc = tail;
            so = 0;
        }
        tracing::trace!(target: "loom::range", "split range boundaries");
        self.update(doc, BoundaryPoint::new(sc, so), BoundaryPoint::new(ec, eo))
    }

    /// Merge adjacent character data of the same kind at both boundaries,
    /// undoing `split_boundaries`.
    pub fn normalize_boundaries(&mut self, doc: &mut Document) -> DomResult<()> {
        let bounds = self.assert_valid(doc)?;
        let BoundaryPoint {
            node: mut sc,
            offset: mut so,
        } = bounds.start;
        let BoundaryPoint {
            node: mut ec,
            offset: mut eo,
        } = bounds.end;

        // End: fold the following sibling into the node ending at the boundary.
        let end_node = if doc.is_character_data(ec) {
            (eo == doc.node_length(ec)).then_some(ec)
        } else {
            eo.checked_sub(1)
                .and_then(|index| doc.child_at(ec, index))
                .filter(|node| doc.is_character_data(*node))
        };
        if let Some(node) = end_node
            && let Some(sibling) = doc
                .next_sibling(node)
                .filter(|sibling| doc.kind(*sibling) == doc.kind(node))
        {
            let node_length = doc.node_length(node);
            let sibling_index = doc.index_of(sibling);
            let parent = doc.parent(node);
            let data = doc.character_data(sibling).unwrap_or_default().to_string();
            doc.append_data(node, &data)?;
            doc.remove(sibling);

            if sc == sibling {
                sc = node;
                so += node_length;
            } else if Some(sc) == parent {
                if so == sibling_index {
                    sc = node;
                    so = node_length;
                } else if so > sibling_index {
                    so -= 1;
                }
            }
            ec = node;
            eo = node_length;
        }

        // Start: fold the preceding sibling into the node starting at the boundary.
        let start_node = if doc.is_character_data(sc) {
            (so == 0).then_some(sc)
        } else {
            doc.child_at(sc, so)
                .filter(|node| doc.is_character_data(*node))
        };
        if let Some(node) = start_node
            && let Some(sibling) = doc
                .previous_sibling(node)
                .filter(|sibling| doc.kind(*sibling) == doc.kind(node))
        {
            let sibling_length = doc.node_length(sibling);
            let node_index = doc.index_of(node);
            let parent = doc.parent(node);
            let data = doc.character_data(sibling).unwrap_or_default().to_string();
            doc.insert_data(node, 0, &data)?;
            doc.remove(sibling);

            if ec == node {
                eo += sibling_length;
            } else if ec == sibling {
                ec = node;
            } else if Some(ec) == parent {
                if eo == node_index {
                    ec = node;
                    eo = sibling_length;
                } else if eo > node_index {
                    eo -= 1;
                }
            }
            sc = node;
            so = sibling_length;
        }
        tracing::trace!(target: "loom::range", "normalized range boundaries");
        self.update(doc, BoundaryPoint::new(sc, so), BoundaryPoint::new(ec, eo))
    }
}

fn assert_not_read_only(doc: &Document, node: NodeId) -> DomResult<()> {
    match doc.readonly_ancestor(node) {
        Some(_) => Err(DomError::NoModification),
        None => Ok(()),
    }
}

fn describe_node(doc: &Document, node: NodeId) -> String {
    match doc.data(node) {
        NodeData::Document => "#document".to_string(),
        NodeData::Fragment => "#fragment".to_string(),
        NodeData::Element(element) => format!("<{}>", element.name),
        NodeData::Text(text) => format!("{text:?}"),
        NodeData::Comment(text) => format!("<!--{text}-->"),
        NodeData::DocType(name) => format!("<!DOCTYPE {name}>"),
    }
}

/// A boundary pinned to nodes rather than child indices, so it can be
/// recovered after siblings are inserted in front of it.
#[derive(Debug, Clone, Copy)]
enum Anchor {
    Data(BoundaryPoint),
    Before(NodeId),
    AtEnd(NodeId),
}

impl Anchor {
    fn of(doc: &Document, point: BoundaryPoint) -> Self {
        if doc.is_character_data(point.node) {
            return Anchor::Data(point);
        }
        match doc.child_at(point.node, point.offset) {
            Some(child) => Anchor::Before(child),
            None => Anchor::AtEnd(point.node),
        }
    }

    fn resolve(self, doc: &Document) -> Option<BoundaryPoint> {
        match self {
            Anchor::Data(point) => Some(point),
            Anchor::Before(child) => BoundaryPoint::before(doc, child).ok(),
            Anchor::AtEnd(node) => Some(BoundaryPoint::new(node, doc.child_count(node))),
        }
    }
}

struct Inserted {
    first: NodeId,
    last: NodeId,
    split_tail: Option<NodeId>,
}

/// Insert `node` at `point`, splitting character data when needed.
///
/// Returns `None` when `node` is an empty fragment.
fn insert_at_point(doc: &mut Document, node: NodeId, point: BoundaryPoint) -> DomResult<Option<Inserted>> {
    let (first, last) = if doc.kind(node) == NodeKind::Fragment {
        match (doc.first_child(node), doc.last_child(node)) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok(None),
        }
    } else {
        (node, node)
    };

    let mut split_tail = None;
    if doc.is_character_data(point.node) {
        let parent = doc
            .parent(point.node)
            .ok_or_else(|| DomError::hierarchy("character data without a parent"))?;
        if point.offset == doc.node_length(point.node) {
            doc.insert_after(node, point.node)?;
        } else if point.offset == 0 {
            doc.insert_before(parent, node, Some(point.node))?;
        } else {
            let tail = doc.split_data(point.node, point.offset)?;
            doc.insert_before(parent, node, Some(tail))?;
            split_tail = Some(tail);
        }
    } else {
        let reference = doc.child_at(point.node, point.offset);
        doc.insert_before(point.node, node, reference)?;
    }
    Ok(Some(Inserted {
        first,
        last,
        split_tail,
    }))
}
