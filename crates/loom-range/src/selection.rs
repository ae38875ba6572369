//! Selection abstraction over a set of ranges.
//!
//! The annotation layer never talks to a platform selection directly. It
//! reads and writes ranges through [`SelectionHost`], so the same logic can
//! drive a browser selection, a native text view, or the in-memory
//! [`Selection`] used in tests.

use loom_dom::{Document, DomError, DomResult, NodeId};

use crate::boundary::BoundaryPoint;
use crate::range::Range;

/// Platform-specific selection storage.
///
/// Implementations hand out copies of their ranges and accept a new set
/// wholesale. `backwards` records that the focus precedes the anchor.
pub trait SelectionHost {
    /// Current ranges, in the order the platform reports them.
    fn ranges(&self) -> Vec<Range>;

    /// Replace every range.
    fn set_ranges(&mut self, ranges: Vec<Range>, backwards: bool);

    fn is_backwards(&self) -> bool {
        false
    }
}

/// In-memory selection: an ordered list of ranges plus a direction flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<Range>,
    backwards: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection holding a single range.
    pub fn from_range(range: Range) -> Self {
        Self {
            ranges: vec![range],
            backwards: false,
        }
    }

    /// Append a range. Detached or stale ranges are rejected.
    pub fn add_range(&mut self, doc: &Document, range: Range) -> DomResult<()> {
        range.assert_valid(doc)?;
        self.ranges.push(range);
        Ok(())
    }

    pub fn remove_all_ranges(&mut self) {
        self.ranges.clear();
        self.backwards = false;
    }

    pub fn range_at(&self, index: usize) -> DomResult<&Range> {
        self.ranges.get(index).ok_or(DomError::IndexSize {
            offset: index,
            length: self.ranges.len(),
        })
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Where the selection started, taken from the last range.
    pub fn anchor(&self) -> Option<BoundaryPoint> {
        let last = self.ranges.last()?;
        if self.backwards {
            last.end().ok()
        } else {
            last.start().ok()
        }
    }

    /// Where the selection is being extended to, taken from the last range.
    pub fn focus(&self) -> Option<BoundaryPoint> {
        let last = self.ranges.last()?;
        if self.backwards {
            last.start().ok()
        } else {
            last.end().ok()
        }
    }

    /// An empty selection counts as collapsed.
    pub fn is_collapsed(&self) -> bool {
        self.ranges.iter().all(Range::is_collapsed)
    }

    /// Replace everything with a caret at `(node, offset)`.
    pub fn collapse(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        let mut range = Range::new(doc);
        range.collapse_to_point(doc, node, offset)?;
        self.ranges = vec![range];
        self.backwards = false;
        Ok(())
    }

    /// Collapse to the start of the first range.
    pub fn collapse_to_start(&mut self, doc: &Document) -> DomResult<()> {
        let first = self
            .ranges
            .first()
            .ok_or_else(|| DomError::invalid_state("selection has no ranges"))?;
        let point = first.start()?;
        self.collapse(doc, point.node, point.offset)
    }

    /// Collapse to the end of the last range.
    pub fn collapse_to_end(&mut self, doc: &Document) -> DomResult<()> {
        let last = self
            .ranges
            .last()
            .ok_or_else(|| DomError::invalid_state("selection has no ranges"))?;
        let point = last.end()?;
        self.collapse(doc, point.node, point.offset)
    }

    /// Select every child of `node`.
    pub fn select_all_children(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let range = Range::from_node_contents(doc, node)?;
        self.ranges = vec![range];
        self.backwards = false;
        Ok(())
    }

    /// Whether any range contains `node`; with `allow_partial`, any overlap counts.
    pub fn contains_node(&self, doc: &Document, node: NodeId, allow_partial: bool) -> DomResult<bool> {
        for range in &self.ranges {
            if range.contains_node(doc, node, allow_partial)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete the contents of every range, leaving a caret where the first
    /// range was.
    pub fn delete_from_document(&mut self, doc: &mut Document) -> DomResult<()> {
        // Later ranges go first so earlier boundaries keep their offsets.
        for range in self.ranges.iter_mut().rev() {
            range.delete_contents(doc)?;
        }
        self.ranges.truncate(1);
        self.backwards = false;
        tracing::debug!(target: "loom::range", "deleted selection contents");
        Ok(())
    }

    /// Text of every range, concatenated.
    pub fn text(&self, doc: &Document) -> DomResult<String> {
        let mut out = String::new();
        for range in &self.ranges {
            out.push_str(&range.text(doc)?);
        }
        Ok(out)
    }
}

impl SelectionHost for Selection {
    fn ranges(&self) -> Vec<Range> {
        self.ranges.clone()
    }

    fn set_ranges(&mut self, ranges: Vec<Range>, backwards: bool) {
        self.ranges = ranges;
        self.backwards = backwards && !self.ranges.is_empty();
    }

    fn is_backwards(&self) -> bool {
        self.backwards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Document, NodeId) {
        let doc = Document::from_markup("<p>hello <b>bold</b> world</p>").unwrap();
        let p = doc.first_child(doc.root()).unwrap();
        (doc, p)
    }

    #[test]
    fn test_anchor_and_focus_follow_direction() {
        let (doc, p) = fixture();
        let hello = doc.first_child(p).unwrap();
        let range = Range::from_points(
            &doc,
            BoundaryPoint::new(hello, 1),
            BoundaryPoint::new(hello, 4),
        )
        .unwrap();

        let mut selection = Selection::new();
        assert!(selection.is_collapsed());
        selection.set_ranges(vec![range], true);
        assert!(selection.is_backwards());
        assert_eq!(selection.anchor(), Some(BoundaryPoint::new(hello, 4)));
        assert_eq!(selection.focus(), Some(BoundaryPoint::new(hello, 1)));
        assert_eq!(selection.text(&doc).unwrap(), "ell");
        assert!(!selection.is_collapsed());
    }

    #[test]
    fn test_collapse_variants() {
        let (doc, p) = fixture();
        let mut selection = Selection::new();
        assert!(matches!(
            selection.collapse_to_start(&doc),
            Err(DomError::InvalidState(_))
        ));

        selection.select_all_children(&doc, p).unwrap();
        assert_eq!(selection.text(&doc).unwrap(), "hello bold world");
        selection.collapse_to_end(&doc).unwrap();
        assert!(selection.is_collapsed());
        assert_eq!(selection.focus(), Some(BoundaryPoint::new(p, 3)));

        assert!(matches!(
            selection.range_at(1),
            Err(DomError::IndexSize { offset: 1, length: 1 })
        ));
    }

    #[test]
    fn test_contains_and_delete() {
        let (mut doc, p) = fixture();
        let bold = doc.child_at(p, 1).unwrap();
        let hello = doc.first_child(p).unwrap();
        let world = doc.child_at(p, 2).unwrap();

        let mut selection = Selection::new();
        let range = Range::from_points(
            &doc,
            BoundaryPoint::new(hello, 5),
            BoundaryPoint::new(world, 1),
        )
        .unwrap();
        selection.add_range(&doc, range).unwrap();
        assert!(selection.contains_node(&doc, bold, false).unwrap());

        selection.delete_from_document(&mut doc).unwrap();
        assert_eq!(doc.outer_html(p), "<p>helloworld</p>");
        assert!(selection.is_collapsed());
    }

    #[test]
    fn test_add_range_rejects_detached() {
        let (doc, _) = fixture();
        let mut range = Range::new(&doc);
        range.detach();
        let mut selection = Selection::new();
        assert!(selection.add_range(&doc, range).is_err());
        assert_eq!(selection.range_count(), 0);
    }
}
