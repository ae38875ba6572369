//! Boundary points and their total order.

use std::cmp::Ordering;

use loom_dom::{Document, DomError, DomResult, NodeId};

/// A position inside or between nodes.
///
/// For character data the offset counts chars, otherwise it counts children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    /// The point just before `node` in its parent.
    pub fn before(doc: &Document, node: NodeId) -> DomResult<Self> {
        let parent = doc.parent(node).ok_or(DomError::InvalidNodeType)?;
        Ok(Self::new(parent, doc.index_of(node)))
    }

    /// The point just after `node` in its parent.
    pub fn after(doc: &Document, node: NodeId) -> DomResult<Self> {
        let parent = doc.parent(node).ok_or(DomError::InvalidNodeType)?;
        Ok(Self::new(parent, doc.index_of(node) + 1))
    }

    /// Whether the offset is within the node's current capacity.
    pub fn is_within_bounds(&self, doc: &Document) -> bool {
        doc.contains(self.node) && self.offset <= doc.node_length(self.node)
    }

    pub fn compare(&self, doc: &Document, other: &BoundaryPoint) -> DomResult<Ordering> {
        compare_points(doc, *self, *other)
    }
}

/// Order two boundary points sharing a root.
///
/// The cases are tried in a fixed order:
/// 1. same container: compare offsets;
/// 2. `b` lies inside `a`'s container: compare `a`'s offset with the index of
///    the child of `a`'s container that leads to `b`;
/// 3. the mirror of 2;
/// 4. otherwise compare the children of the common ancestor that lead to each point.
pub fn compare_points(doc: &Document, a: BoundaryPoint, b: BoundaryPoint) -> DomResult<Ordering> {
    if a.node == b.node {
        return Ok(a.offset.cmp(&b.offset));
    }

    if let Some(child) = doc.closest_ancestor_in(b.node, a.node, true) {
        return Ok(if a.offset <= doc.index_of(child) {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    if let Some(child) = doc.closest_ancestor_in(a.node, b.node, true) {
        return Ok(if doc.index_of(child) < b.offset {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    let root = doc
        .common_ancestor(a.node, b.node)
        .ok_or_else(|| DomError::hierarchy("boundary points share no common ancestor"))?;
    let child_a = doc.closest_ancestor_in(a.node, root, true);
    let child_b = doc.closest_ancestor_in(b.node, root, true);
    match (child_a, child_b) {
        (Some(child_a), Some(child_b)) if child_a != child_b => {
            Ok(doc.index_of(child_a).cmp(&doc.index_of(child_b)))
        }
        _ => Err(DomError::hierarchy(
            "boundary points resolve to the same child of their common ancestor",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Document, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let doc = Document::from_markup("<div>ab<span>cd</span>ef</div>").unwrap();
        let div = doc.first_child(doc.root()).unwrap();
        let ab = doc.child_at(div, 0).unwrap();
        let span = doc.child_at(div, 1).unwrap();
        let cd = doc.first_child(span).unwrap();
        let ef = doc.child_at(div, 2).unwrap();
        (doc, div, ab, span, cd, ef)
    }

    #[test]
    fn test_container_before_child_container() {
        let (doc, div, _, span, _, _) = fixture();
        let a = BoundaryPoint::new(div, 0);
        let b = BoundaryPoint::new(span, 0);
        assert_eq!(compare_points(&doc, a, b), Ok(Ordering::Less));
        assert_eq!(compare_points(&doc, b, a), Ok(Ordering::Greater));
    }

    #[test]
    fn test_offset_equal_to_child_index_is_before() {
        let (doc, div, _, span, cd, _) = fixture();
        // (div, 1) sits right before span, so before anything inside it.
        let a = BoundaryPoint::new(div, 1);
        assert_eq!(compare_points(&doc, a, BoundaryPoint::new(cd, 0)), Ok(Ordering::Less));
        // (div, 2) sits after span.
        let a = BoundaryPoint::new(div, 2);
        assert_eq!(
            compare_points(&doc, a, BoundaryPoint::new(span, 1)),
            Ok(Ordering::Greater)
        );
    }

    #[test]
    fn test_siblings_ordered_through_common_ancestor() {
        let (doc, _, ab, _, cd, ef) = fixture();
        let a = BoundaryPoint::new(ab, 2);
        let c = BoundaryPoint::new(cd, 0);
        let e = BoundaryPoint::new(ef, 0);
        assert_eq!(compare_points(&doc, a, c), Ok(Ordering::Less));
        assert_eq!(compare_points(&doc, e, c), Ok(Ordering::Greater));
        assert_eq!(compare_points(&doc, c, c), Ok(Ordering::Equal));
    }

    #[test]
    fn test_antisymmetry_over_every_point() {
        let (doc, div, ..) = fixture();
        let mut points = Vec::new();
        for node in doc.descendants(div) {
            for offset in 0..=doc.node_length(node) {
                points.push(BoundaryPoint::new(node, offset));
            }
        }
        for a in &points {
            assert_eq!(compare_points(&doc, *a, *a), Ok(Ordering::Equal));
            for b in &points {
                let ab = compare_points(&doc, *a, *b).unwrap();
                let ba = compare_points(&doc, *b, *a).unwrap();
                assert_eq!(ab, ba.reverse(), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_disjoint_trees_are_hierarchy_error() {
        let (mut doc, div, ..) = fixture();
        let loose = doc.create_element("p");
        let err = compare_points(&doc, BoundaryPoint::new(div, 0), BoundaryPoint::new(loose, 0))
            .unwrap_err();
        assert!(matches!(err, DomError::Hierarchy(_)));
    }

    #[test]
    fn test_before_and_after() {
        let (doc, div, _, span, ..) = fixture();
        assert_eq!(BoundaryPoint::before(&doc, span), Ok(BoundaryPoint::new(div, 1)));
        assert_eq!(BoundaryPoint::after(&doc, span), Ok(BoundaryPoint::new(div, 2)));
        assert_eq!(
            BoundaryPoint::before(&doc, doc.root()),
            Err(DomError::InvalidNodeType)
        );
    }
}
