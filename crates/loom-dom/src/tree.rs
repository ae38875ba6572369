//! Tree primitives: ancestor walks, pre-order traversal, common ancestors.
//!
//! Every walk re-reads links from the arena at each step. Nothing here
//! caches structure beyond the next node to visit.

use crate::document::Document;
use crate::node::{NodeId, NodeKind};

/// Inclusive walk from a node up to its root.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

/// Inclusive pre-order walk of a subtree.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.following_node(current, self.root);
        Some(current)
    }
}

impl Document {
    /// `node`, its parent, its grandparent, and so on up to the root.
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(node),
        }
    }

    /// `node` followed by every descendant in document order.
    pub fn descendants(&self, node: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: node,
            next: Some(node),
        }
    }

    /// Next node in pre-order after `node`, without leaving the subtree at `root`.
    pub fn following_node(&self, node: NodeId, root: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first_child(node) {
            return Some(child);
        }
        let mut current = node;
        while current != root {
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent(current)?;
        }
        None
    }

    /// Whether `ancestor` contains `descendant`, optionally counting a node as its own ancestor.
    pub fn is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId, include_self: bool) -> bool {
        let start = if include_self {
            Some(descendant)
        } else {
            self.parent(descendant)
        };
        start.is_some_and(|start| self.ancestors(start).any(|node| node == ancestor))
    }

    /// The ancestor of `node` that is a direct child of `ancestor`, if any.
    pub fn closest_ancestor_in(
        &self,
        node: NodeId,
        ancestor: NodeId,
        include_self: bool,
    ) -> Option<NodeId> {
        let mut current = if include_self {
            Some(node)
        } else {
            self.parent(node)
        };
        while let Some(n) = current {
            let parent = self.parent(n);
            if parent == Some(ancestor) {
                return Some(n);
            }
            current = parent;
        }
        None
    }

    /// Nearest node that is an inclusive ancestor of both `a` and `b`.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let chain: Vec<NodeId> = self.ancestors(a).collect();
        self.ancestors(b).find(|node| chain.contains(node))
    }

    /// Topmost inclusive ancestor of `node`.
    pub fn root_container(&self, node: NodeId) -> NodeId {
        self.ancestors(node).last().unwrap_or(node)
    }

    /// A node is orphaned when its tree isn't rooted in a document or fragment.
    pub fn is_orphan(&self, node: NodeId) -> bool {
        !self.kind(self.root_container(node)).is_root_container()
    }

    /// Nearest inclusive ancestor flagged read-only.
    pub fn readonly_ancestor(&self, node: NodeId) -> Option<NodeId> {
        self.ancestors(node).find(|n| self.is_read_only(*n))
    }

    /// Whether `node` or one of its ancestors is a doctype.
    pub fn has_doctype_ancestor(&self, node: NodeId) -> bool {
        self.ancestors(node)
            .any(|n| self.kind(n) == NodeKind::DocType)
    }

    /// Bounded inclusive ancestor search.
    ///
    /// Inspects at most `max_depth` nodes, starting with `node` itself.
    pub fn find_ancestor(
        &self,
        node: NodeId,
        max_depth: usize,
        mut predicate: impl FnMut(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut current = Some(node);
        let mut depth = 0;
        while let Some(n) = current {
            if depth >= max_depth {
                tracing::debug!(target: "loom::dom", ?node, max_depth, "ancestor search hit depth cap");
                return None;
            }
            if predicate(self, n) {
                return Some(n);
            }
            current = self.parent(n);
            depth += 1;
        }
        None
    }
}
