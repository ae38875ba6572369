//! The node arena and its mutation API.
//!
//! A `Document` owns every node it creates. Nodes are addressed by `NodeId`
//! and linked through parent/child lists that are always re-read from the
//! arena, never snapshotted, so callers can interleave queries and mutations
//! freely as long as they re-derive positions after each change.

use std::sync::atomic::{AtomicU64, Ordering};

use slotmap::SlotMap;
use smol_str::SmolStr;

use crate::error::{DomError, DomResult};
use crate::node::{ElementData, Node, NodeData, NodeId, NodeKind, char_len, char_to_byte};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Document`], used to reject cross-tree operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(u64);

/// Arena of nodes plus the root `Document` node.
///
/// # Panics
///
/// Accessors taking a `NodeId` (`data`, `kind`, `parent`, `children` and
/// the helpers built on them) index the arena directly and panic on an id
/// this document never issued. Call [`Document::ensure`] first when the id
/// comes from outside; `Range` operations validate their nodes themselves.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    pub(crate) nodes: SlotMap<NodeId, Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only its root node.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(NodeData::Document));
        Self {
            id: DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed)),
            nodes,
            root,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The root `Document` node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Check that `node` was created by this document.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Fail with `WrongDocument` if `node` belongs to another arena.
    pub fn ensure(&self, node: NodeId) -> DomResult<()> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(DomError::WrongDocument)
        }
    }

    /// Total number of nodes ever created, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // === Creation ===

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.nodes
            .insert(Node::new(NodeData::Element(ElementData::new(name))))
    }

    /// Create an element with the given attributes, in order.
    pub fn create_element_with<'a>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> NodeId {
        let mut element = ElementData::new(name);
        for (attr, value) in attributes {
            element.set_attribute(attr, value);
        }
        self.nodes.insert(Node::new(NodeData::Element(element)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.nodes.insert(Node::new(NodeData::Text(text.into())))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.nodes.insert(Node::new(NodeData::Comment(text.into())))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.nodes.insert(Node::new(NodeData::Fragment))
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.nodes
            .insert(Node::new(NodeData::DocType(SmolStr::new(name))))
    }

    // === Queries ===

    pub fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node].data
    }

    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node].data.kind()
    }

    pub fn is_character_data(&self, node: NodeId) -> bool {
        self.kind(node).is_character_data()
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        self.kind(node) == NodeKind::Text
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.kind(node) == NodeKind::Element
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes[node].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[node].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Lower-cased tag name of an element.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.name.as_str())
    }

    /// Character payload of a text or comment node.
    pub fn character_data(&self, node: NodeId) -> Option<&str> {
        self.nodes[node].data.character_data()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.nodes[node].children.len()
    }

    pub fn has_children(&self, node: NodeId) -> bool {
        !self.nodes[node].children.is_empty()
    }

    pub fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[node].children.get(index).copied()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].children.first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].children.last().copied()
    }

    /// Position of `node` among its parent's children; 0 for a parentless node.
    pub fn index_of(&self, node: NodeId) -> usize {
        self.parent(node)
            .and_then(|parent| {
                self.nodes[parent]
                    .children
                    .iter()
                    .position(|child| *child == node)
            })
            .unwrap_or(0)
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.child_at(parent, self.index_of(node) + 1)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_of(node);
        if index == 0 {
            None
        } else {
            self.child_at(parent, index - 1)
        }
    }

    /// Boundary capacity of a node: chars for character data, children otherwise.
    pub fn node_length(&self, node: NodeId) -> usize {
        match self.nodes[node].data.character_data() {
            Some(data) => char_len(data),
            None => self.child_count(node),
        }
    }

    /// Concatenated text of all descendant text nodes.
    ///
    /// For a character-data node this is its own payload.
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(data) = self.character_data(node) {
            return data.to_string();
        }
        let mut out = String::new();
        for descendant in self.descendants(node) {
            if let NodeData::Text(data) = self.data(descendant) {
                out.push_str(data);
            }
        }
        out
    }

    pub fn is_read_only(&self, node: NodeId) -> bool {
        self.nodes[node].read_only
    }

    /// Mark a node read-only. Range mutations refuse to touch it or its descendants.
    pub fn set_read_only(&mut self, node: NodeId, read_only: bool) {
        self.nodes[node].read_only = read_only;
    }

    // === Structural mutation ===

    /// Insert `child` before `reference` in `parent`, or append when `reference` is `None`.
    ///
    /// A fragment moves its children instead of itself. Any previous parent
    /// of `child` loses it first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.ensure(parent)?;
        self.ensure(child)?;
        if !self.kind(parent).can_have_children() {
            return Err(DomError::hierarchy("parent cannot have children"));
        }
        if self.kind(child) == NodeKind::Document {
            return Err(DomError::hierarchy("a document node cannot be inserted"));
        }
        if self.is_ancestor_of(child, parent, true) {
            return Err(DomError::hierarchy("insertion would create a cycle"));
        }
        if let Some(reference) = reference {
            self.ensure(reference)?;
            if self.parent(reference) != Some(parent) {
                return Err(DomError::not_found(
                    "reference node is not a child of the parent",
                ));
            }
            if reference == child {
                return Ok(());
            }
        }

        let moving = if self.kind(child) == NodeKind::Fragment {
            std::mem::take(&mut self.nodes[child].children)
        } else {
            self.remove(child);
            vec![child]
        };

        let index = match reference {
            Some(reference) => self.index_of(reference),
            None => self.child_count(parent),
        };
        for node in &moving {
            self.nodes[*node].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent].children;
        let tail = siblings.split_off(index);
        siblings.extend(moving);
        siblings.extend(tail);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `node` directly after `preceding`, which must have a parent.
    pub fn insert_after(&mut self, node: NodeId, preceding: NodeId) -> DomResult<()> {
        self.ensure(preceding)?;
        let parent = self
            .parent(preceding)
            .ok_or_else(|| DomError::not_found("preceding node has no parent"))?;
        let next = self.next_sibling(preceding);
        self.insert_before(parent, node, next)
    }

    /// Detach `node` from its parent. Does nothing for a parentless node.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|child| *child != node);
        }
    }

    /// Move every child of `node` in front of it, then detach `node`.
    pub fn replace_with_own_children(&mut self, node: NodeId) -> DomResult<()> {
        let parent = self
            .parent(node)
            .ok_or_else(|| DomError::not_found("node has no parent"))?;
        let children = std::mem::take(&mut self.nodes[node].children);
        let index = self.index_of(node);
        for child in &children {
            self.nodes[*child].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent].children;
        let tail = siblings.split_off(index);
        siblings.extend(children);
        siblings.extend(tail);
        self.remove(node);
        tracing::trace!(target: "loom::dom", ?node, "unwrapped element into parent");
        Ok(())
    }

    /// Copy a node. A deep copy duplicates the whole subtree.
    ///
    /// The copy is parentless; the read-only flag is carried over.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> NodeId {
        let source = &self.nodes[node];
        let mut copy = Node::new(source.data.clone());
        copy.read_only = source.read_only;
        let children = if deep {
            source.children.clone()
        } else {
            Vec::new()
        };
        let copy = self.nodes.insert(copy);
        for child in children {
            let child_copy = self.clone_node(child, true);
            self.nodes[child_copy].parent = Some(copy);
            self.nodes[copy].children.push(child_copy);
        }
        copy
    }

    // === Character data ===

    fn character_data_mut(&mut self, node: NodeId) -> DomResult<&mut String> {
        self.ensure(node)?;
        self.nodes[node]
            .data
            .character_data_mut()
            .ok_or(DomError::InvalidNodeType)
    }

    fn check_offset(&self, node: NodeId, offset: usize) -> DomResult<()> {
        let length = self.node_length(node);
        if offset > length {
            Err(DomError::IndexSize { offset, length })
        } else {
            Ok(())
        }
    }

    pub fn set_data(&mut self, node: NodeId, text: impl Into<String>) -> DomResult<()> {
        *self.character_data_mut(node)? = text.into();
        Ok(())
    }

    /// Chars `offset..offset + count`, clamped to the end of the payload.
    pub fn substring_data(&self, node: NodeId, offset: usize, count: usize) -> DomResult<String> {
        self.ensure(node)?;
        let data = self.character_data(node).ok_or(DomError::InvalidNodeType)?;
        self.check_offset(node, offset)?;
        Ok(data.chars().skip(offset).take(count).collect())
    }

    pub fn append_data(&mut self, node: NodeId, text: &str) -> DomResult<()> {
        self.character_data_mut(node)?.push_str(text);
        Ok(())
    }

    pub fn insert_data(&mut self, node: NodeId, offset: usize, text: &str) -> DomResult<()> {
        self.check_offset_of_character_data(node, offset)?;
        let data = self.character_data_mut(node)?;
        let byte = char_to_byte(data, offset);
        data.insert_str(byte, text);
        Ok(())
    }

    /// Remove `count` chars starting at `offset`; `count` is clamped to the end.
    pub fn delete_data(&mut self, node: NodeId, offset: usize, count: usize) -> DomResult<()> {
        self.check_offset_of_character_data(node, offset)?;
        let data = self.character_data_mut(node)?;
        let start = char_to_byte(data, offset);
        let end = char_to_byte(data, offset.saturating_add(count));
        data.replace_range(start..end, "");
        Ok(())
    }

    fn check_offset_of_character_data(&self, node: NodeId, offset: usize) -> DomResult<()> {
        self.ensure(node)?;
        if !self.is_character_data(node) {
            return Err(DomError::InvalidNodeType);
        }
        self.check_offset(node, offset)
    }

    /// Split a character-data node at `offset`.
    ///
    /// The original keeps the head; a new node of the same kind holding the
    /// tail is returned and, if the original has a parent, inserted right
    /// after it.
    pub fn split_data(&mut self, node: NodeId, offset: usize) -> DomResult<NodeId> {
        self.check_offset_of_character_data(node, offset)?;
        let data = self.character_data_mut(node)?;
        let byte = char_to_byte(data, offset);
        let tail = data.split_off(byte);

        let tail_data = match self.kind(node) {
            NodeKind::Comment => NodeData::Comment(tail),
            _ => NodeData::Text(tail),
        };
        let mut tail_node = Node::new(tail_data);
        tail_node.read_only = self.nodes[node].read_only;
        let tail_node = self.nodes.insert(tail_node);

        if self.parent(node).is_some() {
            self.insert_after(tail_node, node)?;
        }
        tracing::trace!(target: "loom::dom", ?node, offset, ?tail_node, "split character data");
        Ok(tail_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn div_with_text(doc: &mut Document, text: &str) -> (NodeId, NodeId) {
        let div = doc.create_element("div");
        let text = doc.create_text(text);
        doc.append_child(doc.root(), div).unwrap();
        doc.append_child(div, text).unwrap();
        (div, text)
    }

    #[test]
    fn test_insert_before_and_indices() {
        let mut doc = Document::new();
        let (div, a) = div_with_text(&mut doc, "a");
        let b = doc.create_text("b");
        doc.insert_before(div, b, Some(a)).unwrap();

        assert_eq!(doc.children(div), &[b, a]);
        assert_eq!(doc.index_of(a), 1);
        assert_eq!(doc.previous_sibling(a), Some(b));
        assert_eq!(doc.next_sibling(b), Some(a));
        assert_eq!(doc.next_sibling(a), None);
    }

    #[test]
    fn test_insert_rejects_cycles() {
        let mut doc = Document::new();
        let (div, _) = div_with_text(&mut doc, "a");
        let span = doc.create_element("span");
        doc.append_child(div, span).unwrap();

        let err = doc.append_child(span, div).unwrap_err();
        assert!(matches!(err, DomError::Hierarchy(_)));
        let err = doc.append_child(span, span).unwrap_err();
        assert!(matches!(err, DomError::Hierarchy(_)));
    }

    #[test]
    fn test_insert_into_text_is_hierarchy_error() {
        let mut doc = Document::new();
        let (_, text) = div_with_text(&mut doc, "a");
        let other = doc.create_text("b");
        assert!(matches!(
            doc.append_child(text, other),
            Err(DomError::Hierarchy(_))
        ));
    }

    #[test]
    fn test_reference_must_be_child() {
        let mut doc = Document::new();
        let (div, _) = div_with_text(&mut doc, "a");
        let stray = doc.create_text("stray");
        let child = doc.create_text("c");
        assert!(matches!(
            doc.insert_before(div, child, Some(stray)),
            Err(DomError::NotFound(_))
        ));
    }

    #[test]
    fn test_fragment_insertion_moves_children() {
        let mut doc = Document::new();
        let (div, a) = div_with_text(&mut doc, "a");
        let frag = doc.create_fragment();
        let x = doc.create_text("x");
        let y = doc.create_text("y");
        doc.append_child(frag, x).unwrap();
        doc.append_child(frag, y).unwrap();

        doc.insert_before(div, frag, Some(a)).unwrap();
        assert_eq!(doc.children(div), &[x, y, a]);
        assert!(!doc.has_children(frag));
        assert_eq!(doc.parent(x), Some(div));
    }

    #[test]
    fn test_moving_within_same_parent() {
        let mut doc = Document::new();
        let (div, a) = div_with_text(&mut doc, "a");
        let b = doc.create_text("b");
        let c = doc.create_text("c");
        doc.append_child(div, b).unwrap();
        doc.append_child(div, c).unwrap();

        doc.insert_before(div, c, Some(a)).unwrap();
        assert_eq!(doc.children(div), &[c, a, b]);
        doc.append_child(div, c).unwrap();
        assert_eq!(doc.children(div), &[a, b, c]);
    }

    #[test]
    fn test_split_data_inserts_tail_after() {
        let mut doc = Document::new();
        let (div, text) = div_with_text(&mut doc, "héllo");
        let tail = doc.split_data(text, 2).unwrap();

        assert_eq!(doc.character_data(text), Some("hé"));
        assert_eq!(doc.character_data(tail), Some("llo"));
        assert_eq!(doc.children(div), &[text, tail]);

        let err = doc.split_data(text, 3).unwrap_err();
        assert_eq!(err, DomError::IndexSize { offset: 3, length: 2 });
    }

    #[test]
    fn test_character_data_edits() {
        let mut doc = Document::new();
        let (_, text) = div_with_text(&mut doc, "abcdef");
        doc.delete_data(text, 1, 2).unwrap();
        assert_eq!(doc.character_data(text), Some("adef"));
        doc.insert_data(text, 1, "XY").unwrap();
        assert_eq!(doc.character_data(text), Some("aXYdef"));
        doc.append_data(text, "!").unwrap();
        assert_eq!(doc.substring_data(text, 3, 100).unwrap(), "def!");
        doc.delete_data(text, 4, 100).unwrap();
        assert_eq!(doc.character_data(text), Some("aXYd"));
    }

    #[test]
    fn test_replace_with_own_children() {
        let mut doc = Document::new();
        let (div, a) = div_with_text(&mut doc, "a");
        let b = doc.create_element("b");
        let inner1 = doc.create_text("1");
        let inner2 = doc.create_text("2");
        doc.append_child(b, inner1).unwrap();
        doc.append_child(b, inner2).unwrap();
        doc.append_child(div, b).unwrap();

        doc.replace_with_own_children(b).unwrap();
        assert_eq!(doc.children(div), &[a, inner1, inner2]);
        assert_eq!(doc.parent(b), None);
    }

    #[test]
    fn test_deep_clone_is_detached_copy() {
        let mut doc = Document::new();
        let (div, text) = div_with_text(&mut doc, "a");
        let copy = doc.clone_node(div, true);
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.child_count(copy), 1);
        assert_ne!(doc.first_child(copy), Some(text));
        assert_eq!(doc.text_content(copy), "a");

        let shallow = doc.clone_node(div, false);
        assert_eq!(doc.child_count(shallow), 0);
    }

    #[test]
    fn test_foreign_node_is_wrong_document() {
        let mut doc = Document::new();
        let mut other = Document::new();
        for _ in 0..4 {
            other.create_text("pad");
        }
        let foreign = other.create_text("x");
        assert_eq!(doc.append_child(doc.root(), foreign), Err(DomError::WrongDocument));
    }
}
