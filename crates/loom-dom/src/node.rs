//! Node types stored in the document arena.

use slotmap::new_key_type;
use smol_str::SmolStr;

new_key_type! {
    /// Handle to a node owned by a [`Document`](crate::Document).
    ///
    /// Nodes are never freed while their document lives, so an id handed out
    /// by a document stays addressable even after the node is detached.
    pub struct NodeId;
}

/// Coarse node classification, used wherever the payload doesn't matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Fragment,
    Element,
    Text,
    Comment,
    DocType,
}

impl NodeKind {
    /// Text and comments carry a character payload and use character offsets.
    pub fn is_character_data(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::Comment)
    }

    /// Kinds that may sit at the top of a tree a range can live in.
    pub fn is_root_container(self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Fragment)
    }

    /// Kinds that may hold children.
    pub fn can_have_children(self) -> bool {
        matches!(
            self,
            NodeKind::Document | NodeKind::Fragment | NodeKind::Element
        )
    }
}

/// A single `name="value"` pair on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: SmolStr,
    pub value: String,
}

/// Element payload: tag name plus attributes in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lower-cased tag name.
    pub name: SmolStr,
    pub attributes: Vec<Attribute>,
}

impl ElementData {
    pub fn new(name: &str) -> Self {
        Self {
            name: SmolStr::new(name.to_ascii_lowercase()),
            attributes: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .map(|attr| attr.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
        {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: SmolStr::new(name.to_ascii_lowercase()),
                value,
            }),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self
            .attributes
            .iter()
            .position(|attr| attr.name.eq_ignore_ascii_case(name))?;
        Some(self.attributes.remove(index).value)
    }

    /// Raw value of the `class` attribute, empty when absent.
    pub fn class_name(&self) -> &str {
        self.attribute("class").unwrap_or("")
    }

    /// Set the `class` attribute. An empty value removes the attribute.
    pub fn set_class_name(&mut self, class_name: &str) {
        if class_name.is_empty() {
            self.remove_attribute("class");
        } else {
            self.set_attribute("class", class_name);
        }
    }

    /// Attributes other than `class`.
    pub fn non_class_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attr| !attr.name.eq_ignore_ascii_case("class"))
    }
}

/// Typed node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Fragment,
    Element(ElementData),
    Text(String),
    Comment(String),
    DocType(SmolStr),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Fragment => NodeKind::Fragment,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::DocType(_) => NodeKind::DocType,
        }
    }

    /// Character payload of text and comment nodes.
    pub fn character_data(&self) -> Option<&str> {
        match self {
            NodeData::Text(data) | NodeData::Comment(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn character_data_mut(&mut self) -> Option<&mut String> {
        match self {
            NodeData::Text(data) | NodeData::Comment(data) => Some(data),
            _ => None,
        }
    }
}

/// Arena slot: payload plus tree links.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
    pub(crate) read_only: bool,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
            read_only: false,
        }
    }
}

/// Number of chars in `text`; all character offsets are in chars.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the char at `char_offset`, or `text.len()` past the end.
pub(crate) fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
