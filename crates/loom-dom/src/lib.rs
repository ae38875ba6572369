//! loom-dom: arena-backed document tree used by the loom range engine.
//!
//! This crate provides:
//! - `Document` - owner of every node, addressed by `NodeId`
//! - `NodeData` / `NodeKind` - typed nodes (element, character data, fragment, other)
//! - Tree primitives (ancestor walks, indices, common ancestors) in `tree`
//! - `DomError` - the error taxonomy shared by every loom crate
//! - A small markup reader/writer for fixtures and debugging in `markup`

pub mod document;
pub mod error;
pub mod markup;
pub mod node;
pub mod tree;

pub use document::{Document, DocumentId};
pub use error::{DomError, DomResult};
pub use markup::{MarkupError, parse_fragment};
pub use node::{Attribute, ElementData, NodeData, NodeId, NodeKind};
pub use tree::{Ancestors, Descendants};
