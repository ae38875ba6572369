//! loom-annotate: toggle inline annotations (bold, colours, links...) over loom ranges.
//!
//! This crate provides:
//! - `AnnotationDescriptor` - which elements count as markers of an annotation
//! - `Applier` - apply, remove, toggle and query an annotation over ranges and selections
//! - `AnnotationConfig` - named commands and options loaded from JSON or TOML
//! - Class-list helpers in `classes`

pub mod applier;
pub mod classes;
pub mod config;
pub mod descriptor;

pub use applier::{Applier, INVISIBLE_SPACE, is_split_point, split_node_at};
pub use config::{AnnotationConfig, ApplierOptions, ConfigError, DescriptorSpec};
pub use descriptor::{AnnotationDescriptor, DEFAULT_TAG_NAME};
