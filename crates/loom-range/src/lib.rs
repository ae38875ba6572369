//! loom-range: boundary points, live ranges and selections over a loom `Document`.
//!
//! This crate provides:
//! - `BoundaryPoint` and `compare_points` - the total order on positions
//! - `Range` - boundary pair with comparison, extraction, insertion and
//!   boundary splitting/normalization
//! - `RangeIterator` / `iterate_subtree` - partial-selection traversal
//! - `SelectionHost` / `Selection` - the seam to a platform selection

pub mod boundary;
pub mod iter;
pub mod range;
pub mod selection;

pub use boundary::{BoundaryPoint, compare_points};
pub use iter::{RangeIterator, iterate_subtree};
pub use range::{How, NodePosition, Range};
pub use selection::{Selection, SelectionHost};
