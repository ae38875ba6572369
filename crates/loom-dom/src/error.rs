//! Error taxonomy for tree and range operations.

use smol_str::SmolStr;
use thiserror::Error;

/// Result alias used by every fallible tree and range operation.
pub type DomResult<T> = Result<T, DomError>;

/// Errors raised by tree mutation and range operations.
///
/// None of these are retried internally. Callers decide how to recover,
/// usually by restoring a sane selection and treating the command as a no-op.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomError {
    /// Offset outside `0..=length` of the target node.
    #[error("offset {offset} is out of bounds for node of length {length}")]
    IndexSize { offset: usize, length: usize },

    /// Node kind not permitted at the target position, a cycle would be
    /// created, or two points share no common ancestor.
    #[error("hierarchy request error: {0}")]
    Hierarchy(SmolStr),

    /// Operation mixes nodes from unrelated trees.
    #[error("nodes belong to different documents or root containers")]
    WrongDocument,

    /// Attempted mutation under a read-only ancestor.
    #[error("node is read-only")]
    NoModification,

    /// Operation attempted on a detached or orphaned range.
    #[error("invalid state: {0}")]
    InvalidState(SmolStr),

    /// A referenced node is missing where one is required.
    #[error("node not found: {0}")]
    NotFound(SmolStr),

    /// Node kind is not accepted by this operation.
    #[error("invalid node type for this operation")]
    InvalidNodeType,

    /// The range partially selects a non-text node, so its contents
    /// cannot be surrounded by a single element.
    #[error("range boundaries partially select a non-text node")]
    BadBoundaryPoints,
}

impl DomError {
    pub fn hierarchy(reason: impl Into<SmolStr>) -> Self {
        DomError::Hierarchy(reason.into())
    }

    pub fn invalid_state(reason: impl Into<SmolStr>) -> Self {
        DomError::InvalidState(reason.into())
    }

    pub fn not_found(reason: impl Into<SmolStr>) -> Self {
        DomError::NotFound(reason.into())
    }
}
