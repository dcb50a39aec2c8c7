//! Errors raised while building or querying an address tree.

use thiserror::Error;

/// Errors from the `Configuration` kind of the error taxonomy that belong to
/// address-tree construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A node that requires an id (every non-top-level node) had none.
    #[error("node must have a uid")]
    NodeMustHaveUid,

    /// An `INCREMENTAL` node had no `size` attribute.
    #[error("incremental node {0:?} requires a size attribute")]
    IncrementalNodeRequiresSize(String),

    /// A node carrying a `mask` attribute also declared children.
    #[error("masked node {0:?} cannot have children")]
    MaskedNodeCannotHaveChild(String),

    /// A `NON_INCREMENTAL` node declared children.
    #[error("block access node {0:?} cannot have children")]
    BlockAccessNodeCannotHaveChild(String),

    /// A `class` attribute named a type unknown to the node-class registry.
    #[error("class {0:?} is unknown to the class factory")]
    LabelUnknownToClassFactory(String),

    /// An `INCREMENTAL` node's `partial_addr + size - 1` overflows 32 bits.
    #[error("node {0:?}: block size exceeds the bounds of the address space")]
    ArraySizeExceedsRegisterBound(String),

    /// Two sibling nodes claim overlapping, incompatible address ranges.
    #[error("address space overlap between {0:?} and {1:?}")]
    AddressSpaceOverlap(String, String),

    /// `resolve` was asked for a dotted path with no matching node.
    #[error("no node at path {0:?}")]
    UnknownPath(String),

    /// An attributed node matched more than one, or none, of the four
    /// recognized node shapes.
    #[error("node {0:?} does not unambiguously match a known node shape")]
    AmbiguousNodeShape(String),
}
