//! Tunables for address-tree composition.

/// Whether a detected address-space overlap is merely logged or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Log the overlap and keep building (matches the original's disabled
    /// `THROW_ON_ADDRESS_SPACE_OVERLAP` build).
    #[default]
    Warn,
    /// Fail collision checking with `AddressError::AddressSpaceOverlap`.
    Reject,
}

/// Tunables passed to [`crate::builder::build_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressTreeConfig {
    /// What to do when `check_collisions` finds an overlap.
    pub overlap_policy: OverlapPolicy,
}
