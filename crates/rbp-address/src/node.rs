//! Node data model (§4.5, "AddressTree Node").

use slotmap::new_key_type;

new_key_type! {
    /// Stable handle into a [`crate::tree::AddressTree`]'s arena.
    ///
    /// `children` holds these instead of owning pointers, and `children_map`
    /// holds them as non-owning lookup indices into the same arena — there
    /// is exactly one owner of any node's data (the arena), handles are
    /// freely copyable, and the tree cannot become cyclic by construction.
    pub struct NodeHandle;
}

/// Register-access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// A single register.
    Single,
    /// A block of `size` sequential registers addressed as one region.
    Incremental,
    /// A FIFO-style port: `size` words read or written to the same address.
    NonIncremental,
    /// Pure container, collapsed to `Single` during composition if it has no
    /// children or all children are mask-only.
    Hierarchical,
}

/// Read/write permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions {
    /// Reads are allowed.
    pub read: bool,
    /// Writes are allowed.
    pub write: bool,
}

impl Permissions {
    /// Neither read nor write permitted.
    pub const NONE: Self = Self { read: false, write: false };
    /// Read-only.
    pub const READ: Self = Self { read: true, write: false };
    /// Write-only.
    pub const WRITE: Self = Self { read: false, write: true };
    /// Read and write.
    pub const READ_WRITE: Self = Self { read: true, write: true };
}

/// Sentinel mask meaning "whole register".
pub const NOMASK: u32 = 0xffff_ffff;

/// One node of a hierarchical register map.
#[derive(Debug, Clone)]
pub struct Node {
    /// Path segment, unique among siblings.
    pub uid: String,
    /// Local address contribution, ORed with the inherited address during
    /// composition.
    pub partial_addr: u32,
    /// Absolute address: OR of this node's `partial_addr` and every
    /// ancestor's, set by [`crate::assign::assign_addresses`].
    pub addr: u32,
    /// Access mode.
    pub mode: Mode,
    /// Word count; required for `Incremental`, recommended for
    /// `NonIncremental`.
    pub size: u32,
    /// Read/write permissions.
    pub permissions: Permissions,
    /// Bitfield mask within the register; [`NOMASK`] for a whole register.
    pub mask: u32,
    /// Free text, concatenated from ancestors with `[inner]` bracketing.
    pub tags: String,
    /// Free text, concatenated the same way as `tags`.
    pub description: String,
    /// Children in declaration order.
    pub children: Vec<NodeHandle>,
    /// Dotted-path lookup, including grandchildren spliced in under
    /// `child.uid + "." + grandchild_path`.
    pub children_map: std::collections::HashMap<String, NodeHandle>,
}

impl Node {
    /// A bare node with no address contribution and `Hierarchical` mode,
    /// the shape produced before attributes are applied.
    #[must_use]
    pub fn bare(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            partial_addr: 0,
            addr: 0,
            mode: Mode::Hierarchical,
            size: 0,
            permissions: Permissions::NONE,
            mask: NOMASK,
            tags: String::new(),
            description: String::new(),
            children: Vec::new(),
            children_map: std::collections::HashMap::new(),
        }
    }
}

/// Concatenate `outer` and `inner` free-text fields the way the builder
/// concatenates `tags`/`description`: bracket `inner` when both sides are
/// non-empty, otherwise take whichever side is non-empty.
#[must_use]
pub fn concat_bracketed(outer: &str, inner: &str) -> String {
    match (outer.is_empty(), inner.is_empty()) {
        (false, false) => format!("{outer}[{inner}]"),
        (true, false) => inner.to_string(),
        _ => outer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_brackets_only_when_both_sides_are_present() {
        assert_eq!(concat_bracketed("", "child"), "child");
        assert_eq!(concat_bracketed("parent", ""), "parent");
        assert_eq!(concat_bracketed("parent", "child"), "parent[child]");
        assert_eq!(concat_bracketed("", ""), "");
    }
}
