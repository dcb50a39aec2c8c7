//! Hierarchical register-map builder (§4.5).
//!
//! Parses an attributed-node tree (XML parsing itself is a collaborator,
//! out of scope), composes absolute addresses by bitwise-OR down the tree,
//! checks the result for address-space collisions, and answers dotted-path
//! lookups. The tree is built once per address-map file and is immutable
//! thereafter.

pub mod assign;
pub mod builder;
pub mod config;
pub mod error;
pub mod node;
pub mod tree;

pub use assign::{assign_addresses, check_collisions};
pub use builder::{AddressFileLoader, AttributedNode, ClassRegistry, NodeCreator, build_tree};
pub use config::{AddressTreeConfig, OverlapPolicy};
pub use error::AddressError;
pub use node::{Mode, Node, NodeHandle, NOMASK, Permissions};
pub use tree::AddressTree;
