//! Attribute-rule node-shape matcher and tree builder (§4.5 "Parsing"),
//! ported from `NodeTreeBuilder`'s `Rule<Node*>` chains and `*NodeCreator`
//! methods.
//!
//! XML parsing itself is out of scope (§1 Non-goals): callers hand in
//! anything implementing [`AttributedNode`], the boundary contract this
//! crate actually needs from a parsed document.

use std::{collections::HashMap, sync::Arc};

use slotmap::SlotMap;
use tracing::debug;

use crate::{
    config::AddressTreeConfig,
    error::AddressError,
    node::{Mode, Node, NodeHandle, Permissions, concat_bracketed},
    tree::AddressTree,
};

/// A parsed XML (or XML-equivalent) element, the boundary this crate needs
/// from the external parsing collaborator.
pub trait AttributedNode {
    /// Value of the named attribute, if present.
    fn attribute(&self, name: &str) -> Option<&str>;
    /// Child `<node>` elements, in document order.
    fn children(&self) -> &[Self]
    where
        Self: Sized;
}

/// Instantiates a node subtype named by a `class` attribute
/// (`NodeTreeClassAttribute` / `CreatorInterface` in the original).
pub trait NodeCreator: Send + Sync {
    /// Build a node seeded by the ordered `(key, value)` constructor
    /// arguments parsed from the `class` attribute string.
    fn create(&self, args: &[(String, String)]) -> Node;
}

/// `class` name → constructor, a write-once-at-startup registry (§5).
#[derive(Default, Clone)]
pub struct ClassRegistry {
    creators: HashMap<String, Arc<dyn NodeCreator>>,
}

impl ClassRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a creator under `name`, overwriting any previous one.
    pub fn register(&mut self, name: impl Into<String>, creator: Arc<dyn NodeCreator>) {
        self.creators.insert(name.into(), creator);
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn NodeCreator>> {
        self.creators.get(name)
    }
}

/// Loads and fully builds the address tree named by a `module` attribute's
/// file expression; the collaborator for the out-of-scope filesystem/XML
/// read (`NodeTreeBuilder::CallBack` in the original).
pub trait AddressFileLoader {
    /// Load and build the tree for `module_expr`.
    ///
    /// # Errors
    ///
    /// Implementations surface `AddressError::FailedToOpenAddressTableFile`-
    /// shaped problems however their own error type models them; this
    /// crate only requires an `AddressTree` or an `AddressError` back.
    fn load(&mut self, module_expr: &str) -> Result<AddressTree, AddressError>;
}

/// Parse the `class` attribute's `ClassName(key=value,key=value)` grammar.
fn parse_class_attribute(raw: &str) -> (String, Vec<(String, String)>) {
    let raw = raw.trim();
    let Some(open) = raw.find('(') else {
        return (raw.to_string(), Vec::new());
    };
    let name = raw[..open].trim().to_string();
    let args_str = raw[open + 1..raw.rfind(')').unwrap_or(raw.len())].trim();
    if args_str.is_empty() {
        return (name, Vec::new());
    }
    let args = args_str
        .split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.trim().to_string();
            let value = parts.next()?.trim().to_string();
            Some((key, value))
        })
        .collect();
    (name, args)
}

fn parse_mode(raw: &str) -> Option<Mode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "single" => Some(Mode::Single),
        "block" | "incremental" | "inc" => Some(Mode::Incremental),
        "port" | "non-incremental" | "non-inc" => Some(Mode::NonIncremental),
        _ => None,
    }
}

fn parse_permissions(raw: &str) -> Option<Permissions> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "r" | "read" => Some(Permissions::READ),
        "w" | "write" => Some(Permissions::WRITE),
        "rw" | "wr" | "readwrite" | "writeread" => Some(Permissions::READ_WRITE),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeShape {
    Plain,
    Class,
    BitMask,
    Module,
}

/// Classify an attributed element against the four node shapes (§4.5's
/// required/forbidden attribute table).
fn classify(element: &impl AttributedNode) -> Result<NodeShape, AddressError> {
    let has = |name: &str| element.attribute(name).is_some();

    if has("module") {
        if has("mask") || has("class") || has("mode") || has("size") || has("permission") {
            return Err(AddressError::AmbiguousNodeShape("module node has a forbidden attribute".into()));
        }
        return Ok(NodeShape::Module);
    }
    if has("class") {
        if has("mask") {
            return Err(AddressError::AmbiguousNodeShape("class node has a forbidden mask attribute".into()));
        }
        return Ok(NodeShape::Class);
    }
    if has("mask") {
        return Ok(NodeShape::BitMask);
    }
    Ok(NodeShape::Plain)
}

fn set_common_attributes(node: &mut Node, element: &impl AttributedNode) {
    if let Some(addr) = element.attribute("address").and_then(|v| parse_u32(v)) {
        node.partial_addr |= addr;
    }
    if let Some(tags) = element.attribute("tags") {
        node.tags = concat_bracketed(&node.tags, tags);
    }
    if let Some(description) = element.attribute("description") {
        node.description = concat_bracketed(&node.description, description);
    }
}

fn parse_u32(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

fn set_permissions(node: &mut Node, element: &impl AttributedNode) {
    if let Some(raw) = element.attribute("permission") {
        if let Some(permissions) = parse_permissions(raw) {
            node.permissions = permissions;
        }
    }
}

fn set_mode_and_size(node: &mut Node, element: &impl AttributedNode) -> Result<(), AddressError> {
    let Some(raw) = element.attribute("mode") else { return Ok(()) };
    let Some(mode) = parse_mode(raw) else { return Ok(()) };
    node.mode = mode;

    let size = element.attribute("size").and_then(parse_u32);
    match (mode, size) {
        (Mode::Incremental, None) => {
            return Err(AddressError::IncrementalNodeRequiresSize(node.uid.clone()));
        },
        (Mode::Incremental | Mode::NonIncremental, Some(size)) => node.size = size,
        _ => {},
    }
    Ok(())
}

fn set_mask(node: &mut Node, element: &impl AttributedNode) {
    if let Some(mask) = element.attribute("mask").and_then(parse_u32) {
        node.mask = mask;
    }
}

/// Build one node (and its subtree) from an attributed element, dispatching
/// on its shape.
fn build_node(
    arena: &mut SlotMap<NodeHandle, Node>,
    element: &impl AttributedNode,
    require_id: bool,
    registry: &ClassRegistry,
    loader: &mut dyn AddressFileLoader,
) -> Result<NodeHandle, AddressError> {
    let shape = classify(element)?;

    let node = match shape {
        NodeShape::Module => {
            let module_expr = element.attribute("module").ok_or(AddressError::NodeMustHaveUid)?;
            let loaded = loader.load(module_expr)?;
            let uid = element.attribute("id").ok_or(AddressError::NodeMustHaveUid)?.to_string();

            // The loaded tree owns its own arena; `NodeHandle`s from it are
            // meaningless in `arena`, so graft by walking it once and
            // reinserting every node (`reinsert_recursive`).
            let handle = reinsert_recursive(arena, &loaded, loaded.root());
            arena[handle].uid = uid;
            let mut node = arena[handle].clone();
            set_common_attributes(&mut node, element);
            arena[handle] = node;
            return Ok(handle);
        },
        NodeShape::Class => {
            let class_attr = element.attribute("class").ok_or_else(|| AddressError::NodeMustHaveUid)?;
            let (class_name, args) = parse_class_attribute(class_attr);
            let creator = registry
                .get(&class_name)
                .ok_or_else(|| AddressError::LabelUnknownToClassFactory(class_name.clone()))?;
            let mut node = creator.create(&args);
            set_uid(&mut node, element, require_id)?;
            set_common_attributes(&mut node, element);
            set_permissions(&mut node, element);
            set_mode_and_size(&mut node, element)?;
            add_children(arena, &mut node, element, registry, loader)?;
            arena.insert(node)
        },
        NodeShape::BitMask => {
            if !element.children().is_empty() {
                return Err(AddressError::MaskedNodeCannotHaveChild(
                    element.attribute("id").unwrap_or_default().to_string(),
                ));
            }
            let mut node = Node::bare(String::new());
            set_uid(&mut node, element, require_id)?;
            set_common_attributes(&mut node, element);
            set_permissions(&mut node, element);
            set_mask(&mut node, element);
            node.mode = Mode::Single;
            arena.insert(node)
        },
        NodeShape::Plain => {
            let mut node = Node::bare(String::new());
            set_uid(&mut node, element, require_id)?;
            set_common_attributes(&mut node, element);
            set_permissions(&mut node, element);
            set_mode_and_size(&mut node, element)?;
            add_children(arena, &mut node, element, registry, loader)?;
            arena.insert(node)
        },
    };
    debug!(shape = ?shape, uid = %arena[node].uid, "node built");
    Ok(node)
}

fn set_uid(node: &mut Node, element: &impl AttributedNode, require_id: bool) -> Result<(), AddressError> {
    match element.attribute("id") {
        Some(id) => node.uid = id.to_string(),
        None if require_id => return Err(AddressError::NodeMustHaveUid),
        None => {},
    }
    Ok(())
}

fn add_children(
    arena: &mut SlotMap<NodeHandle, Node>,
    node: &mut Node,
    element: &impl AttributedNode,
    registry: &ClassRegistry,
    loader: &mut dyn AddressFileLoader,
) -> Result<(), AddressError> {
    if node.mode == Mode::NonIncremental {
        if !element.children().is_empty() {
            return Err(AddressError::BlockAccessNodeCannotHaveChild(node.uid.clone()));
        }
        return Ok(());
    }

    for child_element in element.children() {
        let child_handle = build_node(arena, child_element, true, registry, loader)?;
        let child_uid = arena[child_handle].uid.clone();
        node.children.push(child_handle);
        node.children_map.insert(child_uid.clone(), child_handle);
        let grandchildren: Vec<(String, NodeHandle)> = arena[child_handle]
            .children_map
            .iter()
            .map(|(path, handle)| (format!("{child_uid}.{path}"), *handle))
            .collect();
        for (dotted, handle) in grandchildren {
            node.children_map.insert(dotted, handle);
        }
    }
    Ok(())
}

/// Copy `source`'s subtree rooted at `handle` into `dest`, an arena it was
/// not built in. `NodeHandle` values are opaque keys scoped to the arena
/// that minted them, so grafting a `module`-loaded tree means walking it
/// once and reinserting every node, rebuilding `children`/`children_map`
/// against the new handles as it goes.
fn reinsert_recursive(
    dest: &mut SlotMap<NodeHandle, Node>,
    source: &AddressTree,
    handle: NodeHandle,
) -> NodeHandle {
    let source_node = source.get(handle);
    let mut copy = source_node.clone();
    copy.children.clear();
    copy.children_map.clear();
    let dest_handle = dest.insert(copy);

    for &child in &source_node.children {
        let dest_child = reinsert_recursive(dest, source, child);
        let child_uid = source.get(child).uid.clone();
        dest[dest_handle].children.push(dest_child);
        dest[dest_handle].children_map.insert(child_uid.clone(), dest_child);

        for (path, _) in &source.get(child).children_map {
            if let Some(&grandchild) = dest[dest_child].children_map.get(path) {
                dest[dest_handle].children_map.insert(format!("{child_uid}.{path}"), grandchild);
            }
        }
    }
    dest_handle
}

/// Build a complete [`AddressTree`] from a top-level attributed element,
/// then compose addresses and check for collisions (§4.5).
///
/// # Errors
///
/// Any [`AddressError`] raised while classifying a node's shape,
/// instantiating a `class` node, grafting a `module`, or composing and
/// checking the resulting addresses.
pub fn build_tree(
    root_element: &impl AttributedNode,
    registry: &ClassRegistry,
    loader: &mut dyn AddressFileLoader,
    config: AddressTreeConfig,
) -> Result<AddressTree, AddressError> {
    let mut arena = SlotMap::with_key();
    let root_handle = build_node(&mut arena, root_element, false, registry, loader)?;
    let mut tree = AddressTree::new(arena, root_handle);

    crate::assign::assign_addresses(&mut tree, root_handle, 0)?;
    crate::assign::check_collisions(&tree, config)?;
    Ok(tree)
}
