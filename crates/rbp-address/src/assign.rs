//! Address composition and collision checking (§4.5 "Composition", "Collision
//! check"), ported from `NodeTreeBuilder::calculateHierarchicalAddresses`
//! and `NodeTreeBuilder::checkForAddressCollisions`.

use tracing::warn;

use crate::{
    config::{AddressTreeConfig, OverlapPolicy},
    error::AddressError,
    node::{Mode, NodeHandle, NOMASK},
    tree::AddressTree,
};

/// Compose `node`'s absolute address from `inherited` (the parent's already
/// composed address) and recurse into its children.
///
/// - A `Hierarchical` node with no children, or whose children are all
///   mask-only, demotes to `Single`.
/// - An `Incremental` node whose top address (`partial_addr + size - 1`)
///   overflows 32 bits is rejected.
/// - An overlap between a node's own bits and the inherited bits is logged,
///   not rejected — the original tolerates it with a warning.
///
/// # Errors
///
/// `AddressError::ArraySizeExceedsRegisterBound` if an `Incremental` node's
/// block runs past the top of the address space.
pub fn assign_addresses(
    tree: &mut AddressTree,
    node: NodeHandle,
    inherited: u32,
) -> Result<(), AddressError> {
    let uid = tree.get(node).uid.clone();

    if tree.get(node).mode == Mode::Hierarchical {
        let all_masked =
            tree.get(node).children.iter().all(|&child| tree.get(child).mask != NOMASK);
        if tree.get(node).children.is_empty() || all_masked {
            tree.get_mut(node).mode = Mode::Single;
        }
    }

    let partial_addr = tree.get(node).partial_addr;
    if tree.get(node).mode == Mode::Incremental {
        let size = u64::from(tree.get(node).size);
        let top_addr = u64::from(partial_addr) + size.saturating_sub(1);
        if top_addr > u64::from(u32::MAX) {
            return Err(AddressError::ArraySizeExceedsRegisterBound(uid));
        }
        #[allow(clippy::cast_possible_truncation)]
        let top_addr = top_addr as u32;
        if top_addr & inherited != 0 {
            warn!(
                node = %uid,
                top_addr = format_args!("{top_addr:#010x}"),
                parent_addr = format_args!("{inherited:#010x}"),
                "incremental node's top address overlaps with the parent branch",
            );
        }
    } else if partial_addr & inherited != 0 {
        warn!(
            node = %uid,
            partial_addr = format_args!("{partial_addr:#010x}"),
            parent_addr = format_args!("{inherited:#010x}"),
            "node's partial address overlaps with the parent branch",
        );
    }

    let addr = partial_addr | inherited;
    tree.get_mut(node).addr = addr;

    let children = tree.get(node).children.clone();
    for child in children {
        assign_addresses(tree, child, addr)?;
    }
    Ok(())
}

fn range_incremental(tree: &AddressTree, handle: NodeHandle) -> (u32, u32) {
    let node = tree.get(handle);
    (node.addr, node.addr + node.size.saturating_sub(1))
}

fn is_child_of(tree: &AddressTree, parent: NodeHandle, candidate: NodeHandle) -> bool {
    tree.get(parent).children.contains(&candidate)
}

/// Pairwise-check every entry in the root's flattened `children_map` for
/// address collisions (§4.5 "Collision check").
///
/// # Errors
///
/// `AddressError::AddressSpaceOverlap` if `config.overlap_policy` is
/// [`OverlapPolicy::Reject`] and an incompatible overlap is found; under
/// [`OverlapPolicy::Warn`] overlaps are logged and checking continues.
pub fn check_collisions(tree: &AddressTree, config: AddressTreeConfig) -> Result<(), AddressError> {
    let root = tree.get(tree.root());
    let mut entries: Vec<(&String, NodeHandle)> =
        root.children_map.iter().map(|(path, handle)| (path, *handle)).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for i in 0..entries.len() {
        let (path1, node1) = entries[i];
        for &(path2, node2) in &entries[i + 1..] {
            if let Some(conflict) = pair_conflicts(tree, node1, node2) {
                report_overlap(config, path1, path2, conflict)?;
            }
        }
    }
    Ok(())
}

fn pair_conflicts(tree: &AddressTree, node1: NodeHandle, node2: NodeHandle) -> Option<&'static str> {
    let mode1 = tree.get(node1).mode;
    let mode2 = tree.get(node2).mode;

    match (mode1, mode2) {
        (Mode::Incremental, Mode::Incremental) => {
            let (bottom1, top1) = range_incremental(tree, node1);
            let (bottom2, top2) = range_incremental(tree, node2);
            ranges_overlap(bottom1, top1, bottom2, top2).then_some("incremental/incremental")
        },
        (Mode::Incremental, mode2) if mode2 != Mode::Hierarchical => {
            let (bottom1, top1) = range_incremental(tree, node1);
            let addr2 = tree.get(node2).addr;
            (addr2 >= bottom1 && addr2 <= top1).then_some("incremental/single")
        },
        (mode1, Mode::Incremental) if mode1 != Mode::Hierarchical => {
            let addr1 = tree.get(node1).addr;
            let (bottom2, top2) = range_incremental(tree, node2);
            (addr1 >= bottom2 && addr1 <= top2).then_some("single/incremental")
        },
        (mode1, mode2) if mode1 != Mode::Hierarchical && mode2 != Mode::Hierarchical => {
            single_vs_single_conflicts(tree, node1, node2)
        },
        _ => None,
    }
}

fn ranges_overlap(bottom1: u32, top1: u32, bottom2: u32, top2: u32) -> bool {
    (top2 >= bottom1 && top2 <= top1) || (top1 >= bottom2 && top1 <= top2)
}

fn single_vs_single_conflicts(tree: &AddressTree, node1: NodeHandle, node2: NodeHandle) -> Option<&'static str> {
    let addr1 = tree.get(node1).addr;
    let addr2 = tree.get(node2).addr;
    if addr1 != addr2 {
        return None;
    }
    let mask1 = tree.get(node1).mask;
    let mask2 = tree.get(node2).mask;
    if mask1 & mask2 == 0 {
        return None;
    }

    // The bitfield-within-register idiom: a full register and one of its
    // own mask-only children are allowed to share an address.
    if mask1 == NOMASK && is_child_of(tree, node1, node2) {
        return None;
    }
    if mask2 == NOMASK && is_child_of(tree, node2, node1) {
        return None;
    }
    Some("single/single")
}

fn report_overlap(
    config: AddressTreeConfig,
    path1: &str,
    path2: &str,
    kind: &str,
) -> Result<(), AddressError> {
    warn!(branch1 = path1, branch2 = path2, kind, "address space overlap");
    if config.overlap_policy == OverlapPolicy::Reject {
        return Err(AddressError::AddressSpaceOverlap(path1.to_string(), path2.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use slotmap::SlotMap;

    use super::*;
    use crate::node::Node;

    fn single_leaf(uid: &str, partial_addr: u32, mask: u32) -> Node {
        let mut node = Node::bare(uid);
        node.mode = Mode::Single;
        node.partial_addr = partial_addr;
        node.mask = mask;
        node
    }

    fn incremental_leaf(uid: &str, partial_addr: u32, size: u32) -> Node {
        let mut node = Node::bare(uid);
        node.mode = Mode::Incremental;
        node.partial_addr = partial_addr;
        node.size = size;
        node
    }

    #[test]
    fn addr_is_or_of_ancestors() {
        let mut arena = SlotMap::with_key();
        let child = arena.insert(single_leaf("child", 0x0f, NOMASK));
        let mut parent = Node::bare("parent");
        parent.partial_addr = 0x100;
        parent.children.push(child);
        let parent_handle = arena.insert(parent);

        let mut tree = AddressTree::new(arena, parent_handle);
        assign_addresses(&mut tree, parent_handle, 0).unwrap();
        assert_eq!(tree.get(parent_handle).addr, 0x100);
        assert_eq!(tree.get(child).addr, 0x10f);
    }

    #[test]
    fn hierarchical_with_no_children_demotes_to_single() {
        let mut arena = SlotMap::with_key();
        let root = arena.insert(Node::bare("root"));
        let mut tree = AddressTree::new(arena, root);
        assign_addresses(&mut tree, root, 0).unwrap();
        assert_eq!(tree.get(root).mode, Mode::Single);
    }

    #[test]
    fn incremental_block_past_address_space_is_rejected() {
        let mut arena = SlotMap::with_key();
        let node = arena.insert(incremental_leaf("block", 0xffff_fff0, 0x100));
        let mut tree = AddressTree::new(arena, node);
        assert!(matches!(
            assign_addresses(&mut tree, node, 0),
            Err(AddressError::ArraySizeExceedsRegisterBound(_))
        ));
    }

    fn flat_root(entries: Vec<(&str, Node)>) -> AddressTree {
        let mut arena = SlotMap::with_key();
        let mut root = Node::bare("root");
        for (path, node) in entries {
            let handle = arena.insert(node);
            root.children.push(handle);
            root.children_map.insert(path.to_string(), handle);
        }
        let root_handle = arena.insert(root);
        AddressTree::new(arena, root_handle)
    }

    #[test]
    fn overlapping_incremental_siblings_are_flagged() {
        let tree = flat_root(vec![
            ("a", incremental_leaf("a", 0x100, 0x10)),
            ("b", incremental_leaf("b", 0x108, 0x10)),
        ]);
        let mut tree_with_addr = tree.clone();
        assign_addresses(&mut tree_with_addr, tree.root(), 0).unwrap();

        let result = check_collisions(
            &tree_with_addr,
            AddressTreeConfig { overlap_policy: OverlapPolicy::Reject },
        );
        assert!(matches!(result, Err(AddressError::AddressSpaceOverlap(_, _))));
    }

    #[test]
    fn warn_policy_does_not_reject_overlaps() {
        let tree = flat_root(vec![
            ("a", incremental_leaf("a", 0x100, 0x10)),
            ("b", incremental_leaf("b", 0x108, 0x10)),
        ]);
        let mut tree_with_addr = tree.clone();
        assign_addresses(&mut tree_with_addr, tree.root(), 0).unwrap();

        check_collisions(&tree_with_addr, AddressTreeConfig { overlap_policy: OverlapPolicy::Warn })
            .unwrap();
    }

    #[test]
    fn bitfield_within_register_is_not_a_collision() {
        let mut arena = SlotMap::with_key();
        let bitfield = arena.insert(single_leaf("flag", 0x0, 0x0000_00ff));
        let mut register = single_leaf("reg", 0x0, NOMASK);
        register.children.push(bitfield);
        let register_handle = arena.insert(register);

        let mut root = Node::bare("root");
        root.children.push(register_handle);
        root.children.push(bitfield);
        root.children_map.insert("reg".to_string(), register_handle);
        root.children_map.insert("reg.flag".to_string(), bitfield);
        let root_handle = arena.insert(root);

        let mut tree = AddressTree::new(arena, root_handle);
        assign_addresses(&mut tree, root_handle, 0).unwrap();

        check_collisions(&tree, AddressTreeConfig { overlap_policy: OverlapPolicy::Reject }).unwrap();
    }

    proptest! {
        #[test]
        fn addr_equals_or_of_ancestors_for_any_chain(
            partial_addrs in proptest::collection::vec(any::<u32>(), 1..6),
        ) {
            let mut arena = SlotMap::with_key();
            let mut handles = Vec::with_capacity(partial_addrs.len());
            let mut previous: Option<NodeHandle> = None;
            for (i, &partial_addr) in partial_addrs.iter().enumerate() {
                let handle = arena.insert(single_leaf(&format!("n{i}"), partial_addr, NOMASK));
                if let Some(parent) = previous {
                    arena[parent].children.push(handle);
                }
                handles.push(handle);
                previous = Some(handle);
            }
            let root = handles[0];
            let mut tree = AddressTree::new(arena, root);
            assign_addresses(&mut tree, root, 0).unwrap();

            let mut expected = 0u32;
            for (&handle, &partial_addr) in handles.iter().zip(partial_addrs.iter()) {
                expected |= partial_addr;
                prop_assert_eq!(tree.get(handle).addr, expected);
            }
        }
    }
}
