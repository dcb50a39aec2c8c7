//! A representative register map, built through the public `build_tree`
//! entry point, flattened to its dotted paths and resolved
//! `(addr, mask, mode, size, permissions)` tuples (§11.4).

use std::collections::HashMap;

use rbp_address::{
    AddressError, AddressFileLoader, AddressTree, AddressTreeConfig, AttributedNode, ClassRegistry, Mode,
    Permissions, build_tree,
};

struct TestElement {
    attrs: HashMap<&'static str, &'static str>,
    children: Vec<TestElement>,
}

impl TestElement {
    fn new(attrs: &[(&'static str, &'static str)]) -> Self {
        Self { attrs: attrs.iter().copied().collect(), children: Vec::new() }
    }

    fn with_children(mut self, children: Vec<TestElement>) -> Self {
        self.children = children;
        self
    }
}

impl AttributedNode for TestElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).copied()
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

struct NoModules;
impl AddressFileLoader for NoModules {
    fn load(&mut self, _module_expr: &str) -> Result<AddressTree, AddressError> {
        unreachable!("this tree has no module nodes")
    }
}

/// `board` -> `fpga0` (hierarchical) -> `status` (plain leaf, demotes to
/// `Single`), `ctrl` (demotes to `Single` because its only child is a
/// bitfield mask), `ctrl.enable` (the bitfield), `fifo` (an explicit
/// `NonIncremental` port).
#[test]
fn representative_register_map_resolves_the_expected_addresses_and_modes() {
    let root = TestElement::new(&[("id", "board")]).with_children(vec![
        TestElement::new(&[("id", "fpga0"), ("address", "0x1000")]).with_children(vec![
            TestElement::new(&[("id", "status"), ("address", "0x0"), ("permission", "r")]),
            TestElement::new(&[("id", "ctrl"), ("address", "0x1"), ("permission", "rw")])
                .with_children(vec![TestElement::new(&[("id", "enable"), ("mask", "0x1")])]),
            TestElement::new(&[
                ("id", "fifo"),
                ("address", "0x10"),
                ("mode", "non-incremental"),
                ("size", "0x4"),
                ("permission", "r"),
            ]),
        ]),
    ]);

    let registry = ClassRegistry::new();
    let mut loader = NoModules;
    let tree = build_tree(&root, &registry, &mut loader, AddressTreeConfig::default()).unwrap();

    let entries: Vec<(&str, u32, u32, Mode, u32, Permissions)> = tree
        .flatten()
        .into_iter()
        .map(|(path, node)| (path, node.addr, node.mask, node.mode, node.size, node.permissions))
        .collect();

    assert_eq!(
        entries,
        vec![
            ("fpga0", 0x1000, rbp_address::NOMASK, Mode::Hierarchical, 0, Permissions::NONE),
            ("fpga0.ctrl", 0x1001, rbp_address::NOMASK, Mode::Single, 0, Permissions::READ_WRITE),
            ("fpga0.ctrl.enable", 0x1001, 0x1, Mode::Single, 0, Permissions::NONE),
            ("fpga0.fifo", 0x1010, rbp_address::NOMASK, Mode::NonIncremental, 0x4, Permissions::READ),
            ("fpga0.status", 0x1000, rbp_address::NOMASK, Mode::Single, 0, Permissions::READ),
        ]
    );
}
