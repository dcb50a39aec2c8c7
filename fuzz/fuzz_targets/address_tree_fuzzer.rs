//! Fuzz target for the address-tree builder.
//!
//! # Invariants
//!
//! - `build_tree` never panics on an arbitrary attribute tree, whatever
//!   shape the `id`/`address`/`size`/`mask`/`permission`/`class`/`module`
//!   attributes describe.
//! - Every `AddressError` it can raise is returned, never turned into a
//!   panic or an unwinding slice index.

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rbp_address::{AddressError, AddressFileLoader, AddressTreeConfig, AttributedNode, ClassRegistry, build_tree};

#[derive(Debug, Arbitrary)]
struct ArbitraryElement {
    id: Option<String>,
    address: Option<u32>,
    size: Option<u32>,
    mask: Option<u32>,
    permission: Option<PermissionArb>,
    mode: Option<ModeArb>,
    children: Vec<ArbitraryElement>,
}

#[derive(Debug, Arbitrary)]
enum PermissionArb {
    R,
    W,
    Rw,
}

#[derive(Debug, Arbitrary)]
enum ModeArb {
    Single,
    Incremental,
    NonIncremental,
    Hierarchical,
}

struct TestElement {
    attrs: HashMap<&'static str, String>,
    children: Vec<TestElement>,
}

impl AttributedNode for TestElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

struct NoModules;
impl AddressFileLoader for NoModules {
    fn load(&mut self, _module_expr: &str) -> Result<rbp_address::AddressTree, AddressError> {
        Err(AddressError::UnknownPath("fuzz input never names a module".to_string()))
    }
}

const MAX_NODES: usize = 64;

fn to_test_element(input: ArbitraryElement, budget: &mut usize) -> TestElement {
    let mut attrs = HashMap::new();
    if let Some(id) = &input.id {
        attrs.insert("id", id.clone());
    }
    if let Some(address) = input.address {
        attrs.insert("address", format!("{address:#x}"));
    }
    if let Some(size) = input.size {
        attrs.insert("size", format!("{size:#x}"));
    }
    if let Some(mask) = input.mask {
        attrs.insert("mask", format!("{mask:#x}"));
    }
    if let Some(permission) = input.permission {
        let value = match permission {
            PermissionArb::R => "r",
            PermissionArb::W => "w",
            PermissionArb::Rw => "rw",
        };
        attrs.insert("permission", value.to_string());
    }
    if let Some(mode) = input.mode {
        let value = match mode {
            ModeArb::Single => "single",
            ModeArb::Incremental => "incremental",
            ModeArb::NonIncremental => "non-incremental",
            ModeArb::Hierarchical => "hierarchical",
        };
        attrs.insert("mode", value.to_string());
    }

    let mut children = Vec::new();
    for child in input.children {
        if *budget == 0 {
            break;
        }
        *budget -= 1;
        children.push(to_test_element(child, budget));
    }

    TestElement { attrs, children }
}

fuzz_target!(|input: ArbitraryElement| {
    let mut budget = MAX_NODES;
    let root = to_test_element(input, &mut budget);
    let registry = ClassRegistry::new();
    let mut loader = NoModules;

    let _ = build_tree(&root, &registry, &mut loader, AddressTreeConfig::default());
});
