//! Fuzz target for the packet inspector's request/reply walkers.
//!
//! # Invariants
//!
//! - `walk_request` never panics on an arbitrary word buffer, for either
//!   version.
//! - `walk_reply` never panics on an arbitrary word buffer against an
//!   arbitrary `expected` type list, for either version.
//! - All decode errors surface as `ProtocolError`, never a panic or an
//!   out-of-bounds slice.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rbp_proto::{RbpVersion, TransactionType, inspector};

#[derive(Debug, Arbitrary)]
struct Input {
    version_is_v2: bool,
    words: Vec<u32>,
    expected: Vec<TransactionTypeArb>,
}

#[derive(Debug, Arbitrary, Clone, Copy)]
enum TransactionTypeArb {
    Read,
    NiRead,
    Write,
    NiWrite,
    RmwBits,
    RmwSum,
    Bot,
    ConfigSpace,
}

impl From<TransactionTypeArb> for TransactionType {
    fn from(value: TransactionTypeArb) -> Self {
        match value {
            TransactionTypeArb::Read => Self::Read,
            TransactionTypeArb::NiRead => Self::NiRead,
            TransactionTypeArb::Write => Self::Write,
            TransactionTypeArb::NiWrite => Self::NiWrite,
            TransactionTypeArb::RmwBits => Self::RmwBits,
            TransactionTypeArb::RmwSum => Self::RmwSum,
            TransactionTypeArb::Bot => Self::Bot,
            TransactionTypeArb::ConfigSpace => Self::ConfigSpace,
        }
    }
}

#[derive(Default)]
struct NullRequestVisitor;
impl inspector::RequestVisitor for NullRequestVisitor {}

#[derive(Default)]
struct NullReplyVisitor;
impl inspector::ReplyVisitor for NullReplyVisitor {}

fuzz_target!(|input: Input| {
    let version = if input.version_is_v2 { RbpVersion::V2 } else { RbpVersion::V1 };
    let expected: Vec<TransactionType> = input.expected.iter().copied().map(Into::into).collect();

    let mut request_visitor = NullRequestVisitor;
    let _ = inspector::walk_request(version, &input.words, &mut request_visitor);

    let mut reply_visitor = NullReplyVisitor;
    let _ = inspector::walk_reply(version, &input.words, &expected, &mut reply_visitor);
});
