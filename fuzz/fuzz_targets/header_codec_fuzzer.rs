//! Fuzz target for the transaction and packet header codecs.
//!
//! # Invariants
//!
//! - `extract_header` never panics on arbitrary bytes, whatever version is
//!   assumed.
//! - `calculate_header` then `extract_header` round-trips `(type, word
//!   count, transaction id)` for every value `word_count` can hold.
//! - `PacketHeader::decode` never panics on an arbitrary word, and
//!   re-encoding a decoded header then decoding it again yields the same
//!   counter and packet type.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rbp_proto::{PacketHeader, RbpVersion, TransactionHeader, TransactionType};

#[derive(Debug, Arbitrary)]
struct Input {
    word: u32,
    version_is_v2: bool,
    transaction_type: TransactionTypeArb,
    transaction_id: u16,
    word_count: u8,
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

fuzz_target!(|input: Input| {
    let version = if input.version_is_v2 { RbpVersion::V2 } else { RbpVersion::V1 };

    let _ = TransactionHeader::extract_header(version, input.word);

    if let Ok(word) =
        TransactionHeader::calculate_header(version, input.transaction_type.into(), input.transaction_id, input.word_count)
    {
        let decoded = TransactionHeader::extract_header(version, word)
            .expect("a header this crate just encoded must decode");
        assert_eq!(decoded.transaction_type, input.transaction_type.into());
        assert_eq!(decoded.word_count, input.word_count);
        assert_eq!(decoded.transaction_id, input.transaction_id);
    }

    if let Ok(header) = PacketHeader::decode(input.word) {
        let re_decoded = PacketHeader::decode(header.encode()).unwrap();
        assert_eq!(re_decoded.packet_counter, header.packet_counter);
        assert_eq!(re_decoded.packet_type, header.packet_type);
    }
});
