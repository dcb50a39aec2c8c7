//! Protocol-tag registry (§6, §12 "client factory registry"), ported from
//! `ClientFactory.cpp`. Write-once at startup, read-only thereafter (§5):
//! this crate exposes an explicitly constructed [`ClientFactory`] rather
//! than the original's process-wide singleton, per the Design Notes' call
//! to replace singleton factories with injected registries.

use std::collections::HashMap;

use rbp_proto::RbpVersion;

use crate::{error::ClientError, uri::ClientUri};

/// Which concrete transport a registered protocol tag uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain UDP datagrams.
    Udp,
    /// Length-prefixed TCP stream.
    Tcp,
}

/// What a protocol tag resolves to: the wire version and the transport it
/// rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientDescriptor {
    /// RBP version this tag speaks.
    pub version: RbpVersion,
    /// Transport this tag rides on.
    pub transport: TransportKind,
}

/// Maps protocol tags to [`ClientDescriptor`]s, mirroring
/// `ClientFactory::getInstance`'s `add<...>(tag)` registrations.
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    creators: HashMap<String, ClientDescriptor>,
}

impl ClientFactory {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { creators: HashMap::new() }
    }

    /// The four tags spec.md §6 names as examples, pre-registered.
    #[must_use]
    pub fn with_standard_protocols() -> Self {
        let mut factory = Self::new();
        factory.register("ipbusudp-1.3", ClientDescriptor { version: RbpVersion::V1, transport: TransportKind::Udp });
        factory.register("ipbusudp-2.0", ClientDescriptor { version: RbpVersion::V2, transport: TransportKind::Udp });
        factory.register("ipbustcp-1.3", ClientDescriptor { version: RbpVersion::V1, transport: TransportKind::Tcp });
        factory.register("chtcp-1.3", ClientDescriptor { version: RbpVersion::V1, transport: TransportKind::Tcp });
        factory
    }

    /// Register a protocol tag.
    pub fn register(&mut self, tag: impl Into<String>, descriptor: ClientDescriptor) {
        self.creators.insert(tag.into(), descriptor);
    }

    /// Resolve a parsed URI's `protocol` field to its descriptor.
    ///
    /// # Errors
    ///
    /// `ClientError::UnknownProtocol` if no tag matches.
    pub fn resolve(&self, uri: &ClientUri) -> Result<ClientDescriptor, ClientError> {
        self.creators
            .get(&uri.protocol)
            .copied()
            .ok_or_else(|| ClientError::UnknownProtocol(uri.protocol.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_protocols_cover_the_four_named_tags() {
        let factory = ClientFactory::with_standard_protocols();
        let uri = ClientUri::parse("ipbusudp-2.0://fpga0:50001/board.xml").unwrap();
        let descriptor = factory.resolve(&uri).unwrap();
        assert_eq!(descriptor.version, RbpVersion::V2);
        assert_eq!(descriptor.transport, TransportKind::Udp);
    }

    #[test]
    fn unregistered_tag_is_rejected() {
        let factory = ClientFactory::with_standard_protocols();
        let uri = ClientUri::parse("dummy://fpga0:50001/board.xml").unwrap();
        assert!(matches!(factory.resolve(&uri), Err(ClientError::UnknownProtocol(_))));
    }
}
