//! Client-level error taxonomy (§7 "Configuration" kind, plus the errors
//! the lower crates already own).

use thiserror::Error;

/// Errors raised while dispatching a URI to a client, loading an
/// address-map file, or driving a dispatch cycle.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No registered constructor for the URI's `protocol` tag.
    #[error("protocol {0:?} is not registered with the client factory")]
    UnknownProtocol(String),

    /// The URI failed to parse under the `protocol://host:port/path?k=v`
    /// grammar.
    #[error("malformed client URI {0:?}: {1}")]
    MalformedUri(String, String),

    /// A `module` node-shape named a file-loader invocation that returned
    /// other than exactly one tree.
    #[error("expected exactly one address table file for module {0:?}, got {1}")]
    IncorrectAddressTableFileCount(String, usize),

    /// The file loader collaborator failed to open the named address
    /// table.
    #[error("failed to open address table file {0:?}: {1}")]
    FailedToOpenAddressTableFile(String, String),

    /// A v2.0 client was asked to dispatch without a reliability layer, or
    /// a v1.x client was asked to use one.
    #[error("reliability layer is required for RBP 2.0 clients and absent otherwise")]
    ReliabilityLayerMismatch,

    /// STATUS/RESEND recovery exhausted its configured rounds; the
    /// connection is desynchronized and must be reopened.
    #[error("recovery exhausted its configured rounds, connection desynchronized")]
    RecoveryExhausted,

    /// The transport collaborator failed to send or receive a packet.
    #[error("transport I/O error: {0}")]
    Transport(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] rbp_engine::EngineError),

    #[error(transparent)]
    Address(#[from] rbp_address::AddressError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_protocol_names_the_tag() {
        let err = ClientError::UnknownProtocol("dummy-1.0".to_string());
        assert!(err.to_string().contains("dummy-1.0"));
    }
}
