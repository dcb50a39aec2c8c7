//! Client
//!
//! URI dispatch, transport, and the per-client dispatch-cycle driver for the
//! register-bus protocol (§6, §10).
//!
//! # Architecture
//!
//! [`ClientUri::parse`] turns `protocol://host:port/path.ext?k=v` into its
//! fields; [`ClientFactory`] resolves the `protocol` tag to a
//! [`RbpVersion`]/[`TransportKind`] pair; [`RbpClient`] then wires a
//! [`rbp_engine::TransactionEngine`], an optional
//! [`rbp_engine::ReliabilityLayer`] (v2.0 only), and an optional
//! [`rbp_address::AddressTree`] to a concrete [`Transport`] ([`UdpTransport`]
//! or [`TcpTransport`]) and drives one `dispatch` cycle per call.
//!
//! # Components
//!
//! - [`ClientUri`]: parsed client URI
//! - [`ClientFactory`], [`ClientDescriptor`], [`TransportKind`]: protocol-tag
//!   registry
//! - [`Transport`], [`UdpTransport`], [`TcpTransport`]: transport
//!   collaborator
//! - [`RbpClient`]: the dispatch-cycle driver
//! - [`ClientConfig`]: plain configuration struct
//! - [`ClientError`]: this crate's error taxonomy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod error;
mod factory;
mod transport;
mod uri;

pub use client::RbpClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use factory::{ClientDescriptor, ClientFactory, TransportKind};
pub use rbp_engine::Environment;
pub use transport::{TcpTransport, Transport, UdpTransport};
pub use uri::ClientUri;
