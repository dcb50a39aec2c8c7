//! Transaction staging, reply validation, and the packet-counter reliability
//! layer (§4.2, §4.3).
//!
//! Both [`engine::TransactionEngine`] and [`reliability::ReliabilityLayer`]
//! are pure: no sockets, no sleeping, no background tasks. They decode and
//! encode words and hand back actions for a driver to execute, following
//! the same action-returning shape as the codec's packet walker one layer
//! down.

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod reliability;

pub use config::{EngineConfig, ReliabilityConfig};
pub use engine::{OperationId, OperationOutcome, TransactionEngine};
pub use env::Environment;
pub use error::EngineError;
pub use reliability::{ReliabilityAction, ReliabilityLayer};
