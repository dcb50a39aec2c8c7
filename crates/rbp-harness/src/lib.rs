//! Deterministic simulation harness for register-bus protocol testing.
//!
//! Turmoil-based implementations of the [`rbp_engine::Environment`] and
//! [`rbp_client::Transport`] traits for reproducible testing under packet
//! loss, reordering, and partitions, plus a toy in-simulation register-file
//! target to dispatch against.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;
pub mod sim_target;
pub mod sim_transport;

pub use sim_env::SimEnv;
pub use sim_target::{RegisterFile, TargetRecoveryState};
pub use sim_transport::{SimTcpTransport, SimUdpTransport};
