//! Core types for the quarry PBS client.
//!
//! Shared value types used by every other crate in the workspace: the
//! captured outcome of one remote command, the error taxonomy, and the
//! cluster configuration handed to the transport and connection layers.

pub mod config;
pub mod error;
pub mod outcome;

pub use config::{ClusterConfig, PbsCommands, ResourceDefaults};
pub use error::{Error, Result};
pub use outcome::Outcome;
