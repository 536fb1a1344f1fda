//! Remote shell transport for the quarry PBS client.
//!
//! One lazily-established, reusable ssh session per connection; blocking
//! command execution (one awaited round trip per operation) and the minimal
//! file primitives job control needs. This is not a general-purpose ssh
//! layer.

pub mod shell;
pub mod ssh;

pub use shell::{ENV_PREFIX, RemoteShell, sh_quote};
pub use ssh::SshShell;
