//! PBS job control over a remote shell.
//!
//! The public surface is [`PbsConnection`]: submit, query, cancel, release
//! and account for jobs on a PBS-family scheduler reached through a
//! [`quarry_transport::RemoteShell`]. The scheduler itself stays remote;
//! everything here drives its command-line tools and reconciles their
//! output into typed records.

pub mod connection;
pub mod exit_status;
pub mod payload;
pub mod script;

pub use connection::{PbsConnection, SubmitOptions};
pub use exit_status::{CANCELLED_EXIT_STATUS, ExitState, exit_reason, exit_state};
pub use payload::{
    Job, JobList, JobState, PayloadError, Queue, QueueList, Resources, StateCount,
    canonicalize_keys, parse_job_list, parse_queue_list,
};
pub use script::{Hooks, render_wrapper, sanitize_job_name};
