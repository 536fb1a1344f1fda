//! The error taxonomy shared by every public operation.

use crate::outcome::Outcome;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a connection operation can report.
///
/// Operational failures (unreachable host, command exited outside its
/// success set, job unknown to the scheduler) are returned as `Err` values
/// and must be inspected by the caller; `Validation` marks caller bugs and
/// is produced before any remote call is made.
#[derive(Error, Debug)]
pub enum Error {
    /// The remote host actively refused the connection. Lifted out of
    /// `Transport` so callers can react to it distinctly.
    #[error("connection refused by {host}")]
    ConnectionRefused { host: String },

    /// The session or channel broke: the host could not be reached or the
    /// transport errored mid-command.
    #[error("remote shell transport failed: {0}")]
    Transport(String),

    /// The remote command ran but exited outside the declared success set.
    /// Carries the full outcome so the failure can be diagnosed without
    /// re-running the command.
    #[error("{message}")]
    CommandFailed { message: String, outcome: Outcome },

    /// The scheduler explicitly reported the job id as unknown or expired
    /// from history.
    #[error("job {0} is unknown to the scheduler")]
    JobNotFound(String),

    /// The scheduler rejected an operation because the job is not in a state
    /// that permits it.
    #[error("job {job_id} is not in a state that permits {operation}")]
    InvalidState { job_id: String, operation: String },

    /// The scheduler's output could not be decoded into the typed model.
    #[error("failed to decode scheduler output: {0}")]
    Payload(String),

    /// The caller supplied malformed input. Reported before any remote
    /// side effect.
    #[error("invalid argument: {0}")]
    Validation(String),
}

impl Error {
    pub fn command_failed(message: impl Into<String>, outcome: Outcome) -> Self {
        let message = message.into();
        Self::CommandFailed {
            outcome: outcome.with_message(message.clone()),
            message,
        }
    }

    /// The captured outcome, for errors that carry one.
    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::CommandFailed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_carries_outcome() {
        let err = Error::command_failed("qsub failed", Outcome::new(Some(1), "", "bad queue"));
        assert_eq!(err.to_string(), "qsub failed");
        let outcome = err.outcome().unwrap();
        assert_eq!(outcome.status, Some(1));
        assert_eq!(outcome.message.as_deref(), Some("qsub failed"));
    }

    #[test]
    fn test_display() {
        let err = Error::JobNotFound("42.cluster".into());
        assert_eq!(err.to_string(), "job 42.cluster is unknown to the scheduler");
    }
}
