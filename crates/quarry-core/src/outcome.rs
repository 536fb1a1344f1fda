//! Captured result of one remote command execution.

/// What one remote command produced: exit code, both output streams, and an
/// optional explanatory message attached by whichever layer decided the
/// outcome was worth explaining.
///
/// Constructed once per execution and never mutated. `status` is `None` only
/// when the invocation itself failed (e.g. the remote process was killed
/// before exiting), not when the command returned a non-zero code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub message: Option<String>,
}

impl Outcome {
    pub fn new(status: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
            message: None,
        }
    }

    /// Attach an explanatory message, consuming self.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the exit code is in the caller-declared success set.
    pub fn is_success_in(&self, success_statuses: &[i32]) -> bool {
        matches!(self.status, Some(code) if success_statuses.contains(&code))
    }

    /// One-line description for failure messages: exit code plus whichever
    /// output streams are non-empty.
    pub fn describe(&self) -> String {
        let mut parts = vec![match self.status {
            Some(code) => format!("exit status {code}"),
            None => "no exit status".to_string(),
        }];
        if !self.stderr.trim().is_empty() {
            parts.push(format!("stderr: {}", self.stderr.trim()));
        }
        if !self.stdout.trim().is_empty() {
            parts.push(format!("stdout: {}", self.stdout.trim()));
        }
        parts.join(", ")
    }
}
