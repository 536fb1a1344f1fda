//! The remote shell abstraction the connection layer is written against.

use camino::Utf8Path;
use quarry_core::{Error, Outcome, Result};

/// Environment normalization prefixed onto every remote command so that
/// timestamps and text output parse the same regardless of the remote
/// host's configured locale.
pub const ENV_PREFIX: &str = "export TZ=UTC LC_ALL=C.UTF-8; ";

/// Single-quote a string for the remote shell.
///
/// This protects legitimate operands (paths, job names) from word splitting;
/// it does not make the command layer safe against hostile caller input.
pub fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Blocking command execution plus minimal file operations over one
/// persistent remote session.
///
/// Implementations are not safe for concurrent use; the `&mut self` receivers
/// serialize callers at compile time. There is no per-command timeout:
/// a bounded wait must be encoded in the remote command itself or imposed by
/// the caller around the whole operation.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// Run one command through the session and capture its outcome. The exit
    /// code decides only how the execution is logged; turning an unexpected
    /// code into an error is [`RemoteShell::execute_safe`]'s job.
    async fn execute(&mut self, command: &str, success_statuses: &[i32]) -> Result<Outcome>;

    /// Write `bytes` to `destination`, creating the destination directory
    /// first if needed.
    async fn upload(&mut self, bytes: &[u8], destination: &Utf8Path) -> Result<()>;

    /// Read a remote file. Also ensures the containing directory exists
    /// first, mirroring [`RemoteShell::upload`].
    async fn download(&mut self, path: &Utf8Path) -> Result<Vec<u8>>;

    /// Run a command and fail unless the exit code lands in
    /// `success_statuses`, attaching `fail_message` and the full outcome.
    async fn execute_safe(
        &mut self,
        command: &str,
        fail_message: &str,
        success_statuses: &[i32],
    ) -> Result<Outcome> {
        let outcome = self.execute(command, success_statuses).await?;
        if outcome.is_success_in(success_statuses) {
            Ok(outcome)
        } else {
            let message = format!("{fail_message}: {}", outcome.describe());
            Err(Error::command_failed(message, outcome))
        }
    }

    async fn remote_exists(&mut self, path: &Utf8Path) -> Result<bool> {
        let command = format!("test -e {}", sh_quote(path.as_str()));
        let outcome = self.execute(&command, &[0, 1]).await?;
        match outcome.status {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(Error::command_failed(
                format!("failed to test {path}: {}", outcome.describe()),
                outcome,
            )),
        }
    }

    async fn remote_mkdir(&mut self, path: &Utf8Path) -> Result<Outcome> {
        let command = format!("mkdir -p {}", sh_quote(path.as_str()));
        self.execute_safe(&command, &format!("failed to create directory {path}"), &[0])
            .await
    }

    async fn remote_chmod(&mut self, path: &Utf8Path, mode: &str) -> Result<Outcome> {
        let command = format!("chmod {mode} {}", sh_quote(path.as_str()));
        self.execute_safe(&command, &format!("failed to chmod {path}"), &[0])
            .await
    }

    async fn remote_delete(&mut self, path: &Utf8Path, recurse: bool) -> Result<Outcome> {
        let flags = if recurse { "-rf" } else { "-f" };
        let command = format!("rm {flags} {}", sh_quote(path.as_str()));
        self.execute_safe(&command, &format!("failed to delete {path}"), &[0])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote("plain"), "'plain'");
        assert_eq!(sh_quote("with space"), "'with space'");
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
    }
}
