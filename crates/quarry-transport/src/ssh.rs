//! openssh-backed implementation of [`RemoteShell`].

use camino::Utf8Path;
use openssh::{KnownHosts, Session, SessionBuilder, Stdio};
use quarry_core::{ClusterConfig, Error, Outcome, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use crate::shell::{ENV_PREFIX, RemoteShell, sh_quote};

/// One reusable ssh session to the cluster's login host.
///
/// The session is established on first use and replaced when its liveness
/// check fails. Holding the session is the only state this type carries
/// across calls.
pub struct SshShell {
    config: ClusterConfig,
    session: Option<Session>,
}

impl SshShell {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Fold every underlying ssh failure into the transport taxonomy:
    /// a refused connection is kept recognizable, everything else becomes
    /// one `Transport` kind.
    fn classify(&self, err: openssh::Error) -> Error {
        let refused = matches!(
            &err,
            openssh::Error::Connect(io) if io.kind() == std::io::ErrorKind::ConnectionRefused
        ) || err.to_string().contains("Connection refused");
        if refused {
            Error::ConnectionRefused {
                host: self.config.host.clone(),
            }
        } else {
            Error::Transport(err.to_string())
        }
    }

    async fn connect(&self) -> Result<Session> {
        let mut builder = SessionBuilder::default();
        builder
            .user(self.config.user.clone())
            .port(self.config.port)
            .connect_timeout(self.config.connect_timeout)
            // the ssh client's default 3-miss tolerance applies on top
            .server_alive_interval(self.config.keepalive_interval)
            // operator-controlled cluster, host keys are not pre-distributed
            .known_hosts_check(KnownHosts::Accept);
        if let Some(keyfile) = &self.config.keyfile {
            builder.keyfile(keyfile.as_std_path());
        }
        debug!(host = %self.config.host, user = %self.config.user, "establishing ssh session");
        builder
            .connect(&self.config.host)
            .await
            .map_err(|e| self.classify(e))
    }

    /// The live session, connecting lazily and replacing a session whose
    /// liveness check fails. Reconnection is the only implicit retry; a
    /// failed command is never re-run.
    async fn session(&mut self) -> Result<&Session> {
        let alive = match &self.session {
            Some(session) => session.check().await.is_ok(),
            None => false,
        };
        if !alive {
            if self.session.take().is_some() {
                debug!(host = %self.config.host, "ssh session went stale, reconnecting");
            }
            let session = self.connect().await?;
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| Error::Transport("ssh session not established".into()))
    }
}

impl RemoteShell for SshShell {
    async fn execute(&mut self, command: &str, success_statuses: &[i32]) -> Result<Outcome> {
        let full = format!("{ENV_PREFIX}{command}");
        let result = {
            let session = self.session().await?;
            session
                .shell(&full)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
        };
        let output = result.map_err(|e| self.classify(e))?;

        let outcome = Outcome::new(
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        );
        if outcome.is_success_in(success_statuses) {
            debug!(command, status = ?outcome.status, "remote command finished");
        } else {
            error!(
                command,
                status = ?outcome.status,
                stderr = %outcome.stderr.trim(),
                "remote command failed"
            );
        }
        Ok(outcome)
    }

    async fn upload(&mut self, bytes: &[u8], destination: &Utf8Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            self.remote_mkdir(parent).await?;
        }
        let command = format!("cat > {}", sh_quote(destination.as_str()));
        let result = {
            let session = self.session().await?;
            write_through(session, &command, bytes).await
        };
        let output = result.map_err(Error::Transport)?;
        if output.status.code() != Some(0) {
            let outcome = Outcome::new(
                output.status.code(),
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            );
            return Err(Error::command_failed(
                format!("failed to upload {destination}: {}", outcome.describe()),
                outcome,
            ));
        }
        debug!(bytes = bytes.len(), path = %destination, "uploaded file");
        Ok(())
    }

    async fn download(&mut self, path: &Utf8Path) -> Result<Vec<u8>> {
        if let Some(parent) = path.parent() {
            self.remote_mkdir(parent).await?;
        }
        let command = format!("cat {}", sh_quote(path.as_str()));
        let result = {
            let session = self.session().await?;
            session
                .shell(&command)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
        };
        let output = result.map_err(|e| self.classify(e))?;
        if output.status.code() != Some(0) {
            let outcome = Outcome::new(
                output.status.code(),
                String::new(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            );
            return Err(Error::command_failed(
                format!("failed to download {path}: {}", outcome.describe()),
                outcome,
            ));
        }
        debug!(bytes = output.stdout.len(), path = %path, "downloaded file");
        Ok(output.stdout)
    }
}

/// Spawn `command` with a piped stdin, stream `bytes` into it, and collect
/// the output.
async fn write_through(
    session: &Session,
    command: &str,
    bytes: &[u8],
) -> std::result::Result<std::process::Output, String> {
    let mut child = session
        .shell(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .await
        .map_err(|e| e.to_string())?;

    if let Some(mut stdin) = child.stdin().take() {
        stdin.write_all(bytes).await.map_err(|e| e.to_string())?;
        stdin.flush().await.map_err(|e| e.to_string())?;
    }

    child.wait_with_output().await.map_err(|e| e.to_string())
}
