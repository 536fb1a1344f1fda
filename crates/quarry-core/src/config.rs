//! Cluster connection and submission settings.
//!
//! One `ClusterConfig` value is built by the embedding application and passed
//! into the transport and connection constructors. Nothing here is global.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;

/// Paths to the scheduler's command-line tools on the remote host. They are
/// configurable because cluster installs rarely put them on a login shell's
/// default `PATH`.
#[derive(Debug, Clone)]
pub struct PbsCommands {
    pub qsub: String,
    pub qstat: String,
    pub qdel: String,
    pub qrls: String,
    pub qselect: String,
    pub qmgr: String,
}

impl Default for PbsCommands {
    fn default() -> Self {
        Self {
            qsub: "qsub".into(),
            qstat: "qstat".into(),
            qdel: "qdel".into(),
            qrls: "qrls".into(),
            qselect: "qselect".into(),
            qmgr: "qmgr".into(),
        }
    }
}

/// Resource requests applied when a submission does not override them.
#[derive(Debug, Clone)]
pub struct ResourceDefaults {
    pub ncpus: u32,
    pub mem_bytes: u64,
    pub walltime_secs: u64,
}

impl Default for ResourceDefaults {
    fn default() -> Self {
        Self {
            ncpus: 1,
            mem_bytes: 4 * 1024 * 1024 * 1024,
            walltime_secs: 3600,
        }
    }
}

/// Everything the client needs to know about one cluster and the identity it
/// submits under.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    /// Private key for public-key auth; `None` lets the ssh client pick.
    pub keyfile: Option<Utf8PathBuf>,
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
    /// Namespace prepended to every job name and project tag submitted by
    /// this instance, so one cluster account can host several deployments.
    pub instance_tag: String,
    /// Primary group jobs are submitted under (`-W group_list=`).
    pub group: String,
    /// Project identity used when filtering qmgr limit listings.
    pub project: String,
    /// File-creation mask applied to submitted jobs (`-W umask=`).
    pub umask: String,
    /// Prefix of caller-side working directories that maps onto
    /// `cluster_root` on the remote side.
    pub local_root: Utf8PathBuf,
    pub cluster_root: Utf8PathBuf,
    /// Shell fragment prepended to every rendered job script.
    pub prelude: String,
    pub commands: PbsCommands,
    /// qdel/qstat exit codes meaning "the job is already gone". Observed
    /// scheduler behavior, so kept configurable per install: 35 is the
    /// "job has finished" exit, 153 "unknown job id".
    pub graceful_exit_codes: Vec<i32>,
    pub defaults: ResourceDefaults,
}

impl ClusterConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        instance_tag: impl Into<String>,
    ) -> Self {
        let user = user.into();
        let instance_tag = instance_tag.into();
        Self {
            host: host.into(),
            port: 22,
            keyfile: None,
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(300),
            group: user.clone(),
            project: instance_tag.clone(),
            umask: "0077".into(),
            local_root: Utf8PathBuf::from("/"),
            cluster_root: Utf8PathBuf::from("/"),
            prelude: String::new(),
            commands: PbsCommands::default(),
            graceful_exit_codes: vec![35, 153],
            defaults: ResourceDefaults::default(),
            user,
            instance_tag,
        }
    }

    /// Project tag grouping related jobs: the instance tag, plus an optional
    /// caller-supplied suffix.
    pub fn project_name(&self, suffix: Option<&str>) -> String {
        match suffix {
            Some(suffix) => format!("{}_{}", self.instance_tag, suffix),
            None => self.instance_tag.clone(),
        }
    }

    /// Translate a caller-side working directory into the cluster's path
    /// convention by substituting the configured prefix.
    pub fn remote_workdir(&self, local: &Utf8Path) -> Result<Utf8PathBuf> {
        let relative = local.strip_prefix(&self.local_root).map_err(|_| {
            Error::Validation(format!(
                "working directory {local} is not under the configured local root {}",
                self.local_root
            ))
        })?;
        Ok(self.cluster_root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name() {
        let config = ClusterConfig::new("cluster.example.org", "svc", "prod");
        assert_eq!(config.project_name(None), "prod");
        assert_eq!(config.project_name(Some("batch7")), "prod_batch7");
    }

    #[test]
    fn test_remote_workdir() {
        let mut config = ClusterConfig::new("cluster.example.org", "svc", "prod");
        config.local_root = Utf8PathBuf::from("/data/runs");
        config.cluster_root = Utf8PathBuf::from("/scratch/svc");

        let remote = config.remote_workdir(Utf8Path::new("/data/runs/run42")).unwrap();
        assert_eq!(remote, Utf8PathBuf::from("/scratch/svc/run42"));

        assert!(config.remote_workdir(Utf8Path::new("/elsewhere/run42")).is_err());
    }
}
