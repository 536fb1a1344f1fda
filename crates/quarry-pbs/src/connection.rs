//! The public job-control façade.
//!
//! A [`PbsConnection`] composes remote commands, sends them through one
//! [`RemoteShell`], and reconciles the output with the payload transformer,
//! the limits parser, and the exit-status interpreter. Methods take
//! `&mut self`: one connection supports one in-flight operation, and callers
//! that need concurrency use one connection per caller.

use camino::Utf8Path;
use chrono::Utc;
use quarry_core::{ClusterConfig, Error, Outcome, Result};
use quarry_parsers::{
    Principal, format_size_bytes, format_walltime, parse_attribute, parse_limits,
};
use quarry_transport::{RemoteShell, SshShell, sh_quote};
use tracing::debug;

use crate::exit_status::{self, ExitState};
use crate::payload::{Job, JobList, QueueList, parse_job_list, parse_queue_list};
use crate::script::{self, Hooks};

/// qstat/qdel/qrls exit for an id the scheduler no longer knows.
const UNKNOWN_JOB_EXIT: i32 = 153;
/// qrls/qdel exit when the job's state does not permit the request.
const BAD_STATE_EXIT: i32 = 168;
/// xargs folds per-invocation failures 1-125 into 123, so graceful qdel
/// exits surface as 123 from select-then-act pipelines.
const XARGS_SOFT_FAIL_EXIT: i32 = 123;

/// Caller-tunable submission parameters. Everything is optional; resource
/// requests fall back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Base job name; sanitized, then prefixed with the instance tag.
    /// Defaults to a UTC-timestamp name.
    pub job_name: Option<String>,
    pub queue: Option<String>,
    /// Suffix appended to the instance tag to form the project tag, used to
    /// group related jobs for later bulk cancellation.
    pub project_suffix: Option<String>,
    pub ncpus: Option<u32>,
    pub mem_bytes: Option<u64>,
    pub walltime_secs: Option<u64>,
    /// Environment variables exposed to the job (`-v`).
    pub env: Vec<(String, String)>,
    /// Additional `-W` attributes beyond the always-set group list and umask.
    pub attributes: Vec<(String, String)>,
    /// Submit in a held state.
    pub hold: bool,
    /// Dot-prefix the remote script and log files.
    pub hidden: bool,
    pub hooks: Hooks,
}

/// Job control for one PBS cluster over one remote shell session.
pub struct PbsConnection<S: RemoteShell> {
    config: ClusterConfig,
    shell: S,
}

impl PbsConnection<SshShell> {
    /// Connection over a lazily-established ssh session.
    pub fn new(config: ClusterConfig) -> Self {
        let shell = SshShell::new(config.clone());
        Self { config, shell }
    }
}

impl<S: RemoteShell> PbsConnection<S> {
    /// Connection over any transport, for embedding and tests.
    pub fn with_shell(config: ClusterConfig, shell: S) -> Self {
        Self { config, shell }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    fn principal(&self) -> Principal {
        Principal {
            user: self.config.user.clone(),
            group: self.config.group.clone(),
            project: self.config.project.clone(),
        }
    }

    /// Exit codes meaning "done, or already gone" for delete-shaped
    /// operations.
    fn graceful_statuses(&self) -> Vec<i32> {
        let mut statuses = vec![0];
        statuses.extend(&self.config.graceful_exit_codes);
        statuses
    }

    /// Fetch statuses of the principal's jobs, historical ones included.
    ///
    /// `skip`/`take` page through the id selection (1-based window) before
    /// the detail query runs; `None` take is unbounded. The whole
    /// select-page-query chain runs as one remote pipeline.
    pub async fn fetch_all_statuses(
        &mut self,
        skip: Option<usize>,
        take: Option<usize>,
    ) -> Result<JobList> {
        if skip == Some(0) || take == Some(0) {
            return Err(Error::Validation("skip and take must be positive".into()));
        }

        let mut pipeline = format!(
            "{} -x -u {}",
            self.config.commands.qselect,
            sh_quote(&self.config.user)
        );
        if let Some(skip) = skip {
            pipeline.push_str(&format!(" | tail -n +{}", skip + 1));
        }
        if let Some(take) = take {
            pipeline.push_str(&format!(" | head -n {take}"));
        }
        pipeline.push_str(&format!(
            " | xargs -r {} -x -f -F json",
            self.config.commands.qstat
        ));

        let outcome = self
            .shell
            .execute_safe(&pipeline, "failed to fetch job statuses", &[0])
            .await?;
        parse_job_list(&outcome.stdout).map_err(|e| Error::Payload(e.to_string()))
    }

    /// Fetch one job by id, or the first job matching a name.
    pub async fn fetch_status(&mut self, job_id_or_name: &str) -> Result<Job> {
        let command = if looks_like_job_id(job_id_or_name) {
            format!(
                "{} -x -f -F json {}",
                self.config.commands.qstat,
                sh_quote(job_id_or_name)
            )
        } else {
            format!(
                "{} -x -u {} -N {} | head -n 1 | xargs -r {} -x -f -F json",
                self.config.commands.qselect,
                sh_quote(&self.config.user),
                sh_quote(job_id_or_name),
                self.config.commands.qstat
            )
        };

        let outcome = self.shell.execute(&command, &[0]).await?;
        match outcome.status {
            Some(0) => {
                let list =
                    parse_job_list(&outcome.stdout).map_err(|e| Error::Payload(e.to_string()))?;
                list.jobs
                    .into_iter()
                    .next()
                    .map(|(_, job)| job)
                    .ok_or_else(|| Error::JobNotFound(job_id_or_name.to_string()))
            }
            Some(UNKNOWN_JOB_EXIT) => Err(Error::JobNotFound(job_id_or_name.to_string())),
            _ => Err(Error::command_failed(
                format!(
                    "failed to fetch status of {job_id_or_name}: {}",
                    outcome.describe()
                ),
                outcome,
            )),
        }
    }

    pub async fn fetch_all_queue_statuses(&mut self) -> Result<QueueList> {
        let command = format!("{} -Q -f -F json", self.config.commands.qstat);
        let outcome = self
            .shell
            .execute_safe(&command, "failed to fetch queue statuses", &[0])
            .await?;
        parse_queue_list(&outcome.stdout).map_err(|e| Error::Payload(e.to_string()))
    }

    /// Render, place and submit a job script. Returns the scheduler-assigned
    /// job id.
    ///
    /// Each remote step (upload, chmod, qsub) runs only if the previous one
    /// succeeded; nothing is rolled back on a partial failure, so a failed
    /// submission can leave the uploaded script behind.
    pub async fn submit_job(
        &mut self,
        script_body: &str,
        working_directory: &Utf8Path,
        options: &SubmitOptions,
    ) -> Result<String> {
        if script_body.trim().is_empty() {
            return Err(Error::Validation("script body is blank".into()));
        }
        if !working_directory.is_absolute() {
            return Err(Error::Validation(format!(
                "working directory {working_directory} is not absolute"
            )));
        }

        let base_name = match &options.job_name {
            Some(name) => script::sanitize_job_name(name)?,
            None => default_job_name(),
        };
        let job_name = format!("{}_{}", self.config.instance_tag, base_name);

        // one directory holds the script, the log, and the job's cwd
        let remote_dir = self.config.remote_workdir(working_directory)?;
        let script_path = remote_dir.join(script::script_basename(&job_name, options.hidden));
        let log_path = remote_dir.join(script::log_basename(&job_name, options.hidden));

        let wrapper =
            script::render_wrapper(script_body, &self.config.prelude, &remote_dir, &options.hooks);

        self.shell.upload(wrapper.as_bytes(), &script_path).await?;
        self.shell.remote_chmod(&script_path, "0755").await?;

        let command = self.qsub_command(&job_name, &script_path, &log_path, options);
        let outcome = self
            .shell
            .execute_safe(&command, &format!("failed to submit {job_name}"), &[0])
            .await?;

        let job_id = outcome.stdout.trim().to_string();
        debug!(%job_id, %job_name, "job submitted");
        Ok(job_id)
    }

    fn qsub_command(
        &self,
        job_name: &str,
        script_path: &Utf8Path,
        log_path: &Utf8Path,
        options: &SubmitOptions,
    ) -> String {
        let defaults = &self.config.defaults;
        let ncpus = options.ncpus.unwrap_or(defaults.ncpus);
        let mem = format_size_bytes(options.mem_bytes.unwrap_or(defaults.mem_bytes));
        let walltime = format_walltime(options.walltime_secs.unwrap_or(defaults.walltime_secs));
        let project = self.config.project_name(options.project_suffix.as_deref());

        let mut parts = vec![
            self.config.commands.qsub.clone(),
            format!("-N {}", sh_quote(job_name)),
            format!("-P {}", sh_quote(&project)),
        ];
        if let Some(queue) = &options.queue {
            parts.push(format!("-q {}", sh_quote(queue)));
        }
        parts.push(format!("-l ncpus={ncpus}"));
        parts.push(format!("-l mem={mem}"));
        parts.push(format!("-l walltime={walltime}"));
        if !options.env.is_empty() {
            let list = options
                .env
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("-v {}", sh_quote(&list)));
        }
        parts.push(format!("-W group_list={}", self.config.group));
        parts.push(format!("-W umask={}", self.config.umask));
        for (key, value) in &options.attributes {
            parts.push(format!("-W {key}={value}"));
        }
        parts.push(format!("-o {}", sh_quote(log_path.as_str())));
        parts.push("-j oe".to_string());
        parts.push("-m n".to_string());
        if options.hold {
            parts.push("-h".to_string());
        }
        parts.push(sh_quote(script_path.as_str()));
        parts.join(" ")
    }

    /// Whether the scheduler still knows `job_id`. A finished job that is
    /// still in history counts as existing; an unknown or purged id does
    /// not. Both are `Ok`, never errors.
    pub async fn job_exists(&mut self, job_id: &str) -> Result<bool> {
        let command = format!("{} {}", self.config.commands.qstat, sh_quote(job_id));
        let mut accept = self.graceful_statuses();
        if !accept.contains(&UNKNOWN_JOB_EXIT) {
            accept.push(UNKNOWN_JOB_EXIT);
        }

        let outcome = self.shell.execute(&command, &accept).await?;
        match outcome.status {
            Some(UNKNOWN_JOB_EXIT) => Ok(false),
            Some(code) if accept.contains(&code) => Ok(true),
            _ => Err(Error::command_failed(
                format!("failed to check job {job_id}: {}", outcome.describe()),
                outcome,
            )),
        }
    }

    /// Delete a job. `completed` also purges it from finished-job history,
    /// `force` bypasses soft protections, and `wait` blocks the single
    /// round trip until the scheduler stops reporting the job; the poll
    /// loop runs on the remote host, not here.
    ///
    /// A job that is already finished or unknown is the desired end state
    /// and reports success.
    pub async fn cancel_job(
        &mut self,
        job_id: &str,
        wait: bool,
        completed: bool,
        force: bool,
    ) -> Result<Outcome> {
        let mut command = self.config.commands.qdel.clone();
        if completed {
            command.push_str(" -x");
        }
        if force {
            command.push_str(" -W force");
        }
        command.push(' ');
        command.push_str(&sh_quote(job_id));
        if wait {
            command.push_str(&format!(
                " && while {} {} >/dev/null 2>&1; do sleep 0.1; done",
                self.config.commands.qstat,
                sh_quote(job_id)
            ));
        }

        self.shell
            .execute_safe(
                &command,
                &format!("failed to cancel job {job_id}"),
                &self.graceful_statuses(),
            )
            .await
    }

    /// Bulk-cancel every job carrying the derived project tag, in one
    /// select-then-delete pipeline. Does not wait.
    pub async fn cancel_jobs_by_project(
        &mut self,
        project_suffix: Option<&str>,
    ) -> Result<Outcome> {
        let project = self.config.project_name(project_suffix);
        let command = format!(
            "{} -u {} -P {} | xargs -r {}",
            self.config.commands.qselect,
            sh_quote(&self.config.user),
            sh_quote(&project),
            self.config.commands.qdel
        );

        let mut accept = self.graceful_statuses();
        accept.push(XARGS_SOFT_FAIL_EXIT);
        self.shell
            .execute_safe(
                &command,
                &format!("failed to cancel jobs for project {project}"),
                &accept,
            )
            .await
    }

    /// Release a held job.
    pub async fn release_job(&mut self, job_id: &str) -> Result<Outcome> {
        let command = format!("{} {}", self.config.commands.qrls, sh_quote(job_id));
        let outcome = self.shell.execute(&command, &[0]).await?;
        match outcome.status {
            Some(0) => Ok(outcome),
            Some(UNKNOWN_JOB_EXIT) => Err(Error::JobNotFound(job_id.to_string())),
            Some(BAD_STATE_EXIT) => Err(Error::InvalidState {
                job_id: job_id.to_string(),
                operation: "release".into(),
            }),
            _ => Err(Error::command_failed(
                format!("failed to release job {job_id}: {}", outcome.describe()),
                outcome,
            )),
        }
    }

    /// Delete every job belonging to the principal, history included.
    pub async fn clean_all_jobs(&mut self) -> Result<Outcome> {
        let command = format!(
            "{} -x -u {} | xargs -r {} -x -W force",
            self.config.commands.qselect,
            sh_quote(&self.config.user),
            self.config.commands.qdel
        );

        let mut accept = self.graceful_statuses();
        accept.push(XARGS_SOFT_FAIL_EXIT);
        self.shell
            .execute_safe(&command, "failed to clean jobs", &accept)
            .await
    }

    async fn count_jobs(&mut self, state: Option<char>, what: &str) -> Result<u64> {
        let filter = state.map(|s| format!(" -s {s}")).unwrap_or_default();
        let command = format!(
            "{} -x -u {}{} | wc -l",
            self.config.commands.qselect,
            sh_quote(&self.config.user),
            filter
        );
        let outcome = self
            .shell
            .execute_safe(&command, &format!("failed to count {what} jobs"), &[0])
            .await?;
        outcome.stdout.trim().parse().map_err(|_| {
            Error::Payload(format!(
                "unexpected job count output {:?}",
                outcome.stdout.trim()
            ))
        })
    }

    /// Count of the principal's jobs in any state, historical included;
    /// these feed accounting limits, not live-resource ones.
    pub async fn fetch_enqueued_count(&mut self) -> Result<u64> {
        self.count_jobs(None, "enqueued").await
    }

    pub async fn fetch_queued_count(&mut self) -> Result<u64> {
        self.count_jobs(Some('Q'), "queued").await
    }

    pub async fn fetch_running_count(&mut self) -> Result<u64> {
        self.count_jobs(Some('R'), "running").await
    }

    async fn qmgr_listing(&mut self, key: &str) -> Result<String> {
        let command = format!(
            "{} -c {}",
            self.config.commands.qmgr,
            sh_quote(&format!("list server {key}"))
        );
        let outcome = self
            .shell
            .execute_safe(&command, &format!("failed to read server {key}"), &[0])
            .await?;
        Ok(outcome.stdout)
    }

    /// The `max_queued` limit applying to the principal, if any. The
    /// scheduler reports "no cap" as a literal 0, which maps to `None`.
    pub async fn fetch_max_queued(&mut self) -> Result<Option<i64>> {
        let listing = self.qmgr_listing("max_queued").await?;
        let limits = parse_limits(&listing, "max_queued", &self.principal())
            .map_err(|e| Error::Payload(e.to_string()))?;
        Ok(limits.first().map(|limit| limit.value).filter(|v| *v != 0))
    }

    /// The server's `max_array_size` setting; 0 and absent both mean
    /// unrestricted.
    pub async fn fetch_max_array_size(&mut self) -> Result<Option<i64>> {
        let listing = self.qmgr_listing("max_array_size").await?;
        let value = match parse_attribute(&listing, "max_array_size") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                Error::Payload(format!("unexpected max_array_size value {raw:?}"))
            })?),
            None => None,
        };
        Ok(value.filter(|v| *v != 0))
    }

    /// Boolean liveness probe: `false` on any failure, never an error.
    pub async fn test_connection(&mut self) -> bool {
        match self.shell.execute("echo ok", &[0]).await {
            Ok(outcome) => outcome.status == Some(0),
            Err(_) => false,
        }
    }

    pub fn exit_state(exit_status: Option<i64>) -> Option<ExitState> {
        exit_status::exit_state(exit_status)
    }

    pub fn exit_reason(exit_status: Option<i64>) -> Option<String> {
        exit_status::exit_reason(exit_status)
    }
}

fn default_job_name() -> String {
    format!("job_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Ids look like `<seq>.<host>` (array jobs `<seq>[].<host>`); anything else
/// is treated as a job name.
fn looks_like_job_id(s: &str) -> bool {
    let seq = match s.split_once('.') {
        Some((seq, host)) if !host.is_empty() => seq,
        Some(_) => return false,
        None => s,
    };
    !seq.is_empty()
        && seq
            .chars()
            .all(|c| c.is_ascii_digit() || c == '[' || c == ']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    /// Scripted transport: replies to the first matching substring pattern
    /// and records everything it was asked to do.
    #[derive(Default)]
    struct FakeShell {
        responses: Vec<(&'static str, Outcome)>,
        commands: Vec<String>,
        uploads: Vec<(Utf8PathBuf, Vec<u8>)>,
    }

    impl FakeShell {
        fn respond(mut self, pattern: &'static str, status: i32, stdout: &str) -> Self {
            self.responses
                .push((pattern, Outcome::new(Some(status), stdout, "")));
            self
        }
    }

    impl RemoteShell for FakeShell {
        async fn execute(&mut self, command: &str, _success_statuses: &[i32]) -> Result<Outcome> {
            self.commands.push(command.to_string());
            for (pattern, outcome) in &self.responses {
                if command.contains(pattern) {
                    return Ok(outcome.clone());
                }
            }
            Ok(Outcome::new(Some(0), "", ""))
        }

        async fn upload(&mut self, bytes: &[u8], destination: &Utf8Path) -> Result<()> {
            self.uploads.push((destination.to_owned(), bytes.to_vec()));
            Ok(())
        }

        async fn download(&mut self, _path: &Utf8Path) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn config() -> ClusterConfig {
        let mut config = ClusterConfig::new("head.cluster", "svc", "prod");
        config.local_root = Utf8PathBuf::from("/data");
        config.cluster_root = Utf8PathBuf::from("/scratch");
        config.group = "staff".into();
        config
    }

    fn connection(shell: FakeShell) -> PbsConnection<FakeShell> {
        PbsConnection::with_shell(config(), shell)
    }

    #[tokio::test]
    async fn test_submit_hidden_job() {
        let shell = FakeShell::default().respond("qsub", 0, "77.head.cluster\n");
        let mut conn = connection(shell);

        let options = SubmitOptions {
            job_name: Some("test".into()),
            hidden: true,
            env: vec![("RUN_ID".into(), "7".into())],
            ..SubmitOptions::default()
        };
        let job_id = conn
            .submit_job("echo hi\n", Utf8Path::new("/data/run1"), &options)
            .await
            .unwrap();
        assert_eq!(job_id, "77.head.cluster");

        // the wrapper landed dot-prefixed in the translated directory
        let (path, bytes) = &conn.shell.uploads[0];
        assert_eq!(path, "/scratch/run1/.prod_test.sh");
        let wrapper = String::from_utf8_lossy(bytes);
        assert!(wrapper.contains("echo hi"));
        assert!(wrapper.contains("cd '/scratch/run1'"));

        assert!(
            conn.shell
                .commands
                .iter()
                .any(|c| c.contains("chmod 0755 '/scratch/run1/.prod_test.sh'"))
        );

        let qsub = conn
            .shell
            .commands
            .iter()
            .find(|c| c.contains("qsub"))
            .unwrap();
        assert!(qsub.contains("-N 'prod_test'"));
        assert!(qsub.contains("-P 'prod'"));
        assert!(qsub.contains("-l ncpus=1"));
        assert!(qsub.contains("-l mem=4gb"));
        assert!(qsub.contains("-l walltime=01:00:00"));
        assert!(qsub.contains("-v 'RUN_ID=7'"));
        assert!(qsub.contains("-W group_list=staff"));
        assert!(qsub.contains("-W umask=0077"));
        assert!(qsub.contains("-o '/scratch/run1/.prod_test.log'"));
        assert!(qsub.contains("-j oe"));
        assert!(qsub.contains("-m n"));
        assert!(!qsub.contains("-h"));
        assert!(qsub.ends_with("'/scratch/run1/.prod_test.sh'"));
    }

    #[tokio::test]
    async fn test_submit_validation_happens_before_any_remote_call() {
        let mut conn = connection(FakeShell::default());
        let options = SubmitOptions::default();

        let blank = conn
            .submit_job("   ", Utf8Path::new("/data/run1"), &options)
            .await;
        assert!(matches!(blank, Err(Error::Validation(_))));

        let relative = conn
            .submit_job("echo hi", Utf8Path::new("run1"), &options)
            .await;
        assert!(matches!(relative, Err(Error::Validation(_))));

        let numeric = SubmitOptions {
            job_name: Some("12345".into()),
            ..SubmitOptions::default()
        };
        let rejected = conn
            .submit_job("echo hi", Utf8Path::new("/data/run1"), &numeric)
            .await;
        assert!(matches!(rejected, Err(Error::Validation(_))));

        assert!(conn.shell.commands.is_empty());
        assert!(conn.shell.uploads.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_statuses_paging() {
        let payload = r#"{"Jobs": {"9.h": {"Job_Name": "nine"}, "10.h": {"Job_Name": "ten"}}}"#;
        let shell = FakeShell::default().respond("qselect", 0, payload);
        let mut conn = connection(shell);

        let list = conn.fetch_all_statuses(Some(8), Some(10)).await.unwrap();
        let ids: Vec<&str> = list.jobs.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["9.h", "10.h"]);

        let command = &conn.shell.commands[0];
        assert!(command.contains("qselect -x -u 'svc'"));
        assert!(command.contains("| tail -n +9"));
        assert!(command.contains("| head -n 10"));
        assert!(command.contains("| xargs -r qstat -x -f -F json"));
    }

    #[tokio::test]
    async fn test_fetch_all_statuses_rejects_zero_paging() {
        let mut conn = connection(FakeShell::default());
        assert!(matches!(
            conn.fetch_all_statuses(Some(0), None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            conn.fetch_all_statuses(None, Some(0)).await,
            Err(Error::Validation(_))
        ));
        assert!(conn.shell.commands.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_status_by_id_and_not_found() {
        let shell = FakeShell::default().respond("qstat", 153, "");
        let mut conn = connection(shell);
        let err = conn.fetch_status("42.head.cluster").await.unwrap_err();
        assert!(matches!(err, Error::JobNotFound(_)));
        assert!(conn.shell.commands[0].contains("qstat -x -f -F json '42.head.cluster'"));
    }

    #[tokio::test]
    async fn test_fetch_status_by_name_selects_first_match() {
        let payload = r#"{"Jobs": {"9.h": {"Job_Name": "prod_align"}}}"#;
        let shell = FakeShell::default().respond("qselect", 0, payload);
        let mut conn = connection(shell);

        let job = conn.fetch_status("prod_align").await.unwrap();
        assert_eq!(job.id, "9.h");
        let command = &conn.shell.commands[0];
        assert!(command.contains("-N 'prod_align'"));
        assert!(command.contains("| head -n 1 |"));
    }

    #[tokio::test]
    async fn test_job_exists_classifies_gone_jobs_as_success() {
        let mut conn = connection(FakeShell::default().respond("qstat", 153, ""));
        assert!(!conn.job_exists("42.h").await.unwrap());

        let mut conn = connection(FakeShell::default().respond("qstat", 0, ""));
        assert!(conn.job_exists("42.h").await.unwrap());

        // finished but still in history: the scheduler knows it
        let mut conn = connection(FakeShell::default().respond("qstat", 35, ""));
        assert!(conn.job_exists("42.h").await.unwrap());

        let mut conn = connection(FakeShell::default().respond("qstat", 1, ""));
        assert!(conn.job_exists("42.h").await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_job_graceful_and_wait() {
        // already-gone jobs are the desired end state
        let mut conn = connection(FakeShell::default().respond("qdel", 153, ""));
        let outcome = conn.cancel_job("42.h", false, false, false).await.unwrap();
        assert_eq!(outcome.status, Some(153));
        assert_eq!(conn.shell.commands[0], "qdel '42.h'");

        let mut conn = connection(FakeShell::default());
        conn.cancel_job("42.h", true, true, true).await.unwrap();
        assert_eq!(
            conn.shell.commands[0],
            "qdel -x -W force '42.h' && while qstat '42.h' >/dev/null 2>&1; do sleep 0.1; done"
        );

        let mut conn = connection(FakeShell::default().respond("qdel", 1, ""));
        assert!(conn.cancel_job("42.h", false, false, false).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_jobs_by_project() {
        let mut conn = connection(FakeShell::default());
        conn.cancel_jobs_by_project(Some("batch7")).await.unwrap();
        assert_eq!(
            conn.shell.commands[0],
            "qselect -u 'svc' -P 'prod_batch7' | xargs -r qdel"
        );

        // xargs folds graceful qdel exits into 123
        let mut conn = connection(FakeShell::default().respond("qselect", 123, ""));
        assert!(conn.cancel_jobs_by_project(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_release_job_error_classification() {
        let mut conn = connection(FakeShell::default().respond("qrls", 168, ""));
        assert!(matches!(
            conn.release_job("42.h").await,
            Err(Error::InvalidState { .. })
        ));

        let mut conn = connection(FakeShell::default().respond("qrls", 153, ""));
        assert!(matches!(
            conn.release_job("42.h").await,
            Err(Error::JobNotFound(_))
        ));

        let mut conn = connection(FakeShell::default());
        assert!(conn.release_job("42.h").await.is_ok());
    }

    #[tokio::test]
    async fn test_clean_all_jobs_command() {
        let mut conn = connection(FakeShell::default());
        conn.clean_all_jobs().await.unwrap();
        assert_eq!(
            conn.shell.commands[0],
            "qselect -x -u 'svc' | xargs -r qdel -x -W force"
        );
    }

    #[tokio::test]
    async fn test_counts() {
        let mut conn = connection(FakeShell::default().respond("wc -l", 0, " 12\n"));
        assert_eq!(conn.fetch_enqueued_count().await.unwrap(), 12);
        assert_eq!(conn.fetch_queued_count().await.unwrap(), 12);
        assert_eq!(conn.fetch_running_count().await.unwrap(), 12);

        assert!(conn.shell.commands[0].contains("qselect -x -u 'svc' | wc -l"));
        assert!(conn.shell.commands[1].contains("-s Q | wc -l"));
        assert!(conn.shell.commands[2].contains("-s R | wc -l"));
    }

    #[tokio::test]
    async fn test_fetch_max_queued_treats_zero_as_unset() {
        let listing = "Server head\n    max_queued = [u:PBS_GENERIC=0]\n";
        let mut conn = connection(FakeShell::default().respond("max_queued", 0, listing));
        assert_eq!(conn.fetch_max_queued().await.unwrap(), None);

        let listing = "Server head\n    max_queued = [u:PBS_GENERIC=25]\n";
        let mut conn = connection(FakeShell::default().respond("max_queued", 0, listing));
        assert_eq!(conn.fetch_max_queued().await.unwrap(), Some(25));

        // nothing configured at all
        let mut conn = connection(FakeShell::default().respond("max_queued", 0, ""));
        assert_eq!(conn.fetch_max_queued().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_max_array_size() {
        let listing = "Server head\n    max_array_size = 20000\n";
        let mut conn = connection(FakeShell::default().respond("max_array_size", 0, listing));
        assert_eq!(conn.fetch_max_array_size().await.unwrap(), Some(20000));

        let listing = "Server head\n    max_array_size = 0\n";
        let mut conn = connection(FakeShell::default().respond("max_array_size", 0, listing));
        assert_eq!(conn.fetch_max_array_size().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_test_connection_is_boolean() {
        let mut conn = connection(FakeShell::default());
        assert!(conn.test_connection().await);

        let mut conn = connection(FakeShell::default().respond("echo", 1, ""));
        assert!(!conn.test_connection().await);
    }

    #[test]
    fn test_looks_like_job_id() {
        assert!(looks_like_job_id("42.head.cluster"));
        assert!(looks_like_job_id("42[].head.cluster"));
        assert!(looks_like_job_id("42"));
        assert!(!looks_like_job_id("prod_align"));
        assert!(!looks_like_job_id("my.job"));
        assert!(!looks_like_job_id(""));
    }
}
