//! Interpretation of raw PBS job exit statuses.
//!
//! The scheduler reports one integer per finished job, drawn from three
//! ranges: negative values are internal execution-host failures, `[0, 255]`
//! is the script's own exit code, and values of 256 and above mean the job
//! died to a signal (`256 + signo`).

/// Semantic outcome of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Success,
    Failed,
    Cancelled,
    Killed,
}

/// Exit status recorded when a job is cancelled: deletion sends SIGTERM, so
/// the scheduler stores 256 + 15.
pub const CANCELLED_EXIT_STATUS: i64 = 256 + 15;

/// Reason strings for the scheduler-internal failure codes. Codes missing
/// from this table still classify as killed, just without a reason, so new
/// scheduler versions degrade gracefully.
const MOM_FAILURE_REASONS: &[(i64, &str)] = &[
    (-1, "Job exec failed, before files, no retry"),
    (-2, "Job exec failed, after files, no retry"),
    (-3, "Job execution failed, do retry"),
    (-4, "Job aborted on MOM initialization"),
    (-5, "Job aborted on MOM init, chkpt, no migrate"),
    (-6, "Job aborted on MOM init, chkpt, ok migrate"),
    (-7, "Job restart failed"),
    (-10, "Invalid UID/GID for job"),
    (-11, "Job was rerun"),
    (-12, "Job was checkpointed and killed"),
    (-13, "Job failed due to a bad password"),
    (-14, "Job was requeued (if rerunnable) or deleted (if not) due to a sister node failing"),
    (-15, "Requeue job for restart from checkpoint"),
    (-16, "Job execution failed due to hook rejection; requeue for later retry"),
    (-17, "Job execution failed due to hook rejection; delete the job at end"),
    (-18, "A hook requested for job to be requeued"),
    (-19, "A hook requested for job to be deleted"),
    (-20, "Job requeued because server couldn't contact the primary execution host"),
    (-21, "Job exec failed due to a security breach in PBS directory"),
    (-22, "Job exec failed due to an unexpected exception or hook execution timed out"),
    (-23, "Job exec failed because no kerberos credentials were supplied"),
    (-24, "Job exec failed due to exceeding ncpus (burst)"),
    (-25, "Job exec failed due to exceeding ncpus (sum)"),
    (-26, "Job exec failed due to exceeding vmem"),
    (-27, "Job exec failed due to exceeding mem"),
    (-28, "Job exec failed due to exceeding cput"),
    (-29, "Job exec failed due to exceeding walltime"),
    (-30, "Job exec failed due to a join job error"),
];

/// Classify a raw exit status. `None` means the job has not finished yet and
/// maps to `None`.
pub fn exit_state(exit_status: Option<i64>) -> Option<ExitState> {
    let status = exit_status?;
    Some(match status {
        0 => ExitState::Success,
        CANCELLED_EXIT_STATUS => ExitState::Cancelled,
        s if s < 0 => ExitState::Killed,
        s if s >= 256 => ExitState::Killed,
        _ => ExitState::Failed,
    })
}

/// Human-readable reason for a raw exit status, where one exists: script
/// failures carry their code, recognized internal failure codes their table
/// entry. Success, cancellation and plain signal deaths have none.
pub fn exit_reason(exit_status: Option<i64>) -> Option<String> {
    let status = exit_status?;
    match exit_state(Some(status))? {
        ExitState::Failed => Some(format!("Script failed. Exit status {status}")),
        ExitState::Killed if status < 0 => MOM_FAILURE_REASONS
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, reason)| (*reason).to_string()),
        _ => None,
    }
}
