//! Job wrapper rendering and job-name sanitization.

use camino::Utf8Path;
use quarry_core::{Error, Result};
use quarry_transport::sh_quote;

/// Optional shell fragments run around the caller's script body.
///
/// `report_start` and `report_finish` bracket the normal path inside the same
/// job; `report_error` runs exactly once on any abnormal end (non-zero exit,
/// resource-limit kill, cancellation) and cannot tell those causes apart. It
/// should finish quickly: the job may be moments from a forced kill.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub report_start: Option<String>,
    pub report_finish: Option<String>,
    pub report_error: Option<String>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Reduce a job name to the scheduler's allowed character set: letters,
/// digits, underscore and dot. Illegal runs collapse to a single underscore;
/// leading and trailing illegal characters are stripped. Idempotent.
///
/// A purely numeric name is rejected; the scheduler would coerce it to a
/// number and break later parsing of the name field.
pub fn sanitize_job_name(name: &str) -> Result<String> {
    let trimmed = name.trim_matches(|c: char| !is_name_char(c));

    let mut sanitized = String::with_capacity(trimmed.len());
    let mut in_illegal_run = false;
    for c in trimmed.chars() {
        if is_name_char(c) {
            sanitized.push(c);
            in_illegal_run = false;
        } else if !in_illegal_run {
            sanitized.push('_');
            in_illegal_run = true;
        }
    }

    if sanitized.is_empty() {
        return Err(Error::Validation(format!(
            "job name {name:?} has no usable characters"
        )));
    }
    if sanitized.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Validation(format!(
            "job name {name:?} must not be purely numeric"
        )));
    }
    Ok(sanitized)
}

pub fn script_basename(job_name: &str, hidden: bool) -> String {
    if hidden {
        format!(".{job_name}.sh")
    } else {
        format!("{job_name}.sh")
    }
}

pub fn log_basename(job_name: &str, hidden: bool) -> String {
    if hidden {
        format!(".{job_name}.log")
    } else {
        format!("{job_name}.log")
    }
}

/// Emit one hook as a shell function body, one line per hook line, with a
/// no-op fallback so the function is never empty.
fn hook_lines(out: &mut String, hook: Option<&str>) {
    match hook {
        Some(hook) if !hook.trim().is_empty() => {
            for line in hook.lines() {
                out.push_str(line);
                out.push('\n');
            }
        }
        _ => out.push_str(":\n"),
    }
}

/// Render the wrapper script submitted in place of the caller's body.
///
/// The normal path runs `report_start`, the body, then `report_finish`. Any
/// abnormal end runs `report_error` exactly once: a non-zero body exit takes
/// the explicit branch, and a SIGTERM (cancellation or resource kill) takes
/// the trap, which re-raises the signal afterwards so the scheduler still
/// records a signal-derived exit status.
pub fn render_wrapper(
    body: &str,
    prelude: &str,
    workdir: &Utf8Path,
    hooks: &Hooks,
) -> String {
    let mut script = String::from("#!/bin/bash\n");
    if !prelude.trim().is_empty() {
        for line in prelude.lines() {
            script.push_str(line);
            script.push('\n');
        }
    }
    script.push('\n');

    script.push_str("report_start() {\n");
    hook_lines(&mut script, hooks.report_start.as_deref());
    script.push_str("}\n\n");

    script.push_str("report_finish() {\n");
    hook_lines(&mut script, hooks.report_finish.as_deref());
    script.push_str("}\n\n");

    script.push_str("report_error() {\n");
    hook_lines(&mut script, hooks.report_error.as_deref());
    script.push_str("}\n\n");

    script.push_str("trap 'trap - TERM; report_error; kill -s TERM $$' TERM\n\n");

    script.push_str(&format!("cd {} || exit 1\n\n", sh_quote(workdir.as_str())));

    script.push_str("report_start\n\n");

    script.push_str(body);
    if !body.ends_with('\n') {
        script.push('\n');
    }
    script.push_str("exit_status=$?\n\n");

    script.push_str("if [ \"${exit_status}\" -ne 0 ]; then\n");
    script.push_str("    trap - TERM\n");
    script.push_str("    report_error\n");
    script.push_str("    exit \"${exit_status}\"\n");
    script.push_str("fi\n\n");

    script.push_str("report_finish\n");

    script
}
