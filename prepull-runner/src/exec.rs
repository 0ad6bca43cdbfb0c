//! Shared handling for external command output
//!
//! Both CLI wrappers capture stdout/stderr in full; captured streams are
//! logged at debug level and non-zero exits are summarized into the
//! detail string carried by the typed errors.

use std::process::Output;

use tracing::debug;

/// Logs captured stdout/stderr at debug level when non-empty
pub fn log_output(label: &str, output: &Output) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !stdout.trim().is_empty() {
        debug!("{} stdout: {}", label, stdout.trim());
    }
    if !stderr.trim().is_empty() {
        debug!("{} stderr: {}", label, stderr.trim());
    }
}

/// Summarizes a failed invocation: exit code plus trimmed stderr
pub fn failure_detail(output: &Output) -> String {
    let exit_code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);

    format!("exit_code={}, stderr='{}'", exit_code, stderr.trim())
}
