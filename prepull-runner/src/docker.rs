//! Docker CLI wrapper
//!
//! Invokes the docker client for the three operations the runner needs:
//! - Checking docker availability
//! - Logging in to the default registry
//! - Pulling the requested image
//!
//! Every invocation captures stdout/stderr; non-zero exits become typed
//! errors carrying the exit code and trimmed stderr.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::info;

use prepull_core::config::DockerCredentials;
use prepull_core::error::{PrepullError, Result};

use crate::exec;

/// Docker CLI client
///
/// Holds the program path so callers (and tests) can substitute a
/// specific executable instead of whatever PATH resolves.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    /// Creates a client invoking the given program
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Checks that the docker client is installed and runnable
    pub fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|_| PrepullError::MissingDependency("docker".to_string()))?;

        if !output.status.success() {
            return Err(PrepullError::MissingDependency("docker".to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!("Docker is available: {}", version.trim());

        Ok(())
    }

    /// Logs in to the default registry
    ///
    /// The password travels over stdin so it never appears in the process
    /// table. Current docker clients reject the old login email flag, so
    /// the account email is surfaced in the log line only.
    pub fn login(&self, credentials: &DockerCredentials) -> Result<()> {
        info!(
            "Logging in to Docker Hub as {} ({})",
            credentials.username, credentials.email
        );

        let mut child = Command::new(&self.program)
            .args(login_args(&credentials.username))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // A fast-failing child may close stdin before the write lands;
        // the exit status below is what decides the outcome.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(credentials.password.as_bytes());
        }

        let output = child.wait_with_output()?;
        exec::log_output("docker login", &output);

        if !output.status.success() {
            return Err(PrepullError::auth_failure(
                "Docker Hub",
                exec::failure_detail(&output),
            ));
        }

        info!("Docker login succeeded");
        Ok(())
    }

    /// Pulls the named image from the now-authenticated registry
    pub fn pull(&self, image: &str) -> Result<()> {
        info!("Pulling image {}", image);

        let output = Command::new(&self.program)
            .args(pull_args(image))
            .output()?;
        exec::log_output("docker pull", &output);

        if !output.status.success() {
            return Err(PrepullError::pull_failure(
                image,
                exec::failure_detail(&output),
            ));
        }

        info!("Image {} pulled successfully", image);
        Ok(())
    }
}

/// Arguments for `docker login`
fn login_args(username: &str) -> Vec<String> {
    vec![
        "login".to_string(),
        "--username".to_string(),
        username.to_string(),
        "--password-stdin".to_string(),
    ]
}

/// Arguments for `docker pull`
fn pull_args(image: &str) -> Vec<String> {
    vec!["pull".to_string(), image.to_string()]
}
