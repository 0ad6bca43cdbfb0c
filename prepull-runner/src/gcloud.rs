//! gcloud CLI wrapper
//!
//! Handles the GCR authentication sequence:
//! - Checking gcloud availability
//! - Activating a service-account identity from a key file
//! - Wiring the docker client to use the activated identity
//!
//! Same invocation discipline as the docker wrapper: capture output, log
//! it at debug level, fail fatally on any non-zero exit.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use prepull_core::error::{PrepullError, Result};

use crate::exec;

/// gcloud CLI client
#[derive(Debug, Clone)]
pub struct GcloudCli {
    program: PathBuf,
}

impl Default for GcloudCli {
    fn default() -> Self {
        Self::new("gcloud")
    }
}

impl GcloudCli {
    /// Creates a client invoking the given program
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Checks that the gcloud tool is installed and runnable
    pub fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|_| PrepullError::MissingDependency("gcloud".to_string()))?;

        if !output.status.success() {
            return Err(PrepullError::MissingDependency("gcloud".to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!(
            "gcloud is available: {}",
            version.lines().next().unwrap_or("").trim()
        );

        Ok(())
    }

    /// Activates the service account held in the key file
    ///
    /// When the account email is known it is passed explicitly; otherwise
    /// the tool infers it from the key document.
    pub fn activate_service_account(&self, key_file: &Path, account: Option<&str>) -> Result<()> {
        match account {
            Some(account) => info!("Activating service account {}", account),
            None => info!("Activating service account from key file"),
        }

        let output = Command::new(&self.program)
            .args(activate_args(key_file, account))
            .output()?;
        exec::log_output("gcloud auth activate-service-account", &output);

        if !output.status.success() {
            return Err(PrepullError::auth_failure(
                "GCR",
                exec::failure_detail(&output),
            ));
        }

        info!("Service account activated");
        Ok(())
    }

    /// Points the docker client at the activated identity for registry hosts
    pub fn configure_docker(&self) -> Result<()> {
        info!("Configuring docker to use the activated identity");

        let output = Command::new(&self.program)
            .args(configure_docker_args())
            .output()?;
        exec::log_output("gcloud auth configure-docker", &output);

        if !output.status.success() {
            return Err(PrepullError::auth_failure(
                "GCR",
                exec::failure_detail(&output),
            ));
        }

        info!("Docker configured for GCR");
        Ok(())
    }
}

/// Arguments for `gcloud auth activate-service-account`
fn activate_args(key_file: &Path, account: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "auth".to_string(),
        "activate-service-account".to_string(),
    ];
    if let Some(account) = account {
        args.push(account.to_string());
    }
    args.push(format!("--key-file={}", key_file.display()));
    args.push("--quiet".to_string());
    args
}

/// Arguments for `gcloud auth configure-docker`
fn configure_docker_args() -> Vec<String> {
    vec![
        "auth".to_string(),
        "configure-docker".to_string(),
        "--quiet".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_args_with_account() {
        let args = activate_args(Path::new("/tmp/key.json"), Some("ci@project.iam"));
        assert_eq!(
            args,
            vec![
                "auth",
                "activate-service-account",
                "ci@project.iam",
                "--key-file=/tmp/key.json",
                "--quiet",
            ]
        );
    }

    #[test]
    fn test_activate_args_without_account() {
        let args = activate_args(Path::new("/tmp/key.json"), None);
        assert_eq!(
            args,
            vec![
                "auth",
                "activate-service-account",
                "--key-file=/tmp/key.json",
                "--quiet",
            ]
        );
    }

    #[test]
    fn test_configure_docker_args() {
        assert_eq!(
            configure_docker_args(),
            vec!["auth", "configure-docker", "--quiet"]
        );
    }

    #[test]
    fn test_check_available_reports_missing_tool() {
        let cli = GcloudCli::new("/nonexistent/gcloud-binary");
        let err = cli.check_available().unwrap_err();
        assert!(matches!(err, PrepullError::MissingDependency(ref tool) if tool == "gcloud"));
    }
}
