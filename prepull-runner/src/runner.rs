//! Image fetch runner
//!
//! Drives the one-shot sequence: wait out the startup delay, probe the
//! external tools, authenticate against the selected backend, pull the
//! image, then hold the process open indefinitely.
//!
//! The sequence is strictly sequential and the first failure is final;
//! there is no retry and no partial-success state to roll back.

use std::time::Duration;

use tokio::time;
use tracing::{info, trace};

use prepull_core::config::{PullConfig, RegistryAuth};
use prepull_core::error::Result;

use crate::docker::DockerCli;
use crate::gcloud::GcloudCli;
use crate::keyfile::ScopedKeyFile;

/// Interval between hold-loop heartbeats
const HOLD_HEARTBEAT: Duration = Duration::from_secs(300);

/// One-shot image fetch runner
pub struct FetchRunner {
    config: PullConfig,
    docker: DockerCli,
    gcloud: GcloudCli,
}

impl FetchRunner {
    /// Creates a runner using the docker/gcloud clients resolved from PATH
    pub fn new(config: PullConfig) -> Self {
        Self {
            config,
            docker: DockerCli::default(),
            gcloud: GcloudCli::default(),
        }
    }

    /// Creates a runner with explicit CLI clients
    #[allow(dead_code)]
    pub fn with_clients(config: PullConfig, docker: DockerCli, gcloud: GcloudCli) -> Self {
        Self {
            config,
            docker,
            gcloud,
        }
    }

    /// Runs the fetch sequence, then holds the process open forever
    ///
    /// Only ever returns on failure; success ends in the hold loop.
    pub async fn run(&self) -> Result<()> {
        self.fetch().await?;
        self.hold().await
    }

    /// The pre-hold sequence: delay, probe, authenticate, pull
    ///
    /// Split out from [`run`](Self::run) so the sequence can be driven to
    /// completion without entering the hold state.
    pub async fn fetch(&self) -> Result<()> {
        if !self.config.startup_delay.is_zero() {
            info!(
                "Waiting {:?} before first external call",
                self.config.startup_delay
            );
            time::sleep(self.config.startup_delay).await;
        }

        self.docker.check_available()?;

        match &self.config.auth {
            RegistryAuth::Docker(credentials) => {
                self.docker.login(credentials)?;
            }
            RegistryAuth::Gcr(credentials) => {
                self.gcloud.check_available()?;

                // The key only lives on disk for the activation call;
                // dropping the scope removes it before the pull, and on
                // any error path out of this block.
                let key_file = ScopedKeyFile::write(&credentials.key_json)?;
                self.gcloud.activate_service_account(
                    key_file.path(),
                    credentials.client_email().as_deref(),
                )?;
                self.gcloud.configure_docker()?;
            }
        }

        self.docker.pull(&self.config.image)
    }

    /// Terminal hold state
    ///
    /// The process exists to keep its container alive after a successful
    /// pull, so this loop never exits and installs no signal handler;
    /// external termination is the only way out.
    async fn hold(&self) -> Result<()> {
        info!("Image {} ready; holding process open", self.config.image);

        let mut interval = time::interval(HOLD_HEARTBEAT);

        loop {
            interval.tick().await;
            trace!("Hold heartbeat for {}", self.config.image);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use prepull_core::config::{DockerCredentials, GcrCredentials};
    use prepull_core::error::PrepullError;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn write_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A stub tool that appends its name and argv to a record file
    fn recorder_stub(dir: &Path, name: &str, record: &Path) -> PathBuf {
        write_stub(
            dir,
            name,
            &format!(
                "#!/bin/sh\necho \"{} $@\" >> {}\nexit 0\n",
                name,
                record.display()
            ),
        )
    }

    /// A gcloud stub that also snapshots the key file it is handed
    fn key_copying_gcloud_stub(dir: &Path, record: &Path, key_copy: &Path) -> PathBuf {
        write_stub(
            dir,
            "gcloud",
            &format!(
                "#!/bin/sh\n\
                 echo \"gcloud $@\" >> {record}\n\
                 for arg in \"$@\"; do\n\
                 \tcase \"$arg\" in\n\
                 \t\t--key-file=*) cp \"${{arg#--key-file=}}\" {key_copy} ;;\n\
                 \tesac\n\
                 done\n\
                 exit 0\n",
                record = record.display(),
                key_copy = key_copy.display()
            ),
        )
    }

    fn docker_config(image: &str) -> PullConfig {
        PullConfig {
            image: image.to_string(),
            auth: RegistryAuth::Docker(DockerCredentials {
                username: "user".to_string(),
                password: "secret".to_string(),
                email: "user@example.com".to_string(),
            }),
            startup_delay: Duration::ZERO,
        }
    }

    fn gcr_config(image: &str, key_json: &str) -> PullConfig {
        PullConfig {
            image: image.to_string(),
            auth: RegistryAuth::Gcr(GcrCredentials {
                key_json: key_json.to_string(),
            }),
            startup_delay: Duration::ZERO,
        }
    }

    fn recorded_lines(record: &Path) -> Vec<String> {
        fs::read_to_string(record)
            .unwrap_or_default()
            .lines()
            .map(|line| line.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_docker_fetch_runs_login_then_pull() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("calls.log");

        let docker = DockerCli::new(recorder_stub(dir.path(), "docker", &record));
        let gcloud = GcloudCli::new(dir.path().join("gcloud-unused"));

        let runner = FetchRunner::with_clients(docker_config("library/alpine:3"), docker, gcloud);
        runner.fetch().await.unwrap();

        let lines = recorded_lines(&record);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "docker --version");
        assert_eq!(lines[1], "docker login --username user --password-stdin");
        assert_eq!(lines[2], "docker pull library/alpine:3");
    }

    #[tokio::test]
    async fn test_gcr_fetch_sequence_and_key_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("calls.log");
        let key_copy = dir.path().join("key-copy.json");

        let docker = DockerCli::new(recorder_stub(dir.path(), "docker", &record));
        let gcloud = GcloudCli::new(key_copying_gcloud_stub(dir.path(), &record, &key_copy));

        let key = r#"{"type":"service_account","client_email":"ci@project.iam.gserviceaccount.com"}"#;
        let runner =
            FetchRunner::with_clients(gcr_config("gcr.io/project/app:1", key), docker, gcloud);
        runner.fetch().await.unwrap();

        let lines = recorded_lines(&record);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "docker --version");
        assert_eq!(lines[1], "gcloud --version");
        assert!(lines[2].starts_with(
            "gcloud auth activate-service-account ci@project.iam.gserviceaccount.com --key-file="
        ));
        assert!(lines[2].ends_with("--quiet"));
        assert_eq!(lines[3], "gcloud auth configure-docker --quiet");
        assert_eq!(lines[4], "docker pull gcr.io/project/app:1");

        // The activation call saw the full key document on disk
        assert_eq!(fs::read_to_string(&key_copy).unwrap(), key);

        // The key file itself is gone once the sequence completes
        let key_path = recorded_key_path(&lines[2]);
        assert!(!key_path.exists());
    }

    #[tokio::test]
    async fn test_fetch_fails_without_docker() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("calls.log");

        let docker = DockerCli::new(dir.path().join("no-such-docker"));
        let gcloud = GcloudCli::new(recorder_stub(dir.path(), "gcloud", &record));

        let runner = FetchRunner::with_clients(
            gcr_config("gcr.io/project/app:1", "{}"),
            docker,
            gcloud,
        );
        let err = runner.fetch().await.unwrap_err();

        assert!(matches!(err, PrepullError::MissingDependency(ref tool) if tool == "docker"));
        // Nothing else ran
        assert!(recorded_lines(&record).is_empty());
    }

    #[tokio::test]
    async fn test_gcr_activation_failure_is_fatal_and_scrubs_key() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("calls.log");

        let docker = DockerCli::new(recorder_stub(dir.path(), "docker", &record));
        let gcloud = GcloudCli::new(write_stub(
            dir.path(),
            "gcloud",
            &format!(
                "#!/bin/sh\n\
                 echo \"gcloud $@\" >> {record}\n\
                 if [ \"$2\" = \"activate-service-account\" ]; then\n\
                 \techo 'ERROR: invalid key' >&2\n\
                 \texit 1\n\
                 fi\n\
                 exit 0\n",
                record = record.display()
            ),
        ));

        let runner = FetchRunner::with_clients(
            gcr_config("gcr.io/project/app:1", r#"{"client_email":"ci@p.iam"}"#),
            docker,
            gcloud,
        );
        let err = runner.fetch().await.unwrap_err();

        assert!(err.is_auth());
        assert!(err.to_string().contains("invalid key"));

        let lines = recorded_lines(&record);
        // The failing activation is the last call; no configure, no pull
        assert!(lines.last().unwrap().starts_with("gcloud auth activate-service-account"));
        assert!(!lines.iter().any(|line| line.starts_with("docker pull")));

        // The key file did not outlive the failure
        let key_path = recorded_key_path(lines.last().unwrap());
        assert!(!key_path.exists());
    }

    #[tokio::test]
    async fn test_fetch_sequence_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("calls.log");

        let docker = DockerCli::new(recorder_stub(dir.path(), "docker", &record));
        let gcloud = GcloudCli::new(dir.path().join("gcloud-unused"));

        let runner = FetchRunner::with_clients(docker_config("library/alpine:3"), docker, gcloud);
        runner.fetch().await.unwrap();
        runner.fetch().await.unwrap();

        let lines = recorded_lines(&record);
        assert_eq!(lines.len(), 6);
        // Same sequence both times, no state carried between runs
        assert_eq!(lines[..3], lines[3..]);
    }

    /// Pulls the --key-file path back out of a recorded activation line
    fn recorded_key_path(line: &str) -> PathBuf {
        let arg = line
            .split_whitespace()
            .find(|arg| arg.starts_with("--key-file="))
            .expect("activation line carries a --key-file argument");
        PathBuf::from(arg.trim_start_matches("--key-file="))
    }
}
