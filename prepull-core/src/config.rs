//! Pull configuration
//!
//! Defines the immutable record the runner consumes: which registry
//! backend to authenticate against, which image to pull, and the
//! credential group for the selected backend. The record is assembled
//! once at process start and never mutated afterwards.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{PrepullError, Result};

/// Environment variable names consumed by [`PullConfig::from_env`]
pub mod vars {
    pub const IMAGE_TYPE: &str = "PULL_IMAGE_TYPE";
    pub const IMAGE_NAME: &str = "PULL_IMAGE_NAME";
    pub const DOCKER_LOGIN: &str = "DOCKER_LOGIN";
    pub const DOCKER_PWD: &str = "DOCKER_PWD";
    pub const DOCKER_EMAIL: &str = "DOCKER_EMAIL";
    pub const GCR_KEY: &str = "GCR_KEY";
    pub const STARTUP_DELAY: &str = "PULL_STARTUP_DELAY";
}

/// Registry backend selected by PULL_IMAGE_TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// Docker Hub, authenticated with username/password login
    Docker,
    /// Google Container Registry, authenticated with a service-account key
    Gcr,
}

impl ImageType {
    /// Parses a PULL_IMAGE_TYPE value
    ///
    /// Accepts the documented spellings ("Docker", "GCR") case-insensitively.
    /// Anything else is rejected outright instead of falling through to an
    /// unauthenticated pull.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "gcr" => Ok(Self::Gcr),
            _ => Err(PrepullError::UnsupportedImageType(value.to_string())),
        }
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => write!(f, "Docker"),
            Self::Gcr => write!(f, "GCR"),
        }
    }
}

/// Docker Hub login credentials
#[derive(Clone)]
pub struct DockerCredentials {
    /// Registry username
    pub username: String,
    /// Registry password
    pub password: String,
    /// Registry account email
    pub email: String,
}

impl std::fmt::Debug for DockerCredentials {
    // Keeps the password out of debug output and logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Service-account key for GCR
#[derive(Clone)]
pub struct GcrCredentials {
    /// Raw key document content (JSON)
    pub key_json: String,
}

impl std::fmt::Debug for GcrCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcrCredentials")
            .field("key_json", &"<redacted>")
            .finish()
    }
}

/// Fields of the service-account key document the runner cares about
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: Option<String>,
}

impl GcrCredentials {
    /// Extracts the service-account email from the key document, if present
    ///
    /// Returns None when the document is not valid JSON or carries no
    /// client_email field; activation then lets the tool infer the account.
    pub fn client_email(&self) -> Option<String> {
        serde_json::from_str::<ServiceAccountKey>(&self.key_json)
            .ok()
            .and_then(|key| key.client_email)
    }
}

/// Credential group for the selected backend
///
/// Exactly one group exists per configuration; the other group's absence
/// from the environment is not an error.
#[derive(Debug, Clone)]
pub enum RegistryAuth {
    Docker(DockerCredentials),
    Gcr(GcrCredentials),
}

impl RegistryAuth {
    /// Backend this credential group belongs to
    pub fn image_type(&self) -> ImageType {
        match self {
            Self::Docker(_) => ImageType::Docker,
            Self::Gcr(_) => ImageType::Gcr,
        }
    }
}

/// Pull request configuration
#[derive(Debug, Clone)]
pub struct PullConfig {
    /// Fully qualified image reference to pull
    pub image: String,

    /// Credentials for the selected registry backend
    pub auth: RegistryAuth,

    /// Grace period before the first external call
    pub startup_delay: Duration,
}

impl PullConfig {
    /// Creates configuration from process environment variables
    ///
    /// Expected environment variables:
    /// - PULL_IMAGE_TYPE (required, "Docker" or "GCR")
    /// - PULL_IMAGE_NAME (required)
    /// - DOCKER_LOGIN / DOCKER_PWD / DOCKER_EMAIL (required when type is Docker)
    /// - GCR_KEY (required when type is GCR)
    /// - PULL_STARTUP_DELAY (optional, seconds, default: 0)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an arbitrary variable source
    ///
    /// Empty and whitespace-only values count as missing. Credential
    /// variables are checked one at a time so the first missing one is
    /// the one reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let image_type = ImageType::parse(&require(&lookup, vars::IMAGE_TYPE)?)?;
        let image = require(&lookup, vars::IMAGE_NAME)?;

        let auth = match image_type {
            ImageType::Docker => RegistryAuth::Docker(DockerCredentials {
                username: require(&lookup, vars::DOCKER_LOGIN)?,
                password: require(&lookup, vars::DOCKER_PWD)?,
                email: require(&lookup, vars::DOCKER_EMAIL)?,
            }),
            ImageType::Gcr => RegistryAuth::Gcr(GcrCredentials {
                key_json: require(&lookup, vars::GCR_KEY)?,
            }),
        };

        let startup_delay = lookup(vars::STARTUP_DELAY)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);

        let config = Self {
            image,
            auth,
            startup_delay,
        };
        config.validate()?;
        Ok(config)
    }

    /// Backend selected by this configuration
    pub fn image_type(&self) -> ImageType {
        self.auth.image_type()
    }

    /// Validates the assembled configuration
    ///
    /// [`from_lookup`](Self::from_lookup) already rejects missing input;
    /// this guards records built by hand.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(PrepullError::missing(vars::IMAGE_NAME));
        }

        match &self.auth {
            RegistryAuth::Docker(creds) => {
                if creds.username.trim().is_empty() {
                    return Err(PrepullError::missing(vars::DOCKER_LOGIN));
                }
                if creds.password.trim().is_empty() {
                    return Err(PrepullError::missing(vars::DOCKER_PWD));
                }
                if creds.email.trim().is_empty() {
                    return Err(PrepullError::missing(vars::DOCKER_EMAIL));
                }
            }
            RegistryAuth::Gcr(creds) => {
                if creds.key_json.trim().is_empty() {
                    return Err(PrepullError::missing(vars::GCR_KEY));
                }
            }
        }

        Ok(())
    }
}

/// Reads a required variable, treating empty values as missing
fn require<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PrepullError::missing(name)),
    }
}
