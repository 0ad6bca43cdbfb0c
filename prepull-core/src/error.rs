//! Error types for the prepull workspace

use thiserror::Error;

/// Result type alias for prepull operations
pub type Result<T> = std::result::Result<T, PrepullError>;

/// Errors that can occur while fetching an image
///
/// Every variant is fatal: nothing in the fetch routine retries or
/// recovers, so errors carry enough detail for the terminal message
/// and flow straight out to the process boundary.
#[derive(Debug, Error)]
pub enum PrepullError {
    /// A required environment variable is absent or empty
    #[error("Required environment variable '{0}' is not set")]
    MissingConfiguration(String),

    /// PULL_IMAGE_TYPE named a backend this tool does not know
    #[error("Unsupported image type '{0}' (expected 'Docker' or 'GCR')")]
    UnsupportedImageType(String),

    /// An external tool is not resolvable on the execution path
    #[error("Required tool '{0}' is not available on PATH")]
    MissingDependency(String),

    /// Registry login or identity activation failed
    #[error("Authentication against {backend} failed: {detail}")]
    AuthenticationFailure {
        /// Backend the login was attempted against
        backend: String,
        /// Failure detail from the external tool
        detail: String,
    },

    /// The image pull itself failed
    #[error("Failed to pull image '{image}': {detail}")]
    PullFailure {
        /// Image reference that was being pulled
        image: String,
        /// Failure detail from the external tool
        detail: String,
    },

    /// Filesystem or process-spawn error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrepullError {
    /// Create a missing-configuration error naming the variable
    pub fn missing(var: impl Into<String>) -> Self {
        Self::MissingConfiguration(var.into())
    }

    /// Create an authentication error from backend name and detail
    pub fn auth_failure(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            backend: backend.into(),
            detail: detail.into(),
        }
    }

    /// Create a pull error from image reference and detail
    pub fn pull_failure(image: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::PullFailure {
            image: image.into(),
            detail: detail.into(),
        }
    }

    /// Check if this error is a configuration problem (bad or missing input)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingConfiguration(_) | Self::UnsupportedImageType(_)
        )
    }

    /// Check if this error is an authentication failure
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailure { .. })
    }

    /// Check if this error is a pull failure
    pub fn is_pull(&self) -> bool {
        matches!(self, Self::PullFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configuration_names_variable() {
        let err = PrepullError::missing("PULL_IMAGE_NAME");
        assert_eq!(
            err.to_string(),
            "Required environment variable 'PULL_IMAGE_NAME' is not set"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unsupported_image_type_is_configuration() {
        let err = PrepullError::UnsupportedImageType("Foo".to_string());
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Foo"));
    }

    #[test]
    fn test_auth_failure_display() {
        let err = PrepullError::auth_failure("Docker Hub", "exit_code=1, stderr='denied'");
        assert!(err.is_auth());
        assert_eq!(
            err.to_string(),
            "Authentication against Docker Hub failed: exit_code=1, stderr='denied'"
        );
    }

    #[test]
    fn test_pull_failure_display() {
        let err = PrepullError::pull_failure("alpine:3", "exit_code=1, stderr='not found'");
        assert!(err.is_pull());
        assert!(err.to_string().contains("alpine:3"));
        assert!(!err.is_auth());
        assert!(!err.is_configuration());
    }
}
