//! Scoped service-account key file
//!
//! The key document only exists on disk while the activation call needs
//! it. The file is owner-readable only and removed when the handle drops,
//! on success and on every failure path alike. The content itself is
//! never logged.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use prepull_core::error::Result;

/// Temporary on-disk home for the service-account key
pub struct ScopedKeyFile {
    file: NamedTempFile,
}

impl ScopedKeyFile {
    /// Writes the key document to a fresh temp file
    ///
    /// Named temp files are created with mode 0600 on unix, so the key
    /// is owner-readable only for its whole lifetime.
    pub fn write(key_json: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("prepull-key-")
            .suffix(".json")
            .tempfile()?;

        file.write_all(key_json.as_bytes())?;
        file.flush()?;

        Ok(Self { file })
    }

    /// Path handed to the activation call
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
