//! Plain-file bearer token persistence.
//!
//! The board is headless; the token lives in a file readable only by the
//! service user. The storage format is deliberately trivial.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved token, if any. A missing or empty file is `None`.
    pub fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let token = text.trim();
                if token.is_empty() {
                    None
                } else {
                    debug!(path = %self.path.display(), "loaded saved access token");
                    Some(token.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to load token");
                None
            }
        }
    }

    /// Persist the token, creating parent directories and restricting
    /// permissions to the owner.
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        debug!(path = %self.path.display(), "saved access token");
        Ok(())
    }

    /// Remove the saved token. Missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
