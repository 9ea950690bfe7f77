//! Bearer token persisted across process restarts.
//!
//! The store never validates the token: whether it is still accepted is
//! only learnt when the API answers `401`, at which point the transport
//! clears it. Every I/O failure is logged and swallowed, so a broken token
//! file just makes the session unauthenticated.

use std::{io, path::PathBuf};

use tokio::fs;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.ticket_desk/token`, or a path relative to the working directory
    /// when no home directory is known.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".ticket_desk")
            .join("token")
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Overwrites the stored token.
    pub async fn save(&self, token: &str) {
        if let Some(dir) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(dir).await {
                warn!(path = %dir.display(), error = %e, "token dir");
                return;
            }
        }
        match fs::write(&self.path, token).await {
            Ok(()) => debug!(path = %self.path.display(), "token saved"),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token save");
            }
        }
    }

    pub async fn read(&self) -> Option<String> {
        match fs::read_to_string(&self.path).await {
            Ok(token) => {
                let token = token.trim();
                (!token.is_empty()).then(|| token.to_owned())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token read");
                None
            }
        }
    }

    /// Removes the stored token. Does nothing if there is none.
    pub async fn clear(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "token cleared"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token clear");
            }
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}
