use std::io;
use std::path::Path;

use tempfile::TempDir;
use tracing::{info, warn};

use crate::session::SessionId;

/// Scratch directory owned by a single invocation.
/// The directory and everything in it are removed when the workspace is dropped.
pub struct Workspace {
    dir: Option<TempDir>,
    session_id: SessionId,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root`
    pub fn create(root: &Path, session_id: &SessionId) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("ws-").tempdir_in(root)?;
        info!("[{}] Create ws directory {}", session_id, dir.path().display());

        Ok(Self {
            dir: Some(dir),
            session_id: session_id.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().display().to_string();
            info!("[{}] Clean ws directory {}", self.session_id, path);
            if let Err(e) = dir.close() {
                warn!("[{}] Failed to remove {}: {}", self.session_id, path, e);
            }
        }
    }
}
