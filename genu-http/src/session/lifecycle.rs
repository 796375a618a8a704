use std::path::Path;
use std::time::Instant;

use genu_core::{SessionId, Workspace};
use tracing::debug;

/// Keeps the invocation's workspace alive for as long as its response is being produced.
/// When dropped, the workspace is removed.
pub struct InvocationLifecycle {
    workspace: Workspace,
    request_id: String,
    session_id: SessionId,
    started: Instant,
}

impl InvocationLifecycle {
    pub fn new(workspace: Workspace, request_id: String, session_id: SessionId) -> Self {
        Self {
            workspace,
            request_id,
            session_id,
            started: Instant::now(),
        }
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl Drop for InvocationLifecycle {
    fn drop(&mut self) {
        debug!(
            "[{}] - [{}] Invocation finished after {:?}, releasing workspace",
            self.request_id,
            self.session_id,
            self.started.elapsed()
        );
    }
}
