use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Local ephemeral workspace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory under which each connection gets its own workspace.
    /// Empty means `<system temp>/codebox/workspaces`.
    pub root_dir: String,
    /// Remove a session's workspace directory when the session closes.
    pub cleanup_on_close: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root_dir: String::new(),
            cleanup_on_close: true,
        }
    }
}

impl WorkspaceConfig {
    /// Resolve `root_dir`, falling back to the system temp directory.
    pub fn resolved_root(&self) -> PathBuf {
        if self.root_dir.is_empty() {
            std::env::temp_dir().join("codebox").join("workspaces")
        } else {
            PathBuf::from(&self.root_dir)
        }
    }
}
