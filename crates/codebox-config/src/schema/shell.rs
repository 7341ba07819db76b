//! Shell configuration: which program each session terminal runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shell configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell program path. Empty string means auto-detect from `$SHELL`.
    pub program: String,
    /// Extra arguments passed to the shell.
    pub args: Vec<String>,
    /// Extra environment variables injected into the shell.
    pub env: HashMap<String, String>,
    /// Launch as a login shell (`-l`).
    pub login_shell: bool,
    /// Initial terminal columns.
    pub cols: u16,
    /// Initial terminal rows.
    pub rows: u16,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            login_shell: false,
            cols: 80,
            rows: 24,
        }
    }
}
