//! Configuration schema types for the gateway.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod logging;
mod server;
mod shell;
mod store;
mod workspace;

pub use logging::*;
pub use server::*;
pub use shell::*;
pub use store::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CodeboxConfig {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub store: StoreConfig,
    pub shell: ShellConfig,
    pub logging: LoggingConfig,
}
