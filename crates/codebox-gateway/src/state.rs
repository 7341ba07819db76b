//! Process-wide gateway state, built once at startup.

use std::sync::Arc;

use codebox_config::CodeboxConfig;
use codebox_terminal::PtyManager;
use codebox_workspace::{store_from_config, DurableStore, StoreError};

use crate::registry::SessionRegistry;

pub struct GatewayState {
    pub config: CodeboxConfig,
    pub registry: SessionRegistry,
}

impl GatewayState {
    pub fn new(config: CodeboxConfig, store: Arc<dyn DurableStore>) -> Self {
        let registry = SessionRegistry::new(
            store,
            PtyManager::new(config.shell.clone()),
            config.workspace.clone(),
            config.store.clone(),
        );
        Self { config, registry }
    }

    /// Build the state with the store selected by `[store]`.
    pub fn from_config(config: CodeboxConfig) -> Result<Self, StoreError> {
        let store = store_from_config(&config.store)?;
        tracing::info!(
            backend = store.name(),
            workspaces = %config.workspace.resolved_root().display(),
            "durable store ready"
        );
        Ok(Self::new(config, store))
    }
}
