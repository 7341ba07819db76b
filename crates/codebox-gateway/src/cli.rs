use std::path::PathBuf;

use clap::Parser;
use codebox_common::ConfigError;
use codebox_config::schema::{LogLevel, StoreBackend};
use codebox_config::CodeboxConfig;

/// Codebox gateway: sandbox terminals and workspaces over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "codebox-gateway", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides `server.bind`).
    #[arg(short = 'b', long)]
    pub bind: Option<String>,

    /// Directory under which session workspaces are created.
    #[arg(long)]
    pub workspace_root: Option<String>,

    /// Save service base URL (selects the http store).
    #[arg(long, conflicts_with = "store_dir")]
    pub store_url: Option<String>,

    /// Local store directory (selects the directory store).
    #[arg(long)]
    pub store_dir: Option<String>,

    /// Log level override.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

pub fn parse() -> Args {
    Args::parse()
}

impl Args {
    /// Load the config file, then apply command-line overrides on top.
    /// Validation sees the merged result.
    pub fn load_config(&self) -> Result<CodeboxConfig, ConfigError> {
        codebox_config::load_config(self.config.as_deref(), |config| self.apply(config))
    }

    fn apply(&self, config: &mut CodeboxConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(root) = &self.workspace_root {
            config.workspace.root_dir = root.clone();
        }
        if let Some(url) = &self.store_url {
            config.store.backend = StoreBackend::Http;
            config.store.url = url.clone();
        }
        if let Some(dir) = &self.store_dir {
            config.store.backend = StoreBackend::Directory;
            config.store.directory = dir.clone();
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}
