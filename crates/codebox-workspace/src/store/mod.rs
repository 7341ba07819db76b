//! Durable store: the canonical file tree of every session.
//!
//! The store is keyed by session id. A session copy is seeded from a
//! per-language template (`base-code/<language>`) and updated with whole-file
//! pushes. Two implementations exist: the save service over HTTP and a local
//! directory with the same layout.

mod dir;
mod http;

pub use dir::DirDurableStore;
pub use http::HttpDurableStore;

use std::sync::Arc;

use async_trait::async_trait;
use codebox_common::{FileNode, SessionId};
use codebox_config::schema::{StoreBackend, StoreConfig};
use serde::{Deserialize, Serialize};

/// Errors from durable store calls.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store request timed out")]
    Timeout,

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode store response: {0}")]
    Decode(String),

    #[error("no template for language '{0}'")]
    UnknownTemplate(String),

    #[error("not found in store: {0}")]
    NotFound(String),

    #[error("invalid store key: {0}")]
    InvalidKey(String),

    #[error("store client setup failed: {0}")]
    Client(String),

    #[error("{0} is not supported by this store")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One whole-file update pushed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Seed the session copy from the language template (existing session
    /// files win) and return the files to materialize locally.
    ///
    /// Nodes may carry only a `name` (top-level listing) or a full
    /// relative `path`.
    async fn fetch_base(
        &self,
        session: &SessionId,
        language: &str,
    ) -> Result<Vec<FileNode>, StoreError>;

    /// Overwrite the given files in the session copy.
    async fn persist(&self, session: &SessionId, files: &[FileChange]) -> Result<(), StoreError>;

    /// Top-level entries of the session copy, files with content.
    ///
    /// Backends without a listing call return [`StoreError::Unsupported`].
    async fn list_top(&self, session: &SessionId) -> Result<Vec<FileNode>, StoreError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the store selected by `[store]`.
pub fn store_from_config(config: &StoreConfig) -> Result<Arc<dyn DurableStore>, StoreError> {
    match config.backend {
        StoreBackend::Http => Ok(Arc::new(HttpDurableStore::new(
            config.url.clone(),
            config.request_timeout(),
        )?)),
        StoreBackend::Directory => Ok(Arc::new(DirDurableStore::new(&config.directory))),
    }
}
