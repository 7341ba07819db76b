//! Shared test doubles.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use codebox_common::{FileNode, SessionId};
use codebox_workspace::{DirDurableStore, DurableStore, FileChange, StoreError};

/// Directory store whose pushes take a while.
pub(crate) struct SlowStore {
    inner: DirDurableStore,
    delay: Duration,
}

impl SlowStore {
    pub(crate) fn new(root: &Path, delay: Duration) -> Self {
        Self {
            inner: DirDurableStore::new(root),
            delay,
        }
    }
}

#[async_trait]
impl DurableStore for SlowStore {
    async fn fetch_base(&self, session: &SessionId, language: &str) -> Result<Vec<FileNode>, StoreError> {
        self.inner.fetch_base(session, language).await
    }

    async fn persist(&self, session: &SessionId, files: &[FileChange]) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.persist(session, files).await
    }

    async fn list_top(&self, session: &SessionId) -> Result<Vec<FileNode>, StoreError> {
        self.inner.list_top(session).await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Seed `base-code/python/main.py` under `root`.
pub(crate) fn seed_python_template(root: &Path) {
    let base = root.join("base-code/python");
    std::fs::create_dir_all(&base).unwrap();
    std::fs::write(base.join("main.py"), "print('hello')\n").unwrap();
}
