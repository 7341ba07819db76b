//! Workspace bridge: one session's local file tree and its durable copy.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use codebox_common::{BootstrapError, FileNode, SessionId, WorkspaceError};
use codebox_config::schema::StoreConfig;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::paths;
use crate::store::{DurableStore, FileChange, StoreError};
use crate::sync::{SyncQueue, SyncSettings};

/// Marks in-flight write files; [`WorkspaceBridge::list_dir`] skips them.
const TEMP_SUFFIX: &str = ".codebox-tmp";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}-{seq}{TEMP_SUFFIX}", std::process::id()))
}

/// Replace `path` with `content` through a sibling temp file, so readers see
/// either the old file or the new one. Permissions of an existing file carry
/// over.
async fn replace_file(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = temp_sibling(path);
    let result = async {
        tokio::fs::write(&tmp, content).await?;
        if let Ok(meta) = tokio::fs::metadata(path).await {
            tokio::fs::set_permissions(&tmp, meta.permissions()).await?;
        }
        tokio::fs::rename(&tmp, path).await
    }
    .await;
    if result.is_err() {
        tokio::fs::remove_file(&tmp).await.ok();
    }
    result
}

/// The file side of a session.
///
/// Local operations act on `root` directly. Writes are acknowledged once they
/// hit the local disk; the durable push follows in the background.
pub struct WorkspaceBridge {
    session: SessionId,
    root: PathBuf,
    store: Arc<dyn DurableStore>,
    bootstrap_timeout: Duration,
    sync: Mutex<Option<SyncQueue>>,
    sync_worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkspaceBridge {
    /// Create the bridge and start its sync worker. Must be called from
    /// within a tokio runtime.
    pub fn new(
        session: SessionId,
        root: impl Into<PathBuf>,
        store: Arc<dyn DurableStore>,
        config: &StoreConfig,
    ) -> Self {
        let (queue, worker) =
            SyncQueue::spawn(session.clone(), Arc::clone(&store), SyncSettings::from(config));
        Self {
            session,
            root: root.into(),
            store,
            bootstrap_timeout: config.bootstrap_timeout(),
            sync: Mutex::new(Some(queue)),
            sync_worker: Mutex::new(Some(worker)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Seed the local tree from the store template for `language` and return
    /// the top level of the resulting tree.
    pub async fn bootstrap(&self, language: &str) -> Result<Vec<FileNode>, BootstrapError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(WorkspaceError::Io)?;

        let files = match tokio::time::timeout(
            self.bootstrap_timeout,
            self.store.fetch_base(&self.session, language),
        )
        .await
        {
            Ok(Ok(files)) => files,
            Ok(Err(e)) => return Err(self.bootstrap_error(e)),
            Err(_) => return Err(BootstrapError::Timeout(self.bootstrap_timeout)),
        };

        let count = files.len();
        for node in files {
            self.materialize(node).await?;
        }
        info!(
            session = %self.session,
            language,
            files = count,
            root = %self.root.display(),
            "workspace bootstrapped"
        );

        Ok(self.list_dir("").await?)
    }

    fn bootstrap_error(&self, err: StoreError) -> BootstrapError {
        match err {
            StoreError::Unreachable(msg) => BootstrapError::StoreUnreachable(msg),
            StoreError::Timeout => BootstrapError::Timeout(self.bootstrap_timeout),
            StoreError::UnknownTemplate(language) => BootstrapError::UnknownTemplate(language),
            other => BootstrapError::Store(other.to_string()),
        }
    }

    async fn materialize(&self, node: FileNode) -> Result<(), WorkspaceError> {
        let relative = paths::normalize(node.effective_path())?;
        if relative.is_empty() {
            return Err(WorkspaceError::InvalidPath(node.effective_path().to_string()));
        }
        let target = paths::resolve(&self.root, &relative);
        if node.is_dir() {
            tokio::fs::create_dir_all(&target).await?;
        } else {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, node.content.unwrap_or_default()).await?;
        }
        Ok(())
    }

    /// Immediate children of a directory, directories first, then by name.
    pub async fn list_dir(&self, relative: &str) -> Result<Vec<FileNode>, WorkspaceError> {
        let relative = paths::normalize(relative)?;
        let dir = paths::resolve(&self.root, &relative);

        let meta = tokio::fs::metadata(&dir)
            .await
            .map_err(|e| WorkspaceError::from_io(&relative, e))?;
        if !meta.is_dir() {
            return Err(WorkspaceError::NotADirectory(relative));
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| WorkspaceError::from_io(&relative, e))?;
        let mut nodes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            let path = paths::join(&relative, &name);
            let node = if entry.file_type().await?.is_dir() {
                FileNode::dir(path)
            } else {
                FileNode::file(path, None)
            };
            nodes.push(node);
        }
        nodes.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name.cmp(&b.name)));
        Ok(nodes)
    }

    pub async fn read_file(&self, relative: &str) -> Result<String, WorkspaceError> {
        let relative = paths::normalize(relative)?;
        let path = paths::resolve(&self.root, &relative);

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| WorkspaceError::from_io(&relative, e))?;
        if meta.is_dir() {
            return Err(WorkspaceError::InvalidPath(format!("{relative} is a directory")));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| WorkspaceError::from_io(&relative, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Replace the full content of a file, creating parents as needed, then
    /// queue the durable push.
    pub async fn write_file(&self, relative: &str, content: String) -> Result<(), WorkspaceError> {
        let relative = paths::normalize(relative)?;
        if relative.is_empty() {
            return Err(WorkspaceError::InvalidPath("cannot write the workspace root".into()));
        }
        let path = paths::resolve(&self.root, &relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        replace_file(&path, &content).await?;
        debug!(session = %self.session, path = %relative, bytes = content.len(), "file written");

        let queue = self.sync.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match queue {
            Some(queue) => {
                queue.push(FileChange::new(relative, content));
            }
            None => warn!(session = %self.session, path = %relative, "write after sync shutdown not pushed"),
        }
        Ok(())
    }

    /// Stop accepting pushes. Already queued pushes keep draining; the
    /// returned handle resolves once they are done.
    pub fn close_sync(&self) -> Option<JoinHandle<()>> {
        self.sync.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.sync_worker.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Delete the local tree.
    pub async fn remove_root(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(session = %self.session, root = %self.root.display(), "workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(session = %self.session, error = %e, "failed to remove workspace"),
        }
    }
}
