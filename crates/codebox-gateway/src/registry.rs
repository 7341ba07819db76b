//! Session registry: maps connection ids to live sessions.
//!
//! A session owns exactly one workspace tree and one terminal. Both are
//! created by [`SessionRegistry::open`] and released by
//! [`SessionRegistry::close`]; a failed open releases whatever it already
//! created before returning.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use codebox_common::{BootstrapError, ConnectionId, FileNode, SessionId};
use codebox_config::schema::{StoreConfig, WorkspaceConfig};
use codebox_terminal::{PtyError, PtyEvent, PtyHandle, PtyManager};
use codebox_workspace::{DurableStore, WorkspaceBridge};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a session could not reach the ready state.
#[derive(Debug, thiserror::Error)]
pub enum SessionInitError {
    #[error("missing session id (replId)")]
    MissingSessionId,

    #[error("missing language")]
    MissingLanguage,

    #[error("connection already has a session")]
    AlreadyOpen,

    #[error("connection closed while the session was opening")]
    Cancelled,

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("failed to start terminal: {0}")]
    Terminal(#[from] PtyError),
}

/// One live session.
pub struct Session {
    pub connection: ConnectionId,
    pub id: SessionId,
    pub language: String,
    pub opened_at: DateTime<Utc>,
    pub workspace: WorkspaceBridge,
    pub terminal: PtyHandle,
    cancel: CancellationToken,
    cleanup_on_close: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection)
            .field("id", &self.id)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Cancelled when the session is closed.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Release the terminal and the local tree. Returns the sync worker,
    /// which keeps draining queued pushes until it resolves.
    async fn shutdown(&self) -> Option<JoinHandle<()>> {
        self.cancel.cancel();
        self.terminal.destroy().await;
        let sync = self.workspace.close_sync();
        if self.cleanup_on_close {
            self.workspace.remove_root().await;
        }
        tracing::info!(
            conn_id = %self.connection.short(),
            session = %self.id,
            open_secs = (Utc::now() - self.opened_at).num_seconds(),
            "session closed"
        );
        sync
    }
}

enum Entry {
    /// Reserved while bootstrapping; no resources are reachable yet.
    Opening,
    Live(Arc<Session>),
}

/// Thread-safe registry shared by all connection tasks.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<ConnectionId, Entry>>>,
    store: Arc<dyn DurableStore>,
    pty: PtyManager,
    workspace: WorkspaceConfig,
    store_config: StoreConfig,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn DurableStore>,
        pty: PtyManager,
        workspace: WorkspaceConfig,
        store_config: StoreConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
            pty,
            workspace,
            store_config,
        }
    }

    fn workspace_dir(&self, connection: &ConnectionId) -> PathBuf {
        self.workspace.resolved_root().join(connection.to_string())
    }

    /// Create the session for `connection`: seed its workspace, then start
    /// its terminal with output flowing to `on_output`.
    ///
    /// Returns the session and the top level of its tree.
    pub async fn open(
        &self,
        connection: ConnectionId,
        session_id: &str,
        language: &str,
        on_output: mpsc::Sender<PtyEvent>,
    ) -> Result<(Arc<Session>, Vec<FileNode>), SessionInitError> {
        if session_id.is_empty() {
            return Err(SessionInitError::MissingSessionId);
        }
        if language.is_empty() {
            return Err(SessionInitError::MissingLanguage);
        }

        {
            let mut map = self.sessions.write().await;
            if map.contains_key(&connection) {
                return Err(SessionInitError::AlreadyOpen);
            }
            map.insert(connection, Entry::Opening);
        }

        let session = SessionId::new(session_id);
        let workspace = WorkspaceBridge::new(
            session.clone(),
            self.workspace_dir(&connection),
            Arc::clone(&self.store),
            &self.store_config,
        );

        let root = match workspace.bootstrap(language).await {
            Ok(root) => root,
            Err(e) => {
                self.abort_open(&connection, &workspace).await;
                return Err(e.into());
            }
        };

        let terminal = match self.pty.create(&session, workspace.root(), on_output) {
            Ok(handle) => handle,
            Err(e) => {
                self.abort_open(&connection, &workspace).await;
                return Err(e.into());
            }
        };

        let live = Arc::new(Session {
            connection,
            id: session,
            language: language.to_string(),
            opened_at: Utc::now(),
            workspace,
            terminal,
            cancel: CancellationToken::new(),
            cleanup_on_close: self.workspace.cleanup_on_close,
        });

        {
            let mut map = self.sessions.write().await;
            if matches!(map.get(&connection), Some(Entry::Opening)) {
                map.insert(connection, Entry::Live(Arc::clone(&live)));
            } else {
                // Closed underneath us.
                drop(map);
                // Nothing can have been written yet.
                if let Some(worker) = live.shutdown().await {
                    worker.abort();
                }
                return Err(SessionInitError::Cancelled);
            }
        }

        tracing::info!(
            conn_id = %connection.short(),
            session = %live.id,
            language,
            "session opened"
        );
        Ok((live, root))
    }

    /// Undo a partial open. Nothing has been pushed yet, so the sync worker
    /// is stopped outright.
    async fn abort_open(&self, connection: &ConnectionId, workspace: &WorkspaceBridge) {
        if let Some(worker) = workspace.close_sync() {
            worker.abort();
        }
        workspace.remove_root().await;
        let mut map = self.sessions.write().await;
        if matches!(map.get(connection), Some(Entry::Opening)) {
            map.remove(connection);
        }
    }

    pub async fn get(&self, connection: &ConnectionId) -> Option<Arc<Session>> {
        match self.sessions.read().await.get(connection) {
            Some(Entry::Live(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Tear down the session of `connection`. Safe to call any number of
    /// times; only the first call releases anything.
    ///
    /// Pushes still queued for the session drain in the background.
    pub async fn close(&self, connection: &ConnectionId) {
        let entry = self.sessions.write().await.remove(connection);
        if let Some(Entry::Live(session)) = entry {
            drop(session.shutdown().await);
        }
    }

    /// Close every session (process shutdown).
    ///
    /// Waits for queued pushes to reach the durable store, for at most one
    /// push's full retry budget. Workers still running after that are
    /// stopped and their pushes reported as dropped.
    pub async fn close_all(&self) {
        let entries: Vec<Entry> = self.sessions.write().await.drain().map(|(_, e)| e).collect();
        let mut workers = Vec::new();
        for entry in entries {
            if let Entry::Live(session) = entry {
                if let Some(worker) = session.shutdown().await {
                    workers.push((session, worker));
                }
            }
        }

        let deadline = Instant::now() + self.store_config.drain_timeout();
        for (session, mut worker) in workers {
            match tokio::time::timeout_at(deadline, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(session = %session.id, error = %e, "sync worker failed"),
                Err(_) => {
                    worker.abort();
                    tracing::warn!(
                        session = %session.id,
                        "DurableSyncWarning: dropping queued pushes at shutdown"
                    );
                }
            }
        }
    }

    /// Number of sessions, including ones still opening.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
