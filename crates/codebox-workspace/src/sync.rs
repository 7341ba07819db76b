//! Background pushes of local writes to the durable store.
//!
//! Each session owns one worker fed by an unbounded queue, so enqueueing never
//! blocks a request and pushes reach the store in submission order. Changes
//! that pile up while a push is in flight are merged, last write per path
//! wins, and sent as one batch.
//!
//! A push that fails (or times out) is retried `retries` times. After that it
//! is dropped and a `DurableSyncWarning` is logged; the local copy stays
//! authoritative for the rest of the session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use codebox_common::SessionId;
use codebox_config::schema::StoreConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{DurableStore, FileChange, StoreError};

/// Largest batch sent in one `persist` call.
const MAX_BATCH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 1,
        }
    }
}

impl From<&StoreConfig> for SyncSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            timeout: config.persist_timeout(),
            retries: config.persist_retries,
        }
    }
}

/// Sending half of a session's sync worker.
///
/// Dropping every clone lets the worker drain what is queued and exit.
#[derive(Clone)]
pub struct SyncQueue {
    session: SessionId,
    tx: mpsc::UnboundedSender<FileChange>,
}

impl SyncQueue {
    /// Start the worker for `session`.
    pub fn spawn(
        session: SessionId,
        store: Arc<dyn DurableStore>,
        settings: SyncSettings,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(session.clone(), store, settings, rx));
        (Self { session, tx }, worker)
    }

    /// Queue a push. Returns `false` if the worker is gone.
    pub fn push(&self, change: FileChange) -> bool {
        if self.tx.send(change).is_err() {
            warn!(session = %self.session, "sync worker stopped; push not queued");
            return false;
        }
        true
    }
}

async fn run_worker(
    session: SessionId,
    store: Arc<dyn DurableStore>,
    settings: SyncSettings,
    mut rx: mpsc::UnboundedReceiver<FileChange>,
) {
    debug!(session = %session, store = store.name(), "sync worker started");

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(change) => batch.push(change),
                Err(_) => break,
            }
        }
        let batch = coalesce(batch);
        push_with_retry(&session, store.as_ref(), settings, &batch).await;
    }

    debug!(session = %session, "sync worker finished");
}

/// Keep the last change per path, ordered by each path's first appearance.
fn coalesce(batch: Vec<FileChange>) -> Vec<FileChange> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    let mut out: Vec<FileChange> = Vec::with_capacity(batch.len());
    for change in batch {
        match index.get(&change.path) {
            Some(&i) => out[i] = change,
            None => {
                index.insert(change.path.clone(), out.len());
                out.push(change);
            }
        }
    }
    out
}

async fn push_with_retry(
    session: &SessionId,
    store: &dyn DurableStore,
    settings: SyncSettings,
    batch: &[FileChange],
) {
    let attempts = settings.retries.saturating_add(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(settings.timeout, store.persist(session, batch)).await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        };
        match result {
            Ok(()) => {
                debug!(session = %session, files = batch.len(), attempt, "pushed to durable store");
                return;
            }
            Err(e) => {
                debug!(session = %session, attempt, error = %e, "durable push failed");
                last_error = Some(e);
            }
        }
    }

    let paths: Vec<&str> = batch.iter().map(|c| c.path.as_str()).collect();
    warn!(
        session = %session,
        ?paths,
        attempts,
        error = %last_error.map(|e| e.to_string()).unwrap_or_default(),
        "DurableSyncWarning: dropping push after retries"
    );
}
