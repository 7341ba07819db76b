//! In-memory store used by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use codebox_common::{FileNode, SessionId};

use crate::store::{DurableStore, FileChange, StoreError};

#[derive(Default)]
pub(crate) struct RecordingStore {
    templates: HashMap<String, Vec<FileNode>>,
    unreachable: bool,
    delay: Option<Duration>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    pushed: Mutex<Vec<FileChange>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_template(mut self, language: &str, files: Vec<FileNode>) -> Self {
        self.templates.insert(language.to_string(), files);
        self
    }

    /// Fail the next `n` persist calls.
    pub(crate) fn failing(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn pushed(&self) -> Vec<FileChange> {
        self.pushed.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DurableStore for RecordingStore {
    async fn fetch_base(
        &self,
        _session: &SessionId,
        language: &str,
    ) -> Result<Vec<FileNode>, StoreError> {
        self.pause().await;
        if self.unreachable {
            return Err(StoreError::Unreachable("connection refused".into()));
        }
        self.templates
            .get(language)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTemplate(language.to_string()))
    }

    async fn persist(&self, _session: &SessionId, files: &[FileChange]) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing || self.unreachable {
            return Err(StoreError::Unreachable("connection refused".into()));
        }
        self.pushed.lock().unwrap().extend_from_slice(files);
        Ok(())
    }

    async fn list_top(&self, _session: &SessionId) -> Result<Vec<FileNode>, StoreError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
