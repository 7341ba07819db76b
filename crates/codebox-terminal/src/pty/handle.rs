//! PTY handle: input, resize, and teardown for one session terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use codebox_common::SessionId;
use portable_pty::{Child, MasterPty, PtySize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::types::PtyError;

/// Upper bound for reaping a killed shell during teardown.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single live terminal owned by one session.
///
/// All methods take `&self` so the handle can be shared between the
/// request handlers that write to it and the registry that destroys it.
pub struct PtyHandle {
    session: SessionId,
    /// Queue feeding the writer thread; `None` once destroyed.
    input_tx: Mutex<Option<std::sync::mpsc::Sender<Vec<u8>>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    /// Task relaying output to the consumer; `None` once destroyed.
    forwarder: Mutex<Option<JoinHandle<()>>>,
    /// Set by the I/O threads when the process is gone.
    exited: Arc<AtomicBool>,
    destroyed: AtomicBool,
    size: Mutex<PtySize>,
}

impl PtyHandle {
    pub(super) fn new(
        session: SessionId,
        input_tx: std::sync::mpsc::Sender<Vec<u8>>,
        child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
        master: Box<dyn MasterPty + Send>,
        forwarder: JoinHandle<()>,
        exited: Arc<AtomicBool>,
        size: PtySize,
    ) -> Self {
        Self {
            session,
            input_tx: Mutex::new(Some(input_tx)),
            child,
            master: Mutex::new(master),
            forwarder: Mutex::new(Some(forwarder)),
            exited,
            destroyed: AtomicBool::new(false),
            size: Mutex::new(size),
        }
    }

    /// Whether writes are rejected (process exited or handle destroyed).
    pub fn is_closed(&self) -> bool {
        self.exited.load(Ordering::SeqCst) || self.destroyed.load(Ordering::SeqCst)
    }

    /// Returns `true` if the shell process is still running.
    pub fn is_alive(&self) -> bool {
        !self.is_closed() && matches!(lock(&self.child).try_wait(), Ok(None))
    }

    /// Queue raw input bytes for the shell.
    ///
    /// Never blocks: bytes are appended to the writer queue and applied in
    /// submission order.
    pub fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        if self.is_closed() {
            return Err(PtyError::Closed);
        }
        match lock(&self.input_tx).as_ref() {
            Some(tx) => tx.send(data.to_vec()).map_err(|_| PtyError::Closed),
            None => Err(PtyError::Closed),
        }
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        if self.is_closed() {
            return Err(PtyError::Closed);
        }
        let new_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        lock(&self.master)
            .resize(new_size)
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))?;
        *lock(&self.size) = new_size;
        Ok(())
    }

    /// Current `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        let size = lock(&self.size);
        (size.cols, size.rows)
    }

    /// Kill the shell and stop output delivery.
    ///
    /// Once this returns the consumer receives no further events. Calling it
    /// again is a no-op.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        lock(&self.input_tx).take();

        if let Err(e) = lock(&self.child).kill() {
            debug!(session = %self.session, "PTY kill error (may already be dead): {e}");
        }

        let forwarder = lock(&self.forwarder).take();
        if let Some(task) = forwarder {
            task.abort();
            let _ = task.await;
        }

        let child = Arc::clone(&self.child);
        let reap = tokio::task::spawn_blocking(move || {
            let mut guard = lock(&child);
            guard.wait()
        });
        match tokio::time::timeout(REAP_TIMEOUT, reap).await {
            Ok(Ok(Ok(status))) => {
                debug!(session = %self.session, code = status.exit_code(), "terminal reaped")
            }
            Ok(Ok(Err(e))) => debug!(session = %self.session, "PTY wait error: {e}"),
            Ok(Err(e)) => debug!(session = %self.session, "PTY reap task failed: {e}"),
            Err(_) => debug!(session = %self.session, "PTY reap timed out"),
        }

        info!(session = %self.session, "terminal destroyed");
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }
        // Dropped without `destroy`: kill the shell so the reader thread sees
        // EOF and exits, and stop the forwarder.
        let _ = lock(&self.child).kill();
        if let Some(task) = lock(&self.forwarder).take() {
            task.abort();
        }
    }
}
