//! PTY spawn logic: open a PTY, start the session shell, and wire the
//! reader/writer threads and the output forwarder.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use codebox_common::SessionId;
use codebox_config::schema::ShellConfig;
use portable_pty::{native_pty_system, Child, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::handle::{lock, PtyHandle};
use super::types::{PtyError, PtyEvent, EXIT_STATUS_WAIT_MS, PTY_CHANNEL_DEPTH, PTY_READ_CHUNK};
use crate::shell::build_command;

/// Spawns one interactive shell per session.
///
/// The manager itself holds no per-session state; every [`PtyHandle`] it
/// returns is exclusively owned by its session.
#[derive(Debug, Clone, Default)]
pub struct PtyManager {
    shell: ShellConfig,
}

impl PtyManager {
    pub fn new(shell: ShellConfig) -> Self {
        Self { shell }
    }

    /// Start the session shell in `cwd`.
    ///
    /// Every output chunk is sent to `on_output` in production order. When
    /// `on_output` is full the PTY is not read until it drains. Must be called
    /// from within a tokio runtime.
    pub fn create(
        &self,
        session: &SessionId,
        cwd: &Path,
        on_output: mpsc::Sender<PtyEvent>,
    ) -> Result<PtyHandle, PtyError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PtyError::SpawnFailed(format!("no async runtime: {e}")))?;

        let size = PtySize {
            rows: self.shell.rows,
            cols: self.shell.cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = native_pty_system()
            .openpty(size)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let cmd = build_command(&self.shell, cwd);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn shell: {e}")))?;

        // Drop the slave side so EOF is observed once the shell exits.
        drop(pair.slave);

        let child: Arc<Mutex<Box<dyn Child + Send + Sync>>> = Arc::new(Mutex::new(child));

        let writer = match pair.master.take_writer() {
            Ok(w) => w,
            Err(e) => {
                kill_quietly(&child);
                return Err(PtyError::SpawnFailed(format!("failed to take PTY writer: {e}")));
            }
        };
        let reader = match pair.master.try_clone_reader() {
            Ok(r) => r,
            Err(e) => {
                kill_quietly(&child);
                return Err(PtyError::SpawnFailed(format!("failed to clone PTY reader: {e}")));
            }
        };

        let exited = Arc::new(AtomicBool::new(false));

        let (raw_tx, raw_rx) = mpsc::channel::<Vec<u8>>(PTY_CHANNEL_DEPTH);
        if let Err(e) = spawn_reader(session, reader, raw_tx, Arc::clone(&exited)) {
            kill_quietly(&child);
            return Err(e);
        }

        let (input_tx, input_rx) = std::sync::mpsc::channel::<Vec<u8>>();
        if let Err(e) = spawn_writer(session, writer, input_rx, Arc::clone(&exited)) {
            kill_quietly(&child);
            return Err(e);
        }

        let forwarder = runtime.spawn(forward_output(
            session.clone(),
            raw_rx,
            on_output,
            Arc::clone(&child),
        ));

        info!(session = %session, cwd = %cwd.display(), "terminal started");

        Ok(PtyHandle::new(
            session.clone(),
            input_tx,
            child,
            pair.master,
            forwarder,
            exited,
            size,
        ))
    }
}

fn kill_quietly(child: &Mutex<Box<dyn Child + Send + Sync>>) {
    let _ = lock(child).kill();
}

fn spawn_reader(
    session: &SessionId,
    mut reader: Box<dyn Read + Send>,
    raw_tx: mpsc::Sender<Vec<u8>>,
    exited: Arc<AtomicBool>,
) -> Result<(), PtyError> {
    let session = session.clone();
    thread::Builder::new()
        .name("pty-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; PTY_READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break, // EOF, shell exited
                    Ok(n) => {
                        // Blocks while the consumer is behind.
                        if raw_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break; // Forwarder gone
                        }
                    }
                    Err(e) => {
                        debug!(session = %session, "PTY reader error: {e}");
                        break;
                    }
                }
            }
            exited.store(true, Ordering::SeqCst);
        })
        .map(|_| ())
        .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn PTY reader thread: {e}")))
}

fn spawn_writer(
    session: &SessionId,
    mut writer: Box<dyn Write + Send>,
    input_rx: std::sync::mpsc::Receiver<Vec<u8>>,
    exited: Arc<AtomicBool>,
) -> Result<(), PtyError> {
    let session = session.clone();
    thread::Builder::new()
        .name("pty-writer".to_string())
        .spawn(move || {
            for data in input_rx {
                if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
                    debug!(session = %session, "PTY write failed: {e}");
                    exited.store(true, Ordering::SeqCst);
                    break;
                }
            }
        })
        .map(|_| ())
        .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn PTY writer thread: {e}")))
}

/// Relay raw chunks to the session consumer, then report the exit.
async fn forward_output(
    session: SessionId,
    mut raw_rx: mpsc::Receiver<Vec<u8>>,
    on_output: mpsc::Sender<PtyEvent>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
) {
    while let Some(chunk) = raw_rx.recv().await {
        if on_output.send(PtyEvent::Output(chunk)).await.is_err() {
            debug!(session = %session, "terminal output consumer dropped");
            return;
        }
    }

    let code = wait_exit_code(&child).await;
    info!(session = %session, ?code, "terminal process exited");
    let _ = on_output.send(PtyEvent::Exited { code }).await;
}

async fn wait_exit_code(child: &Mutex<Box<dyn Child + Send + Sync>>) -> Option<u32> {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    loop {
        match lock(child).try_wait() {
            Ok(Some(status)) => return Some(status.exit_code()),
            Ok(None) => {}
            Err(e) => {
                debug!("PTY wait error: {e}");
                return None;
            }
        }
        if waited >= Duration::from_millis(EXIT_STATUS_WAIT_MS) {
            return None;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
}
