//! PTY types: errors, events, and tuning constants.

// =============================================================================
// CONSTANTS
// =============================================================================

/// Maximum bytes read from a PTY in one syscall (8 KB).
pub const PTY_READ_CHUNK: usize = 8_192;

/// Chunks buffered between the reader thread and the forwarder task. Once
/// full, the reader thread blocks and the PTY stops being drained.
pub const PTY_CHANNEL_DEPTH: usize = 32;

/// How long to wait for the exit status once the PTY reports EOF.
pub const EXIT_STATUS_WAIT_MS: u64 = 1_000;

// =============================================================================
// ERROR
// =============================================================================

/// Errors originating from PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    /// The process exited or the handle was destroyed.
    #[error("terminal process is closed")]
    Closed,

    #[error("failed to resize PTY: {0}")]
    ResizeFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// =============================================================================
// EVENTS
// =============================================================================

/// What a session terminal delivers to its consumer, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    /// A chunk of raw output bytes.
    Output(Vec<u8>),
    /// The process went away on its own. Always the last event.
    Exited { code: Option<u32> },
}
