//! Session terminals: one interactive shell per session, driven through a
//! pseudo-terminal.
//!
//! Output flows from a PTY reader thread through bounded channels to the
//! session's consumer, so a slow consumer pauses PTY reads instead of
//! buffering without limit.

pub mod pty;
pub mod shell;
pub mod utf8;

pub use pty::{PtyError, PtyEvent, PtyHandle, PtyManager};
pub use utf8::Utf8Decoder;
