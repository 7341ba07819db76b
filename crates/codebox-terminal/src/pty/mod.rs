//! PTY management using the `portable-pty` crate.
//!
//! [`PtyManager::create`] spawns the session shell; the returned
//! [`PtyHandle`] accepts input, resizes, and tears the process down.

mod handle;
mod spawn;
mod types;

pub use handle::PtyHandle;
pub use spawn::PtyManager;
pub use types::*;

// =============================================================================
// TESTS
// =============================================================================
