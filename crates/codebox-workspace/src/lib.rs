//! Session workspaces: the local ephemeral file tree of each session and its
//! link to the durable store.
//!
//! - [`WorkspaceBridge`] seeds the tree at session start and serves the file
//!   operations of one session.
//! - [`DurableStore`] abstracts the canonical copy; [`HttpDurableStore`] talks
//!   to the save service, [`DirDurableStore`] keeps the same layout on disk.
//! - [`sync`] pushes local writes to the store in the background, in order.

pub mod bridge;
pub mod paths;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::WorkspaceBridge;
pub use store::{
    store_from_config, DirDurableStore, DurableStore, FileChange, HttpDurableStore, StoreError,
};
pub use sync::{SyncQueue, SyncSettings};
