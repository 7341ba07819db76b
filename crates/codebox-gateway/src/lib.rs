//! codebox-gateway: one WebSocket connection per sandbox session.
//!
//! Each connection owns a session (a terminal and a workspace tree) and
//! multiplexes terminal I/O and file operations over a single socket.

pub mod cli;
pub mod connection;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;

#[cfg(test)]
mod testing;

pub use registry::{Session, SessionInitError, SessionRegistry};
pub use server::serve;
pub use state::GatewayState;
