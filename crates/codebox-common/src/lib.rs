pub mod errors;
pub mod id;
pub mod types;

pub use errors::{BootstrapError, CodeboxError, ConfigError, ProtocolError, WorkspaceError};
pub use id::{new_id, ConnectionId, SessionId};
pub use types::{FileKind, FileNode};

pub type Result<T> = std::result::Result<T, CodeboxError>;
