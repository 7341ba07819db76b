use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// A single inbound frame could not be decoded. The frame is dropped and the
/// connection keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("message has no type")]
    MissingType,

    #[error("invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,
}

/// The workspace could not be seeded from the durable store.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("durable store unreachable: {0}")]
    StoreUnreachable(String),

    #[error("durable store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("no template for language '{0}'")]
    UnknownTemplate(String),

    #[error("durable store rejected bootstrap: {0}")]
    Store(String),

    #[error("failed to materialize workspace: {0}")]
    Materialize(#[from] WorkspaceError),
}

/// Request-scoped file tree errors. Never fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WorkspaceError {
    /// Map an I/O error for `path` onto `NotFound` when the OS reports it missing.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            WorkspaceError::NotFound(path.to_string())
        } else {
            WorkspaceError::Io(err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodeboxError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("server.outbound_buffer = 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: server.outbound_buffer = 0"
        );
    }

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::InvalidPayload {
            kind: "fetchContent".into(),
            reason: "missing field `path`".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid payload for 'fetchContent': missing field `path`"
        );
        assert_eq!(ProtocolError::MissingType.to_string(), "message has no type");
    }

    #[test]
    fn bootstrap_error_display() {
        let err = BootstrapError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "durable store did not answer within 3s");

        let err = BootstrapError::UnknownTemplate("cobol".into());
        assert_eq!(err.to_string(), "no template for language 'cobol'");

        let err = BootstrapError::Store("HTTP 500".into());
        assert_eq!(err.to_string(), "durable store rejected bootstrap: HTTP 500");
    }

    #[test]
    fn workspace_error_from_io_maps_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = WorkspaceError::from_io("src/main.py", io);
        assert!(matches!(err, WorkspaceError::NotFound(ref p) if p == "src/main.py"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = WorkspaceError::from_io("src/main.py", io);
        assert!(matches!(err, WorkspaceError::Io(_)));
    }

    #[test]
    fn codebox_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: CodeboxError = config_err.into();
        assert!(matches!(err, CodeboxError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn codebox_error_from_bootstrap() {
        let err: CodeboxError = BootstrapError::StoreUnreachable("refused".into()).into();
        assert!(matches!(err, CodeboxError::Bootstrap(_)));
        assert_eq!(err.to_string(), "durable store unreachable: refused");
    }

    #[test]
    fn codebox_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: CodeboxError = io_err.into();
        assert!(matches!(err, CodeboxError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn codebox_error_other_variants() {
        let err = CodeboxError::Terminal("pty allocation failed".into());
        assert_eq!(err.to_string(), "terminal error: pty allocation failed");

        let err = CodeboxError::Store("bucket missing".into());
        assert_eq!(err.to_string(), "store error: bucket missing");

        let err = CodeboxError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
