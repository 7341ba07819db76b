use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which durable store implementation backs the workspaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// The save service over HTTP.
    #[default]
    Http,
    /// A local directory laid out like the object store bucket.
    Directory,
}

/// Durable store client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Base URL of the save service (`http` backend).
    pub url: String,
    /// Bucket directory (`directory` backend).
    pub directory: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Upper bound for seeding a workspace at session start.
    pub bootstrap_timeout_secs: u64,
    /// Upper bound for a single background push.
    pub persist_timeout_secs: u64,
    /// Extra attempts after a failed push before it is dropped.
    pub persist_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Http,
            url: "http://127.0.0.1:4000".into(),
            directory: String::new(),
            request_timeout_secs: 10,
            bootstrap_timeout_secs: 30,
            persist_timeout_secs: 10,
            persist_retries: 1,
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }

    /// How long queued pushes may keep draining once the process is shutting
    /// down: one push with all of its attempts.
    pub fn drain_timeout(&self) -> Duration {
        self.persist_timeout() * self.persist_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_defaults_point_at_local_save_service() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, StoreBackend::Http);
        assert_eq!(config.url, "http://127.0.0.1:4000");
        assert_eq!(config.persist_retries, 1);
        assert_eq!(config.persist_timeout(), Duration::from_secs(10));
        assert_eq!(config.drain_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn backend_parses_lowercase() {
        let config: StoreConfig = toml::from_str("backend = \"directory\"").unwrap();
        assert_eq!(config.backend, StoreBackend::Directory);
        assert!(toml::from_str::<StoreConfig>("backend = \"gcs\"").is_err());
    }
}
