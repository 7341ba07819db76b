//! Full configuration validation.
//!
//! Each section has its own check; all errors are collected into a single
//! `ConfigError` so a user sees every problem at once.

mod helpers;


use crate::schema::{CodeboxConfig, StoreBackend};
use codebox_common::ConfigError;
use helpers::validate_range;
use std::net::SocketAddr;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &CodeboxConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_server(&mut errors, config);
    validate_store(&mut errors, config);
    validate_shell(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_server(errors: &mut Vec<String>, config: &CodeboxConfig) {
    let server = &config.server;
    if server.bind.parse::<SocketAddr>().is_err() {
        errors.push(format!("server.bind = {:?} is not a socket address", server.bind));
    }
    validate_range(
        errors,
        "server.max_message_bytes",
        server.max_message_bytes as u64,
        1024,
        64 * 1024 * 1024,
    );
    validate_range(
        errors,
        "server.outbound_buffer",
        server.outbound_buffer as u64,
        1,
        65_536,
    );
    validate_range(
        errors,
        "server.ping_interval_secs",
        server.ping_interval_secs,
        1,
        3600,
    );
    if server.heartbeat_timeout_secs <= server.ping_interval_secs {
        errors.push(format!(
            "server.heartbeat_timeout_secs = {} must exceed server.ping_interval_secs = {}",
            server.heartbeat_timeout_secs, server.ping_interval_secs
        ));
    }
}

fn validate_store(errors: &mut Vec<String>, config: &CodeboxConfig) {
    let store = &config.store;
    match store.backend {
        StoreBackend::Http => {
            if !(store.url.starts_with("http://") || store.url.starts_with("https://")) {
                errors.push(format!("store.url = {:?} must be an http(s) URL", store.url));
            }
        }
        StoreBackend::Directory => {
            if store.directory.is_empty() {
                errors.push("store.directory must be set for the directory backend".into());
            }
        }
    }
    validate_range(
        errors,
        "store.request_timeout_secs",
        store.request_timeout_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "store.bootstrap_timeout_secs",
        store.bootstrap_timeout_secs,
        1,
        600,
    );
    validate_range(
        errors,
        "store.persist_timeout_secs",
        store.persist_timeout_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "store.persist_retries",
        store.persist_retries as u64,
        0,
        5,
    );
}

fn validate_shell(errors: &mut Vec<String>, config: &CodeboxConfig) {
    validate_range(errors, "shell.cols", config.shell.cols as u64, 10, 1000);
    validate_range(errors, "shell.rows", config.shell.rows as u64, 2, 1000);
}
