//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Codebox gateway configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# bind = "0.0.0.0:3001"
# max_message_bytes = 4194304   # 1024-67108864
# outbound_buffer = 256         # 1-65536
# ping_interval_secs = 30       # 1-3600
# heartbeat_timeout_secs = 90   # must exceed ping_interval_secs

[workspace]
# root_dir = ""                 # empty: <temp>/codebox/workspaces
# cleanup_on_close = true

[store]
# backend = "http"              # http, directory
# url = "http://127.0.0.1:4000"
# directory = ""                # bucket directory for the directory backend
# request_timeout_secs = 10     # 1-300
# bootstrap_timeout_secs = 30   # 1-600
# persist_timeout_secs = 10     # 1-300
# persist_retries = 1           # 0-5

[shell]
# program = ""                  # empty: $SHELL, then /bin/sh
# args = []
# login_shell = false
# cols = 80
# rows = 24

[shell.env]
# PYTHONUNBUFFERED = "1"

[logging]
# level = "info"                # trace, debug, info, warn, error
"##
    .to_string()
}
