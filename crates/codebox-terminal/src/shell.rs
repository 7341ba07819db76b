//! Shell detection and command construction.

use std::path::Path;

use codebox_config::schema::ShellConfig;
use portable_pty::CommandBuilder;

/// Detect the default shell.
///
/// - On Unix: reads the `SHELL` environment variable, falling back to `/bin/sh`.
/// - On Windows: reads the `COMSPEC` environment variable, falling back to `cmd.exe`.
pub fn detect_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }

    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }

    #[cfg(not(any(unix, windows)))]
    {
        "/bin/sh".to_string()
    }
}

/// Environment variables inherited from the gateway process.
///
/// Everything else is dropped so gateway credentials (store tokens and the
/// like) never reach user code running in the sandbox.
pub(crate) const ALLOWED_ENV_VARS: &[&str] = &[
    "HOME", "USER", "LOGNAME", "PATH", "LANG", "LC_ALL", "LC_CTYPE", "TMPDIR", "TZ",
];

/// Build the sanitized command for a session shell rooted at `cwd`.
pub(crate) fn build_command(config: &ShellConfig, cwd: &Path) -> CommandBuilder {
    let program = if config.program.is_empty() {
        detect_shell()
    } else {
        config.program.clone()
    };

    let mut cmd = CommandBuilder::new(&program);

    if config.login_shell {
        cmd.arg("-l");
    }
    cmd.args(&config.args);

    cmd.env_clear();
    for key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }
    cmd.env("SHELL", &program);
    for (key, value) in &config.env {
        cmd.env(key, value);
    }
    cmd.env("TERM", "xterm-256color");
    cmd.cwd(cwd);

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_shell_returns_non_empty() {
        assert!(!detect_shell().is_empty());
    }

    #[test]
    fn allowed_env_vars_contains_essentials() {
        assert!(ALLOWED_ENV_VARS.contains(&"HOME"));
        assert!(ALLOWED_ENV_VARS.contains(&"PATH"));
    }

    #[test]
    fn allowed_env_vars_excludes_secrets() {
        for var in ALLOWED_ENV_VARS {
            let lower = var.to_lowercase();
            for needle in ["key", "secret", "token", "password"] {
                assert!(
                    !lower.contains(needle),
                    "ALLOWED_ENV_VARS should not contain '{var}'"
                );
            }
        }
    }

    #[test]
    fn build_command_applies_config() {
        let mut config = ShellConfig {
            program: "/bin/sh".into(),
            args: vec!["-i".into()],
            login_shell: true,
            ..ShellConfig::default()
        };
        config.env.insert("PYTHONUNBUFFERED".into(), "1".into());

        let cmd = build_command(&config, Path::new("/tmp"));
        let argv: Vec<String> = cmd
            .get_argv()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(argv, vec!["/bin/sh", "-l", "-i"]);
        assert_eq!(
            cmd.get_env("PYTHONUNBUFFERED").map(|v| v.to_string_lossy().into_owned()),
            Some("1".to_string())
        );
        assert_eq!(
            cmd.get_env("TERM").map(|v| v.to_string_lossy().into_owned()),
            Some("xterm-256color".to_string())
        );
        assert_eq!(cmd.get_cwd().map(|c| c.to_string_lossy().into_owned()), Some("/tmp".into()));
    }
}
