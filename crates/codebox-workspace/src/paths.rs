//! Client path handling.
//!
//! Clients address files relative to the workspace root. A leading `/` is
//! read as the root itself; `.` and empty components are dropped; `..` may
//! step back up but never above the root.

use std::path::{Path, PathBuf};

use codebox_common::WorkspaceError;

/// Normalize a client path to `a/b/c` form. The root is `""`.
pub fn normalize(raw: &str) -> Result<String, WorkspaceError> {
    if raw.contains('\0') || raw.contains('\\') {
        return Err(WorkspaceError::InvalidPath(raw.to_string()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(WorkspaceError::InvalidPath(raw.to_string()));
                }
            }
            name => parts.push(name),
        }
    }
    Ok(parts.join("/"))
}

/// Map a normalized relative path onto `root`.
pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

/// Join a directory path and a child name in wire form.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Whether `name` is usable as a single directory name in a store key.
pub fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_plain_paths() {
        assert_eq!(normalize("").unwrap(), "");
        assert_eq!(normalize("/").unwrap(), "");
        assert_eq!(normalize("main.py").unwrap(), "main.py");
        assert_eq!(normalize("/src/./app//main.py").unwrap(), "src/app/main.py");
        assert_eq!(normalize("src/app/").unwrap(), "src/app");
    }

    #[test]
    fn normalize_allows_dotdot_inside_root() {
        assert_eq!(normalize("src/../main.py").unwrap(), "main.py");
        assert_eq!(normalize("a/b/../../c").unwrap(), "c");
    }

    #[test]
    fn normalize_rejects_escape() {
        for raw in ["..", "../etc/passwd", "src/../../x", "/../x"] {
            assert!(
                matches!(normalize(raw), Err(WorkspaceError::InvalidPath(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn normalize_rejects_nul_and_backslash() {
        assert!(normalize("a\0b").is_err());
        assert!(normalize("..\\..\\windows").is_err());
    }

    #[test]
    fn resolve_and_join() {
        let root = Path::new("/work/abc");
        assert_eq!(resolve(root, ""), PathBuf::from("/work/abc"));
        assert_eq!(resolve(root, "src/a.py"), PathBuf::from("/work/abc/src/a.py"));
        assert_eq!(join("", "a.py"), "a.py");
        assert_eq!(join("src", "a.py"), "src/a.py");
    }

    #[test]
    fn single_component() {
        assert!(is_single_component("python"));
        assert!(is_single_component("repl-42"));
        assert!(!is_single_component(""));
        assert!(!is_single_component(".."));
        assert!(!is_single_component("a/b"));
    }
}
