use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Dir,
}

/// One entry of a workspace tree.
///
/// Serialized as `{"name", "type", "path", "content"?}`. `content` is only
/// carried for files, and only when it has been loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(rename = "path", default)]
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileNode {
    pub fn file(relative_path: impl Into<String>, content: Option<String>) -> Self {
        let relative_path = relative_path.into();
        Self {
            name: base_name(&relative_path),
            kind: FileKind::File,
            relative_path,
            content,
        }
    }

    pub fn dir(relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        Self {
            name: base_name(&relative_path),
            kind: FileKind::Dir,
            relative_path,
            content: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    /// Path to use when materializing this node. Falls back to `name` for
    /// store listings that only carry top-level names.
    pub fn effective_path(&self) -> &str {
        if self.relative_path.is_empty() {
            &self.name
        } else {
            &self.relative_path
        }
    }
}

fn base_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
