//! Directory-backed store with the bucket layout of the save service:
//! `base-code/<language>/...` templates and `repl/<session>/...` copies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use codebox_common::{FileNode, SessionId};
use tracing::debug;

use super::{DurableStore, FileChange, StoreError};
use crate::paths;

pub struct DirDurableStore {
    root: PathBuf,
}

impl DirDurableStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn template_dir(&self, language: &str) -> Result<PathBuf, StoreError> {
        if !paths::is_single_component(language) {
            return Err(StoreError::UnknownTemplate(language.to_string()));
        }
        Ok(self.root.join("base-code").join(language))
    }

    fn session_dir(&self, session: &SessionId) -> Result<PathBuf, StoreError> {
        if !paths::is_single_component(session.as_str()) {
            return Err(StoreError::InvalidKey(session.to_string()));
        }
        Ok(self.root.join("repl").join(session.as_str()))
    }
}

/// Copy `src` into `dst` recursively, keeping files that already exist.
fn copy_missing(src: &Path, dst: &Path) -> io::Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_missing(&entry.path(), &target)?;
        } else if !target.exists() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Collect every node under `dir`, files with content, parents first.
fn collect_tree(dir: &Path, prefix: &str, out: &mut Vec<FileNode>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = paths::join(prefix, &name);
        if entry.file_type()?.is_dir() {
            out.push(FileNode::dir(relative.clone()));
            collect_tree(&entry.path(), &relative, out)?;
        } else {
            let bytes = fs::read(entry.path())?;
            let content = String::from_utf8_lossy(&bytes).into_owned();
            out.push(FileNode::file(relative, Some(content)));
        }
    }
    Ok(())
}

fn list_top_level(dir: &Path) -> io::Result<Vec<FileNode>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            out.push(FileNode::dir(name));
        } else {
            let bytes = fs::read(entry.path())?;
            out.push(FileNode::file(
                name,
                Some(String::from_utf8_lossy(&bytes).into_owned()),
            ));
        }
    }
    Ok(out)
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?
}

#[async_trait]
impl DurableStore for DirDurableStore {
    async fn fetch_base(
        &self,
        session: &SessionId,
        language: &str,
    ) -> Result<Vec<FileNode>, StoreError> {
        let template = self.template_dir(language)?;
        let dest = self.session_dir(session)?;
        let language = language.to_string();
        let session_name = session.to_string();

        blocking(move || {
            if !template.is_dir() {
                return Err(StoreError::UnknownTemplate(language));
            }
            let copied = copy_missing(&template, &dest)?;
            debug!(session = %session_name, %language, copied, "seeded session copy");

            let mut files = Vec::new();
            collect_tree(&dest, "", &mut files)?;
            if files.is_empty() {
                return Err(StoreError::UnknownTemplate(language));
            }
            Ok(files)
        })
        .await
    }

    async fn persist(&self, session: &SessionId, files: &[FileChange]) -> Result<(), StoreError> {
        let dest = self.session_dir(session)?;
        let mut writes = Vec::with_capacity(files.len());
        for change in files {
            let relative = paths::normalize(&change.path)
                .map_err(|_| StoreError::InvalidKey(change.path.clone()))?;
            if relative.is_empty() {
                return Err(StoreError::InvalidKey(change.path.clone()));
            }
            writes.push((dest.join(relative), change.content.clone()));
        }

        blocking(move || {
            for (path, content) in writes {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, content)?;
            }
            Ok(())
        })
        .await
    }

    async fn list_top(&self, session: &SessionId) -> Result<Vec<FileNode>, StoreError> {
        let dir = self.session_dir(session)?;
        let session_name = session.to_string();
        blocking(move || {
            if !dir.is_dir() {
                return Err(StoreError::NotFound(session_name));
            }
            Ok(list_top_level(&dir)?)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> (tempfile::TempDir, DirDurableStore) {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base-code/python");
        fs::create_dir_all(base.join("lib")).unwrap();
        fs::write(base.join("main.py"), "print('hello')\n").unwrap();
        fs::write(base.join("lib/util.py"), "X = 1\n").unwrap();
        let store = DirDurableStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn fetch_base_copies_template() {
        let (dir, store) = seeded_store();
        let session = SessionId::new("abc");
        let files = store.fetch_base(&session, "python").await.unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.effective_path()).collect();
        assert_eq!(paths, vec!["lib", "lib/util.py", "main.py"]);
        assert_eq!(files[2].content.as_deref(), Some("print('hello')\n"));
        assert!(dir.path().join("repl/abc/lib/util.py").exists());
    }

    #[tokio::test]
    async fn fetch_base_keeps_existing_session_files() {
        let (dir, store) = seeded_store();
        let session = SessionId::new("abc");
        fs::create_dir_all(dir.path().join("repl/abc")).unwrap();
        fs::write(dir.path().join("repl/abc/main.py"), "print(2)\n").unwrap();

        let files = store.fetch_base(&session, "python").await.unwrap();
        let main = files.iter().find(|f| f.name == "main.py").unwrap();
        assert_eq!(main.content.as_deref(), Some("print(2)\n"));
    }

    #[tokio::test]
    async fn fetch_base_unknown_template() {
        let (_dir, store) = seeded_store();
        let session = SessionId::new("abc");
        for language in ["cobol", "../python", ""] {
            let err = store.fetch_base(&session, language).await.unwrap_err();
            assert!(matches!(err, StoreError::UnknownTemplate(_)), "{language}: {err:?}");
        }
    }

    #[tokio::test]
    async fn persist_then_list_top() {
        let (_dir, store) = seeded_store();
        let session = SessionId::new("abc");
        store.fetch_base(&session, "python").await.unwrap();
        store
            .persist(
                &session,
                &[
                    FileChange::new("main.py", "print(1)"),
                    FileChange::new("new/deep/file.txt", "x"),
                ],
            )
            .await
            .unwrap();

        let top = store.list_top(&session).await.unwrap();
        let names: Vec<&str> = top.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["lib", "main.py", "new"]);
        assert_eq!(top[1].content.as_deref(), Some("print(1)"));
        assert!(top[0].content.is_none());
    }

    #[tokio::test]
    async fn persist_rejects_escaping_paths() {
        let (_dir, store) = seeded_store();
        let err = store
            .persist(&SessionId::new("abc"), &[FileChange::new("../../x", "y")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn list_top_unknown_session() {
        let (_dir, store) = seeded_store();
        let err = store.list_top(&SessionId::new("nobody")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
