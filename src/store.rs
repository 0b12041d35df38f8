use anyhow::Context;
use std::path::{Path, PathBuf};

/// The remote document store behind the sync gateway, reduced to the two
/// operations the original ever used: read one blob, replace one blob.
/// Last write wins; no merge, no conflict detection.
pub trait DocumentStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Directory-backed store: each key is one `{key}.json` file, replaced
/// atomically via a temp file and rename.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn doc_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl DocumentStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.doc_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read document {}", path.to_string_lossy()))?;
        Ok(Some(text))
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("failed to create store root {}", self.root.to_string_lossy())
        })?;
        let path = self.doc_path(key);
        let tmp = self.root.join(format!("{}.json.writing", key));
        std::fs::write(&tmp, value)
            .with_context(|| format!("failed to write document {}", tmp.to_string_lossy()))?;
        std::fs::rename(&tmp, &path).with_context(|| {
            format!("failed to move document into place {}", path.to_string_lossy())
        })?;
        Ok(())
    }
}

pub fn store_at(path: &Path) -> FileStore {
    FileStore::new(path)
}
