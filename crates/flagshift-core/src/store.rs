//! Project store: where sources come from and where patched text goes

use std::io::Write as _;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::OutputMode;
use crate::error::StoreError;

/// Read/write access to a project's sources
///
/// Paths handed in and out are relative to the project root.
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    /// Source files with one of `extensions`, skipping `exclude_dirs`, sorted
    async fn list(
        &self,
        extensions: &[String],
        exclude_dirs: &[String],
    ) -> Result<Vec<PathBuf>, StoreError>;

    /// Current text of a source file
    async fn read(&self, path: &Path) -> Result<String, StoreError>;

    /// Replace a file's text in one step; readers never see partial output
    async fn write(&self, path: &Path, contents: &str) -> Result<(), StoreError>;

    /// Write the summary artifact, returning where it landed
    async fn write_summary(&self, path: &Path, contents: &str) -> Result<PathBuf, StoreError>;
}

/// File system store rooted at a project directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    output: OutputMode,
}

impl FsStore {
    /// Store writing patched files back in place
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output: OutputMode::InPlace,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Absolute staging directory, if staging
    fn staging_dir(&self) -> Option<PathBuf> {
        match &self.output {
            OutputMode::InPlace => None,
            OutputMode::Staging(dir) => Some(self.resolve(dir)),
        }
    }

    /// Destination of a patched source file
    #[must_use]
    pub fn output_path(&self, path: &Path) -> PathBuf {
        match self.staging_dir() {
            Some(dir) => dir.join(path),
            None => self.root.join(path),
        }
    }
}

/// Temp file in the target's directory, then rename over the target
fn write_atomic(target: &Path, contents: &str) -> Result<(), StoreError> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| StoreError::write(target, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| StoreError::write(target, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::write(target, e))?;
    tmp.persist(target)
        .map_err(|e| StoreError::write(target, e.error))?;
    Ok(())
}

#[async_trait::async_trait]
impl ProjectStore for FsStore {
    async fn list(
        &self,
        extensions: &[String],
        exclude_dirs: &[String],
    ) -> Result<Vec<PathBuf>, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::RootNotFound(self.root.clone()));
        }
        let root = self.root.clone();
        let staging = self.staging_dir();
        let extensions = extensions.to_vec();
        let exclude_dirs = exclude_dirs.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkDir::new(&root).follow_links(false).into_iter().filter_entry(|entry| {
                if !entry.file_type().is_dir() || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                let excluded = exclude_dirs.iter().any(|d| *d == name);
                let staged = staging.as_deref().is_some_and(|s| entry.path() == s);
                !excluded && !staged
            });

            for entry in walker {
                let entry = entry.map_err(|e| StoreError::List {
                    path: e.path().map_or_else(|| root.clone(), Path::to_path_buf),
                    message: e.to_string(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let matches = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.iter().any(|x| x == e));
                if !matches {
                    continue;
                }
                if let Ok(relative) = entry.path().strip_prefix(&root) {
                    files.push(relative.to_path_buf());
                }
            }
            files.sort();
            tracing::debug!("listed {} source files under {}", files.len(), root.display());
            Ok(files)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn read(&self, path: &Path) -> Result<String, StoreError> {
        let full = self.resolve(path);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| StoreError::read(path, e))?;
        String::from_utf8(bytes).map_err(|_| StoreError::Encoding(path.to_path_buf()))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        let target = self.output_path(path);
        let contents = contents.to_string();
        tokio::task::spawn_blocking(move || write_atomic(&target, &contents))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn write_summary(&self, path: &Path, contents: &str) -> Result<PathBuf, StoreError> {
        let target = self.resolve(path);
        let contents = contents.to_string();
        let written = target.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &contents))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["ts".to_string(), "js".to_string()]
    }

    fn touch(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/b.ts", "");
        touch(dir.path(), "src/a.js", "");
        touch(dir.path(), "src/readme.md", "");
        touch(dir.path(), "node_modules/statsig-js/index.js", "");
        touch(dir.path(), "app/node_modules/x.js", "");

        let store = FsStore::new(dir.path());
        let files = store.list(&exts(), &["node_modules".to_string()]).await.unwrap();
        assert_eq!(files, vec![PathBuf::from("src/a.js"), PathBuf::from("src/b.ts")]);
    }

    #[tokio::test]
    async fn list_skips_staging_dir() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts", "");
        touch(dir.path(), "migrated/src/a.ts", "");

        let store = FsStore::new(dir.path()).with_output(OutputMode::Staging("migrated".into()));
        let files = store.list(&exts(), &[]).await.unwrap();
        assert_eq!(files, vec![PathBuf::from("src/a.ts")]);
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path().join("nope"));
        assert!(matches!(
            store.list(&exts(), &[]).await,
            Err(StoreError::RootNotFound(_))
        ));
    }

    #[tokio::test]
    async fn write_in_place_replaces_text() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts", "old");

        let store = FsStore::new(dir.path());
        store.write(Path::new("src/a.ts"), "new").await.unwrap();
        assert_eq!(store.read(Path::new("src/a.ts")).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn write_to_staging_leaves_source() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.ts", "old");

        let store = FsStore::new(dir.path()).with_output(OutputMode::Staging("out".into()));
        store.write(Path::new("src/a.ts"), "new").await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("src/a.ts")).unwrap(), "old");
        assert_eq!(std::fs::read_to_string(dir.path().join("out/src/a.ts")).unwrap(), "new");
    }

    #[tokio::test]
    async fn non_utf8_read_is_encoding_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bin.js"), [0xff, 0xfe, 0x00]).unwrap();
        let store = FsStore::new(dir.path());
        assert!(matches!(
            store.read(Path::new("bin.js")).await,
            Err(StoreError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn summary_lands_under_root() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let path = store
            .write_summary(Path::new("migration-summary.json"), "{}")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("migration-summary.json"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
    }
}
