//! Testing utilities for the flagshift workspace
//!
//! Fixture projects, an in-memory [`ProjectStore`] and config helpers.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::TempDir;

use flagshift_core::{MigrationConfig, ProjectStore, StoreError};

/// Browser SDK file; every site migrates
pub const CLIENT_SOURCE: &str = "import Statsig from 'statsig-js';\n\
await Statsig.initialize('client-key', { userID: 'u1' });\n\
const a = Statsig.checkGate('new_checkout', true);\n\
const b = Statsig.checkGate('dark_mode');\n";

pub const CLIENT_MIGRATED: &str = "import { initialize } from 'launchdarkly-js-client-sdk';\n\
const ldClient = initialize('YOUR_CLIENT_SIDE_ID', { kind: \"user\", key: \"u1\" });\n\
await ldClient.waitForInitialization();\n\
const a = ldClient.variation('new_checkout', false);\n\
const b = ldClient.variation('dark_mode', false);\n";

/// Node server file; every site migrates
pub const SERVER_SOURCE: &str = "const statsig = require('statsig-node');\n\
await statsig.initialize('secret');\n\
const on = await statsig.checkGate(user, 'beta');\n";

pub const SERVER_MIGRATED: &str = "const { init } = require('@launchdarkly/node-server-sdk');\n\
const ldClient = init('YOUR_CLIENT_SIDE_ID');\n\
await ldClient.waitForInitialization();\n\
const on = await ldClient.boolVariation('beta', user, false);\n";

/// Gate tied to an experiment by pragma; nothing in it may be patched
pub const CHECKOUT_SOURCE: &str = "import Statsig from 'statsig-js';\n\
// flagshift:related express_checkout\n\
const exp = Statsig.getExperiment('checkout_flow_test');\n\
if (Statsig.checkGate('express_checkout')) {}\n";

/// Does not parse
pub const BROKEN_SOURCE: &str = "import Statsig from 'statsig-js';\nconst x = (;\n";

/// Mentions no Statsig API at all
pub const PLAIN_SOURCE: &str = "export const add = (a, b) => a + b;\n";

/// Config tuned for tests: small pool, generous timeout
pub fn test_config() -> MigrationConfig {
    MigrationConfig::new()
        .with_max_parallel_files(2)
        .with_file_timeout_ms(30_000)
}

/// Temp directory holding the given files
pub fn write_project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, source) in files {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, source).unwrap();
    }
    dir
}

/// Browser, server and experiment files plus a file without Statsig usage
pub fn sample_project() -> TempDir {
    write_project(&[
        ("src/client.js", CLIENT_SOURCE),
        ("server/index.js", SERVER_SOURCE),
        ("src/checkout.js", CHECKOUT_SOURCE),
        ("src/util.js", PLAIN_SOURCE),
    ])
}

pub fn read(dir: &TempDir, path: &str) -> String {
    std::fs::read_to_string(dir.path().join(path)).unwrap()
}

/// In-memory store with injectable failures
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, String>>,
    written: Mutex<BTreeMap<PathBuf, String>>,
    summaries: Mutex<BTreeMap<PathBuf, String>>,
    /// Text swapped in right after the first read of a path
    edits_after_read: Mutex<BTreeMap<PathBuf, String>>,
    failing_writes: Mutex<BTreeSet<PathBuf>>,
    fail_summary: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let store = Self::new();
        {
            let mut map = store.files.lock();
            for (path, source) in files {
                map.insert(PathBuf::from(path), (*source).to_string());
            }
        }
        store
    }

    /// Simulate an editor touching `path` between scan and write
    pub fn modify_after_first_read(&self, path: &str, text: &str) {
        self.edits_after_read
            .lock()
            .insert(PathBuf::from(path), text.to_string());
    }

    pub fn fail_writes_to(&self, path: &str) {
        self.failing_writes.lock().insert(PathBuf::from(path));
    }

    pub fn fail_summary(&self) {
        *self.fail_summary.lock() = true;
    }

    /// Current text of a source file
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().get(Path::new(path)).cloned()
    }

    /// Paths written through [`ProjectStore::write`], sorted
    pub fn written(&self) -> Vec<PathBuf> {
        self.written.lock().keys().cloned().collect()
    }

    pub fn summary(&self, path: &str) -> Option<String> {
        self.summaries.lock().get(Path::new(path)).cloned()
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryStore {
    async fn list(
        &self,
        extensions: &[String],
        exclude_dirs: &[String],
    ) -> Result<Vec<PathBuf>, StoreError> {
        let files = self.files.lock();
        Ok(files
            .keys()
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.iter().any(|x| x == e))
            })
            .filter(|path| {
                !path
                    .components()
                    .any(|c| exclude_dirs.iter().any(|d| c.as_os_str() == d.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn read(&self, path: &Path) -> Result<String, StoreError> {
        let mut files = self.files.lock();
        let current = files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::read(path, io::Error::from(io::ErrorKind::NotFound)))?;
        if let Some(edit) = self.edits_after_read.lock().remove(path) {
            files.insert(path.to_path_buf(), edit);
        }
        Ok(current)
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        if self.failing_writes.lock().contains(path) {
            return Err(StoreError::write(
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only file"),
            ));
        }
        self.files
            .lock()
            .insert(path.to_path_buf(), contents.to_string());
        self.written
            .lock()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn write_summary(&self, path: &Path, contents: &str) -> Result<PathBuf, StoreError> {
        if *self.fail_summary.lock() {
            return Err(StoreError::write(
                path,
                io::Error::other("disk full"),
            ));
        }
        self.summaries
            .lock()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(path.to_path_buf())
    }
}
