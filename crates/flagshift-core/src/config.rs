//! Migration configuration
//!
//! Loaded from `flagshift.toml`; every field has a default so an empty file
//! (or no file) is a valid configuration.
//!
//! ```toml
//! max_parallel_files = 8
//! client_identifier = "launchDarkly"
//! output = { staging = "migrated" }
//!
//! [wrappers]
//! isFeatureOn = "gate_check"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use flagshift_catalog::literal::is_identifier;
use flagshift_catalog::{FindingKind, DEFAULT_PRAGMA_TAG};
use flagshift_engine::{RewriteOptions, DEFAULT_CLIENT_IDENTIFIER, DEFAULT_CREDENTIAL_PLACEHOLDER};
use flagshift_scanner::DEFAULT_PRAGMA_WINDOW;

use crate::error::ConfigError;

/// Default config file name looked up in the project root
pub const CONFIG_FILE_NAME: &str = "flagshift.toml";

/// Default summary artifact name
pub const DEFAULT_SUMMARY_PATH: &str = "migration-summary.json";

/// Where patched files go
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Overwrite sources under the project root
    #[default]
    InPlace,
    /// Mirror patched files under this directory, sources untouched
    Staging(PathBuf),
}

/// Settings for one migration pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// File extensions to scan, without the dot
    pub extensions: Vec<String>,
    /// Directory names skipped at any depth
    pub exclude_dirs: Vec<String>,
    /// Files scanned concurrently
    pub max_parallel_files: usize,
    /// Per-file scan timeout in milliseconds
    pub file_timeout_ms: u64,
    /// Comment tag declaring experiment relations
    pub pragma_tag: String,
    /// Lines between a pragma and its experiment fetch
    pub pragma_window: usize,
    /// Name of the LaunchDarkly client in rewritten code
    pub client_identifier: String,
    /// Placeholder written where a client-side ID belongs
    pub credential_placeholder: String,
    /// Also migrate matches not tied to a Statsig import
    pub rewrite_low_confidence: bool,
    pub output: OutputMode,
    /// Summary artifact path; relative paths resolve against the root
    pub summary_path: PathBuf,
    /// Build the report without touching sources
    pub dry_run: bool,
    /// Project wrapper methods treated as built-in patterns
    pub wrappers: BTreeMap<String, FindingKind>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            extensions: ["js", "jsx", "ts", "tsx", "mjs", "cjs"]
                .into_iter()
                .map(String::from)
                .collect(),
            exclude_dirs: ["node_modules", "dist", "build", ".git", ".next", "coverage"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_parallel_files: 8,
            file_timeout_ms: 10_000,
            pragma_tag: DEFAULT_PRAGMA_TAG.to_string(),
            pragma_window: DEFAULT_PRAGMA_WINDOW,
            client_identifier: DEFAULT_CLIENT_IDENTIFIER.to_string(),
            credential_placeholder: DEFAULT_CREDENTIAL_PLACEHOLDER.to_string(),
            rewrite_low_confidence: false,
            output: OutputMode::InPlace,
            summary_path: PathBuf::from(DEFAULT_SUMMARY_PATH),
            dry_run: false,
            wrappers: BTreeMap::new(),
        }
    }
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`MigrationConfig::from_toml_str`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `flagshift.toml` from `root` if present, else defaults
    ///
    /// # Errors
    ///
    /// As [`MigrationConfig::from_file`] when the file exists.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::info!("loading config from {}", path.display());
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_files == 0 {
            return Err(ConfigError::invalid("max_parallel_files", "must be at least 1"));
        }
        if self.file_timeout_ms == 0 {
            return Err(ConfigError::invalid("file_timeout_ms", "must be at least 1"));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::invalid("extensions", "at least one extension is required"));
        }
        if let Some(ext) = self.extensions.iter().find(|e| e.is_empty() || e.starts_with('.')) {
            return Err(ConfigError::invalid(
                "extensions",
                format!("'{ext}' must be a bare extension such as \"ts\""),
            ));
        }
        if !is_identifier(&self.client_identifier) {
            return Err(ConfigError::invalid(
                "client_identifier",
                format!("'{}' is not a JavaScript identifier", self.client_identifier),
            ));
        }
        if self.credential_placeholder.trim().is_empty() {
            return Err(ConfigError::invalid("credential_placeholder", "must not be empty"));
        }
        if self.summary_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("summary_path", "must not be empty"));
        }
        if let OutputMode::Staging(dir) = &self.output {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::invalid("output", "staging directory must not be empty"));
            }
        }
        Ok(())
    }

    /// Options handed to the rewrite engine
    #[must_use]
    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions::default()
            .with_client_identifier(self.client_identifier.clone())
            .with_credential_placeholder(self.credential_placeholder.clone())
            .with_rewrite_low_confidence(self.rewrite_low_confidence)
    }

    /// With concurrent file limit
    #[inline]
    #[must_use]
    pub fn with_max_parallel_files(mut self, n: usize) -> Self {
        self.max_parallel_files = n;
        self
    }

    /// With per-file timeout
    #[inline]
    #[must_use]
    pub fn with_file_timeout_ms(mut self, ms: u64) -> Self {
        self.file_timeout_ms = ms;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_pragma_tag(mut self, tag: impl Into<String>) -> Self {
        self.pragma_tag = tag.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_pragma_window(mut self, lines: usize) -> Self {
        self.pragma_window = lines;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_client_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.client_identifier = identifier.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_credential_placeholder(mut self, credential: impl Into<String>) -> Self {
        self.credential_placeholder = credential.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_rewrite_low_confidence(mut self, enabled: bool) -> Self {
        self.rewrite_low_confidence = enabled;
        self
    }

    /// With output mode
    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = path.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With a project wrapper method
    #[inline]
    #[must_use]
    pub fn with_wrapper(mut self, method: impl Into<String>, kind: FindingKind) -> Self {
        self.wrappers.insert(method.into(), kind);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = MigrationConfig::from_toml_str("").unwrap();
        assert_eq!(config, MigrationConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_output_and_wrappers() {
        let config = MigrationConfig::from_toml_str(
            r#"
            max_parallel_files = 2
            client_identifier = "launchDarkly"
            output = { staging = "out" }

            [wrappers]
            isFeatureOn = "gate_check"
            readSetting = "config_fetch"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_parallel_files, 2);
        assert_eq!(config.client_identifier, "launchDarkly");
        assert_eq!(config.output, OutputMode::Staging(PathBuf::from("out")));
        assert_eq!(config.wrappers.get("isFeatureOn"), Some(&FindingKind::GateCheck));
        assert_eq!(config.wrappers.get("readSetting"), Some(&FindingKind::ConfigFetch));
        // untouched fields keep their defaults
        assert_eq!(config.extensions.len(), 6);
    }

    #[test]
    fn in_place_output_parses_from_string() {
        let config = MigrationConfig::from_toml_str(r#"output = "in-place""#).unwrap();
        assert_eq!(config.output, OutputMode::InPlace);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = MigrationConfig::from_toml_str("max_files = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_names_the_field() {
        let cases = [
            MigrationConfig::new().with_max_parallel_files(0),
            MigrationConfig::new().with_file_timeout_ms(0),
            MigrationConfig::new().with_client_identifier("ld-client"),
            MigrationConfig::new().with_credential_placeholder("  "),
            MigrationConfig::new().with_output(OutputMode::Staging(PathBuf::new())),
        ];
        let fields: Vec<&str> = cases
            .iter()
            .map(|c| match c.validate().unwrap_err() {
                ConfigError::InvalidValue { field, .. } => field,
                other => panic!("unexpected error: {other}"),
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                "max_parallel_files",
                "file_timeout_ms",
                "client_identifier",
                "credential_placeholder",
                "output"
            ]
        );
    }

    #[test]
    fn dotted_extension_is_rejected() {
        let mut config = MigrationConfig::new();
        config.extensions = vec![".ts".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rewrite_options_follow_config() {
        let options = MigrationConfig::new()
            .with_client_identifier("flags")
            .with_credential_placeholder("CLIENT_ID")
            .with_rewrite_low_confidence(true)
            .rewrite_options();
        assert_eq!(options.client_identifier, "flags");
        assert_eq!(options.credential_placeholder, "CLIENT_ID");
        assert!(options.rewrite_low_confidence);
    }

    #[test]
    fn discover_without_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::discover(dir.path()).unwrap();
        assert_eq!(config, MigrationConfig::default());
    }

    #[test]
    fn discover_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "dry_run = true\n").unwrap();
        assert!(MigrationConfig::discover(dir.path()).unwrap().dry_run);
    }
}
