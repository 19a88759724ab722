//! Loading and persisting the configuration document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::document::Configuration;
use crate::files::{atomic_write, parent_directory};

const STORE_TARGET: &str = "smarttype_config::store";
const CONFIG_FILE_MODE: u32 = 0o644;
const DEFAULT_WRITE_ATTEMPTS: u32 = 2;
const DEFAULT_WRITE_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised while reading or writing the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("configuration io failed for '{}': {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The file exists but does not hold a valid document.
    #[error("failed to parse configuration '{}': {message}", .path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser or validation diagnostic.
        message: String,
    },
    /// The in-memory document could not be rendered.
    #[error("failed to serialise configuration: {message}")]
    Serialize {
        /// Serialiser diagnostic.
        message: String,
    },
    /// The configured path has no parent directory to create.
    #[error("configuration path '{}' has no parent directory", .path.display())]
    MissingParent {
        /// Configured path.
        path: PathBuf,
    },
}

impl ConfigError {
    /// True when the file was readable but malformed.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Reads and writes the configuration document at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Creates a store for the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the tracked document.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Loads the document, materialising and persisting the built-in
    /// default when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read or the
    /// default cannot be written, and [`ConfigError::Parse`] when the file
    /// is empty, malformed or fails validation. A parse failure never
    /// yields a partially populated document.
    pub fn load(&self) -> Result<Configuration, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => self.parse(&content),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                let config = Configuration::default();
                self.persist_default(&config)?;
                info!(
                    target: STORE_TARGET,
                    path = %self.path.display(),
                    "configuration file absent; wrote built-in default"
                );
                Ok(config)
            }
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Serialises `config` to its canonical form and writes it atomically,
    /// creating the parent directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the directory or file cannot be
    /// written.
    pub fn save(&self, config: &Configuration) -> Result<(), ConfigError> {
        let rendered = render(config)?;
        let parent = parent_directory(&self.path).ok_or_else(|| ConfigError::MissingParent {
            path: self.path.clone(),
        })?;
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
        atomic_write(&self.path, rendered.as_bytes(), CONFIG_FILE_MODE).map_err(|source| {
            ConfigError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }

    fn parse(&self, content: &str) -> Result<Configuration, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Parse {
                path: self.path.clone(),
                message: "configuration file is empty".to_owned(),
            });
        }
        serde_saphyr::from_str::<Configuration>(content).map_err(|error| ConfigError::Parse {
            path: self.path.clone(),
            message: error.to_string(),
        })
    }

    fn persist_default(&self, config: &Configuration) -> Result<(), ConfigError> {
        let mut attempt = 1;
        loop {
            match self.save(config) {
                Ok(()) => return Ok(()),
                Err(ConfigError::Io { path, source }) if attempt < DEFAULT_WRITE_ATTEMPTS => {
                    warn!(
                        target: STORE_TARGET,
                        path = %path.display(),
                        error = %source,
                        attempt,
                        "failed to write default configuration; retrying"
                    );
                    attempt += 1;
                    thread::sleep(DEFAULT_WRITE_BACKOFF);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Renders the canonical YAML form of `config`.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] when the serialiser rejects the
/// document.
pub fn render(config: &Configuration) -> Result<String, ConfigError> {
    serde_saphyr::to_string(config).map_err(|error| ConfigError::Serialize {
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::document::AppConfig;

    struct Harness {
        _dir: TempDir,
        store: ConfigStore,
    }

    #[fixture]
    fn harness() -> Harness {
        let dir = TempDir::new().expect("temp dir");
        let store = ConfigStore::new(dir.path().join("nested").join("config.yaml"));
        Harness { _dir: dir, store }
    }

    fn write(harness: &Harness, content: &str) {
        let parent = harness.store.path().parent().expect("parent");
        fs::create_dir_all(parent).expect("create parent");
        fs::write(harness.store.path(), content).expect("write config");
    }

    #[rstest]
    fn absent_file_materialises_default(harness: Harness) {
        let config = harness.store.load().expect("load default");
        assert_eq!(config, Configuration::default());
        assert!(harness.store.path().exists(), "default should be persisted");
        let reread = harness.store.load().expect("reload persisted default");
        assert_eq!(reread, config);
    }

    #[rstest]
    fn save_then_load_returns_same_document(harness: Harness) {
        let mut config = Configuration::default();
        config.enabled = false;
        config.min_word_length = 0;
        config.hotkey = "Ctrl+Alt+T".to_owned();
        config.set_application(
            "gedit",
            AppConfig {
                enabled: false,
                smart_quotes: None,
                autocorrect: Some(false),
            },
        );
        config.add_custom_typo("recieve", "receive");
        harness.store.save(&config).expect("save");
        assert_eq!(harness.store.load().expect("load"), config);
    }

    #[rstest]
    fn missing_keys_take_defaults(harness: Harness) {
        write(&harness, "enabled: false\n");
        let config = harness.store.load().expect("load partial document");
        assert!(!config.enabled);
        assert!(config.smart_punctuation);
        assert_eq!(config.min_word_length, 2);
        assert_eq!(config.hotkey, "Super+Shift+A");
        assert!(config.applications.is_empty());
        assert!(config.custom_typos.is_empty());
    }

    #[rstest]
    fn unknown_keys_are_ignored(harness: Harness) {
        write(
            &harness,
            "enabled: true\nfuture_feature: 12\ntheme:\n  name: dark\n",
        );
        let config = harness.store.load().expect("load forward compatible document");
        assert!(config.enabled);
    }

    #[rstest]
    fn unset_override_stays_distinct_from_false(harness: Harness) {
        write(
            &harness,
            "applications:\n  kitty:\n    enabled: true\n    smart_quotes: false\n  firefox:\n    enabled: true\n",
        );
        let config = harness.store.load().expect("load");
        let kitty = config.application("kitty").expect("kitty");
        let firefox = config.application("firefox").expect("firefox");
        assert_eq!(kitty.smart_quotes, Some(false));
        assert_eq!(firefox.smart_quotes, None);
        assert_eq!(firefox.autocorrect, None);
    }

    #[rstest]
    #[case::not_a_mapping("- just\n- a list\n")]
    #[case::wrong_type("enabled: maybe-later\n")]
    #[case::bad_map("applications: 7\n")]
    #[case::negative_length("min_word_length: -3\n")]
    #[case::empty("")]
    #[case::blank("   \n\n")]
    fn malformed_documents_fail_with_parse_error(harness: Harness, #[case] content: &str) {
        write(&harness, content);
        let error = harness.store.load().expect_err("malformed input must fail");
        assert!(error.is_parse(), "expected parse error, got {error:?}");
    }

    #[rstest]
    fn negative_length_names_the_field(harness: Harness) {
        write(&harness, "min_word_length: -1\n");
        let error = harness.store.load().expect_err("negative length must fail");
        assert!(
            error.to_string().contains("min_word_length"),
            "diagnostic should name the field: {error}"
        );
    }

    #[test]
    fn path_without_parent_is_rejected_on_save() {
        let store = ConfigStore::new("/");
        let error = store
            .save(&Configuration::default())
            .expect_err("the root has no parent");
        assert!(matches!(error, ConfigError::MissingParent { .. }));
    }

    #[cfg(unix)]
    #[rstest]
    fn unreadable_file_fails_with_io_error(harness: Harness) {
        // A directory at the document path cannot be read as a file.
        fs::create_dir_all(harness.store.path()).expect("create dir in place of file");
        let error = harness.store.load().expect_err("directory is not a file");
        assert!(matches!(error, ConfigError::Io { .. }), "got {error:?}");
    }
}
