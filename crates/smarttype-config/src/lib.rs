//! Configuration model and filesystem layout for SmartType.
//!
//! The crate owns three concerns shared by the supervisor daemon and its
//! control surface:
//!
//! - the YAML configuration document ([`Configuration`], [`AppConfig`])
//!   and the [`ConfigStore`] that loads, validates and persists it;
//! - the daemon's own runtime settings ([`DaemonSettings`]), exposed as a
//!   `clap` argument group;
//! - the runtime artefact layout ([`RuntimePaths`]) that lets a control
//!   invocation locate a running daemon.

mod defaults;
mod document;
mod files;
mod logging;
mod runtime;
mod settings;
mod store;

pub use defaults::{
    APPLICATION_DIR, CONFIG_FILE_NAME, DEFAULT_DEBOUNCE, DEFAULT_LOG_FILTER, DEFAULT_STOP_TIMEOUT,
    DEFAULT_WORKER_LOG, FALLBACK_WORKER_PATH, INSTALLED_WORKER_PATH, default_config_path,
    default_runtime_dir,
};
pub use document::{AppConfig, Configuration, ValidationError};
pub use files::{atomic_write, parent_directory};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use settings::DaemonSettings;
pub use store::{ConfigError, ConfigStore, render};
