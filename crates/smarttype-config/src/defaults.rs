use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(unix)]
use libc::geteuid;

use crate::document::{AppConfig, Configuration};

/// Directory name used under the user's configuration and runtime roots.
pub const APPLICATION_DIR: &str = "smarttype";

/// File name of the configuration document.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default `RUST_LOG` value handed to the worker process.
pub const DEFAULT_WORKER_LOG: &str = "info";

/// Default bound on the graceful stop of a worker before it is killed.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default quiet window used to coalesce bursts of file events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Installed location of the worker binary.
pub const INSTALLED_WORKER_PATH: &str = "/usr/local/bin/smarttype-hook";

/// Build-output location of the worker binary, relative to the working directory.
pub const FALLBACK_WORKER_PATH: &str = "./target/release/smarttype-hook";

pub(crate) const DEFAULT_MIN_WORD_LENGTH: u32 = 2;
pub(crate) const DEFAULT_HOTKEY: &str = "Super+Shift+A";

pub(crate) const fn enabled() -> bool {
    true
}

pub(crate) const fn smart_punctuation() -> bool {
    true
}

pub(crate) const fn autocorrect() -> bool {
    true
}

pub(crate) const fn min_word_length() -> i64 {
    DEFAULT_MIN_WORD_LENGTH as i64
}

pub(crate) fn hotkey() -> String {
    DEFAULT_HOTKEY.to_owned()
}

/// Builds the configuration written when no file exists yet.
pub(crate) fn builtin_configuration() -> Configuration {
    let mut applications = BTreeMap::new();
    applications.insert("firefox".to_owned(), AppConfig::with_overrides(true, true));
    // Terminals and editors keep straight quotes.
    for name in ["qterminal", "kitty", "alacritty", "code"] {
        applications.insert(name.to_owned(), AppConfig::with_overrides(false, true));
    }

    let mut custom_typos = BTreeMap::new();
    custom_typos.insert("hte".to_owned(), "the".to_owned());
    custom_typos.insert("becuase".to_owned(), "because".to_owned());

    Configuration {
        enabled: true,
        smart_punctuation: true,
        autocorrect: true,
        min_word_length: DEFAULT_MIN_WORD_LENGTH,
        hotkey: DEFAULT_HOTKEY.to_owned(),
        applications,
        custom_typos,
    }
}

/// Default location of the configuration document.
///
/// Resolves to `<config dir>/smarttype/config.yaml`, falling back to the
/// working directory when the platform exposes no configuration root.
pub fn default_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APPLICATION_DIR);
    path.push(CONFIG_FILE_NAME);
    path
}

/// Default directory for the daemon's lock, pid, health and log files.
pub fn default_runtime_dir() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = dirs::runtime_dir() {
            dir.push(APPLICATION_DIR);
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push(APPLICATION_DIR);
        dir.push(format!("uid-{}", unsafe { geteuid() }));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push(APPLICATION_DIR);
        dir
    }
}
