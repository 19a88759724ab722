//! The configuration document shared by the supervisor and the worker.
//!
//! The document is always replaced wholesale: a [`Configuration`] is only
//! ever produced from a complete, validated parse. Deserialisation goes
//! through [`RawConfiguration`] so that range checks run before a value
//! escapes to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults;

/// Parsed and validated configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConfiguration")]
pub struct Configuration {
    /// Whether the worker should run at all.
    pub enabled: bool,
    /// Global smart punctuation toggle.
    pub smart_punctuation: bool,
    /// Global autocorrect toggle.
    pub autocorrect: bool,
    /// Words shorter than this are never corrected.
    pub min_word_length: u32,
    /// Hotkey that toggles correction in the worker.
    pub hotkey: String,
    /// Per-application settings keyed by application name.
    pub applications: BTreeMap<String, AppConfig>,
    /// User supplied typo to correction mapping.
    pub custom_typos: BTreeMap<String, String>,
}

impl Default for Configuration {
    fn default() -> Self {
        defaults::builtin_configuration()
    }
}

impl Configuration {
    /// Looks up the settings recorded for an application.
    #[must_use]
    pub fn application(&self, name: &str) -> Option<&AppConfig> {
        self.applications.get(name)
    }

    /// Inserts or replaces the settings for an application.
    pub fn set_application(&mut self, name: impl Into<String>, config: AppConfig) {
        self.applications.insert(name.into(), config);
    }

    /// Adds or replaces a custom typo correction.
    pub fn add_custom_typo(&mut self, typo: impl Into<String>, correction: impl Into<String>) {
        self.custom_typos.insert(typo.into(), correction.into());
    }

    /// Removes a custom typo correction, returning the previous correction.
    pub fn remove_custom_typo(&mut self, typo: &str) -> Option<String> {
        self.custom_typos.remove(typo)
    }

    /// Effective smart quotes setting for `name`.
    ///
    /// Unknown applications and unset overrides inherit the global smart
    /// punctuation toggle; a disabled application never gets smart quotes.
    #[must_use]
    pub fn smart_quotes_for(&self, name: &str) -> bool {
        match self.application(name) {
            Some(app) => app.enabled && app.smart_quotes_or(self.smart_punctuation),
            None => self.smart_punctuation,
        }
    }

    /// Effective autocorrect setting for `name`.
    #[must_use]
    pub fn autocorrect_for(&self, name: &str) -> bool {
        match self.application(name) {
            Some(app) => app.enabled && app.autocorrect_or(self.autocorrect),
            None => self.autocorrect,
        }
    }
}

/// Per-application settings.
///
/// `smart_quotes` and `autocorrect` are tri-state: `None` inherits the
/// global value, `Some(false)` is an explicit opt-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Whether correction is active in this application.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Smart quotes override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_quotes: Option<bool>,
    /// Autocorrect override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocorrect: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smart_quotes: None,
            autocorrect: None,
        }
    }
}

impl AppConfig {
    pub(crate) const fn with_overrides(smart_quotes: bool, autocorrect: bool) -> Self {
        Self {
            enabled: true,
            smart_quotes: Some(smart_quotes),
            autocorrect: Some(autocorrect),
        }
    }

    /// Resolves the smart quotes override against the global default.
    #[must_use]
    pub fn smart_quotes_or(&self, global: bool) -> bool {
        self.smart_quotes.unwrap_or(global)
    }

    /// Resolves the autocorrect override against the global default.
    #[must_use]
    pub fn autocorrect_or(&self, global: bool) -> bool {
        self.autocorrect.unwrap_or(global)
    }
}

/// Wire shape of the document before validation.
///
/// Missing scalars fall back to the built-in defaults and missing maps
/// are empty. Unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct RawConfiguration {
    #[serde(default = "defaults::enabled")]
    enabled: bool,
    #[serde(default = "defaults::smart_punctuation")]
    smart_punctuation: bool,
    #[serde(default = "defaults::autocorrect")]
    autocorrect: bool,
    #[serde(default = "defaults::min_word_length")]
    min_word_length: i64,
    #[serde(default = "defaults::hotkey")]
    hotkey: String,
    #[serde(default)]
    applications: BTreeMap<String, AppConfig>,
    #[serde(default)]
    custom_typos: BTreeMap<String, String>,
}

/// Validation failures raised while converting the raw document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `min_word_length` was negative.
    #[error("min_word_length must be zero or greater, found {value}")]
    NegativeMinWordLength {
        /// Value found in the document.
        value: i64,
    },
    /// `min_word_length` did not fit the supported range.
    #[error("min_word_length {value} is out of range")]
    MinWordLengthOutOfRange {
        /// Value found in the document.
        value: i64,
    },
}

impl TryFrom<RawConfiguration> for Configuration {
    type Error = ValidationError;

    fn try_from(raw: RawConfiguration) -> Result<Self, Self::Error> {
        let RawConfiguration {
            enabled,
            smart_punctuation,
            autocorrect,
            min_word_length,
            hotkey,
            applications,
            custom_typos,
        } = raw;
        if min_word_length < 0 {
            return Err(ValidationError::NegativeMinWordLength {
                value: min_word_length,
            });
        }
        let min_word_length = u32::try_from(min_word_length).map_err(|_| {
            ValidationError::MinWordLengthOutOfRange {
                value: min_word_length,
            }
        })?;
        Ok(Self {
            enabled,
            smart_punctuation,
            autocorrect,
            min_word_length,
            hotkey,
            applications,
            custom_typos,
        })
    }
}
