use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format for the daemon's own log records.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per record with the event fields flattened.
    #[default]
    Json,
    /// Single-line text for reading on a terminal.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
