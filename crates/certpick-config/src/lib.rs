//! Configuration surface for certpick: the certificate manifest, the crypto
//! engine hint properties, and the serde-backed selector settings.

use thiserror::Error;

mod manifest;
mod properties;
mod settings;

pub use manifest::{uri_to_path, validate_group_name, Manifest, ManifestEntry, MAX_LINE_LEN};
pub use properties::{load_engine_hint, parse_engine_hint};
pub use settings::SelectorSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest line {line} exceeds the line length limit")]
    LineTooLong { line: usize },
    #[error("manifest line {line} is malformed: expected five non-empty comma-separated fields")]
    MalformedLine { line: usize },
    #[error("group name {group:?} is empty or contains a delimiter")]
    BadGroupName { group: String },
    #[error("no manifest entries for group {group}")]
    UnknownGroup { group: String },
    #[error("manifest contains no entries")]
    EmptyManifest,
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}
