//! Error types for the cluster state aggregator.

use std::path::PathBuf;

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the aggregator.
///
/// Malformed events are not errors; they are counted and ignored.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A TOML config document could not be parsed.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A config file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// An observer callback returned an error.
    #[error("observer `{hook}` failed: {source}")]
    Observer {
        /// Which observer hook failed.
        hook: &'static str,
        /// Error returned by the callback.
        #[source]
        source: anyhow::Error,
    },

    /// A custom event-group handler returned an error.
    #[error("handler for group `{group}` failed: {source}")]
    Handler {
        /// Event group the handler was registered for.
        group: String,
        /// Error returned by the handler.
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
