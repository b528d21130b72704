//! Typed errors for the registry crate.

use thiserror::Error;

/// Errors raised while querying or loading a step registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A category name other than `sources` or `filters`.
    #[error("unknown step category '{0}' (expected 'sources' or 'filters')")]
    UnknownCategory(String),

    /// The manifest file could not be read.
    #[error("cannot read registry manifest '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The manifest was readable but not a valid registry description.
    #[error("invalid registry manifest '{path}': {reason}")]
    InvalidManifest { path: String, reason: String },

    /// A dynamic registry could not produce a snapshot.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}
