//! Errors raised while reading `INTERVUE_*` settings.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected configuration, from [`Config::from_env`](super::Config::from_env) or
/// [`Config::validate`](super::Config::validate).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port '{value}': INTERVUE_PORT must be between 1 and 65535")]
    InvalidPort { value: String },

    #[error("INTERVUE_PORT '{value}' is not a number: {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("INTERVUE_BIND_ADDR '{value}' is not an IP address: {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A numeric variable could not be parsed.
    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    /// A setting parsed but breaks an engine invariant.
    #[error("{name} out of range: {reason}")]
    OutOfRange { name: &'static str, reason: String },

    /// `INTERVUE_QUESTION_BANK_PATH` or `INTERVUE_STORAGE_PATH` is missing.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    #[error("expected a file: {path}")]
    NotAFile { path: PathBuf },

    #[error("expected a directory: {path}")]
    NotADirectory { path: PathBuf },
}
