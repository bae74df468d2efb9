//! Core error types for stillpoint-core.
//!
//! Nothing in the session subsystem is fatal to a running meditation:
//! most of these errors are logged and swallowed at the component that
//! produced them. They surface as `Err` only at the storage and script
//! loading boundaries, where the caller decides what to do.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for stillpoint-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Narration script errors
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Word timing cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Errors raised while reading a narration script.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The JSON document did not match either accepted shape
    #[error("Malformed script document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Markup line could not be understood
    #[error("Line {line}: {message}")]
    Markup { line: usize, message: String },

    /// Script has no intro section
    #[error("Script has no intro section")]
    MissingIntro,

    /// Failed to read the script file
    #[error("Failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Word timing cache errors. Always logged and treated as a cache miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache entry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write cache entry {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Screen wake lock failures. The timer keeps running without one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WakeLockError {
    #[error("Wake lock request denied: {0}")]
    Denied(String),

    #[error("Wake lock release failed: {0}")]
    ReleaseFailed(String),
}

/// Bell playback failures. The affected bell is skipped.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Audio output unavailable: {0}")]
    Output(#[from] std::io::Error),

    #[error("Bell clip failed to play: {0}")]
    Clip(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
