mod config;
pub mod timing_cache;

pub use config::{
    FileSettingsStore, MemorySettingsStore, SessionConfig, SessionConfigPatch, SettingsStore,
    VoiceSettings,
};
pub use timing_cache::{
    CacheKey, FileTimingCache, MemoryTimingCache, SectionTimings, TimingCache, WordTiming,
    WordTimingMap,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/stillpoint[-dev]/` based on STILLPOINT_ENV.
///
/// Set STILLPOINT_ENV=dev to use the development data directory, or
/// STILLPOINT_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("STILLPOINT_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STILLPOINT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("stillpoint-dev")
            } else {
                base_dir.join("stillpoint")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
