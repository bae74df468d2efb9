//! TOML-based session configuration.
//!
//! Stores the user's session preferences:
//! - Meditation length and pre-roll delay
//! - Start/end bell counts and the gaps between them
//! - Interval bell period
//! - Guided narration voice settings
//! - Bell volume and mute state
//!
//! Configuration is stored at `~/.config/stillpoint/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::data_dir;
use crate::bell::{Volume, DEFAULT_GAP_SECS};
use crate::error::ConfigError;

/// Voice used for guided narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_rate")]
    pub rate: f32,
    #[serde(default = "default_pitch")]
    pub pitch: f32,
}

/// User-controlled session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Meditation length in seconds.
    #[serde(default = "default_meditation_duration")]
    pub meditation_duration: u64,
    /// Silent pre-roll before the start bells, in seconds.
    #[serde(default = "default_start_delay")]
    pub start_delay: u64,
    #[serde(default = "default_bell_count")]
    pub start_bell_count: usize,
    /// Seconds between consecutive start bells; `start_bell_count - 1` long.
    #[serde(default)]
    pub start_bell_gaps: Vec<f64>,
    #[serde(default = "default_bell_count")]
    pub end_bell_count: usize,
    #[serde(default)]
    pub end_bell_gaps: Vec<f64>,
    /// Interval bell period in minutes, 0 = off.
    #[serde(default)]
    pub interval_bell_period: u64,
    #[serde(default)]
    pub guided: bool,
    #[serde(default)]
    pub voice: VoiceSettings,
    #[serde(default)]
    pub volume: Volume,
}

fn default_voice_id() -> String {
    "default".into()
}
fn default_rate() -> f32 {
    0.9
}
fn default_pitch() -> f32 {
    0.5
}
fn default_meditation_duration() -> u64 {
    30 * 60
}
fn default_start_delay() -> u64 {
    5
}
fn default_bell_count() -> usize {
    1
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_id: default_voice_id(),
            rate: default_rate(),
            pitch: default_pitch(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            meditation_duration: default_meditation_duration(),
            start_delay: default_start_delay(),
            start_bell_count: default_bell_count(),
            start_bell_gaps: Vec::new(),
            end_bell_count: default_bell_count(),
            end_bell_gaps: Vec::new(),
            interval_bell_period: 0,
            guided: false,
            voice: VoiceSettings::default(),
            volume: Volume::default(),
        }
    }
}

/// Partial update merged into a [`SessionConfig`]; last write wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meditation_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_bell_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_bell_gaps: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_bell_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_bell_gaps: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_bell_period: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guided: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
}

impl SessionConfigPatch {
    pub fn apply(&self, cfg: &mut SessionConfig) {
        if let Some(v) = self.meditation_duration {
            cfg.meditation_duration = v;
        }
        if let Some(v) = self.start_delay {
            cfg.start_delay = v;
        }
        if let Some(ref gaps) = self.start_bell_gaps {
            cfg.start_bell_gaps = gaps.clone();
        }
        if let Some(v) = self.start_bell_count {
            cfg.set_start_bell_count(v);
        }
        if let Some(ref gaps) = self.end_bell_gaps {
            cfg.end_bell_gaps = gaps.clone();
        }
        if let Some(v) = self.end_bell_count {
            cfg.set_end_bell_count(v);
        }
        if let Some(v) = self.interval_bell_period {
            cfg.interval_bell_period = v;
        }
        if let Some(v) = self.guided {
            cfg.guided = v;
        }
        if let Some(ref v) = self.voice {
            cfg.voice = v.clone();
        }
        if let Some(v) = self.volume {
            cfg.volume = v;
        }
        cfg.normalize();
    }
}

impl SessionConfig {
    pub fn set_start_bell_count(&mut self, count: usize) {
        self.start_bell_count = count;
        resize_gaps(&mut self.start_bell_gaps, count);
    }

    pub fn set_end_bell_count(&mut self, count: usize) {
        self.end_bell_count = count;
        resize_gaps(&mut self.end_bell_gaps, count);
    }

    /// Restore the `gaps.len() == max(0, count - 1)` invariant.
    pub fn normalize(&mut self) {
        resize_gaps(&mut self.start_bell_gaps, self.start_bell_count);
        resize_gaps(&mut self.end_bell_gaps, self.end_bell_count);
    }

    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, e.g. `voice.rate`.
    ///
    /// Setting a bell count resizes its gap list.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.normalize();
        Ok(())
    }

    /// Parse from TOML, normalizing gap lists.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut cfg: SessionConfig = toml::from_str(content)?;
        cfg.normalize();
        Ok(cfg)
    }
}

fn resize_gaps(gaps: &mut Vec<f64>, count: usize) {
    gaps.resize(count.saturating_sub(1), DEFAULT_GAP_SECS);
}

/// Persistent home of the [`SessionConfig`].
pub trait SettingsStore {
    /// Stored configuration, `None` if nothing usable is stored.
    fn load(&self) -> Option<SessionConfig>;

    /// Merge `patch` into the current configuration and persist it.
    /// Failures are logged, never returned.
    fn save(&mut self, patch: &SessionConfigPatch);

    /// Observe every configuration change.
    fn subscribe(&self) -> watch::Receiver<SessionConfig>;

    /// Latest known configuration.
    fn current(&self) -> SessionConfig;
}

/// Settings kept in a TOML file.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    tx: watch::Sender<SessionConfig>,
}

impl FileSettingsStore {
    /// Store backed by `path`, seeded from its current content.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = read_config(&path).unwrap_or_default();
        let (tx, _rx) = watch::channel(initial);
        Self { path, tx }
    }

    /// Store at `<data_dir>/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open() -> Result<Self, ConfigError> {
        Ok(Self::new(data_dir()?.join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn replace(&mut self, cfg: SessionConfig) -> Result<(), ConfigError> {
        write_config(&self.path, &cfg)?;
        self.tx.send_replace(cfg);
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Option<SessionConfig> {
        read_config(&self.path)
    }

    fn save(&mut self, patch: &SessionConfigPatch) {
        let mut cfg = self.tx.borrow().clone();
        patch.apply(&mut cfg);
        if let Err(e) = write_config(&self.path, &cfg) {
            tracing::warn!("{e}");
        }
        self.tx.send_replace(cfg);
    }

    fn subscribe(&self) -> watch::Receiver<SessionConfig> {
        self.tx.subscribe()
    }

    fn current(&self) -> SessionConfig {
        self.tx.borrow().clone()
    }
}

fn read_config(path: &Path) -> Option<SessionConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read settings: {e}");
            return None;
        }
    };
    match SessionConfig::from_toml(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable settings: {e}");
            None
        }
    }
}

fn write_config(path: &Path, cfg: &SessionConfig) -> Result<(), ConfigError> {
    let save_failed = |message: String| ConfigError::SaveFailed {
        path: path.to_path_buf(),
        message,
    };
    let content = toml::to_string_pretty(cfg).map_err(|e| save_failed(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
}

/// In-memory settings, for tests and ephemeral sessions.
#[derive(Debug)]
pub struct MemorySettingsStore {
    saved: Option<SessionConfig>,
    tx: watch::Sender<SessionConfig>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionConfig::default());
        Self { saved: None, tx }
    }

    pub fn with_config(cfg: SessionConfig) -> Self {
        let (tx, _rx) = watch::channel(cfg.clone());
        Self {
            saved: Some(cfg),
            tx,
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Option<SessionConfig> {
        self.saved.clone()
    }

    fn save(&mut self, patch: &SessionConfigPatch) {
        let mut cfg = self.tx.borrow().clone();
        patch.apply(&mut cfg);
        self.saved = Some(cfg.clone());
        self.tx.send_replace(cfg);
    }

    fn subscribe(&self) -> watch::Receiver<SessionConfig> {
        self.tx.subscribe()
    }

    fn current(&self) -> SessionConfig {
        self.tx.borrow().clone()
    }
}
