use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// Length of the bundled bell recording, in seconds.
pub const DEFAULT_CLIP_SECS: f64 = 10.5;

/// Plays a single bell sound on demand.
pub trait BellPlayer {
    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Halt the clip currently ringing, if any.
    fn stop(&mut self);

    /// Fixed length of one bell clip, in seconds.
    fn clip_duration_secs(&self) -> f64;

    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;
}

/// Bell loudness with a mute toggle that remembers the last audible level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(default = "default_level")]
    pub level: f32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_level")]
    pub previous: f32,
}

fn default_level() -> f32 {
    1.0
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            level: 1.0,
            muted: false,
            previous: 1.0,
        }
    }
}

impl Volume {
    /// Set the level, clamped to `[0, 1]`. Zero counts as muted.
    pub fn set(&mut self, level: f32) {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        self.level = level;
        self.muted = level == 0.0;
        if level > 0.0 {
            self.previous = level;
        }
    }

    pub fn toggle_mute(&mut self) {
        if self.muted {
            self.level = if self.previous > 0.0 { self.previous } else { 1.0 };
            self.muted = false;
        } else {
            if self.level > 0.0 {
                self.previous = self.level;
            }
            self.level = 0.0;
            self.muted = true;
        }
    }

    /// Level actually applied to playback.
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level
        }
    }
}

/// Rings the terminal bell and logs each strike.
#[derive(Debug)]
pub struct TerminalBell {
    clip_secs: f64,
    volume: f32,
    ringing: bool,
}

impl TerminalBell {
    pub fn new() -> Self {
        Self {
            clip_secs: DEFAULT_CLIP_SECS,
            volume: 1.0,
            ringing: false,
        }
    }

    pub fn with_clip_duration(clip_secs: f64) -> Self {
        Self {
            clip_secs,
            ..Self::new()
        }
    }
}

impl Default for TerminalBell {
    fn default() -> Self {
        Self::new()
    }
}

impl BellPlayer for TerminalBell {
    fn play(&mut self) -> Result<(), PlaybackError> {
        tracing::info!(volume = self.volume, "bell");
        if self.volume > 0.0 {
            let mut err = std::io::stderr();
            err.write_all(b"\x07")?;
            err.flush()?;
        }
        self.ringing = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.ringing {
            tracing::debug!("bell stopped");
        }
        self.ringing = false;
    }

    fn clip_duration_secs(&self) -> f64 {
        self.clip_secs
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }
}

/// Logs bells without producing sound.
#[derive(Debug, Default)]
pub struct SilentBell {
    volume: f32,
}

impl BellPlayer for SilentBell {
    fn play(&mut self) -> Result<(), PlaybackError> {
        tracing::info!("bell (silent)");
        Ok(())
    }

    fn stop(&mut self) {}

    fn clip_duration_secs(&self) -> f64 {
        DEFAULT_CLIP_SECS
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }
}
