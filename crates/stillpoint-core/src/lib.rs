//! # Stillpoint Core Library
//!
//! This library provides the session logic for the Stillpoint meditation
//! timer: a countdown with an optional pre-roll delay, ceremonial bells,
//! and an optional guided mode that narrates a script with synthesized
//! speech. The `stillpoint` CLI is a thin front end over it.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A clock-driven phase state machine that requires the
//!   caller to periodically invoke `tick()` for progress updates
//! - **Narration**: Section scheduling, part-by-part speech, and word
//!   timings that make seeks resume mid-sentence
//! - **Storage**: TOML-based configuration and a JSON word-timing cache
//! - **Leaves**: Bell, speech, noise and wake-lock traits the host implements
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core session state machine
//! - [`NarrationScheduler`]: Guided narration driven by published state
//! - [`Session`]: Both of the above, wired together
//! - [`SessionConfig`]: User settings

pub mod bell;
pub mod clock;
pub mod error;
pub mod events;
pub mod narration;
pub mod noise;
pub mod script;
pub mod session;
pub mod speech;
pub mod storage;
pub mod timer;

pub use bell::{BellPlayer, BellSequencer, SilentBell, TerminalBell, Volume};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, ConfigError, CoreError, PlaybackError, ScriptError, WakeLockError};
pub use events::Event;
pub use narration::{compute_schedule, NarrationScheduler, ScheduledEvent};
pub use noise::{LoggedNoise, NoisePlayer, SilentNoise};
pub use script::Script;
pub use session::{Devices, Session};
pub use speech::{SimulatedSpeech, SpeechEngine};
pub use storage::{
    FileSettingsStore, FileTimingCache, MemorySettingsStore, MemoryTimingCache, SessionConfig,
    SettingsStore, TimingCache,
};
pub use timer::{NoopWakeLock, Phase, SessionState, TimerEngine, WakeLock};
