//! Guided narration.
//!
//! [`compute_schedule`] decides when each script section is spoken;
//! [`NarrationScheduler`] speaks them against the live session state and
//! records per-word timings so a seek can resume mid-sentence.

mod playback;
mod schedule;
mod scheduler;

pub use playback::{Prosody, SectionPlayback, Step, Utterance};
pub use schedule::{
    compute_schedule, ScheduledEvent, FIRST_POKE_SECS, SECOND_POKE_SECS,
    SPREAD_MIN_DURATION_SECS, TRAILING_SILENCE_SECS, WINDOW_START_SECS,
};
pub use scheduler::NarrationScheduler;
