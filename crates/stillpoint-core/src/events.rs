use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, SessionState};

/// Every state change of the session engine produces an Event.
/// Front ends print or log them; the published state carries the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        phase: Phase,
        total_duration: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        phase: Phase,
        elapsed: u64,
        at: DateTime<Utc>,
    },
    SessionPaused {
        elapsed: u64,
        remaining_time: i64,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
    SessionSeeked {
        elapsed: u64,
        remaining_time: i64,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        elapsed: u64,
        at: DateTime<Utc>,
    },
    IntervalBell {
        elapsed_in_meditation: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        total_duration: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: SessionState,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Event kind as a stable lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionStarted { .. } => "session_started",
            Event::SessionResumed { .. } => "session_resumed",
            Event::SessionPaused { .. } => "session_paused",
            Event::SessionReset { .. } => "session_reset",
            Event::SessionSeeked { .. } => "session_seeked",
            Event::PhaseChanged { .. } => "phase_changed",
            Event::IntervalBell { .. } => "interval_bell",
            Event::SessionCompleted { .. } => "session_completed",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}
