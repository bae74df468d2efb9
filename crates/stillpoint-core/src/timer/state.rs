use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Stopped,
    /// Silent pre-roll before the start bells.
    Delay,
    Bells,
    Meditation,
    Paused,
    Finished,
}

impl Phase {
    /// True for the phases in which the session clock runs.
    pub fn is_running(self) -> bool {
        matches!(self, Phase::Delay | Phase::Bells | Phase::Meditation)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Stopped => "stopped",
            Phase::Delay => "delay",
            Phase::Bells => "bells",
            Phase::Meditation => "meditation",
            Phase::Paused => "paused",
            Phase::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// The single authoritative view of a session, published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    /// Phase that was active when the session was paused.
    pub paused_phase: Option<Phase>,
    /// Seconds since this run started.
    pub elapsed: u64,
    /// Delay + bell sequence + meditation, frozen for the run.
    pub total_duration: u64,
    /// Negative countdown during the pre-roll, then seconds left in the
    /// meditation.
    pub remaining_time: i64,
    pub delay_duration: u64,
    pub bell_duration: u64,
    pub meditation_duration: u64,
    pub is_bell_sequence_running: bool,
    pub is_wake_lock_active: bool,
    /// Bumped on every seek and reset, so subscribers can tell a jump
    /// from an ordinary tick.
    pub position_epoch: u64,
}

impl SessionState {
    pub fn initial(delay: u64, bells: u64, meditation: u64) -> Self {
        Self {
            phase: Phase::Stopped,
            paused_phase: None,
            elapsed: 0,
            total_duration: delay + bells + meditation,
            remaining_time: meditation as i64,
            delay_duration: delay,
            bell_duration: bells,
            meditation_duration: meditation,
            is_bell_sequence_running: false,
            is_wake_lock_active: false,
            position_epoch: 0,
        }
    }

    /// Elapsed offset at which the meditation phase begins.
    pub fn meditation_start(&self) -> u64 {
        self.delay_duration + self.bell_duration
    }

    /// Seconds into the meditation phase, `None` during the pre-roll.
    pub fn elapsed_in_meditation(&self) -> Option<u64> {
        self.elapsed.checked_sub(self.meditation_start())
    }

    /// Phase implied by `elapsed` alone.
    pub fn phase_at(&self, elapsed: u64) -> Phase {
        if elapsed < self.delay_duration {
            Phase::Delay
        } else if elapsed < self.meditation_start() {
            Phase::Bells
        } else {
            Phase::Meditation
        }
    }

    /// Remaining time shown for `elapsed` within `phase`.
    pub fn remaining_at(&self, elapsed: u64, phase: Phase) -> i64 {
        let elapsed = elapsed as i64;
        match phase {
            Phase::Delay => elapsed - self.delay_duration as i64,
            Phase::Bells => elapsed - self.meditation_start() as i64,
            _ => self.total_duration as i64 - elapsed,
        }
    }

    /// The phase the session is in, looking through a pause.
    pub fn effective_phase(&self) -> Phase {
        match (self.phase, self.paused_phase) {
            (Phase::Paused, Some(p)) => p,
            (p, _) => p,
        }
    }
}
