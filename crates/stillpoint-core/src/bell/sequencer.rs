//! Chained bell sequences.
//!
//! The first bell rings immediately; each later bell is armed only when
//! the previous one rings, `gap` seconds after that bell's start. The
//! sequence counts as running until the last clip has finished.

use super::player::BellPlayer;
use crate::clock::Deferred;

/// Gap used for any bell whose interval was never configured.
pub const DEFAULT_GAP_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Strike {
    index: usize,
    due_ms: u64,
}

#[derive(Debug, Default)]
pub struct BellSequencer {
    queue: Deferred<Strike>,
    count: usize,
    gaps: Vec<f64>,
    rung: usize,
    finishes_at_ms: Option<u64>,
}

impl BellSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds from the first strike until the last clip stops ringing.
    pub fn sequence_duration(count: usize, gaps: &[f64], clip_secs: f64) -> f64 {
        if count == 0 {
            return 0.0;
        }
        let gaps: f64 = (0..count - 1).map(|i| gap_at(gaps, i)).sum();
        gaps + clip_secs.max(0.0)
    }

    /// Begin a new sequence, cancelling any sequence already in flight.
    pub fn start(&mut self, now: u64, count: usize, gaps: &[f64], player: &mut dyn BellPlayer) {
        self.cancel(player);
        if count == 0 {
            return;
        }
        self.count = count;
        self.gaps = (0..count.saturating_sub(1)).map(|i| gap_at(gaps, i)).collect();
        tracing::debug!(count, gaps = ?self.gaps, "bell sequence started");
        self.strike(Strike { index: 0, due_ms: now }, player);
    }

    /// Ring every bell that has come due. Returns how many rang.
    pub fn poll(&mut self, now: u64, player: &mut dyn BellPlayer) -> usize {
        let mut rang = 0;
        // Striking may arm the next bell, which can itself already be due.
        loop {
            let due = self.queue.drain_due(now);
            if due.is_empty() {
                break;
            }
            for strike in due {
                self.strike(strike, player);
                rang += 1;
            }
        }
        if let Some(end) = self.finishes_at_ms {
            if self.queue.is_empty() && now >= end {
                self.finishes_at_ms = None;
                tracing::debug!(rung = self.rung, "bell sequence finished");
            }
        }
        rang
    }

    /// Stop further bells and silence the current clip.
    pub fn cancel(&mut self, player: &mut dyn BellPlayer) {
        if self.is_running() {
            tracing::debug!(rung = self.rung, of = self.count, "bell sequence cancelled");
            player.stop();
        }
        self.queue.clear();
        self.finishes_at_ms = None;
        self.rung = 0;
        self.count = 0;
        self.gaps.clear();
    }

    pub fn is_running(&self) -> bool {
        !self.queue.is_empty() || self.finishes_at_ms.is_some()
    }

    /// Bells rung so far in the current sequence.
    pub fn rung(&self) -> usize {
        self.rung
    }

    fn strike(&mut self, strike: Strike, player: &mut dyn BellPlayer) {
        if let Err(e) = player.play() {
            tracing::warn!(bell = strike.index, "bell playback failed: {e}");
        }
        self.rung += 1;
        let next = strike.index + 1;
        if next < self.count {
            let gap_ms = secs_to_ms(self.gaps[strike.index]);
            let due_ms = strike.due_ms.saturating_add(gap_ms);
            self.queue.schedule(strike.due_ms, gap_ms, Strike { index: next, due_ms });
        }
        let clip_ms = secs_to_ms(player.clip_duration_secs());
        self.finishes_at_ms = Some(strike.due_ms.saturating_add(clip_ms));
    }
}

fn gap_at(gaps: &[f64], i: usize) -> f64 {
    gaps.get(i)
        .copied()
        .filter(|g| g.is_finite() && *g >= 0.0)
        .unwrap_or(DEFAULT_GAP_SECS)
}

pub(crate) fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;

    #[derive(Default)]
    struct CountingBell {
        plays: usize,
        stops: usize,
        fail: bool,
    }

    impl BellPlayer for CountingBell {
        fn play(&mut self) -> Result<(), PlaybackError> {
            self.plays += 1;
            if self.fail {
                return Err(PlaybackError::Clip("decoder".into()));
            }
            Ok(())
        }
        fn stop(&mut self) {
            self.stops += 1;
        }
        fn clip_duration_secs(&self) -> f64 {
            2.0
        }
        fn set_volume(&mut self, _: f32) {}
        fn volume(&self) -> f32 {
            1.0
        }
    }

    #[test]
    fn three_bells_ring_at_zero_two_four() {
        let mut bell = CountingBell::default();
        let mut seq = BellSequencer::new();
        seq.start(0, 3, &[2.0, 2.0], &mut bell);
        assert_eq!(bell.plays, 1);

        seq.poll(1_999, &mut bell);
        assert_eq!(bell.plays, 1);
        seq.poll(2_000, &mut bell);
        assert_eq!(bell.plays, 2);
        seq.poll(4_000, &mut bell);
        assert_eq!(bell.plays, 3);

        seq.poll(5_000, &mut bell);
        assert_eq!(bell.plays, 3);
        assert!(seq.is_running(), "last clip still ringing");
        seq.poll(6_000, &mut bell);
        assert!(!seq.is_running());
        seq.poll(60_000, &mut bell);
        assert_eq!(bell.plays, 3);
    }

    #[test]
    fn late_poll_keeps_chained_spacing() {
        let mut bell = CountingBell::default();
        let mut seq = BellSequencer::new();
        seq.start(0, 3, &[2.0, 2.0], &mut bell);
        // One coarse poll catches up on both remaining bells.
        assert_eq!(seq.poll(4_500, &mut bell), 2);
        assert_eq!(bell.plays, 3);
    }

    #[test]
    fn zero_count_is_noop() {
        let mut bell = CountingBell::default();
        let mut seq = BellSequencer::new();
        seq.start(0, 0, &[], &mut bell);
        assert_eq!(bell.plays, 0);
        assert!(!seq.is_running());
        assert_eq!(BellSequencer::sequence_duration(0, &[], 2.0), 0.0);
    }

    #[test]
    fn missing_gaps_default_to_five_seconds() {
        assert_eq!(BellSequencer::sequence_duration(3, &[1.0], 2.0), 1.0 + 5.0 + 2.0);
        assert_eq!(BellSequencer::sequence_duration(1, &[], 10.5), 10.5);
    }

    #[test]
    fn cancel_mid_sequence_stops_clip_and_further_bells() {
        let mut bell = CountingBell::default();
        let mut seq = BellSequencer::new();
        seq.start(0, 3, &[2.0, 2.0], &mut bell);
        seq.poll(2_000, &mut bell);
        seq.cancel(&mut bell);
        assert_eq!(bell.stops, 1);
        seq.poll(10_000, &mut bell);
        assert_eq!(bell.plays, 2);
        assert!(!seq.is_running());
    }

    #[test]
    fn failed_bell_is_skipped_and_sequence_continues() {
        let mut bell = CountingBell {
            fail: true,
            ..Default::default()
        };
        let mut seq = BellSequencer::new();
        seq.start(0, 2, &[1.0], &mut bell);
        seq.poll(1_000, &mut bell);
        assert_eq!(bell.plays, 2);
        assert_eq!(seq.rung(), 2);
    }
}
