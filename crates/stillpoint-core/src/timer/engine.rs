//! Session timeline engine.
//!
//! The engine is a clock-driven state machine. It does not use internal
//! threads - the caller is responsible for calling `tick()` periodically,
//! a few times per second is plenty.
//!
//! ## Phases
//!
//! ```text
//! Stopped -> Delay -> Bells -> Meditation -> Finished
//!              \________|__________/
//!                     Paused
//! ```
//!
//! Stages with zero length are skipped. While running, the phase is a
//! pure function of `elapsed` against two thresholds: the delay length,
//! and the delay plus the start bell sequence length.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(config, clock, bell, wake_lock);
//! engine.start();
//! // In a loop:
//! for event in engine.tick() { /* ... */ }
//! ```

use std::rc::Rc;

use chrono::Utc;
use tokio::sync::watch;

use super::state::{Phase, SessionState};
use super::wake_lock::WakeLock;
use crate::bell::{BellPlayer, BellSequencer};
use crate::clock::Clock;
use crate::events::Event;
use crate::storage::SessionConfig;

const TICK_MS: u64 = 1_000;

/// Core session engine. The only writer of [`SessionState`].
pub struct TimerEngine {
    config: SessionConfig,
    /// Config edited mid-run; takes effect on the next fresh run.
    pending_config: Option<SessionConfig>,
    clock: Rc<dyn Clock>,
    bell: Box<dyn BellPlayer>,
    wake_lock: Box<dyn WakeLock>,
    sequencer: BellSequencer,
    st: SessionState,
    tx: watch::Sender<SessionState>,
    /// Due time of the next one-second tick while the clock runs.
    next_tick_ms: Option<u64>,
}

impl TimerEngine {
    pub fn new(
        mut config: SessionConfig,
        clock: Rc<dyn Clock>,
        mut bell: Box<dyn BellPlayer>,
        wake_lock: Box<dyn WakeLock>,
    ) -> Self {
        config.normalize();
        bell.set_volume(config.volume.effective());
        let (delay, bells, meditation) = durations(&config, bell.as_ref());
        let st = SessionState::initial(delay, bells, meditation);
        let (tx, _rx) = watch::channel(st.clone());
        Self {
            config,
            pending_config: None,
            clock,
            bell,
            wake_lock,
            sequencer: BellSequencer::new(),
            st,
            tx,
            next_tick_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.st.clone()
    }

    /// Receive every published change of the session state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.st.phase
    }

    pub fn elapsed(&self) -> u64 {
        self.st.elapsed
    }

    pub fn remaining_time(&self) -> i64 {
        self.st.remaining_time
    }

    /// Latest configuration, including one waiting for the next run.
    pub fn config(&self) -> &SessionConfig {
        self.pending_config.as_ref().unwrap_or(&self.config)
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    pub fn is_running(&self) -> bool {
        self.st.phase.is_running()
    }

    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.st.clone(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a fresh run, or resume a paused one where it left off.
    pub fn start(&mut self) -> Option<Event> {
        match self.st.phase {
            Phase::Stopped | Phase::Finished => Some(self.begin_run()),
            Phase::Paused => Some(self.resume_run()),
            _ => None, // Already running.
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.st.phase.is_running() {
            return None;
        }
        self.halt();
        self.st.paused_phase = Some(self.st.phase);
        self.st.phase = Phase::Paused;
        tracing::info!(elapsed = self.st.elapsed, "session paused");
        self.publish();
        Some(Event::SessionPaused {
            elapsed: self.st.elapsed,
            remaining_time: self.st.remaining_time,
            at: Utc::now(),
        })
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.halt();
        if let Some(cfg) = self.pending_config.take() {
            self.config = cfg;
        }
        let epoch = self.st.position_epoch + 1;
        self.st = self.fresh_state();
        self.st.position_epoch = epoch;
        tracing::info!("session reset");
        self.publish();
        Some(Event::SessionReset { at: Utc::now() })
    }

    /// Jump to the position that shows `remaining` on the display.
    ///
    /// Non-negative values count down the meditation. Negative values
    /// follow the pre-roll convention of the phase being shown: inside
    /// the delay they count to the first bell, otherwise to the start of
    /// the meditation.
    pub fn seek(&mut self, remaining: i64) -> Option<Event> {
        let st = if matches!(self.st.phase, Phase::Stopped | Phase::Finished) {
            self.fresh_state()
        } else {
            self.st.clone()
        };
        let target = if remaining >= 0 {
            let remaining = (remaining as u64).min(st.meditation_duration);
            st.total_duration - remaining
        } else if st.effective_phase() == Phase::Delay {
            (st.delay_duration as i64 + remaining).max(0) as u64
        } else {
            (st.meditation_start() as i64 + remaining).max(0) as u64
        };
        self.seek_elapsed(target)
    }

    /// Jump to an absolute elapsed position.
    ///
    /// Always pauses first. The clock restarts only if the session was
    /// running; a paused or stopped session stays paused at the new
    /// position. Seeking never starts the bell sequence.
    pub fn seek_elapsed(&mut self, target: u64) -> Option<Event> {
        let was_running = self.st.phase.is_running();
        if matches!(self.st.phase, Phase::Stopped | Phase::Finished) {
            if let Some(cfg) = self.pending_config.take() {
                self.config = cfg;
            }
            let epoch = self.st.position_epoch;
            self.st = self.fresh_state();
            self.st.position_epoch = epoch;
        }
        self.halt();

        let elapsed = target.min(self.st.total_duration);
        let phase = self.st.phase_at(elapsed);
        self.st.elapsed = elapsed;
        self.st.position_epoch += 1;
        self.st.remaining_time = self.st.remaining_at(elapsed, phase);

        if was_running {
            self.acquire_wake_lock();
            let now = self.clock.now_ms();
            if elapsed >= self.st.total_duration {
                self.complete(now);
            } else {
                self.st.phase = phase;
                self.st.paused_phase = None;
                self.next_tick_ms = Some(now + TICK_MS);
            }
        } else {
            self.st.phase = Phase::Paused;
            self.st.paused_phase = Some(phase);
        }
        tracing::info!(elapsed, remaining = self.st.remaining_time, was_running, "seek");
        self.publish();
        Some(Event::SessionSeeked {
            elapsed: self.st.elapsed,
            remaining_time: self.st.remaining_time,
            at: Utc::now(),
        })
    }

    /// Call periodically. Advances the one-second clock, fires phase
    /// side effects, and rings due bells.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        while let Some(due) = self.next_tick_ms {
            if due > now {
                break;
            }
            self.next_tick_ms = Some(due + TICK_MS);
            self.step(due, &mut events);
        }
        self.sequencer.poll(now, self.bell.as_mut());
        self.st.is_bell_sequence_running = self.sequencer.is_running();
        self.publish();
        events
    }

    /// Take a new configuration. Applied immediately while stopped or
    /// finished, otherwise from the next fresh run. Volume always
    /// applies immediately.
    pub fn apply_config(&mut self, mut config: SessionConfig) {
        config.normalize();
        self.bell.set_volume(config.volume.effective());
        if matches!(self.st.phase, Phase::Stopped | Phase::Finished) {
            self.config = config;
            self.pending_config = None;
            let (delay, bells, meditation) = durations(&self.config, self.bell.as_ref());
            self.st.delay_duration = delay;
            self.st.bell_duration = bells;
            self.st.meditation_duration = meditation;
            self.st.total_duration = delay + bells + meditation;
            self.st.remaining_time = meditation as i64;
            self.publish();
        } else {
            self.pending_config = Some(config);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_run(&mut self) -> Event {
        if let Some(cfg) = self.pending_config.take() {
            self.config = cfg;
        }
        self.sequencer.cancel(self.bell.as_mut());
        let epoch = self.st.position_epoch;
        self.st = self.fresh_state();
        self.st.position_epoch = epoch;
        self.acquire_wake_lock();

        let now = self.clock.now_ms();
        if self.st.total_duration == 0 {
            self.complete(now);
        } else {
            let phase = self.st.phase_at(0);
            self.enter_phase(phase, now);
            self.st.remaining_time = self.st.remaining_at(0, phase);
            self.next_tick_ms = Some(now + TICK_MS);
        }
        self.st.is_bell_sequence_running = self.sequencer.is_running();
        tracing::info!(
            total = self.st.total_duration,
            delay = self.st.delay_duration,
            bells = self.st.bell_duration,
            "session started"
        );
        self.publish();
        Event::SessionStarted {
            phase: self.st.phase,
            total_duration: self.st.total_duration,
            at: Utc::now(),
        }
    }

    fn resume_run(&mut self) -> Event {
        let phase = self
            .st
            .paused_phase
            .take()
            .unwrap_or_else(|| self.st.phase_at(self.st.elapsed));
        self.acquire_wake_lock();
        let now = self.clock.now_ms();
        if self.st.elapsed >= self.st.total_duration {
            self.complete(now);
        } else {
            // Straight back into the paused phase: no entry side effects.
            self.st.phase = phase;
            self.st.remaining_time = self.st.remaining_at(self.st.elapsed, phase);
            self.next_tick_ms = Some(now + TICK_MS);
        }
        tracing::info!(elapsed = self.st.elapsed, %phase, "session resumed");
        self.publish();
        Event::SessionResumed {
            phase: self.st.phase,
            elapsed: self.st.elapsed,
            at: Utc::now(),
        }
    }

    fn step(&mut self, at: u64, events: &mut Vec<Event>) {
        self.st.elapsed += 1;
        let elapsed = self.st.elapsed;
        if elapsed >= self.st.total_duration {
            events.push(self.complete(at));
            return;
        }

        let phase = self.st.phase_at(elapsed);
        if let Some(event) = self.enter_phase(phase, at) {
            events.push(event);
        }
        self.st.remaining_time = self.st.remaining_at(elapsed, phase);

        if phase == Phase::Meditation {
            if let Some(event) = self.interval_bell() {
                events.push(event);
            }
        }
    }

    /// Move to `phase`. Entering `Bells` plays the start sequence once;
    /// re-entering a phase that is already current does nothing.
    fn enter_phase(&mut self, phase: Phase, at: u64) -> Option<Event> {
        let from = self.st.phase;
        if from == phase {
            return None;
        }
        self.st.phase = phase;
        if phase == Phase::Bells {
            self.sequencer.start(
                at,
                self.config.start_bell_count,
                &self.config.start_bell_gaps,
                self.bell.as_mut(),
            );
        }
        tracing::info!(%from, to = %phase, elapsed = self.st.elapsed, "phase changed");
        Some(Event::PhaseChanged {
            from,
            to: phase,
            elapsed: self.st.elapsed,
            at: Utc::now(),
        })
    }

    fn interval_bell(&mut self) -> Option<Event> {
        let period_secs = self.config.interval_bell_period.saturating_mul(60);
        if period_secs == 0 || self.st.remaining_time <= 0 {
            return None;
        }
        let into = self.st.elapsed_in_meditation()?;
        if into == 0 || into % period_secs != 0 {
            return None;
        }
        if let Err(e) = self.bell.play() {
            tracing::warn!("interval bell failed: {e}");
        }
        tracing::debug!(into, "interval bell");
        Some(Event::IntervalBell {
            elapsed_in_meditation: into,
            at: Utc::now(),
        })
    }

    fn complete(&mut self, at: u64) -> Event {
        self.next_tick_ms = None;
        self.st.elapsed = self.st.total_duration;
        self.sequencer.start(
            at,
            self.config.end_bell_count,
            &self.config.end_bell_gaps,
            self.bell.as_mut(),
        );
        self.st.is_bell_sequence_running = self.sequencer.is_running();
        self.st.phase = Phase::Finished;
        self.st.paused_phase = None;
        self.release_wake_lock();
        // Ready for the next run.
        self.st.remaining_time = self.st.meditation_duration as i64;
        tracing::info!(total = self.st.total_duration, "session complete");
        Event::SessionCompleted {
            total_duration: self.st.total_duration,
            at: Utc::now(),
        }
    }

    /// Stop the clock, bells and audio, and let the screen sleep.
    fn halt(&mut self) {
        self.next_tick_ms = None;
        self.sequencer.cancel(self.bell.as_mut());
        self.bell.stop();
        self.st.is_bell_sequence_running = false;
        self.release_wake_lock();
    }

    fn fresh_state(&self) -> SessionState {
        let (delay, bells, meditation) = durations(&self.config, self.bell.as_ref());
        SessionState::initial(delay, bells, meditation)
    }

    fn acquire_wake_lock(&mut self) {
        match self.wake_lock.acquire() {
            Ok(()) => self.st.is_wake_lock_active = true,
            Err(e) => {
                tracing::warn!("wake lock unavailable: {e}");
                self.st.is_wake_lock_active = false;
            }
        }
    }

    fn release_wake_lock(&mut self) {
        if self.st.is_wake_lock_active {
            if let Err(e) = self.wake_lock.release() {
                tracing::warn!("{e}");
            }
        }
        self.st.is_wake_lock_active = false;
    }

    fn publish(&self) {
        let snapshot = self.st.clone();
        self.tx.send_if_modified(|current| {
            if *current != snapshot {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }
}

/// Delay, start bell sequence, and meditation lengths in whole seconds.
fn durations(config: &SessionConfig, bell: &dyn BellPlayer) -> (u64, u64, u64) {
    let bells = BellSequencer::sequence_duration(
        config.start_bell_count,
        &config.start_bell_gaps,
        bell.clip_duration_secs(),
    );
    (config.start_delay, bells.ceil() as u64, config.meditation_duration)
}
