//! A complete session: timer engine plus guided narration, wired
//! together explicitly.
//!
//! The engine is the only writer of the session state; the narration
//! scheduler reads it through the engine's watch channel. Every command
//! and every tick runs the engine first and narration second, so
//! narration never acts on a stale phase. Background noise follows last.

use std::rc::Rc;

use tokio::sync::watch;

use crate::bell::BellPlayer;
use crate::clock::Clock;
use crate::events::Event;
use crate::narration::NarrationScheduler;
use crate::noise::{NoiseController, NoisePlayer};
use crate::script::Script;
use crate::speech::SpeechEngine;
use crate::storage::{SessionConfig, TimingCache};
use crate::timer::{SessionState, TimerEngine, WakeLock};

/// Output devices and persistence a session is built on.
pub struct Devices {
    pub bell: Box<dyn BellPlayer>,
    pub speech: Box<dyn SpeechEngine>,
    pub noise: Box<dyn NoisePlayer>,
    pub wake_lock: Box<dyn WakeLock>,
    pub cache: Box<dyn TimingCache>,
}

pub struct Session {
    engine: TimerEngine,
    narration: NarrationScheduler,
    noise: NoiseController,
}

impl Session {
    pub fn new(config: SessionConfig, script: Script, clock: Rc<dyn Clock>, devices: Devices) -> Self {
        let narration_config = config.clone();
        let engine = TimerEngine::new(config, Rc::clone(&clock), devices.bell, devices.wake_lock);
        let narration = NarrationScheduler::new(
            engine.subscribe(),
            clock,
            devices.speech,
            devices.cache,
            script,
            &narration_config,
        );
        Self {
            engine,
            narration,
            noise: NoiseController::new(devices.noise),
        }
    }

    pub fn start(&mut self) -> Option<Event> {
        let event = self.engine.start();
        self.follow();
        event
    }

    pub fn pause(&mut self) -> Option<Event> {
        let event = self.engine.pause();
        self.follow();
        event
    }

    /// Start when idle or paused, pause when running.
    pub fn toggle(&mut self) -> Option<Event> {
        if self.engine.is_running() {
            self.pause()
        } else {
            self.start()
        }
    }

    pub fn reset(&mut self) -> Option<Event> {
        let event = self.engine.reset();
        self.follow();
        event
    }

    pub fn seek(&mut self, remaining: i64) -> Option<Event> {
        let event = self.engine.seek(remaining);
        self.follow();
        event
    }

    pub fn seek_elapsed(&mut self, elapsed: u64) -> Option<Event> {
        let event = self.engine.seek_elapsed(elapsed);
        self.follow();
        event
    }

    pub fn tick(&mut self) -> Vec<Event> {
        let events = self.engine.tick();
        self.follow();
        events
    }

    pub fn apply_config(&mut self, config: SessionConfig) {
        self.narration.apply_config(&config);
        self.engine.apply_config(config);
        self.follow();
    }

    /// Let the engine's followers catch up with its latest state.
    fn follow(&mut self) {
        self.narration.tick();
        self.noise.sync(self.engine.phase(), self.narration.is_enabled());
    }

    pub fn state(&self) -> SessionState {
        self.engine.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.engine.subscribe()
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn narration(&self) -> &NarrationScheduler {
        &self.narration
    }

    pub fn narration_mut(&mut self) -> &mut NarrationScheduler {
        &mut self.narration
    }

    pub fn is_noise_playing(&self) -> bool {
        self.noise.is_playing()
    }
}
