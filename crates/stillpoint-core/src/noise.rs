//! Background noise under an unguided meditation.
//!
//! Noise plays while the session is in the meditation phase with guided
//! narration off. Leaving the meditation phase or switching narration on
//! silences it. [`NoiseController`] turns published state into
//! `start`/`stop` calls on a [`NoisePlayer`], issuing each only on a change.

use crate::timer::Phase;

/// Gain applied to the noise signal. Barely audible on purpose.
pub const NOISE_GAIN: f32 = 0.004;

/// Audio output for the noise bed.
pub trait NoisePlayer {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Produces nothing.
#[derive(Debug, Default)]
pub struct SilentNoise;

impl NoisePlayer for SilentNoise {
    fn start(&mut self) {}

    fn stop(&mut self) {}
}

/// Logs noise transitions instead of producing sound.
#[derive(Debug, Default)]
pub struct LoggedNoise;

impl NoisePlayer for LoggedNoise {
    fn start(&mut self) {
        tracing::info!(gain = NOISE_GAIN, "background noise on");
    }

    fn stop(&mut self) {
        tracing::info!("background noise off");
    }
}

pub struct NoiseController {
    player: Box<dyn NoisePlayer>,
    playing: bool,
}

impl NoiseController {
    pub fn new(player: Box<dyn NoisePlayer>) -> Self {
        Self {
            player,
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Bring the player in line with the session's phase and guided mode.
    pub fn sync(&mut self, phase: Phase, guided: bool) {
        let wanted = phase == Phase::Meditation && !guided;
        if wanted == self.playing {
            return;
        }
        self.playing = wanted;
        tracing::debug!(%phase, guided, playing = wanted, "noise sync");
        if wanted {
            self.player.start();
        } else {
            self.player.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Calls(Rc<RefCell<Vec<&'static str>>>);

    impl NoisePlayer for Calls {
        fn start(&mut self) {
            self.0.borrow_mut().push("start");
        }
        fn stop(&mut self) {
            self.0.borrow_mut().push("stop");
        }
    }

    #[test]
    fn starts_once_for_unguided_meditation() {
        let calls = Calls::default();
        let mut noise = NoiseController::new(Box::new(calls.clone()));
        noise.sync(Phase::Delay, false);
        noise.sync(Phase::Meditation, false);
        noise.sync(Phase::Meditation, false);
        assert!(noise.is_playing());
        assert_eq!(*calls.0.borrow(), vec!["start"]);
    }

    #[test]
    fn guided_meditation_stays_quiet() {
        let calls = Calls::default();
        let mut noise = NoiseController::new(Box::new(calls.clone()));
        noise.sync(Phase::Meditation, true);
        assert!(!noise.is_playing());
        assert!(calls.0.borrow().is_empty());
    }

    #[test]
    fn stops_when_leaving_meditation_or_going_guided() {
        let calls = Calls::default();
        let mut noise = NoiseController::new(Box::new(calls.clone()));
        noise.sync(Phase::Meditation, false);
        noise.sync(Phase::Finished, false);
        noise.sync(Phase::Meditation, false);
        noise.sync(Phase::Stopped, true);
        assert_eq!(*calls.0.borrow(), vec!["start", "stop", "start", "stop"]);
    }
}
