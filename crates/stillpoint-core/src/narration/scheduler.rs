//! Live narration driven by the published session state.
//!
//! The scheduler never owns the session clock. It watches the engine's
//! state channel and, on each tick, reacts to what changed: a phase
//! transition suspends, resumes or abandons speech; a new
//! `position_epoch` means the position jumped and narration is
//! repositioned; a new meditation duration recomputes the schedule.
//!
//! At most one section plays at a time. Word boundaries reported by the
//! speech engine are stored as meditation times so a later seek can
//! restart speech at the word that was playing.

use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::watch;

use super::playback::{Prosody, SectionPlayback, Step, Utterance};
use super::schedule::{compute_schedule, ScheduledEvent};
use crate::bell::secs_to_ms;
use crate::clock::{Clock, Deferred, TimerHandle};
use crate::script::Script;
use crate::speech::{SpeechEngine, SpeechEvent, UtteranceId};
use crate::storage::{
    CacheKey, SessionConfig, TimingCache, VoiceSettings, WordTiming, WordTimingMap,
};
use crate::timer::{Phase, SessionState};

/// How many cancelled utterance ids are remembered while waiting for the
/// engine to report on them.
const CANCELLED_MEMORY: usize = 16;

/// Meditation time with sub-second precision, frozen while paused.
#[derive(Debug, Clone, Copy, Default)]
struct MeditationClock {
    base_secs: f64,
    running_since: Option<u64>,
}

impl MeditationClock {
    fn secs(&self, now: u64) -> f64 {
        match self.running_since {
            Some(since) => self.base_secs + now.saturating_sub(since) as f64 / 1000.0,
            None => self.base_secs,
        }
    }

    fn set(&mut self, secs: f64, now: u64, running: bool) {
        self.base_secs = secs;
        self.running_since = running.then_some(now);
    }

    fn freeze(&mut self, now: u64) {
        self.base_secs = self.secs(now);
        self.running_since = None;
    }

    fn run(&mut self, now: u64) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }
}

#[derive(Debug)]
struct ActiveUtterance {
    id: UtteranceId,
    section: usize,
    char_base: usize,
    /// Meditation time at which the utterance started.
    time_base: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Wait {
    Armed(TimerHandle),
    /// Suspended with this much of the silence still owed.
    Suspended(u64),
}

/// Where playback restarts after a seek.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ResumePoint {
    section: usize,
    char_index: usize,
}

pub struct NarrationScheduler {
    rx: watch::Receiver<SessionState>,
    clock: Rc<dyn Clock>,
    speech: Box<dyn SpeechEngine>,
    cache: Box<dyn TimingCache>,
    script: Script,
    voice: VoiceSettings,
    enabled: bool,

    duration: u64,
    schedule: Vec<ScheduledEvent>,
    timings: WordTimingMap,

    last_spoken_index: Option<usize>,
    playback: Option<SectionPlayback>,
    active: Option<ActiveUtterance>,
    waits: Deferred<()>,
    wait: Option<Wait>,
    resume_point: Option<ResumePoint>,
    /// Utterances this scheduler cancelled; their errors are expected.
    cancelled: VecDeque<UtteranceId>,

    meditation_clock: MeditationClock,
    suspended: bool,
    seen_phase: Phase,
    seen_epoch: u64,
}

impl NarrationScheduler {
    pub fn new(
        rx: watch::Receiver<SessionState>,
        clock: Rc<dyn Clock>,
        speech: Box<dyn SpeechEngine>,
        cache: Box<dyn TimingCache>,
        script: Script,
        config: &SessionConfig,
    ) -> Self {
        let st = rx.borrow().clone();
        let mut scheduler = Self {
            rx,
            clock,
            speech,
            cache,
            script,
            voice: config.voice.clone(),
            enabled: config.guided,
            duration: st.meditation_duration,
            schedule: Vec::new(),
            timings: WordTimingMap::new(),
            last_spoken_index: None,
            playback: None,
            active: None,
            waits: Deferred::new(),
            wait: None,
            resume_point: None,
            cancelled: VecDeque::new(),
            meditation_clock: MeditationClock::default(),
            suspended: false,
            seen_phase: st.phase,
            seen_epoch: st.position_epoch,
        };
        scheduler.reload();
        scheduler
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn schedule(&self) -> &[ScheduledEvent] {
        &self.schedule
    }

    /// Index of the latest schedule entry that was spoken or passed over.
    pub fn last_spoken_index(&self) -> Option<usize> {
        self.last_spoken_index
    }

    pub fn word_timings(&self) -> &WordTimingMap {
        &self.timings
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while a section is mid-flight, paused or not.
    pub fn is_narrating(&self) -> bool {
        self.playback.is_some() || self.active.is_some()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            self.duration,
            self.speech.voice_id(),
            self.voice.rate,
            self.voice.pitch,
        )
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Pick up guided mode and voice changes.
    pub fn apply_config(&mut self, config: &SessionConfig) {
        if config.guided != self.enabled {
            self.enabled = config.guided;
            tracing::info!(guided = self.enabled, "guided narration toggled");
            if !self.enabled {
                self.cancel_all();
            }
        }
        if config.voice != self.voice {
            self.voice = config.voice.clone();
            self.timings = self.cache.load(&self.cache_key()).unwrap_or_default();
        }
    }

    /// Replace the script. Takes effect immediately; whatever was playing
    /// is abandoned.
    pub fn set_script(&mut self, script: Script) {
        self.cancel_all();
        self.script = script;
        self.reload();
    }

    /// Reposition narration at meditation time `t` seconds.
    ///
    /// The section covering `t` resumes at its last cached word. Without
    /// cached timings for it, narration stays silent until the next
    /// section is due.
    pub fn resume_from_time(&mut self, t: f64) {
        let now = self.clock.now_ms();
        self.cancel_all();
        let running = self.rx.borrow().phase == Phase::Meditation;
        self.meditation_clock.set(t, now, running);
        self.plan_resume(t);
        if running && self.enabled {
            self.start_due(now);
        }
    }

    /// Advance narration. Call after every engine tick.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        if self.rx.has_changed().unwrap_or(false) {
            let st = self.rx.borrow_and_update().clone();
            self.observe(&st, now);
        }
        self.drain_speech(now);
        self.fire_waits(now);
        if self.enabled && !self.suspended && self.rx.borrow().phase == Phase::Meditation {
            self.start_due(now);
        }
    }

    // ── State observation ────────────────────────────────────────────

    fn observe(&mut self, st: &SessionState, now: u64) {
        if st.meditation_duration != self.duration {
            self.cancel_all();
            self.duration = st.meditation_duration;
            self.reload();
        }

        let jumped = st.position_epoch != self.seen_epoch;
        let from = self.seen_phase;
        self.seen_epoch = st.position_epoch;
        self.seen_phase = st.phase;

        if jumped {
            self.on_jump(st, now);
            return;
        }
        if from == st.phase {
            return;
        }
        match (from, st.phase) {
            (_, Phase::Paused) => self.suspend(now),
            (Phase::Paused, to) if to.is_running() => self.resume(now, to),
            (Phase::Stopped | Phase::Finished, _) | (_, Phase::Stopped) => {
                self.restart(now);
                if st.phase == Phase::Meditation {
                    let into = st.elapsed_in_meditation().unwrap_or(0);
                    self.meditation_clock.set(into as f64, now, true);
                }
            }
            (_, Phase::Finished) => {
                self.cancel_all();
                self.meditation_clock.freeze(now);
            }
            (_, Phase::Meditation) => {
                let into = st.elapsed_in_meditation().unwrap_or(0);
                self.meditation_clock.set(into as f64, now, true);
            }
            _ => {}
        }
    }

    /// A seek or reset moved the session position.
    fn on_jump(&mut self, st: &SessionState, now: u64) {
        self.suspended = st.phase == Phase::Paused;
        if st.phase == Phase::Stopped {
            self.restart(now);
            return;
        }
        let running = st.phase == Phase::Meditation;
        match st.elapsed_in_meditation() {
            Some(into) if st.effective_phase() == Phase::Meditation => {
                self.cancel_all();
                self.meditation_clock.set(into as f64, now, running);
                self.plan_resume(into as f64);
            }
            _ => {
                // Back in the pre-roll: the whole schedule is ahead again.
                self.cancel_all();
                self.last_spoken_index = None;
                self.meditation_clock.set(0.0, now, false);
            }
        }
    }

    fn restart(&mut self, now: u64) {
        self.cancel_all();
        self.last_spoken_index = None;
        self.suspended = false;
        self.meditation_clock.set(0.0, now, false);
    }

    fn suspend(&mut self, now: u64) {
        self.suspended = true;
        self.meditation_clock.freeze(now);
        if let Some(Wait::Armed(handle)) = self.wait {
            let owed = self
                .waits
                .cancel(handle)
                .map_or(0, |pending| pending.remaining_ms(now));
            self.wait = Some(Wait::Suspended(owed));
        }
        if self.active.is_some() && self.speech.is_speaking() && !self.speech.is_paused() {
            self.speech.pause(now);
        }
        tracing::debug!(wait = ?self.wait, speaking = self.active.is_some(), "narration suspended");
    }

    fn resume(&mut self, now: u64, phase: Phase) {
        self.suspended = false;
        if phase == Phase::Meditation {
            self.meditation_clock.run(now);
        }

        if let Some(Wait::Suspended(owed)) = self.wait {
            if owed == 0 {
                self.wait = None;
                self.advance(now);
            } else {
                self.wait = Some(Wait::Armed(self.waits.schedule(now, owed, ())));
            }
            return;
        }

        if self.active.is_some() {
            if self.speech.is_speaking() && self.speech.is_paused() {
                self.speech.resume(now);
            } else {
                // The engine lost track of the utterance. Start over from
                // the last word we know about.
                let t = self.meditation_clock.secs(now);
                tracing::warn!(
                    speaking = self.speech.is_speaking(),
                    paused = self.speech.is_paused(),
                    at = t,
                    "speech engine state inconsistent on resume, repositioning"
                );
                self.cancel_all();
                self.plan_resume(t);
            }
            return;
        }

        // An utterance ended while suspended: carry on with the section.
        if self.playback.is_some() && self.wait.is_none() {
            self.advance(now);
        }
    }

    // ── Playback ─────────────────────────────────────────────────────

    fn start_due(&mut self, now: u64) {
        if self.is_narrating() {
            return;
        }
        if let Some(point) = self.resume_point.take() {
            self.begin(point.section, point.char_index, now);
            return;
        }
        let Some(into) = self.rx.borrow().elapsed_in_meditation() else {
            return;
        };
        let next = self.last_spoken_index.map_or(0, |i| i + 1);
        if let Some(event) = self.schedule.get(next) {
            if event.time <= into {
                self.begin(next, 0, now);
            }
        }
    }

    fn begin(&mut self, section: usize, char_index: usize, now: u64) {
        let Some(event) = self.schedule.get(section) else {
            return;
        };
        tracing::info!(section, kind = ?event.kind, time = event.time, char_index, "narrating section");
        self.last_spoken_index = Some(section);
        self.playback = Some(SectionPlayback::new(
            section,
            &event.content,
            char_index,
            self.prosody(),
        ));
        self.advance(now);
    }

    /// Run the current section up to its next suspension point.
    fn advance(&mut self, now: u64) {
        if self.suspended {
            return;
        }
        while let Some(playback) = self.playback.as_mut() {
            let section = playback.index();
            match playback.next_step() {
                Step::Speak(utterance) => {
                    self.speak(section, utterance, now);
                    return;
                }
                Step::Wait(secs) if secs > 0.0 => {
                    let handle = self.waits.schedule(now, secs_to_ms(secs), ());
                    self.wait = Some(Wait::Armed(handle));
                    return;
                }
                Step::Wait(_) => {}
                Step::Done => {
                    tracing::debug!(section, "section finished");
                    self.playback = None;
                }
            }
        }
    }

    fn speak(&mut self, section: usize, utterance: Utterance, now: u64) {
        let id = self.speech.speak(now, utterance.request);
        self.active = Some(ActiveUtterance {
            id,
            section,
            char_base: utterance.char_base,
            time_base: self.meditation_clock.secs(now),
        });
    }

    fn drain_speech(&mut self, now: u64) {
        for event in self.speech.poll(now) {
            let id = event.id();
            let ours = self.active.as_ref().is_some_and(|a| a.id == id);
            match event {
                SpeechEvent::WordBoundary {
                    char_index,
                    elapsed_ms,
                    ..
                } => {
                    if let Some(active) = self.active.as_ref().filter(|_| ours) {
                        let timing = WordTiming {
                            char_index: active.char_base + char_index,
                            time: active.time_base + elapsed_ms as f64 / 1000.0,
                        };
                        self.timings.merge(active.section, [timing]);
                    }
                }
                SpeechEvent::End { .. } => {
                    self.forget_cancelled(id);
                    if ours {
                        self.active = None;
                        self.persist();
                        self.advance(now);
                    }
                }
                SpeechEvent::Error { kind, .. } => {
                    let cancelled = self.forget_cancelled(id);
                    if cancelled && kind.is_cancellation() {
                        tracing::debug!(id, %kind, "ignoring error from cancelled utterance");
                    } else if cancelled {
                        tracing::warn!(id, %kind, "cancelled utterance failed");
                    } else if ours {
                        tracing::warn!(id, %kind, "utterance failed, skipping part");
                        self.active = None;
                        self.advance(now);
                    } else {
                        tracing::debug!(id, %kind, "ignoring error from stale utterance");
                    }
                }
            }
        }
    }

    fn fire_waits(&mut self, now: u64) {
        if self.waits.drain_due(now).is_empty() {
            return;
        }
        self.wait = None;
        self.advance(now);
    }

    /// Drop whatever is playing or waiting.
    fn cancel_all(&mut self) {
        let now = self.clock.now_ms();
        if let Some(active) = self.active.take() {
            if self.cancelled.len() == CANCELLED_MEMORY {
                self.cancelled.pop_front();
            }
            self.cancelled.push_back(active.id);
        }
        if self.speech.is_speaking() || self.speech.is_paused() {
            self.speech.cancel(now);
        }
        self.waits.clear();
        self.wait = None;
        self.playback = None;
        self.resume_point = None;
    }

    fn forget_cancelled(&mut self, id: UtteranceId) -> bool {
        match self.cancelled.iter().position(|&c| c == id) {
            Some(at) => {
                self.cancelled.remove(at);
                true
            }
            None => false,
        }
    }

    // ── Positioning ──────────────────────────────────────────────────

    fn plan_resume(&mut self, t: f64) {
        let Some(section) = self.schedule.iter().rposition(|e| e.time as f64 <= t) else {
            self.last_spoken_index = None;
            return;
        };
        if t <= self.schedule[section].time as f64 {
            // Exactly at the start: let it play normally.
            self.last_spoken_index = section.checked_sub(1);
            return;
        }

        self.last_spoken_index = Some(section);
        let Some(timings) = self.timings.get(section) else {
            tracing::debug!(section, at = t, "no cached timings, staying silent");
            return;
        };
        let char_index = timings.last_at_or_before(t).map_or(0, |word| word.char_index);
        tracing::debug!(section, char_index, at = t, "resuming mid-section");
        self.resume_point = Some(ResumePoint {
            section,
            char_index,
        });
    }

    fn reload(&mut self) {
        self.schedule = compute_schedule(self.duration, &self.script);
        self.timings = self.cache.load(&self.cache_key()).unwrap_or_default();
        self.last_spoken_index = None;
        tracing::debug!(
            duration = self.duration,
            sections = self.schedule.len(),
            cached = self.timings.len(),
            "narration reloaded"
        );
    }

    fn persist(&mut self) {
        let key = self.cache_key();
        self.cache.save(&key, &self.timings);
    }

    fn prosody(&self) -> Prosody {
        Prosody {
            rate: self.script.rate.unwrap_or(self.voice.rate),
            pitch: self.script.pitch.unwrap_or(self.voice.pitch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::script::{MeditationPart, ScriptSection, SectionKind};
    use crate::speech::{SimulatedSpeech, SpeechErrorKind};
    use crate::storage::{MemoryTimingCache, SectionTimings};

    fn script() -> Script {
        Script {
            rate: Some(1.0),
            pitch: None,
            sections: vec![
                ScriptSection {
                    kind: SectionKind::Intro,
                    content: vec![
                        MeditationPart::say("Focus on your breath"),
                        MeditationPart::pause(2.0),
                        MeditationPart::say("and rest."),
                    ],
                },
                ScriptSection {
                    kind: SectionKind::Poke,
                    content: vec![MeditationPart::say("Come back.")],
                },
            ],
        }
    }

    struct Rig {
        clock: ManualClock,
        tx: watch::Sender<SessionState>,
        cache: MemoryTimingCache,
        narration: NarrationScheduler,
    }

    fn rig_with(cache: MemoryTimingCache) -> Rig {
        rig_with_script(cache, script())
    }

    fn rig_with_script(cache: MemoryTimingCache, script: Script) -> Rig {
        let clock = ManualClock::new();
        let (tx, rx) = watch::channel(SessionState::initial(0, 0, 600));
        let config = SessionConfig {
            meditation_duration: 600,
            guided: true,
            ..Default::default()
        };
        let narration = NarrationScheduler::new(
            rx,
            Rc::new(clock.clone()),
            Box::new(SimulatedSpeech::new("test-voice")),
            Box::new(cache.clone()),
            script,
            &config,
        );
        Rig {
            clock,
            tx,
            cache,
            narration,
        }
    }

    fn rig() -> Rig {
        rig_with(MemoryTimingCache::new())
    }

    impl Rig {
        fn set(&self, f: impl FnOnce(&mut SessionState)) {
            self.tx.send_modify(f);
        }

        fn meditate_at(&self, elapsed: u64) {
            self.set(|s| {
                s.phase = Phase::Meditation;
                s.elapsed = elapsed;
            });
        }

        fn run(&mut self, ms: u64) {
            for _ in 0..ms / 100 {
                self.clock.advance(100);
                self.narration.tick();
            }
        }
    }

    #[test]
    fn intro_plays_when_meditation_begins() {
        let mut rig = rig();
        rig.meditate_at(0);
        rig.narration.tick();
        assert_eq!(rig.narration.last_spoken_index(), Some(0));
        assert!(rig.narration.is_narrating());
    }

    #[test]
    fn nothing_plays_when_guided_is_off() {
        let mut rig = rig();
        let config = SessionConfig {
            guided: false,
            ..Default::default()
        };
        rig.narration.apply_config(&config);
        rig.meditate_at(0);
        rig.narration.tick();
        assert_eq!(rig.narration.last_spoken_index(), None);
    }

    #[test]
    fn finished_section_persists_word_timings() {
        let mut rig = rig();
        rig.meditate_at(0);
        rig.narration.tick();
        // 4 words at 400 ms, a 2 s silence, then 2 more words.
        rig.run(5_000);
        assert!(!rig.narration.is_narrating());

        let timings = rig.narration.word_timings().get(0).cloned().unwrap_or_default();
        let offsets: Vec<usize> = timings.as_slice().iter().map(|t| t.char_index).collect();
        assert_eq!(offsets, vec![0, 6, 9, 14, 21, 25]);
        assert_eq!(timings.as_slice()[1].time, 0.4);
        assert!(rig.cache.len() == 1);
    }

    #[test]
    fn seek_resumes_at_cached_word() {
        let cache = MemoryTimingCache::new();
        let mut map = WordTimingMap::new();
        map.insert(
            0,
            SectionTimings::from_unsorted([
                WordTiming { char_index: 0, time: 30.0 },
                WordTiming { char_index: 6, time: 31.0 },
                WordTiming { char_index: 9, time: 31.5 },
                WordTiming { char_index: 14, time: 32.0 },
            ]),
        );
        let mut seeded = cache.clone();
        seeded.save(&CacheKey::new(600, "test-voice", 0.9, 0.5), &map);

        let mut rig = rig_with(cache);
        rig.meditate_at(31);
        rig.narration.tick();
        rig.narration.resume_from_time(31.7);

        assert_eq!(rig.narration.last_spoken_index(), Some(0));
        let playing = rig.narration.playback.as_ref().map(|p| p.index());
        assert_eq!(playing, Some(0));
        assert_eq!(rig.narration.active.as_ref().map(|a| a.char_base), Some(9));
    }

    #[test]
    fn seek_into_long_silence_resumes_at_last_word() {
        let script = Script {
            rate: Some(1.0),
            pitch: None,
            sections: vec![ScriptSection {
                kind: SectionKind::Intro,
                content: vec![
                    MeditationPart::say("Focus on your breath"),
                    MeditationPart::pause(12.0),
                    MeditationPart::say("and rest."),
                ],
            }],
        };
        let cache = MemoryTimingCache::new();
        let mut map = WordTimingMap::new();
        map.insert(
            0,
            SectionTimings::from_unsorted([
                WordTiming { char_index: 0, time: 0.0 },
                WordTiming { char_index: 6, time: 0.4 },
                WordTiming { char_index: 9, time: 0.8 },
                WordTiming { char_index: 14, time: 1.2 },
                WordTiming { char_index: 21, time: 13.6 },
                WordTiming { char_index: 25, time: 14.0 },
            ]),
        );
        let mut seeded = cache.clone();
        seeded.save(&CacheKey::new(600, "test-voice", 0.9, 0.5), &map);

        let mut rig = rig_with_script(cache, script);
        rig.meditate_at(12);
        rig.narration.tick();
        // Ten seconds past "breath", in the middle of the silence.
        rig.narration.resume_from_time(12.0);

        assert_eq!(rig.narration.last_spoken_index(), Some(0));
        assert!(rig.narration.is_narrating());
        assert_eq!(rig.narration.active.as_ref().map(|a| a.char_base), Some(14));

        // The rest of the section still plays after the silence.
        let mut reached_rest = false;
        for _ in 0..150 {
            rig.run(100);
            if rig.narration.active.as_ref().map(|a| a.char_base) == Some(21) {
                reached_rest = true;
                break;
            }
        }
        assert!(reached_rest);
    }

    #[test]
    fn cancelled_ids_are_bounded_without_engine_reports() {
        let mut rig = rig();
        rig.meditate_at(0);
        rig.narration.tick();
        // Restart the intro repeatedly without ever polling the engine.
        for _ in 0..40 {
            rig.narration.resume_from_time(0.0);
        }
        assert_eq!(rig.narration.cancelled.len(), CANCELLED_MEMORY);
        assert!(rig.narration.active.is_some());
    }

    #[test]
    fn seek_without_cache_stays_silent_until_next_section() {
        let mut rig = rig();
        rig.meditate_at(50);
        rig.narration.tick();
        rig.narration.resume_from_time(50.0);
        assert_eq!(rig.narration.last_spoken_index(), Some(0));
        assert!(!rig.narration.is_narrating());

        rig.meditate_at(119);
        rig.narration.tick();
        assert!(!rig.narration.is_narrating());

        rig.meditate_at(120);
        rig.narration.tick();
        assert_eq!(rig.narration.last_spoken_index(), Some(1));
        assert!(rig.narration.is_narrating());
    }

    #[test]
    fn only_the_next_due_section_starts() {
        let mut rig = rig();
        rig.meditate_at(200);
        rig.narration.tick();
        assert_eq!(rig.narration.last_spoken_index(), Some(0));
    }

    #[test]
    fn pause_holds_a_scripted_silence() {
        let mut rig = rig();
        rig.meditate_at(0);
        rig.narration.tick();
        rig.run(1_600);
        assert_eq!(rig.narration.wait.map(|w| matches!(w, Wait::Armed(_))), Some(true));

        rig.run(500);
        rig.set(|s| {
            s.paused_phase = Some(Phase::Meditation);
            s.phase = Phase::Paused;
        });
        rig.narration.tick();
        assert!(matches!(rig.narration.wait, Some(Wait::Suspended(owed)) if owed > 0));

        rig.run(10_000);
        assert!(matches!(rig.narration.wait, Some(Wait::Suspended(_))));

        rig.set(|s| {
            s.paused_phase = None;
            s.phase = Phase::Meditation;
        });
        rig.narration.tick();
        rig.run(2_000);
        assert!(rig.narration.active.is_some());
    }

    #[test]
    fn inconsistent_engine_on_resume_repositions() {
        let mut rig = rig();
        rig.meditate_at(0);
        rig.narration.tick();
        rig.run(500);

        rig.set(|s| {
            s.paused_phase = Some(Phase::Meditation);
            s.phase = Phase::Paused;
        });
        rig.narration.tick();
        // Something else cancelled the utterance behind our back.
        rig.narration.speech.cancel(rig.clock.now_ms());
        rig.narration.speech.pause(rig.clock.now_ms());

        rig.set(|s| {
            s.paused_phase = None;
            s.phase = Phase::Meditation;
        });
        rig.narration.tick();
        // Timings for "Focus" and "on" exist, so speech restarts at "on".
        assert_eq!(rig.narration.active.as_ref().map(|a| a.char_base), Some(6));
    }

    #[test]
    fn own_cancellation_errors_do_not_skip_ahead() {
        let mut rig = rig();
        rig.meditate_at(0);
        rig.narration.tick();
        rig.run(300);
        rig.narration.resume_from_time(0.0);
        rig.narration.tick();
        // The restarted intro is still on its first part.
        assert_eq!(rig.narration.active.as_ref().map(|a| a.char_base), Some(0));
        assert!(rig.narration.cancelled.is_empty());
    }

    /// Engine that reports abandoned utterances as interrupted.
    struct InterruptingSpeech(SimulatedSpeech);

    impl SpeechEngine for InterruptingSpeech {
        fn speak(&mut self, now: u64, request: crate::speech::SpeechRequest) -> UtteranceId {
            self.0.speak(now, request)
        }
        fn cancel(&mut self, now: u64) {
            self.0.cancel(now)
        }
        fn pause(&mut self, now: u64) {
            self.0.pause(now)
        }
        fn resume(&mut self, now: u64) {
            self.0.resume(now)
        }
        fn is_speaking(&self) -> bool {
            self.0.is_speaking()
        }
        fn is_paused(&self) -> bool {
            self.0.is_paused()
        }
        fn voice_id(&self) -> &str {
            self.0.voice_id()
        }
        fn poll(&mut self, now: u64) -> Vec<SpeechEvent> {
            self.0
                .poll(now)
                .into_iter()
                .map(|event| match event {
                    SpeechEvent::Error { id, .. } => SpeechEvent::Error {
                        id,
                        kind: SpeechErrorKind::Interrupted,
                    },
                    other => other,
                })
                .collect()
        }
    }

    #[test]
    fn interrupted_reports_for_cancelled_utterances_are_ignored() {
        let clock = ManualClock::new();
        let (tx, rx) = watch::channel(SessionState::initial(0, 0, 600));
        let config = SessionConfig {
            guided: true,
            ..Default::default()
        };
        let mut narration = NarrationScheduler::new(
            rx,
            Rc::new(clock.clone()),
            Box::new(InterruptingSpeech(SimulatedSpeech::new("v"))),
            Box::new(MemoryTimingCache::new()),
            script(),
            &config,
        );
        tx.send_modify(|s| s.phase = Phase::Meditation);
        narration.tick();
        clock.advance(300);
        narration.tick();

        narration.resume_from_time(0.0);
        clock.advance(100);
        narration.tick();

        assert_eq!(narration.active.as_ref().map(|a| a.char_base), Some(0));
        assert!(narration.cancelled.is_empty());
    }

    #[test]
    fn genuine_errors_skip_the_part() {
        let clock = ManualClock::new();
        let (tx, rx) = watch::channel(SessionState::initial(0, 0, 600));
        let mut speech = SimulatedSpeech::new("v");
        speech.fail_next(SpeechErrorKind::SynthesisFailed);
        let config = SessionConfig {
            guided: true,
            ..Default::default()
        };
        let mut narration = NarrationScheduler::new(
            rx,
            Rc::new(clock.clone()),
            Box::new(speech),
            Box::new(MemoryTimingCache::new()),
            script(),
            &config,
        );
        tx.send_modify(|s| s.phase = Phase::Meditation);
        narration.tick();
        clock.advance(100);
        narration.tick();
        assert!(narration.active.is_none());
        assert!(matches!(narration.wait, Some(Wait::Armed(_))));
    }

    #[test]
    fn reset_clears_progress() {
        let mut rig = rig();
        rig.meditate_at(0);
        rig.narration.tick();
        rig.set(|s| {
            *s = SessionState::initial(0, 0, 600);
            s.position_epoch = 1;
        });
        rig.narration.tick();
        assert_eq!(rig.narration.last_spoken_index(), None);
        assert!(!rig.narration.is_narrating());
    }

    #[test]
    fn duration_change_recomputes_schedule() {
        let mut rig = rig();
        assert_eq!(rig.narration.schedule().len(), 2);
        rig.set(|s| *s = SessionState::initial(0, 0, 300));
        rig.narration.tick();
        assert_eq!(rig.narration.schedule().len(), 1);
    }
}
