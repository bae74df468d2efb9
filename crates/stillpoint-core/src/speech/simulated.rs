use super::{SpeechEngine, SpeechErrorKind, SpeechEvent, SpeechRequest, UtteranceId};

/// Speaking pace at `rate == 1.0`.
pub const DEFAULT_WORDS_PER_MINUTE: f64 = 150.0;

#[derive(Debug)]
struct Active {
    id: UtteranceId,
    text: String,
    /// Byte offsets of each word start.
    words: Vec<usize>,
    next_word: usize,
    ms_per_word: u64,
    /// Speaking time accumulated before the current segment.
    spoken_ms: u64,
    /// Start of the current unpaused segment.
    segment_start: Option<u64>,
}

impl Active {
    fn elapsed(&self, now: u64) -> u64 {
        self.spoken_ms
            + self
                .segment_start
                .map(|s| now.saturating_sub(s))
                .unwrap_or(0)
    }

    fn total_ms(&self) -> u64 {
        self.ms_per_word * self.words.len() as u64
    }
}

/// Deterministic speech engine that "speaks" at a fixed pace.
///
/// Each word takes the same time at a given rate. Elapsed times exclude
/// paused intervals. Cancelling an unfinished utterance reports
/// [`SpeechErrorKind::Canceled`] for it, as platform engines do.
#[derive(Debug)]
pub struct SimulatedSpeech {
    voice_id: String,
    words_per_minute: f64,
    next_id: UtteranceId,
    active: Option<Active>,
    paused: bool,
    events: Vec<SpeechEvent>,
    fail_next: Option<SpeechErrorKind>,
    echo: bool,
}

impl SimulatedSpeech {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            next_id: 1,
            active: None,
            paused: false,
            events: Vec::new(),
            fail_next: None,
            echo: false,
        }
    }

    pub fn with_words_per_minute(mut self, wpm: f64) -> Self {
        self.words_per_minute = wpm;
        self
    }

    /// Log every spoken word at info level.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Make the next utterance fail with `kind` instead of speaking.
    pub fn fail_next(&mut self, kind: SpeechErrorKind) {
        self.fail_next = Some(kind);
    }

    pub fn current_text(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.text.as_str())
    }

    fn ms_per_word(&self, rate: f32) -> u64 {
        let rate = if rate.is_finite() && rate > 0.0 { rate as f64 } else { 1.0 };
        (60_000.0 / (self.words_per_minute * rate)).round().max(1.0) as u64
    }
}

impl SpeechEngine for SimulatedSpeech {
    fn speak(&mut self, now: u64, request: SpeechRequest) -> UtteranceId {
        self.cancel(now);
        let id = self.next_id;
        self.next_id += 1;
        self.paused = false;

        if let Some(kind) = self.fail_next.take() {
            self.events.push(SpeechEvent::Error { id, kind });
            return id;
        }

        let words = word_starts(&request.text);
        self.active = Some(Active {
            id,
            ms_per_word: self.ms_per_word(request.rate),
            text: request.text,
            words,
            next_word: 0,
            spoken_ms: 0,
            segment_start: Some(now),
        });
        id
    }

    fn cancel(&mut self, now: u64) {
        // Flush whatever was already spoken so event order stays truthful.
        let mut flushed = self.poll_active(now);
        self.events.append(&mut flushed);
        if let Some(active) = self.active.take() {
            self.events.push(SpeechEvent::Error {
                id: active.id,
                kind: SpeechErrorKind::Canceled,
            });
        }
        self.paused = false;
    }

    fn pause(&mut self, now: u64) {
        self.paused = true;
        if let Some(active) = self.active.as_mut() {
            if let Some(start) = active.segment_start.take() {
                active.spoken_ms += now.saturating_sub(start);
            }
        }
    }

    fn resume(&mut self, now: u64) {
        self.paused = false;
        if let Some(active) = self.active.as_mut() {
            if active.segment_start.is_none() {
                active.segment_start = Some(now);
            }
        }
    }

    fn is_speaking(&self) -> bool {
        self.active.is_some()
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn voice_id(&self) -> &str {
        &self.voice_id
    }

    fn poll(&mut self, now: u64) -> Vec<SpeechEvent> {
        let mut events = std::mem::take(&mut self.events);
        events.extend(self.poll_active(now));
        events
    }
}

impl SimulatedSpeech {
    fn poll_active(&mut self, now: u64) -> Vec<SpeechEvent> {
        let mut events = Vec::new();
        let Some(active) = self.active.as_mut() else {
            return events;
        };
        let elapsed = active.elapsed(now);
        while active.next_word < active.words.len() {
            let at = active.ms_per_word * active.next_word as u64;
            if at > elapsed {
                break;
            }
            let char_index = active.words[active.next_word];
            if self.echo {
                let word = active.text[char_index..]
                    .split_whitespace()
                    .next()
                    .unwrap_or_default();
                tracing::info!(target: "stillpoint::voice", "{word}");
            }
            events.push(SpeechEvent::WordBoundary {
                id: active.id,
                char_index,
                elapsed_ms: at,
            });
            active.next_word += 1;
        }
        if elapsed >= active.total_ms() && active.next_word == active.words.len() {
            events.push(SpeechEvent::End { id: active.id });
            self.active = None;
        }
        events
    }
}

/// Byte offsets at which each whitespace-separated word starts.
pub(crate) fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            starts.push(i);
            in_word = true;
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.into(),
            rate: 1.0,
            pitch: 1.0,
        }
    }

    #[test]
    fn word_starts_skip_runs_of_whitespace() {
        assert_eq!(word_starts("Focus on  your breath"), vec![0, 6, 10, 15]);
        assert!(word_starts("   ").is_empty());
    }

    #[test]
    fn emits_boundaries_then_end() {
        // 150 wpm -> 400 ms per word
        let mut tts = SimulatedSpeech::new("sim");
        let id = tts.speak(0, req("one two three"));
        let events = tts.poll(0);
        assert_eq!(
            events,
            vec![SpeechEvent::WordBoundary {
                id,
                char_index: 0,
                elapsed_ms: 0
            }]
        );
        let events = tts.poll(800);
        assert_eq!(events.len(), 2);
        assert!(tts.is_speaking());
        let events = tts.poll(1_200);
        assert_eq!(events, vec![SpeechEvent::End { id }]);
        assert!(!tts.is_speaking());
    }

    #[test]
    fn paused_time_is_excluded_from_elapsed() {
        let mut tts = SimulatedSpeech::new("sim");
        let id = tts.speak(0, req("one two"));
        tts.poll(0);
        tts.pause(200);
        assert!(tts.poll(5_000).is_empty());
        tts.resume(5_000);
        let events = tts.poll(5_200);
        assert_eq!(
            events,
            vec![SpeechEvent::WordBoundary {
                id,
                char_index: 4,
                elapsed_ms: 400
            }]
        );
    }

    #[test]
    fn cancel_reports_canceled_for_unfinished_utterance() {
        let mut tts = SimulatedSpeech::new("sim");
        let id = tts.speak(0, req("one two three"));
        tts.cancel(100);
        let events = tts.poll(100);
        assert_eq!(
            events.last(),
            Some(&SpeechEvent::Error {
                id,
                kind: SpeechErrorKind::Canceled
            })
        );
        assert!(!tts.is_speaking());
    }

    #[test]
    fn fail_next_reports_error_without_speaking() {
        let mut tts = SimulatedSpeech::new("sim");
        tts.fail_next(SpeechErrorKind::SynthesisFailed);
        let id = tts.speak(0, req("hello"));
        assert!(!tts.is_speaking());
        assert_eq!(
            tts.poll(0),
            vec![SpeechEvent::Error {
                id,
                kind: SpeechErrorKind::SynthesisFailed
            }]
        );
    }

    #[test]
    fn empty_text_ends_immediately() {
        let mut tts = SimulatedSpeech::new("sim");
        let id = tts.speak(0, req(""));
        assert_eq!(tts.poll(0), vec![SpeechEvent::End { id }]);
    }
}
