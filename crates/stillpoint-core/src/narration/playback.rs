//! Part-by-part playback of one scheduled section.
//!
//! [`SectionPlayback`] is a cursor over a section's parts. Each call to
//! [`SectionPlayback::next_step`] yields the next thing to do: speak an
//! utterance, wait out a scripted silence, or stop. The scheduler executes
//! the step and asks for the next one when the utterance ends or the
//! silence elapses, so pausing and cancelling only ever touch one pending
//! step.

use crate::script::{part_offsets, MeditationPart, Say, WordSpec};
use crate::speech::SpeechRequest;

/// Rate and pitch an utterance is spoken with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prosody {
    pub rate: f32,
    pub pitch: f32,
}

impl Prosody {
    fn with_overrides(self, rate: Option<f32>, pitch: Option<f32>) -> Self {
        Self {
            rate: rate.unwrap_or(self.rate),
            pitch: pitch.unwrap_or(self.pitch),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub request: SpeechRequest,
    /// Section-wide offset of the first byte of `request.text`.
    pub char_base: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Speak(Utterance),
    /// Scripted silence, in seconds.
    Wait(f64),
    Done,
}

#[derive(Debug, Clone)]
pub struct SectionPlayback {
    index: usize,
    parts: Vec<MeditationPart>,
    offsets: Vec<usize>,
    part: usize,
    /// Offset into the current plain-text part to start speaking from.
    skip: usize,
    /// Next word of the current word-sequence part.
    word: usize,
    defaults: Prosody,
}

impl SectionPlayback {
    /// Playback of schedule entry `index`, starting at section-wide
    /// character offset `from_char` (0 for the top of the section).
    pub fn new(index: usize, parts: &[MeditationPart], from_char: usize, defaults: Prosody) -> Self {
        let mut playback = Self {
            index,
            parts: parts.to_vec(),
            offsets: part_offsets(parts),
            part: 0,
            skip: 0,
            word: 0,
            defaults,
        };
        if from_char > 0 {
            playback.seek_char(from_char);
        }
        playback
    }

    /// Schedule index of the section being played.
    pub fn index(&self) -> usize {
        self.index
    }

    fn seek_char(&mut self, from_char: usize) {
        let found = self
            .parts
            .iter()
            .zip(&self.offsets)
            .enumerate()
            .filter(|(_, (part, offset))| {
                matches!(part, MeditationPart::Say { .. }) && **offset <= from_char
            })
            .last();
        let Some((part, (MeditationPart::Say { say, .. }, offset))) = found else {
            return;
        };
        let local = from_char - offset;
        self.part = part;
        match say {
            Say::PlainText(text) if local < text.len() && text.is_char_boundary(local) => {
                self.skip = local;
            }
            Say::PlainText(_) => {}
            Say::WordSequence(words) => {
                self.word = word_starts(words)
                    .iter()
                    .rposition(|start| *start <= local)
                    .unwrap_or(0);
            }
        }
    }

    pub fn next_step(&mut self) -> Step {
        while let Some(part) = self.parts.get(self.part) {
            match part {
                MeditationPart::Pause { pause } => {
                    self.part += 1;
                    return Step::Wait(*pause);
                }
                MeditationPart::Say { say, rate, pitch } => {
                    let prosody = self.defaults.with_overrides(*rate, *pitch);
                    let offset = self.offsets[self.part];
                    match say {
                        Say::PlainText(text) => {
                            let skip = std::mem::take(&mut self.skip);
                            self.part += 1;
                            let rest = &text[skip..];
                            if rest.trim().is_empty() {
                                continue;
                            }
                            return Step::Speak(Utterance {
                                request: SpeechRequest {
                                    text: rest.to_string(),
                                    rate: prosody.rate,
                                    pitch: prosody.pitch,
                                },
                                char_base: offset + skip,
                            });
                        }
                        Say::WordSequence(words) => {
                            if self.word >= words.len() {
                                self.part += 1;
                                self.word = 0;
                                continue;
                            }
                            let (utterance, end) = batch(words, self.word, offset, prosody);
                            self.word = end;
                            return Step::Speak(utterance);
                        }
                    }
                }
            }
        }
        Step::Done
    }
}

/// Offsets of each word within the joined text of a word sequence.
fn word_starts(words: &[WordSpec]) -> Vec<usize> {
    let mut cursor = 0;
    words
        .iter()
        .map(|w| {
            let start = cursor;
            cursor += w.text.len() + 1;
            start
        })
        .collect()
}

/// One utterance for the run of words from `first` that share a prosody.
/// Returns it with the index of the first word left over.
fn batch(words: &[WordSpec], first: usize, part_offset: usize, base: Prosody) -> (Utterance, usize) {
    let prosody_of = |w: &WordSpec| base.with_overrides(w.rate, w.pitch);
    let prosody = prosody_of(&words[first]);
    let end = words[first..]
        .iter()
        .position(|w| prosody_of(w) != prosody)
        .map_or(words.len(), |n| first + n);
    let text = words[first..end]
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let char_base = part_offset + word_starts(words)[first];
    let utterance = Utterance {
        request: SpeechRequest {
            text,
            rate: prosody.rate,
            pitch: prosody.pitch,
        },
        char_base,
    };
    (utterance, end)
}
