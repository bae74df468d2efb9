//! Text-to-speech seam.
//!
//! An engine speaks one utterance at a time. Progress is reported as
//! polled [`SpeechEvent`]s rather than callbacks: the narration scheduler
//! drains them on every tick.

mod simulated;

pub use simulated::SimulatedSpeech;

use serde::{Deserialize, Serialize};

pub type UtteranceId = u64;

/// One utterance handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechErrorKind {
    /// Utterance was cancelled before it finished.
    Canceled,
    /// Utterance was cut off by another one.
    Interrupted,
    SynthesisFailed,
    VoiceUnavailable,
    Other(String),
}

impl SpeechErrorKind {
    /// Kinds an engine reports for an utterance it was told to abandon.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled | Self::Interrupted)
    }
}

impl std::fmt::Display for SpeechErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canceled => f.write_str("canceled"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::SynthesisFailed => f.write_str("synthesis-failed"),
            Self::VoiceUnavailable => f.write_str("voice-unavailable"),
            Self::Other(msg) => write!(f, "other: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// The engine began speaking the word at `char_index` of the
    /// utterance text, `elapsed_ms` after the utterance started.
    WordBoundary {
        id: UtteranceId,
        char_index: usize,
        elapsed_ms: u64,
    },
    End {
        id: UtteranceId,
    },
    Error {
        id: UtteranceId,
        kind: SpeechErrorKind,
    },
}

impl SpeechEvent {
    pub fn id(&self) -> UtteranceId {
        match self {
            Self::WordBoundary { id, .. } | Self::End { id } | Self::Error { id, .. } => *id,
        }
    }
}

pub trait SpeechEngine {
    /// Queue `request` for immediate playback, replacing anything in flight.
    fn speak(&mut self, now: u64, request: SpeechRequest) -> UtteranceId;

    fn cancel(&mut self, now: u64);

    fn pause(&mut self, now: u64);

    fn resume(&mut self, now: u64);

    /// True while an utterance is loaded, paused or not.
    fn is_speaking(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Identifier of the selected voice, used to key cached timings.
    fn voice_id(&self) -> &str;

    fn poll(&mut self, now: u64) -> Vec<SpeechEvent>;
}
