//! Narration content model.
//!
//! A script is one `intro` section followed by any number of `poke`
//! sections. Each section is an ordered list of parts: silences and
//! spoken text. Spoken text is either a plain string or a sequence of
//! words that may carry their own rate and pitch.
//!
//! Scripts arrive as JSON (a bare array of sections, or an object that
//! adds `rate`/`pitch` defaults) or in the plain-text markup handled by
//! [`markup`].

pub mod markup;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Intro,
    Poke,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpec {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
}

impl WordSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rate: None,
            pitch: None,
        }
    }
}

/// Spoken content of a `say` part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Say {
    PlainText(String),
    WordSequence(Vec<WordSpec>),
}

impl Say {
    /// Flattened spoken text; words are joined by single spaces.
    pub fn text(&self) -> String {
        match self {
            Say::PlainText(text) => text.clone(),
            Say::WordSequence(words) => words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn char_len(&self) -> usize {
        match self {
            Say::PlainText(text) => text.len(),
            Say::WordSequence(words) => {
                let chars: usize = words.iter().map(|w| w.text.len()).sum();
                chars + words.len().saturating_sub(1)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeditationPart {
    /// Scripted silence, in seconds.
    Pause { pause: f64 },
    Say {
        say: Say,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rate: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pitch: Option<f32>,
    },
}

impl MeditationPart {
    pub fn say(text: impl Into<String>) -> Self {
        MeditationPart::Say {
            say: Say::PlainText(text.into()),
            rate: None,
            pitch: None,
        }
    }

    pub fn pause(secs: f64) -> Self {
        MeditationPart::Pause { pause: secs }
    }

    /// Length of the part's flattened spoken text; zero for silences.
    pub fn char_len(&self) -> usize {
        match self {
            MeditationPart::Pause { .. } => 0,
            MeditationPart::Say { say, .. } => say.char_len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSection {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub content: Vec<MeditationPart>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
    pub sections: Vec<ScriptSection>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptDocument {
    Bare(Vec<ScriptSection>),
    Wrapped(Script),
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script = match serde_json::from_str::<ScriptDocument>(json)? {
            ScriptDocument::Bare(sections) => Script {
                rate: None,
                pitch: None,
                sections,
            },
            ScriptDocument::Wrapped(script) => script,
        };
        script.validate()?;
        Ok(script)
    }

    /// Read a script file. `.json` files are parsed as JSON, anything
    /// else as markup.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => markup::parse(&content),
        }
    }

    /// The script shipped with the application.
    pub fn builtin() -> Self {
        // The bundled markup is covered by tests; an empty script is the
        // harmless fallback.
        markup::parse(markup::DEFAULT_SCRIPT).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.intro().is_none() {
            return Err(ScriptError::MissingIntro);
        }
        Ok(())
    }

    pub fn intro(&self) -> Option<&ScriptSection> {
        self.sections.iter().find(|s| s.kind == SectionKind::Intro)
    }

    pub fn pokes(&self) -> impl Iterator<Item = &ScriptSection> {
        self.sections.iter().filter(|s| s.kind == SectionKind::Poke)
    }
}

/// Flattened spoken text of a section: say parts joined by one space.
pub fn section_text(content: &[MeditationPart]) -> String {
    content
        .iter()
        .filter_map(|p| match p {
            MeditationPart::Say { say, .. } => Some(say.text()),
            MeditationPart::Pause { .. } => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Section-wide character offset at which each part starts.
///
/// Offsets index into [`section_text`]. A silence takes the offset of
/// the next spoken part.
pub fn part_offsets(content: &[MeditationPart]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(content.len());
    let mut cursor = 0;
    let mut spoken_before = false;
    for part in content {
        match part {
            MeditationPart::Pause { .. } => {
                offsets.push(if spoken_before { cursor + 1 } else { cursor });
            }
            MeditationPart::Say { say, .. } => {
                if spoken_before {
                    cursor += 1;
                }
                offsets.push(cursor);
                cursor += say.char_len();
                spoken_before = true;
            }
        }
    }
    offsets
}
