//! Plain-text script markup.
//!
//! ```text
//! /intro
//! Welcome. /2s
//! Settle in. /5s
//!
//! /p
//! Notice the breath. /3s
//! ```
//!
//! `/intro` and `/p` open a section and must stand alone on their line.
//! `/Ns` (fractional seconds allowed) inserts a silence; the words
//! around it become separate spoken parts. Blank lines are ignored.

use indoc::indoc;

use super::{MeditationPart, Script, ScriptSection, SectionKind};
use crate::error::ScriptError;

pub const DEFAULT_SCRIPT: &str = indoc! {"
    /intro
    Welcome, and thank you for taking this time. /2s
    Let your body find a position that is both relaxed and alert. /3s
    Soften your gaze, or close your eyes, and breathe in deeply. /5s
    And slowly breathe out. /5s
    Let the day settle. /5s

    /p
    Turn your attention to the breath. /2s
    Feel it arriving at the nostrils, /2s and leaving again. /5s
    There is nothing to fix. Only notice. /5s

    /p
    If the mind has drifted, that is fine. /2s
    Gently return to this breath. /5s
    Only this moment. /5s

    /p
    Sense the weight of the body resting where it is. /3s
    Find a place that feels tight, /2s and let it loosen. /5s
    Rest here. /5s

    /p
    Let each breath be new. /3s
    Arriving, /2s and letting go. /5s
"};

pub fn parse(input: &str) -> Result<Script, ScriptError> {
    let mut sections: Vec<ScriptSection> = Vec::new();

    for (i, raw) in input.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/intro" => {
                sections.push(ScriptSection {
                    kind: SectionKind::Intro,
                    content: Vec::new(),
                });
                continue;
            }
            "/p" => {
                sections.push(ScriptSection {
                    kind: SectionKind::Poke,
                    content: Vec::new(),
                });
                continue;
            }
            _ => {}
        }

        let section = sections.last_mut().ok_or_else(|| ScriptError::Markup {
            line: line_no,
            message: "text before the first section header".into(),
        })?;

        let mut words: Vec<&str> = Vec::new();
        for token in line.split_whitespace() {
            if let Some(cmd) = token.strip_prefix('/') {
                let secs = parse_pause(cmd).ok_or_else(|| ScriptError::Markup {
                    line: line_no,
                    message: format!("unknown directive '{token}'"),
                })?;
                flush(&mut words, &mut section.content);
                section.content.push(MeditationPart::pause(secs));
            } else {
                words.push(token);
            }
        }
        flush(&mut words, &mut section.content);
    }

    let script = Script {
        rate: None,
        pitch: None,
        sections,
    };
    script.validate()?;
    Ok(script)
}

fn parse_pause(cmd: &str) -> Option<f64> {
    let secs: f64 = cmd.strip_suffix('s')?.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

fn flush(words: &mut Vec<&str>, content: &mut Vec<MeditationPart>) {
    if !words.is_empty() {
        content.push(MeditationPart::say(words.join(" ")));
        words.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_around_inline_pauses() {
        let script = parse(indoc! {"
            /intro
            Feel the cool air, /2s and the warm air leaving. /5s
        "})
        .unwrap();
        assert_eq!(
            script.sections[0].content,
            vec![
                MeditationPart::say("Feel the cool air,"),
                MeditationPart::pause(2.0),
                MeditationPart::say("and the warm air leaving."),
                MeditationPart::pause(5.0),
            ]
        );
    }

    #[test]
    fn poke_headers_open_new_sections() {
        let script = parse("/intro\nHi. /1s\n\n/p\nOne.\n/p\nTwo. /0.5s\n").unwrap();
        assert_eq!(script.sections.len(), 3);
        assert_eq!(script.pokes().count(), 2);
        assert_eq!(
            script.sections[2].content[1],
            MeditationPart::pause(0.5)
        );
    }

    #[test]
    fn text_before_header_is_rejected() {
        let err = parse("Hello\n/intro\n").unwrap_err();
        assert!(matches!(err, ScriptError::Markup { line: 1, .. }));
    }

    #[test]
    fn unknown_directive_is_rejected() {
        let err = parse("/intro\nHello /loud\n").unwrap_err();
        assert!(matches!(err, ScriptError::Markup { line: 2, .. }));
    }

    #[test]
    fn default_script_parses() {
        let script = parse(DEFAULT_SCRIPT).unwrap();
        assert_eq!(script.sections[0].kind, SectionKind::Intro);
        assert_eq!(script.pokes().count(), 4);
    }
}
