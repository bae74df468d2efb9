//! When each script section is spoken.
//!
//! The intro opens the meditation. The first two pokes sit at fixed
//! offsets; longer sessions spread the remaining pokes evenly across the
//! middle of the sitting. Every poke must leave a stretch of trailing
//! silence before the end bells.

use serde::Serialize;

use crate::script::{MeditationPart, Script, SectionKind};

pub const FIRST_POKE_SECS: u64 = 120;
pub const SECOND_POKE_SECS: u64 = 264;
/// Start of the window over which later pokes are spread.
pub const WINDOW_START_SECS: u64 = 265;
/// Silence every poke must leave before the meditation ends.
pub const TRAILING_SILENCE_SECS: u64 = 300;
/// Pokes beyond the second are only placed in sessions longer than this.
pub const SPREAD_MIN_DURATION_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    /// Seconds since the meditation phase began.
    pub time: u64,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub content: Vec<MeditationPart>,
}

/// Place the script's sections on a meditation of `duration` seconds.
///
/// Pure: the same duration and script always give the same schedule.
pub fn compute_schedule(duration: u64, script: &Script) -> Vec<ScheduledEvent> {
    let fits = |offset: u64| offset + TRAILING_SILENCE_SECS < duration;

    let mut schedule = Vec::new();
    if let Some(intro) = script.intro() {
        schedule.push(ScheduledEvent {
            time: 0,
            kind: SectionKind::Intro,
            content: intro.content.clone(),
        });
    }

    let pokes: Vec<_> = script.pokes().collect();
    let mut place = |time: u64, content: &[MeditationPart]| {
        if fits(time) {
            schedule.push(ScheduledEvent {
                time,
                kind: SectionKind::Poke,
                content: content.to_vec(),
            });
        }
    };

    for (poke, time) in pokes.iter().zip([FIRST_POKE_SECS, SECOND_POKE_SECS]) {
        place(time, &poke.content);
    }

    if duration > SPREAD_MIN_DURATION_SECS && pokes.len() > 2 {
        let rest = &pokes[2..];
        let k = rest.len() as u64;
        let window = duration - TRAILING_SILENCE_SECS - WINDOW_START_SECS;
        for (i, poke) in rest.iter().enumerate() {
            let time = WINDOW_START_SECS + window * (i as u64 + 1) / (k + 1);
            place(time, &poke.content);
        }
    }

    schedule.sort_by_key(|e| e.time);
    tracing::debug!(
        duration,
        times = ?schedule.iter().map(|e| e.time).collect::<Vec<_>>(),
        "narration schedule computed"
    );
    schedule
}
