//! Property tests for narration scheduling.

use proptest::prelude::*;
use stillpoint_core::narration::{
    compute_schedule, FIRST_POKE_SECS, SECOND_POKE_SECS, SPREAD_MIN_DURATION_SECS,
    TRAILING_SILENCE_SECS,
};
use stillpoint_core::script::{MeditationPart, ScriptSection, SectionKind};
use stillpoint_core::Script;

fn script_with(pokes: usize) -> Script {
    let mut sections = vec![ScriptSection {
        kind: SectionKind::Intro,
        content: vec![MeditationPart::say("Welcome.")],
    }];
    sections.extend((0..pokes).map(|i| ScriptSection {
        kind: SectionKind::Poke,
        content: vec![MeditationPart::say(format!("Reminder {i}."))],
    }));
    Script {
        rate: None,
        pitch: None,
        sections,
    }
}

proptest! {
    #[test]
    fn schedule_is_sorted_and_opens_with_intro(duration in 0u64..7_200, pokes in 0usize..12) {
        let schedule = compute_schedule(duration, &script_with(pokes));
        prop_assert_eq!(schedule[0].time, 0);
        prop_assert_eq!(schedule[0].kind, SectionKind::Intro);
        prop_assert!(schedule.windows(2).all(|w| w[0].time <= w[1].time));
        prop_assert!(schedule.len() <= pokes + 1);
    }

    #[test]
    fn pokes_leave_trailing_silence(duration in 0u64..7_200, pokes in 0usize..12) {
        let schedule = compute_schedule(duration, &script_with(pokes));
        for event in schedule.iter().filter(|e| e.kind == SectionKind::Poke) {
            prop_assert!(event.time + TRAILING_SILENCE_SECS < duration);
        }
    }

    #[test]
    fn short_sessions_use_only_fixed_offsets(duration in 0u64..=SPREAD_MIN_DURATION_SECS, pokes in 0usize..12) {
        let schedule = compute_schedule(duration, &script_with(pokes));
        for event in schedule.iter().filter(|e| e.kind == SectionKind::Poke) {
            prop_assert!(event.time == FIRST_POKE_SECS || event.time == SECOND_POKE_SECS);
        }
    }

    #[test]
    fn long_sessions_place_every_poke(duration in 1_200u64..7_200, pokes in 0usize..12) {
        let schedule = compute_schedule(duration, &script_with(pokes));
        prop_assert_eq!(schedule.len(), pokes + 1);
    }
}
