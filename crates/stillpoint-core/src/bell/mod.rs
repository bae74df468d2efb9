mod player;
mod sequencer;

pub use player::{BellPlayer, SilentBell, TerminalBell, Volume, DEFAULT_CLIP_SECS};
pub use sequencer::{BellSequencer, DEFAULT_GAP_SECS};
pub(crate) use sequencer::secs_to_ms;
