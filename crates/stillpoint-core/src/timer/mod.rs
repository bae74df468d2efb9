mod engine;
mod state;
mod wake_lock;

pub use engine::TimerEngine;
pub use state::{Phase, SessionState};
pub use wake_lock::{NoopWakeLock, WakeLock};
