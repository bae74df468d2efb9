use crate::error::WakeLockError;

/// Keeps the screen awake while a session runs.
pub trait WakeLock {
    fn acquire(&mut self) -> Result<(), WakeLockError>;
    fn release(&mut self) -> Result<(), WakeLockError>;
}

/// For hosts without a screen to keep awake. Always succeeds.
#[derive(Debug, Default)]
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), WakeLockError> {
        Ok(())
    }
}
