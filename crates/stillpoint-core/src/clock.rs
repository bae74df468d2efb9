//! Time source and cancellable deferred work.
//!
//! Every component is driven by the caller's loop: nothing here spawns a
//! thread or a task. Components read the current time from a [`Clock`]
//! and park delayed continuations in a [`Deferred`] queue that the owner
//! drains on each tick.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`Instant`], zeroed at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and simulations.
///
/// Clones share the same time cell.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Handle to a continuation parked in a [`Deferred`] queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// A continuation removed from the queue before it fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    pub started_ms: u64,
    pub delay_ms: u64,
    pub payload: T,
}

impl<T> Pending<T> {
    /// Time still owed at `now`, zero if it had already conceptually elapsed.
    pub fn remaining_ms(&self, now: u64) -> u64 {
        self.delay_ms
            .saturating_sub(now.saturating_sub(self.started_ms))
    }
}

#[derive(Debug)]
struct Entry<T> {
    handle: TimerHandle,
    started_ms: u64,
    delay_ms: u64,
    payload: T,
}

impl<T> Entry<T> {
    fn due_ms(&self) -> u64 {
        self.started_ms.saturating_add(self.delay_ms)
    }
}

/// Queue of cancellable delayed continuations.
#[derive(Debug)]
pub struct Deferred<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: u64, delay_ms: u64, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            handle,
            started_ms: now,
            delay_ms,
            payload,
        });
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> Option<Pending<T>> {
        let pos = self.entries.iter().position(|e| e.handle == handle)?;
        let entry = self.entries.remove(pos);
        Some(Pending {
            started_ms: entry.started_ms,
            delay_ms: entry.delay_ms,
            payload: entry.payload,
        })
    }

    pub fn remaining_ms(&self, handle: TimerHandle, now: u64) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| e.due_ms().saturating_sub(now))
    }

    /// Remove and return every payload due at `now`, earliest first.
    /// Ties keep scheduling order.
    pub fn drain_due(&mut self, now: u64) -> Vec<T> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].due_ms() <= now {
                due.push(self.entries.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|e| (e.due_ms(), e.handle.0));
        due.into_iter().map(|e| e.payload).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
