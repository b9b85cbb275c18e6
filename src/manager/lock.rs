//! Process-wide reentrant read/write lock.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::error::{LucernaError, Result};

#[derive(Debug, Default)]
struct LockState {
    writer: Option<ThreadId>,
    write_depth: usize,
    readers: HashMap<ThreadId, usize>,
}

/// A read/write lock that threads may re-enter.
///
/// The writer may take the write lock again and may take the read lock. A
/// thread holding only the read lock cannot upgrade: asking for the write
/// lock fails instead of deadlocking.
#[derive(Debug, Default)]
pub struct ReentrantRwLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl ReentrantRwLock {
    /// Create an unlocked lock.
    pub fn new() -> Self {
        ReentrantRwLock::default()
    }

    /// Take the read lock, blocking while another thread writes.
    pub fn read(&self) -> ReadGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        let reentrant = state.writer == Some(me) || state.readers.contains_key(&me);
        if !reentrant {
            while state.writer.is_some() {
                self.released.wait(&mut state);
            }
        }
        *state.readers.entry(me).or_insert(0) += 1;

        ReadGuard { lock: self, owner: me }
    }

    /// Take the write lock, blocking while other threads read or write.
    pub fn write(&self) -> Result<WriteGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.writer == Some(me) {
            state.write_depth += 1;
            return Ok(WriteGuard { lock: self });
        }
        if state.readers.contains_key(&me) {
            return Err(LucernaError::invalid_operation(
                "cannot take the write lock while holding the read lock",
            ));
        }

        while state.writer.is_some() || !state.readers.is_empty() {
            self.released.wait(&mut state);
        }
        state.writer = Some(me);
        state.write_depth = 1;

        Ok(WriteGuard { lock: self })
    }

    /// Whether the calling thread holds the write lock.
    pub fn holds_write_lock(&self) -> bool {
        self.state.lock().writer == Some(thread::current().id())
    }

    /// Whether the calling thread holds the read lock.
    pub fn holds_read_lock(&self) -> bool {
        self.state
            .lock()
            .readers
            .contains_key(&thread::current().id())
    }
}

/// Releases one read acquisition on drop.
#[derive(Debug)]
pub struct ReadGuard<'a> {
    lock: &'a ReentrantRwLock,
    owner: ThreadId,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock();
        if let Some(count) = state.readers.get_mut(&self.owner) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(&self.owner);
                self.lock.released.notify_all();
            }
        }
    }
}

/// Releases one write acquisition on drop.
#[derive(Debug)]
pub struct WriteGuard<'a> {
    lock: &'a ReentrantRwLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock();
        state.write_depth -= 1;
        if state.write_depth == 0 {
            state.writer = None;
            self.lock.released.notify_all();
        }
    }
}
