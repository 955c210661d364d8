//! Blocking primitives on std threads

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::platform::{Condition, CriticalSection, Lock, Semaphore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait<'a, T>(cvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

/// Mutual-exclusion lock that is not tied to a guard's scope
#[derive(Debug, Default)]
pub struct HostedLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl Lock for HostedLock {
    fn new() -> Self {
        Self::default()
    }

    fn acquire(&self) {
        let mut held = lock(&self.held);
        while *held {
            held = wait(&self.released, held);
        }
        *held = true;
    }

    fn release(&self) {
        *lock(&self.held) = false;
        self.released.notify_one();
    }
}

#[derive(Debug, Default)]
pub struct HostedSemaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Semaphore for HostedSemaphore {
    fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            available: Condvar::new(),
        }
    }

    fn init(&self, count: usize) {
        *lock(&self.count) = count;
        self.available.notify_all();
    }

    fn down(&self) {
        let mut count = lock(&self.count);
        while *count == 0 {
            count = wait(&self.available, count);
        }
        *count -= 1;
    }

    fn up(&self) {
        *lock(&self.count) += 1;
        self.available.notify_one();
    }

    fn count(&self) -> usize {
        *lock(&self.count)
    }
}

/// Condition variable over [`HostedLock`].
///
/// Broadcasts bump a sequence number; a waiter sleeps until it changes.
#[derive(Debug, Default)]
pub struct HostedCondition {
    sequence: Mutex<u64>,
    changed: Condvar,
}

impl Condition<HostedLock> for HostedCondition {
    fn new() -> Self {
        Self::default()
    }

    fn wait(&self, external: &HostedLock) {
        let mut sequence = lock(&self.sequence);
        let observed = *sequence;
        // Released while holding `sequence`, so a broadcast issued after
        // the release cannot be missed.
        external.release();
        while *sequence == observed {
            sequence = wait(&self.changed, sequence);
        }
        drop(sequence);
        external.acquire();
    }

    fn broadcast(&self) {
        *lock(&self.sequence) += 1;
        self.changed.notify_all();
    }
}

/// Reentrant critical section: one thread at a time, nesting counted
#[derive(Debug, Default)]
pub struct HostedCriticalSection {
    owner: Mutex<(Option<ThreadId>, u32)>,
    left: Condvar,
}

impl HostedCriticalSection {
    /// Nesting depth held by the calling thread
    pub fn depth(&self) -> u32 {
        let owner = lock(&self.owner);
        match owner.0 {
            Some(id) if id == thread::current().id() => owner.1,
            _ => 0,
        }
    }
}

impl CriticalSection for HostedCriticalSection {
    fn enter(&self) {
        let me = thread::current().id();
        let mut owner = lock(&self.owner);
        loop {
            match owner.0 {
                None => {
                    *owner = (Some(me), 1);
                    return;
                }
                Some(id) if id == me => {
                    owner.1 += 1;
                    return;
                }
                Some(_) => owner = wait(&self.left, owner),
            }
        }
    }

    fn leave(&self) {
        let me = thread::current().id();
        let mut owner = lock(&self.owner);
        match owner.0 {
            Some(id) if id == me && owner.1 > 1 => owner.1 -= 1,
            Some(id) if id == me => {
                *owner = (None, 0);
                self.left.notify_one();
            }
            _ => crate::halt!("leave_critical without matching enter"),
        }
    }
}
