//! Collaborator contracts
//!
//! The core never implements scheduling policy, blocking, or program
//! loading itself. It consumes them through the traits below, bundled into
//! a single [`Platform`] so a kernel instance is generic over one type
//! parameter.
//!
//! | Contract            | Bare metal                      | Hosted (`hosted` feature)  |
//! |---------------------|---------------------------------|----------------------------|
//! | [`CriticalSection`] | cli/sti with nesting count      | reentrant global mutex     |
//! | [`Scheduler`]       | ready queue + `current_running` | `VecDeque` + thread-local  |
//! | [`Lock`]            | blocking kernel lock            | `Mutex<bool>` + `Condvar`  |
//! | [`Semaphore`]       | counting semaphore              | `Mutex<usize>` + `Condvar` |
//! | [`Condition`]       | condition variable              | sequence number + `Condvar`|
//! | [`ProgramLoader`]   | ramdisk lookup                  | name → entry map           |

use crate::process::{EntryPoint, Pid};

/// Preemption control.
///
/// `enter` disables preemption, `leave` re-enables it. Calls nest: only the
/// outermost `leave` re-enables preemption.
pub trait CriticalSection: Send + Sync {
    fn enter(&self);
    fn leave(&self);
}

/// RAII critical section
pub struct CriticalGuard<'a, C: CriticalSection + ?Sized> {
    section: &'a C,
}

impl<'a, C: CriticalSection + ?Sized> CriticalGuard<'a, C> {
    pub fn new(section: &'a C) -> Self {
        section.enter();
        Self { section }
    }
}

impl<C: CriticalSection + ?Sized> Drop for CriticalGuard<'_, C> {
    fn drop(&mut self) {
        self.section.leave();
    }
}

/// Ready-queue side of the scheduler.
///
/// Picking the next task and switching to it is the scheduler's business;
/// the core only adds and removes entries and asks who is running.
pub trait Scheduler: Send + Sync {
    /// Append `pid` to the ready queue
    fn enqueue_ready(&self, pid: Pid);

    /// Remove `pid` from the ready queue. Returns false if it was not queued.
    fn remove_ready(&self, pid: Pid) -> bool;

    /// The process currently running on this CPU, if any
    fn current(&self) -> Option<Pid>;
}

/// Mutual-exclusion lock. May block the caller.
pub trait Lock: Send + Sync {
    fn new() -> Self
    where
        Self: Sized;

    fn acquire(&self);

    fn release(&self);
}

/// Counting semaphore. `down` blocks at zero, `up` may wake a waiter.
pub trait Semaphore: Send + Sync {
    fn new(count: usize) -> Self
    where
        Self: Sized;

    /// Re-initialize the count. Waiters present at this point are not
    /// guaranteed to be woken.
    fn init(&self, count: usize);

    fn down(&self);

    fn up(&self);

    /// Current count. A snapshot for diagnostics, never for synchronization.
    fn count(&self) -> usize;
}

/// Condition variable paired with a [`Lock`].
pub trait Condition<L: Lock>: Send + Sync {
    fn new() -> Self
    where
        Self: Sized;

    /// Atomically release `lock` and block until signaled, then re-acquire
    /// `lock` before returning. The caller must hold `lock`.
    fn wait(&self, lock: &L);

    /// Wake every waiter
    fn broadcast(&self);
}

/// Program loader: resolves a program name to its entry point
pub trait ProgramLoader: Send + Sync {
    fn resolve(&self, name: &str) -> Option<EntryPoint>;
}

/// Everything the core needs from the rest of the kernel
pub trait Platform: Send + Sync + 'static {
    type Critical: CriticalSection;
    type Scheduler: Scheduler;
    type Loader: ProgramLoader;
    type Lock: Lock;
    type Semaphore: Semaphore;
    type Condition: Condition<Self::Lock>;

    fn critical_section(&self) -> &Self::Critical;

    fn scheduler(&self) -> &Self::Scheduler;

    fn loader(&self) -> &Self::Loader;

    /// Timer ticks since boot
    fn ticks(&self) -> u64;
}
