//! Ready queue with a per-thread current process.
//!
//! Every hosted task runs on its own OS thread, so "current" is whatever
//! the calling thread was started as.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::platform::Scheduler;
use crate::process::Pid;

thread_local! {
    static CURRENT: Cell<Option<Pid>> = const { Cell::new(None) };
}

#[derive(Debug, Default)]
pub struct HostedScheduler {
    ready: Mutex<VecDeque<Pid>>,
}

impl HostedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Pid>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the calling thread to `pid`
    pub fn set_current(&self, pid: Option<Pid>) {
        CURRENT.with(|current| current.set(pid));
    }

    /// Snapshot of the ready queue, front first
    pub fn ready_queue(&self) -> Vec<Pid> {
        self.queue().iter().copied().collect()
    }
}

impl Scheduler for HostedScheduler {
    fn enqueue_ready(&self, pid: Pid) {
        self.queue().push_back(pid);
    }

    fn remove_ready(&self, pid: Pid) -> bool {
        let mut queue = self.queue();
        let before = queue.len();
        queue.retain(|queued| *queued != pid);
        queue.len() != before
    }

    fn current(&self) -> Option<Pid> {
        CURRENT.with(Cell::get)
    }
}
