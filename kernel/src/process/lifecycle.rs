//! Process lifecycle: spawn, exit, wait, kill and the scheduler hooks
//!
//! Every table mutation happens inside one critical section so a
//! preemption never observes a half-initialized slot. The only blocking
//! operation here is `wait`, which blocks on the target slot's exit event
//! and never inside the critical section.

use core::num::NonZeroU32;

use alloc::string::ToString;

use crate::error::{KernelError, Result};
use crate::kernel::Kernel;
use crate::platform::{Condition, Lock, Platform, ProgramLoader, Scheduler};
use crate::process::{
    EntryPoint, LockHandle, Pcb, Pid, ProcessStatus, ProcessTable, SavedContext, StackRegion,
    StatusReport, TaskType,
};
use crate::sync::LockGuard;

/// Exit notification for one table slot.
///
/// Lives outside the process table so that waiters can block on it without
/// holding the table.
pub(crate) struct ExitEvent<P: Platform> {
    lock: P::Lock,
    condition: P::Condition,
}

impl<P: Platform> ExitEvent<P> {
    pub(crate) fn new() -> Self {
        Self {
            lock: P::Lock::new(),
            condition: P::Condition::new(),
        }
    }
}

impl<P: Platform> Kernel<P> {
    /// Spawn the initial process
    pub fn boot(&self, init_name: &str) -> Result<Pid> {
        log::info!(
            "segos core: {} pcbs, {} mailboxes x {} messages",
            self.max_pcbs(),
            self.config().max_mailboxes,
            self.config().mailbox_capacity
        );
        let pid = self.spawn(init_name)?;
        log::info!("init '{}' is pid {}", init_name, pid);
        Ok(pid)
    }

    /// Load `name` into the first free slot and queue it to run.
    ///
    /// Nothing is allocated unless the loader resolves the name.
    pub fn spawn(&self, name: &str) -> Result<Pid> {
        let (pid, entry_point) = self.with_table(|table| {
            let pid = table.find_free().ok_or(KernelError::TableFull {
                capacity: table.capacity(),
            })?;
            let entry_point = self.platform().loader().resolve(name).ok_or_else(|| {
                KernelError::ProgramNotFound {
                    name: name.to_string(),
                }
            })?;
            self.install(table, pid, TaskType::Process, entry_point);
            Ok((pid, entry_point))
        })?;

        log::debug!("spawned '{}' as pid {} (entry {})", name, pid, entry_point);
        Ok(pid)
    }

    /// Allocate a kernel thread starting at `entry_point`
    pub fn spawn_kernel_thread(&self, entry_point: EntryPoint) -> Result<Pid> {
        let pid = self.with_table(|table| {
            let pid = table.find_free().ok_or(KernelError::TableFull {
                capacity: table.capacity(),
            })?;
            self.install(table, pid, TaskType::KernelThread, entry_point);
            Ok(pid)
        })?;

        log::debug!("spawned kernel thread pid {} (entry {})", pid, entry_point);
        Ok(pid)
    }

    fn install(&self, table: &mut ProcessTable, pid: Pid, task_type: TaskType, entry_point: EntryPoint) {
        let kernel_stack = self.stacks().stack_top(pid, StackRegion::Kernel);
        let user_stack = match task_type {
            TaskType::Process => Some(self.stacks().stack_top(pid, StackRegion::User)),
            TaskType::KernelThread => None,
        };
        let generation = table.next_generation(pid);

        table.install(Pcb::first_time(
            pid,
            generation,
            task_type,
            entry_point,
            kernel_stack,
            user_stack,
        ));
        self.platform().scheduler().enqueue_ready(pid);
    }

    /// Terminate `pid`.
    ///
    /// Waiters are woken before the slot becomes Exited; they observe the
    /// new status once this releases the exit lock.
    pub fn exit(&self, pid: Pid) -> Result<()> {
        let event = self.exit_event(pid)?;
        let _exit_lock = LockGuard::new(&event.lock);

        if !self.with_table(|table| table.live(pid).is_some()) {
            return Err(KernelError::InvalidTarget { pid });
        }

        event.condition.broadcast();

        let previous = self.with_table(|table| {
            let previous = table.release(pid);
            if previous.is_some_and(ProcessStatus::is_ready) {
                self.platform().scheduler().remove_ready(pid);
            }
            previous
        });

        log::debug!("pid {} exited (was {:?})", pid, previous);
        Ok(())
    }

    /// Block until `pid` exits.
    ///
    /// Fails without blocking if `pid` is out of range, already Exited, or
    /// the caller itself.
    pub fn wait(&self, pid: Pid) -> Result<()> {
        let current = self.platform().scheduler().current();
        if current == Some(pid) {
            return Err(KernelError::InvalidTarget { pid });
        }

        let event = self.exit_event(pid)?;
        self.waiting_on(LockHandle::Exit(pid), || {
            let exit_lock = LockGuard::new(&event.lock);

            // A reused slot carries a new generation, so a waiter never
            // sleeps through the exit it asked for.
            let generation = self
                .with_table(|table| table.live_generation(pid))
                .ok_or(KernelError::InvalidTarget { pid })?;

            while self.with_table(|table| table.live_generation(pid)) == Some(generation) {
                event.condition.wait(exit_lock.lock());
            }
            Ok(())
        })
    }

    /// Not implemented: the target keeps running
    pub fn kill(&self, pid: Pid) -> Result<()> {
        log::warn!("kill({}) rejected: not supported", pid);
        Err(KernelError::NotSupported { pid })
    }

    /// The process running on this CPU
    pub fn getpid(&self) -> Option<Pid> {
        self.platform().scheduler().current()
    }

    pub fn priority(&self, pid: Pid) -> Result<u32> {
        self.with_table(|table| table.live(pid).map(Pcb::priority))
            .ok_or(KernelError::InvalidTarget { pid })
    }

    /// Change `pid`'s priority, returning the old one
    pub fn set_priority(&self, pid: Pid, priority: NonZeroU32) -> Result<u32> {
        let previous = self
            .with_table(|table| table.set_priority(pid, priority.get()))
            .ok_or(KernelError::InvalidTarget { pid })?;
        log::debug!("pid {} priority {} -> {}", pid, previous, priority);
        Ok(previous)
    }

    /// Take a Ready process off the ready queue
    pub fn block(&self, pid: Pid) -> Result<()> {
        self.with_table(|table| match table.live(pid).map(Pcb::status) {
            Some(ProcessStatus::Ready) => {
                table.set_status(pid, ProcessStatus::Blocked);
                self.platform().scheduler().remove_ready(pid);
                Ok(())
            }
            _ => Err(KernelError::InvalidTarget { pid }),
        })
    }

    /// Put a Blocked process back on the ready queue
    pub fn unblock(&self, pid: Pid) -> Result<()> {
        self.with_table(|table| match table.live(pid).map(Pcb::status) {
            Some(ProcessStatus::Blocked) => {
                table.set_status(pid, ProcessStatus::Ready);
                self.platform().scheduler().enqueue_ready(pid);
                Ok(())
            }
            _ => Err(KernelError::InvalidTarget { pid }),
        })
    }

    /// Switch-out hook: record the kernel stack pointer of the task being
    /// switched out and charge it the ticks since it was last entered.
    pub fn save_context(&self, pid: Pid, kernel_stack: usize) -> Result<()> {
        let now = self.platform().ticks();
        self.with_table(|table| {
            let pcb = table.live_mut(pid).ok_or(KernelError::InvalidTarget { pid })?;
            if pcb.entry_count > 0 {
                pcb.total_process_time += now.saturating_sub(pcb.last_entry_time);
            }
            pcb.context = SavedContext::Suspended { kernel_stack };
            Ok(())
        })
    }

    /// Switch-in hook for a task resuming from a saved context.
    ///
    /// A FirstTime task is entered through the trampoline instead, so it is
    /// rejected here.
    pub fn resume(&self, pid: Pid) -> Result<()> {
        let now = self.platform().ticks();
        self.with_table(|table| match table.live_mut(pid) {
            Some(pcb) if pcb.status != ProcessStatus::FirstTime => {
                pcb.last_entry_time = now;
                pcb.entry_count += 1;
                Ok(())
            }
            _ => Err(KernelError::InvalidTarget { pid }),
        })
    }

    /// Tick at which a sleeping task becomes runnable again
    pub fn set_sleep_until(&self, pid: Pid, ticks: u64) -> Result<()> {
        self.with_table(|table| {
            let pcb = table.live_mut(pid).ok_or(KernelError::InvalidTarget { pid })?;
            pcb.sleep_until = ticks;
            Ok(())
        })
    }

    /// Context the switch routine resumes `pid` from
    pub fn context(&self, pid: Pid) -> Option<SavedContext> {
        self.with_table(|table| table.live(pid).map(Pcb::context))
    }

    pub fn set_waiting_for_lock(&self, pid: Pid, lock: Option<LockHandle>) -> Result<()> {
        self.with_table(|table| {
            let pcb = table.live_mut(pid).ok_or(KernelError::InvalidTarget { pid })?;
            pcb.waiting_for_lock = lock;
            Ok(())
        })
    }

    /// Snapshot of a live PCB
    pub fn pcb(&self, pid: Pid) -> Option<Pcb> {
        self.with_table(|table| table.live(pid).cloned())
    }

    pub fn total_ready_priority(&self) -> u64 {
        self.with_table(|table| table.total_ready_priority())
    }

    pub fn live_count(&self) -> usize {
        self.with_table(|table| table.live_count())
    }

    pub fn max_pcbs(&self) -> usize {
        self.config().num_pcbs
    }

    pub fn status_report(&self) -> StatusReport {
        self.with_table(|table| StatusReport::from_table(table))
    }

    fn exit_event(&self, pid: Pid) -> Result<&ExitEvent<P>> {
        self.exit_events()
            .get(pid.index())
            .ok_or(KernelError::InvalidTarget { pid })
    }

    /// Run `f` with the current process marked as waiting for `lock`
    pub(crate) fn waiting_on<R>(&self, lock: LockHandle, f: impl FnOnce() -> R) -> R {
        let current = self.getpid();
        if let Some(pid) = current {
            self.note_waiting(pid, Some(lock));
        }
        let result = f();
        if let Some(pid) = current {
            self.note_waiting(pid, None);
        }
        result
    }

    fn note_waiting(&self, pid: Pid, lock: Option<LockHandle>) {
        match self.set_waiting_for_lock(pid, lock) {
            Ok(()) => {}
            // The caller exited itself while waiting
            Err(KernelError::InvalidTarget { .. }) => {}
            Err(err) => log::warn!("pid {}: waiting_for_lock not recorded: {}", pid, err),
        }
    }
}
