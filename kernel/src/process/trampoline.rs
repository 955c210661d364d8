//! First-entry trampoline
//!
//! A freshly spawned PCB carries [`SavedContext::FirstEntry`]. When the
//! context-switch routine resumes such a context it does not restore
//! registers; it lands here instead, still inside the critical section it
//! entered to perform the switch.
//!
//! The trampoline picks the task's execution stack from its type, marks it
//! Ready, leaves the critical section and hands a [`Launch`] to the
//! architecture's jump routine. The jump is the last thing that happens:
//! there is no return address back into the trampoline.
//!
//! [`SavedContext::FirstEntry`]: crate::process::SavedContext::FirstEntry

use crate::halt;
use crate::kernel::Kernel;
use crate::platform::{CriticalSection, Platform, Scheduler};
use crate::process::{EntryPoint, Pid, ProcessStatus, TaskType};

/// Everything the jump routine needs to start a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launch {
    pub pid: Pid,
    pub task_type: TaskType,
    pub entry_point: EntryPoint,
    /// Initial stack pointer: kernel stack for threads, user stack for processes
    pub stack: usize,
}

impl<P: Platform> Kernel<P> {
    /// Run the current task's first entry.
    ///
    /// The caller must hold the critical section (the switch routine entered
    /// it); this releases exactly one level of it before calling `jump`.
    /// Halts if no task is current or the current task has already run.
    pub fn first_entry<R>(&self, jump: impl FnOnce(Launch) -> R) -> R {
        let now = self.platform().ticks();

        let launch = self.with_table(|table| {
            let Some(pid) = self.platform().scheduler().current() else {
                halt!("first entry with no current process");
            };

            let (task_type, entry_point, stack) = match table.get(pid) {
                Some(pcb) if pcb.status == ProcessStatus::FirstTime => {
                    (pcb.task_type, pcb.entry_point, pcb.execution_stack())
                }
                Some(pcb) => halt!("first entry into pid {} with status {:?}", pid, pcb.status),
                None => halt!("first entry into unknown pid {}", pid),
            };

            table.set_status(pid, ProcessStatus::Ready);
            if let Some(pcb) = table.get_mut(pid) {
                pcb.last_entry_time = now;
                pcb.entry_count += 1;
            }

            Launch {
                pid,
                task_type,
                entry_point,
                stack,
            }
        });

        log::trace!(
            "pid {} first entry at {} on stack {:#x}",
            launch.pid,
            launch.entry_point,
            launch.stack
        );

        self.platform().critical_section().leave();
        jump(launch)
    }
}
