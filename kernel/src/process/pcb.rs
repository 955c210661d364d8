//! Process Control Block
//!
//! One PCB per table slot. A slot's index is its pid, so a `Pid` is both
//! the process identifier and the arena handle.
//!
//! ## Status Lifecycle
//!
//! ```text
//! Exited ──spawn──▶ FirstTime ──first entry──▶ Ready ◀──▶ Blocked
//!   ▲                   │                        │          │
//!   └──────────────────exit──────────────────────┴──────────┘
//! ```
//!
//! Running is not a status: it is whichever PCB the scheduler reports as
//! current.

use core::fmt;

use crate::config::DEFAULT_PRIORITY;
use crate::ipc::MailboxId;

/// Process identifier (slot index in the process table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(usize);

impl Pid {
    pub const fn new(slot: usize) -> Self {
        Self(slot)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Address the trampoline transfers control to on first execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPoint(pub usize);

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Kind of task occupying a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Runs on its kernel stack only
    KernelThread,
    /// Runs on a user stack, enters the kernel on its kernel stack
    Process,
}

impl TaskType {
    /// Critical-section depth a task of this type starts with
    pub const fn initial_nesting(self) -> u32 {
        match self {
            TaskType::KernelThread => 1,
            TaskType::Process => 0,
        }
    }
}

/// Slot status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Free slot
    Exited,
    /// Spawned, on the ready queue, never run
    FirstTime,
    /// On the ready queue (or running)
    Ready,
    /// Waiting on a primitive, off the ready queue
    Blocked,
}

impl ProcessStatus {
    /// Whether a PCB with this status sits on the ready queue and so counts
    /// toward the total ready priority
    #[inline]
    pub const fn is_ready(self) -> bool {
        matches!(self, ProcessStatus::FirstTime | ProcessStatus::Ready)
    }

    #[inline]
    pub const fn is_live(self) -> bool {
        !matches!(self, ProcessStatus::Exited)
    }

    pub const fn label(self) -> &'static str {
        match self {
            ProcessStatus::Exited => "Exited",
            ProcessStatus::FirstTime => "First",
            ProcessStatus::Ready => "Ready",
            ProcessStatus::Blocked => "Blocked",
        }
    }
}

/// Non-owning reference to a lock a PCB may be blocked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockHandle {
    /// Buffer lock of a mailbox
    Mailbox(MailboxId),
    /// Exit lock of a process slot (held by `wait`/`exit`)
    Exit(Pid),
}

/// Context handed to the context-switch routine
///
/// Built once at spawn. A task that has never run carries `FirstEntry`:
/// the switch routine sends it through the trampoline instead of restoring
/// registers. Once switched out it carries `Suspended`, and from then on it
/// is indistinguishable from a task that blocked and resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedContext {
    FirstEntry { kernel_stack: usize },
    Suspended { kernel_stack: usize },
}

impl SavedContext {
    pub const fn kernel_stack(&self) -> usize {
        match *self {
            SavedContext::FirstEntry { kernel_stack } | SavedContext::Suspended { kernel_stack } => {
                kernel_stack
            }
        }
    }

    pub const fn is_first_entry(&self) -> bool {
        matches!(self, SavedContext::FirstEntry { .. })
    }
}

/// Process control block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub(crate) pid: Pid,
    pub(crate) generation: u64,
    pub(crate) task_type: TaskType,
    pub(crate) status: ProcessStatus,
    pub(crate) priority: u32,
    pub(crate) kernel_stack: usize,
    pub(crate) user_stack: Option<usize>,
    pub(crate) nested_count: u32,
    pub(crate) entry_point: EntryPoint,
    pub(crate) context: SavedContext,
    pub(crate) sleep_until: u64,
    pub(crate) total_process_time: u64,
    pub(crate) last_entry_time: u64,
    pub(crate) entry_count: u64,
    pub(crate) waiting_for_lock: Option<LockHandle>,
}

impl Pcb {
    /// An unused slot
    pub(crate) const fn exited(pid: Pid) -> Self {
        Self {
            pid,
            generation: 0,
            task_type: TaskType::Process,
            status: ProcessStatus::Exited,
            priority: DEFAULT_PRIORITY,
            kernel_stack: 0,
            user_stack: None,
            nested_count: 0,
            entry_point: EntryPoint(0),
            context: SavedContext::FirstEntry { kernel_stack: 0 },
            sleep_until: 0,
            total_process_time: 0,
            last_entry_time: 0,
            entry_count: 0,
            waiting_for_lock: None,
        }
    }

    /// A freshly spawned task, ready for its first switch
    pub(crate) fn first_time(
        pid: Pid,
        generation: u64,
        task_type: TaskType,
        entry_point: EntryPoint,
        kernel_stack: usize,
        user_stack: Option<usize>,
    ) -> Self {
        Self {
            pid,
            generation,
            task_type,
            status: ProcessStatus::FirstTime,
            priority: DEFAULT_PRIORITY,
            kernel_stack,
            user_stack,
            nested_count: task_type.initial_nesting(),
            entry_point,
            context: SavedContext::FirstEntry { kernel_stack },
            sleep_until: 0,
            total_process_time: 0,
            last_entry_time: 0,
            entry_count: 0,
            waiting_for_lock: None,
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Allocation count of this slot, bumped on every spawn
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    #[inline]
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    #[inline]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    #[inline]
    pub fn kernel_stack(&self) -> usize {
        self.kernel_stack
    }

    #[inline]
    pub fn user_stack(&self) -> Option<usize> {
        self.user_stack
    }

    #[inline]
    pub fn nested_count(&self) -> u32 {
        self.nested_count
    }

    #[inline]
    pub fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }

    #[inline]
    pub fn context(&self) -> SavedContext {
        self.context
    }

    #[inline]
    pub fn sleep_until(&self) -> u64 {
        self.sleep_until
    }

    #[inline]
    pub fn total_process_time(&self) -> u64 {
        self.total_process_time
    }

    #[inline]
    pub fn last_entry_time(&self) -> u64 {
        self.last_entry_time
    }

    #[inline]
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    #[inline]
    pub fn waiting_for_lock(&self) -> Option<LockHandle> {
        self.waiting_for_lock
    }

    /// The stack this task executes on once running
    pub fn execution_stack(&self) -> usize {
        match self.task_type {
            TaskType::KernelThread => self.kernel_stack,
            TaskType::Process => self.user_stack.unwrap_or(self.kernel_stack),
        }
    }
}
