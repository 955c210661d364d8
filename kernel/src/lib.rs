//! segos kernel core
//!
//! The process/IPC core of a single-segment teaching kernel.
//!
//! # Architecture
//!
//! The core is organized into the following modules:
//! - `process`: PCB table, stack layout, first-entry trampoline and the
//!   spawn/exit/wait/kill lifecycle
//! - `ipc`: named, reference-counted bounded-buffer mailboxes
//! - `platform`: contracts of the collaborators the core consumes
//!   (scheduler ready queue, lock, semaphore, condition, critical section,
//!   program loader)
//! - `syscall`: typed syscall surface consumed by the trap layer
//! - `hosted`: std-backed platform for tests and simulation
//!
//! ```text
//!   trap layer ──▶ syscall::dispatch ──▶ Kernel ──┬──▶ ProcessTable ──▶ StackLayout
//!                                                 │          │
//!                                                 │          └──▶ Scheduler (ready queue)
//!                                                 └──▶ Mailboxes ──▶ Lock / Semaphore
//! ```
//!
//! Every table is a fixed arena indexed by a small handle ([`Pid`],
//! [`MailboxId`]). Table-wide mutations happen inside the platform critical
//! section; mailbox buffers are guarded by their own lock.

#![cfg_attr(not(any(test, feature = "hosted")), no_std)]

extern crate alloc;

pub mod config;
pub mod debug;
pub mod error;
pub mod invariants;
pub mod ipc;
pub mod platform;
pub mod process;
pub mod sync;
pub mod syscall;

#[cfg(any(test, feature = "hosted"))]
pub mod hosted;

mod kernel;

#[doc(hidden)]
pub use log as __log;

pub use config::{ConfigError, KernelConfig, StackConfig};
pub use error::{KernelError, Result};
pub use invariants::InvariantViolation;
pub use ipc::MailboxId;
pub use kernel::Kernel;
pub use platform::Platform;
pub use process::{
    EntryPoint, Launch, LockHandle, Pcb, Pid, ProcessStatus, SavedContext, StackLayout,
    StackRegion, StatusReport, StatusRow, TaskType,
};
pub use syscall::{dispatch, Syscall};
