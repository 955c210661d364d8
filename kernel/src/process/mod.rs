//! Process management
//!
//! - `pcb`: the process control block and its handle types
//! - `table`: fixed PCB arena and the ready-priority counter
//! - `stack`: per-slot stack regions
//! - `trampoline`: first entry of a never-run task
//! - `lifecycle`: spawn/exit/wait/kill and the scheduler hooks
//! - `report`: status table for debugging

mod lifecycle;
mod pcb;
mod report;
mod stack;
mod table;
mod trampoline;

pub(crate) use lifecycle::ExitEvent;
pub use pcb::{EntryPoint, LockHandle, Pcb, Pid, ProcessStatus, SavedContext, TaskType};
pub use report::{StatusReport, StatusRow};
pub use stack::{StackLayout, StackRegion};
pub use table::ProcessTable;
pub use trampoline::Launch;
