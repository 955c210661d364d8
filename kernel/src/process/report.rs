//! Process status table for debugging output

use core::fmt;

use alloc::vec::Vec;

use crate::process::{Pid, ProcessStatus, ProcessTable, TaskType};

/// One live slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRow {
    pub pid: Pid,
    pub task_type: TaskType,
    pub priority: u32,
    pub status: ProcessStatus,
    pub entry_count: u64,
}

/// Snapshot of every live slot, in pid order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub rows: Vec<StatusRow>,
    pub total_ready_priority: u64,
}

impl StatusReport {
    pub(crate) fn from_table(table: &ProcessTable) -> Self {
        let rows = table
            .iter()
            .filter(|pcb| pcb.status().is_live())
            .map(|pcb| StatusRow {
                pid: pcb.pid(),
                task_type: pcb.task_type(),
                priority: pcb.priority(),
                status: pcb.status(),
                entry_count: pcb.entry_count(),
            })
            .collect();

        Self {
            rows,
            total_ready_priority: table.total_ready_priority(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "P R O C E S S   S T A T U S")?;
        writeln!(f, "{:<5} {:<8} {:>4}  {:<8} {:>7}", "Pid", "Type", "Prio", "Status", "Entries")?;
        for row in &self.rows {
            let kind = match row.task_type {
                TaskType::KernelThread => "Thread",
                TaskType::Process => "Process",
            };
            writeln!(
                f,
                "{:<5} {:<8} {:>4}  {:<8} {:>7}",
                row.pid,
                kind,
                row.priority,
                row.status.label(),
                row.entry_count
            )?;
        }
        write!(f, "ready priority: {}", self.total_ready_priority)
    }
}
