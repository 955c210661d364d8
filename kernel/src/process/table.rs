//! Process table
//!
//! A fixed arena of PCBs indexed by pid, plus the total ready priority.
//! All methods assume the caller holds the critical section; the kernel
//! only reaches the table through its critical-section guard.

use alloc::vec::Vec;

use crate::halt;
use crate::ksched_trace;
use crate::process::{Pcb, Pid, ProcessStatus};

pub struct ProcessTable {
    pcbs: Vec<Pcb>,
    /// Sum of `priority` over PCBs on the ready queue
    total_ready_priority: u64,
}

impl ProcessTable {
    /// A table of `capacity` slots, all Exited
    pub fn new(capacity: usize) -> Self {
        Self {
            pcbs: (0..capacity).map(|slot| Pcb::exited(Pid::new(slot))).collect(),
            total_ready_priority: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.pcbs.len()
    }

    #[inline]
    pub fn total_ready_priority(&self) -> u64 {
        self.total_ready_priority
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.pcbs.get(pid.index())
    }

    pub(crate) fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.pcbs.get_mut(pid.index())
    }

    /// A live (non-Exited) PCB
    pub fn live(&self, pid: Pid) -> Option<&Pcb> {
        self.get(pid).filter(|pcb| pcb.status.is_live())
    }

    pub(crate) fn live_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.get_mut(pid).filter(|pcb| pcb.status.is_live())
    }

    /// Generation of `pid` if the slot is live
    pub fn live_generation(&self, pid: Pid) -> Option<u64> {
        self.live(pid).map(|pcb| pcb.generation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.pcbs.iter()
    }

    pub fn live_count(&self) -> usize {
        self.pcbs.iter().filter(|pcb| pcb.status.is_live()).count()
    }

    /// First-fit search for a free slot
    pub fn find_free(&self) -> Option<Pid> {
        self.pcbs
            .iter()
            .position(|pcb| pcb.status == ProcessStatus::Exited)
            .map(Pid::new)
    }

    /// Next generation number for a slot about to be reused
    pub(crate) fn next_generation(&self, pid: Pid) -> u64 {
        self.get(pid).map_or(1, |pcb| pcb.generation + 1)
    }

    /// Install a freshly built PCB into its slot.
    ///
    /// The slot must be Exited: anything else means two live PCBs would
    /// share one pid, which is table corruption.
    pub(crate) fn install(&mut self, pcb: Pcb) {
        let pid = pcb.pid;
        let priority = pcb.priority;
        let ready = pcb.status.is_ready();

        match self.pcbs.get_mut(pid.index()) {
            Some(slot) if slot.status == ProcessStatus::Exited => *slot = pcb,
            Some(slot) => halt!(
                "duplicate allocation of pid {} (slot is {:?})",
                pid,
                slot.status
            ),
            None => halt!("pid {} outside process table", pid),
        }

        if ready {
            self.total_ready_priority += u64::from(priority);
        }
    }

    /// Move a live PCB to `status`, keeping the ready priority in step.
    /// Returns the previous status, or `None` if the slot is not live.
    pub(crate) fn set_status(&mut self, pid: Pid, status: ProcessStatus) -> Option<ProcessStatus> {
        let pcb = self.pcbs.get_mut(pid.index()).filter(|pcb| pcb.status.is_live())?;
        let previous = pcb.status;
        let priority = u64::from(pcb.priority);
        pcb.status = status;

        match (previous.is_ready(), status.is_ready()) {
            (true, false) => self.total_ready_priority -= priority,
            (false, true) => self.total_ready_priority += priority,
            _ => {}
        }

        ksched_trace!("pid {}: {:?} -> {:?}", pid, previous, status);
        Some(previous)
    }

    /// Change a live PCB's priority. Returns the old priority.
    pub(crate) fn set_priority(&mut self, pid: Pid, priority: u32) -> Option<u32> {
        let pcb = self.pcbs.get_mut(pid.index()).filter(|pcb| pcb.status.is_live())?;
        let previous = pcb.priority;
        pcb.priority = priority;

        if pcb.status.is_ready() {
            self.total_ready_priority = self.total_ready_priority - u64::from(previous)
                + u64::from(priority);
        }
        Some(previous)
    }

    /// Return a live slot to Exited. Returns the status it had.
    pub(crate) fn release(&mut self, pid: Pid) -> Option<ProcessStatus> {
        let previous = self.set_status(pid, ProcessStatus::Exited)?;
        if let Some(pcb) = self.pcbs.get_mut(pid.index()) {
            pcb.waiting_for_lock = None;
        }
        Some(previous)
    }

    /// Recompute the ready priority from scratch
    pub fn ready_priority_sum(&self) -> u64 {
        self.pcbs
            .iter()
            .filter(|pcb| pcb.status.is_ready())
            .map(|pcb| u64::from(pcb.priority))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{EntryPoint, TaskType};

    fn spawned(pid: usize, generation: u64) -> Pcb {
        Pcb::first_time(
            Pid::new(pid),
            generation,
            TaskType::Process,
            EntryPoint(0x8000),
            0x10_1000,
            Some(0x10_2000),
        )
    }

    #[test]
    fn new_table_is_empty() {
        let table = ProcessTable::new(4);
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.find_free(), Some(Pid::new(0)));
        assert_eq!(table.total_ready_priority(), 0);
    }

    #[test]
    fn first_fit_reuses_lowest_slot() {
        let mut table = ProcessTable::new(3);
        table.install(spawned(0, 1));
        table.install(spawned(1, 1));
        assert_eq!(table.find_free(), Some(Pid::new(2)));

        table.release(Pid::new(0));
        assert_eq!(table.find_free(), Some(Pid::new(0)));
        assert_eq!(table.next_generation(Pid::new(0)), 2);
    }

    #[test]
    fn ready_priority_tracks_transitions() {
        let mut table = ProcessTable::new(2);
        table.install(spawned(0, 1));
        table.install(spawned(1, 1));
        assert_eq!(table.total_ready_priority(), 2);

        table.set_priority(Pid::new(1), 5);
        assert_eq!(table.total_ready_priority(), 6);

        table.set_status(Pid::new(1), ProcessStatus::Blocked);
        assert_eq!(table.total_ready_priority(), 1);

        // Priority changes while blocked do not touch the ready total.
        table.set_priority(Pid::new(1), 3);
        assert_eq!(table.total_ready_priority(), 1);

        table.set_status(Pid::new(1), ProcessStatus::Ready);
        assert_eq!(table.total_ready_priority(), 4);

        table.release(Pid::new(0));
        assert_eq!(table.total_ready_priority(), 3);
        assert_eq!(table.total_ready_priority(), table.ready_priority_sum());
    }

    #[test]
    fn exited_slots_reject_transitions() {
        let mut table = ProcessTable::new(1);
        assert_eq!(table.set_status(Pid::new(0), ProcessStatus::Ready), None);
        assert_eq!(table.release(Pid::new(0)), None);
        assert_eq!(table.set_priority(Pid::new(0), 2), None);
    }

    #[test]
    #[should_panic(expected = "duplicate allocation")]
    fn duplicate_install_halts() {
        let mut table = ProcessTable::new(1);
        table.install(spawned(0, 1));
        table.install(spawned(0, 2));
    }
}
