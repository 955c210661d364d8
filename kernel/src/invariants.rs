//! Runtime-checkable table invariants
//!
//! Used by tests and the simulator after a run. A violation means table
//! corruption; production paths halt on the same conditions instead of
//! checking after the fact.
//!
//! 1. **Pid identity**: every slot's pid is its index
//! 2. **Stack disjointness**: live stack regions lie in the window and never
//!    overlap
//! 3. **Ready priority**: the counter equals the sum over ready PCBs
//! 4. **Mailbox bound**: no channel buffers more than its capacity
//! 5. **Mailbox counts**: the `full` semaphore equals the buffered message
//!    count and `full + empty` equals the capacity
//! 6. **Mailbox names**: open entries have distinct names
//!
//! Mailbox counts are only exact while no send or receive is between its
//! semaphore wait and its paired signal, so check at a quiescent point.

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;

use thiserror::Error;

use crate::ipc::MailboxId;
use crate::kernel::Kernel;
use crate::platform::Platform;
use crate::process::Pid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("Slot {slot} holds pid {pid}")]
    PidMismatch { slot: usize, pid: Pid },

    #[error("Stack {region:#x?} of pid {pid} lies outside the stack window")]
    StackOutOfWindow { pid: Pid, region: Range<usize> },

    #[error("Stacks of pid {first} and pid {second} overlap")]
    StackOverlap { first: Pid, second: Pid },

    #[error("Ready priority counter is {counter}, ready PCBs sum to {actual}")]
    ReadyPriorityMismatch { counter: u64, actual: u64 },

    #[error("Mailbox {id} buffers {count} messages, capacity is {capacity}")]
    MailboxOverflow {
        id: MailboxId,
        count: usize,
        capacity: usize,
    },

    #[error("Mailbox {id} buffers {count} messages but counts full={full} empty={empty} (capacity {capacity})")]
    MailboxCountMismatch {
        id: MailboxId,
        count: usize,
        full: usize,
        empty: usize,
        capacity: usize,
    },

    #[error("Mailboxes {first} and {second} are both open as '{name}'")]
    DuplicateMailboxName {
        first: MailboxId,
        second: MailboxId,
        name: String,
    },
}

impl<P: Platform> Kernel<P> {
    /// Check every invariant; returns all violations found
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        violations.extend(self.check_process_table());
        violations.extend(self.check_mailboxes());
        violations
    }

    fn check_process_table(&self) -> Vec<InvariantViolation> {
        let stack_size = self.config().stack.size;
        let window = self.config().stack.base..self.config().stack.limit;

        self.with_table(|table| {
            let mut violations = Vec::new();
            let mut regions: Vec<(Range<usize>, Pid)> = Vec::new();

            for (slot, pcb) in table.iter().enumerate() {
                if pcb.pid().index() != slot {
                    violations.push(InvariantViolation::PidMismatch { slot, pid: pcb.pid() });
                }
                if !pcb.status().is_live() {
                    continue;
                }

                let tops = core::iter::once(pcb.kernel_stack()).chain(pcb.user_stack());
                for top in tops {
                    let region = top.saturating_sub(stack_size)..top;
                    if region.start < window.start || region.end > window.end {
                        violations.push(InvariantViolation::StackOutOfWindow {
                            pid: pcb.pid(),
                            region: region.clone(),
                        });
                    }
                    regions.push((region, pcb.pid()));
                }
            }

            regions.sort_by_key(|(region, _)| region.start);
            for pair in regions.windows(2) {
                let ((a, first), (b, second)) = (&pair[0], &pair[1]);
                if a.end > b.start {
                    violations.push(InvariantViolation::StackOverlap {
                        first: *first,
                        second: *second,
                    });
                }
            }

            let actual = table.ready_priority_sum();
            if actual != table.total_ready_priority() {
                violations.push(InvariantViolation::ReadyPriorityMismatch {
                    counter: table.total_ready_priority(),
                    actual,
                });
            }

            violations
        })
    }

    fn check_mailboxes(&self) -> Vec<InvariantViolation> {
        let capacity = self.config().mailbox_capacity;
        let mut violations = Vec::new();

        for slot in 0..self.config().max_mailboxes {
            let id = MailboxId::new(slot);
            let Ok(channel) = self.mailboxes().channel(id) else { continue };

            let count = channel.len();
            if count > capacity {
                violations.push(InvariantViolation::MailboxOverflow { id, count, capacity });
            }

            let (full, empty) = (channel.stored(), channel.free());
            if full != count || full + empty != capacity {
                violations.push(InvariantViolation::MailboxCountMismatch {
                    id,
                    count,
                    full,
                    empty,
                    capacity,
                });
            }
        }

        self.with_registry(|registry| {
            let open: Vec<MailboxId> = registry.open_ids().collect();
            for (i, &first) in open.iter().enumerate() {
                for &second in &open[i + 1..] {
                    if let (Some(a), Some(b)) = (registry.name(first), registry.name(second)) {
                        if a == b {
                            violations.push(InvariantViolation::DuplicateMailboxName {
                                first,
                                second,
                                name: String::from(a),
                            });
                        }
                    }
                }
            }
        });

        violations
    }
}
