//! Stack regions
//!
//! Every slot owns two fixed-size regions in the stack window: a kernel
//! stack and a user stack. The layout is a pure function of the pid and the
//! region, so no allocator state exists and two distinct `(pid, region)`
//! pairs can never overlap:
//!
//! ```text
//! base                                                             limit
//!  │ pid 0 kernel │ pid 0 user │ pid 1 kernel │ pid 1 user │ ... │
//!  └──── size ────┘
//! ```
//!
//! Stacks grow down, so the value handed to a task is the region's top.

use core::ops::Range;

use crate::config::StackConfig;
use crate::halt;
use crate::process::Pid;

/// Which of a slot's two regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackRegion {
    Kernel = 0,
    User = 1,
}

/// Stack window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    base: usize,
    size: usize,
    limit: usize,
}

impl StackLayout {
    pub const fn new(base: usize, size: usize, limit: usize) -> Self {
        Self { base, size, limit }
    }

    pub const fn from_config(config: &StackConfig) -> Self {
        Self::new(config.base, config.size, config.limit)
    }

    /// Initial stack pointer (region top) for `pid`'s `region`.
    ///
    /// Halts if the top lies past the reserved window: that means the
    /// table is configured larger than the window allows.
    pub fn stack_top(&self, pid: Pid, region: StackRegion) -> usize {
        match self.checked_top(pid, region) {
            Some(top) => top,
            None => halt!(
                "stack for pid {} ({:?}) exceeds window limit {:#x}",
                pid,
                region,
                self.limit
            ),
        }
    }

    /// Address range `[top - size, top)` of a region
    pub fn region(&self, pid: Pid, region: StackRegion) -> Range<usize> {
        let top = self.stack_top(pid, region);
        (top - self.size)..top
    }

    /// Number of slots whose both regions fit in the window
    pub fn max_slots(&self) -> usize {
        if self.size == 0 || self.limit <= self.base {
            return 0;
        }
        (self.limit - self.base) / (2 * self.size)
    }

    fn checked_top(&self, pid: Pid, region: StackRegion) -> Option<usize> {
        let index = pid.index().checked_mul(2)?.checked_add(region as usize)?;
        let top = index
            .checked_add(1)?
            .checked_mul(self.size)?
            .checked_add(self.base)?;
        (top <= self.limit).then_some(top)
    }
}

impl Default for StackLayout {
    fn default() -> Self {
        Self::from_config(&StackConfig::default())
    }
}
