//! Kernel configuration
//!
//! Compile-time defaults for the fixed tables, plus [`KernelConfig`] which
//! carries the same values at construction time so hosted builds and the
//! simulator can size the tables from a configuration file.
//!
//! The tables never grow after [`Kernel::new`](crate::Kernel::new): a
//! configuration only chooses their fixed size.

use static_assertions::const_assert;
use thiserror::Error;

use crate::process::StackLayout;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of process control blocks
pub const NUM_PCBS: usize = 128;

/// Number of mailbox registry entries
pub const MAX_MBOXEN: usize = 32;

/// Messages a mailbox holds before senders block
pub const MAX_MBOX_LENGTH: usize = 32;

/// Largest message a mailbox cell stores (longer sends are truncated)
pub const MAX_MESSAGE_LENGTH: usize = 256;

/// Longest mailbox name compared or stored
pub const MBOX_NAME_LENGTH: usize = 32;

/// Lowest address of the stack window
pub const STACK_BASE: usize = 0x10_0000;

/// Size of a single stack region
pub const STACK_SIZE: usize = 0x1000;

/// End of the reserved stack window (inclusive bound for a stack top)
pub const STACK_LIMIT: usize = 0x20_0000;

/// Priority of a freshly spawned task
pub const DEFAULT_PRIORITY: u32 = 1;

// Every slot owns a kernel and a user region.
const_assert!(STACK_BASE + 2 * NUM_PCBS * STACK_SIZE <= STACK_LIMIT);
const_assert!(MAX_MBOX_LENGTH > 0);
const_assert!(MBOX_NAME_LENGTH > 0);

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Field {field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("Stack window too small: {num_pcbs} slots need up to {required:#x}, limit is {limit:#x}")]
    StackWindowExceeded {
        num_pcbs: usize,
        required: usize,
        limit: usize,
    },

    #[error("Stack base {base:#x} is not below limit {limit:#x}")]
    InvalidStackWindow { base: usize, limit: usize },
}

/// Stack window layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct StackConfig {
    pub base: usize,
    pub size: usize,
    pub limit: usize,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            base: STACK_BASE,
            size: STACK_SIZE,
            limit: STACK_LIMIT,
        }
    }
}

/// Table sizes and layout for one kernel instance
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct KernelConfig {
    /// Process table capacity (N)
    pub num_pcbs: usize,

    /// Mailbox registry capacity (M)
    pub max_mailboxes: usize,

    /// Messages per mailbox (K); the ring has K + 1 cells
    pub mailbox_capacity: usize,

    /// Maximum stored message length in bytes
    pub max_message_len: usize,

    /// Maximum mailbox name length in bytes
    pub max_name_len: usize,

    /// Stack window
    pub stack: StackConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            num_pcbs: NUM_PCBS,
            max_mailboxes: MAX_MBOXEN,
            mailbox_capacity: MAX_MBOX_LENGTH,
            max_message_len: MAX_MESSAGE_LENGTH,
            max_name_len: MBOX_NAME_LENGTH,
            stack: StackConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Check that every table is non-empty and that the stack window can
    /// hold a kernel and a user region for every slot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("num_pcbs", self.num_pcbs),
            ("max_mailboxes", self.max_mailboxes),
            ("mailbox_capacity", self.mailbox_capacity),
            ("max_message_len", self.max_message_len),
            ("max_name_len", self.max_name_len),
            ("stack.size", self.stack.size),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        if self.stack.base >= self.stack.limit {
            return Err(ConfigError::InvalidStackWindow {
                base: self.stack.base,
                limit: self.stack.limit,
            });
        }

        if self.num_pcbs > StackLayout::from_config(&self.stack).max_slots() {
            // Highest stack top the table would need: the user region of
            // the last slot.
            let required = self
                .num_pcbs
                .checked_mul(2)
                .and_then(|regions| regions.checked_mul(self.stack.size))
                .and_then(|span| span.checked_add(self.stack.base))
                .unwrap_or(usize::MAX);
            return Err(ConfigError::StackWindowExceeded {
                num_pcbs: self.num_pcbs,
                required,
                limit: self.stack.limit,
            });
        }

        Ok(())
    }
}
