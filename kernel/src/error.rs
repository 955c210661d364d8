//! Recoverable kernel errors
//!
//! Every variant is reported back to the calling process. Conditions that
//! indicate table corruption do not appear here: they go through
//! [`halt!`](crate::halt) instead.

use alloc::string::String;
use thiserror::Error;

use crate::ipc::MailboxId;
use crate::process::Pid;

/// Error types for process and mailbox operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("Process table full ({capacity} slots)")]
    TableFull { capacity: usize },

    #[error("Program not found: {name}")]
    ProgramNotFound { name: String },

    #[error("Invalid target process: {pid}")]
    InvalidTarget { pid: Pid },

    #[error("Operation not supported on process {pid}")]
    NotSupported { pid: Pid },

    #[error("Mailbox registry full ({capacity} entries)")]
    RegistryFull { capacity: usize },

    #[error("Invalid mailbox: {id}")]
    InvalidMailbox { id: MailboxId },
}

pub type Result<T> = core::result::Result<T, KernelError>;

impl KernelError {
    /// Negative sentinel returned through the syscall layer
    pub const fn errno(&self) -> i32 {
        match self {
            KernelError::ProgramNotFound { .. } => -1,
            KernelError::TableFull { .. } => -2,
            KernelError::InvalidTarget { .. } => -3,
            KernelError::NotSupported { .. } => -4,
            KernelError::RegistryFull { .. } => -5,
            KernelError::InvalidMailbox { .. } => -6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn errno_values_are_negative_and_distinct() {
        let errors = [
            KernelError::ProgramNotFound {
                name: "ghost".to_string(),
            },
            KernelError::TableFull { capacity: 4 },
            KernelError::InvalidTarget { pid: Pid::new(3) },
            KernelError::NotSupported { pid: Pid::new(3) },
            KernelError::RegistryFull { capacity: 2 },
            KernelError::InvalidMailbox {
                id: MailboxId::new(9),
            },
        ];

        for (i, a) in errors.iter().enumerate() {
            assert!(a.errno() < 0);
            for b in &errors[i + 1..] {
                assert_ne!(a.errno(), b.errno());
            }
        }
    }

    #[test]
    fn spawn_codes_match_kernel_convention() {
        assert_eq!(KernelError::TableFull { capacity: 1 }.errno(), -2);
        assert_eq!(
            KernelError::ProgramNotFound {
                name: "x".to_string()
            }
            .errno(),
            -1
        );
    }

    #[test]
    fn messages_name_the_target() {
        let err = KernelError::InvalidTarget { pid: Pid::new(7) };
        assert_eq!(err.to_string(), "Invalid target process: 7");
    }
}
