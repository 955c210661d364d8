//! Kernel instance
//!
//! Owns the process table, the per-slot exit events and the mailbox
//! tables, all sized once from a validated [`KernelConfig`].

use alloc::boxed::Box;

use crate::config::{ConfigError, KernelConfig};
use crate::ipc::{Mailboxes, Registry};
use crate::platform::{CriticalGuard, Platform};
use crate::process::{ExitEvent, ProcessTable, StackLayout};

/// The process/IPC core, generic over its collaborators
pub struct Kernel<P: Platform> {
    config: KernelConfig,
    platform: P,
    stacks: StackLayout,
    /// Only locked inside the critical section
    table: spin::Mutex<ProcessTable>,
    exits: Box<[ExitEvent<P>]>,
    mailboxes: Mailboxes<P>,
}

impl<P: Platform> Kernel<P> {
    /// Build a kernel with empty tables
    pub fn new(config: KernelConfig, platform: P) -> Result<Self, ConfigError> {
        config.validate()?;

        let exits = (0..config.num_pcbs).map(|_| ExitEvent::new()).collect();
        let kernel = Self {
            stacks: StackLayout::from_config(&config.stack),
            table: spin::Mutex::new(ProcessTable::new(config.num_pcbs)),
            exits,
            mailboxes: Mailboxes::new(&config),
            config,
            platform,
        };

        log::debug!(
            "kernel tables ready: {} pcbs, stack window {:#x}..{:#x}",
            kernel.config.num_pcbs,
            kernel.config.stack.base,
            kernel.config.stack.limit
        );
        Ok(kernel)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn stacks(&self) -> &StackLayout {
        &self.stacks
    }

    pub(crate) fn exit_events(&self) -> &[ExitEvent<P>] {
        &self.exits
    }

    pub(crate) fn mailboxes(&self) -> &Mailboxes<P> {
        &self.mailboxes
    }

    /// Run `f` on the process table inside the critical section.
    ///
    /// Must not be nested and `f` must not block.
    pub(crate) fn with_table<R>(&self, f: impl FnOnce(&mut ProcessTable) -> R) -> R {
        let _critical = CriticalGuard::new(self.platform.critical_section());
        let mut table = self.table.lock();
        f(&mut table)
    }

    /// Run `f` on the mailbox registry inside the critical section.
    ///
    /// Same rules as [`with_table`](Self::with_table).
    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let _critical = CriticalGuard::new(self.platform.critical_section());
        let mut registry = self.mailboxes.registry().lock();
        f(&mut registry)
    }
}
