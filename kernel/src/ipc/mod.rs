//! Mailbox IPC
//!
//! Named, reference-counted bounded buffers. A process opens a mailbox by
//! name, sends and receives byte messages through its id, and closes it
//! when done. The last close discards whatever is still buffered.
//!
//! ## Operations
//!
//! - `mbox_open(name)`: look up or allocate an entry
//! - `mbox_close(id)`: drop one use, reset the buffer at zero
//! - `mbox_send(id, data)`: block while full, then enqueue (truncated)
//! - `mbox_recv(id, max_len)`: block while empty, then dequeue (truncated)
//!
//! Messages are delivered FIFO per mailbox.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let id = kernel.mbox_open("log")?;
//! kernel.mbox_send(id, b"hello")?;
//! assert_eq!(kernel.mbox_recv(id, 64)?, b"hello");
//! kernel.mbox_close(id)?;
//! ```

mod channel;
mod mailbox;

use core::fmt;

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::kernel::Kernel;
use crate::platform::Platform;
use crate::process::LockHandle;

pub(crate) use channel::Channel;
pub use mailbox::Registry;

/// Mailbox identifier (registry slot index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MailboxId(usize);

impl MailboxId {
    pub const fn new(slot: usize) -> Self {
        Self(slot)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry plus one channel per entry
pub(crate) struct Mailboxes<P: Platform> {
    /// Only locked inside the critical section
    registry: spin::Mutex<Registry>,
    channels: Box<[Channel<P>]>,
}

impl<P: Platform> Mailboxes<P> {
    pub(crate) fn new(config: &KernelConfig) -> Self {
        Self {
            registry: spin::Mutex::new(Registry::new(config.max_mailboxes, config.max_name_len)),
            channels: (0..config.max_mailboxes)
                .map(|_| Channel::new(config.mailbox_capacity, config.max_message_len))
                .collect(),
        }
    }

    pub(crate) fn registry(&self) -> &spin::Mutex<Registry> {
        &self.registry
    }

    pub(crate) fn channel(&self, id: MailboxId) -> Result<&Channel<P>> {
        self.channels
            .get(id.index())
            .ok_or(KernelError::InvalidMailbox { id })
    }
}

impl<P: Platform> Kernel<P> {
    /// Open `name`, creating the mailbox if no open one has that name
    pub fn mbox_open(&self, name: &str) -> Result<MailboxId> {
        let (id, usage) = self.with_registry(|registry| registry.open(name))?;
        log::debug!("mbox '{}' opened as {} (usage {})", name, id, usage);
        Ok(id)
    }

    /// Drop one use of `id`. The last close discards buffered messages;
    /// no task may be blocked on the mailbox at that point.
    pub fn mbox_close(&self, id: MailboxId) -> Result<()> {
        let channel = self.mailboxes().channel(id)?;
        let mut ring = self.waiting_on(LockHandle::Mailbox(id), || channel.lock());

        let remaining = self.with_registry(|registry| {
            let remaining = registry.close(id)?;
            if remaining == 0 {
                channel.reset(&mut ring);
            }
            Ok(remaining)
        })?;
        drop(ring);

        log::debug!("mbox {} closed (usage {})", id, remaining);
        Ok(())
    }

    /// Number of processes holding `id` open
    pub fn mbox_usage_count(&self, id: MailboxId) -> Result<usize> {
        self.with_registry(|registry| registry.usage_count(id))
            .ok_or(KernelError::InvalidMailbox { id })
    }

    /// Whether a send would block right now. Diagnostics only.
    pub fn mbox_is_full(&self, id: MailboxId) -> Result<bool> {
        Ok(self.mailboxes().channel(id)?.is_full())
    }

    /// Messages currently buffered. Diagnostics only.
    pub fn mbox_message_count(&self, id: MailboxId) -> Result<usize> {
        Ok(self.mailboxes().channel(id)?.len())
    }

    /// Enqueue `data`, blocking while the mailbox is full. Messages longer
    /// than the cell size are truncated. Returns the stored length.
    pub fn mbox_send(&self, id: MailboxId, data: &[u8]) -> Result<usize> {
        let channel = self.open_channel(id)?;

        channel.reserve_cell();
        let stored = {
            let mut ring = self.waiting_on(LockHandle::Mailbox(id), || channel.lock());
            channel.write(&mut ring, data)
        };
        channel.publish();

        if stored < data.len() {
            log::trace!("mbox {} send truncated {} -> {} bytes", id, data.len(), stored);
        } else {
            log::trace!("mbox {} send {} bytes", id, stored);
        }
        Ok(stored)
    }

    /// Dequeue the oldest message, blocking while the mailbox is empty.
    /// The message is truncated to `max_len` bytes.
    pub fn mbox_recv(&self, id: MailboxId, max_len: usize) -> Result<Vec<u8>> {
        let channel = self.open_channel(id)?;

        channel.reserve_message();
        let message = {
            let mut ring = self.waiting_on(LockHandle::Mailbox(id), || channel.lock());
            let mut out = vec![0u8; channel.peek_len(&ring).min(max_len)];
            let (len, stored) = channel.read(&mut ring, &mut out);
            self.trace_recv(id, len, stored);
            out
        };
        channel.release_cell();

        Ok(message)
    }

    /// Dequeue the oldest message into `buf`, truncated to its length.
    /// Returns the number of bytes written.
    pub fn mbox_recv_into(&self, id: MailboxId, buf: &mut [u8]) -> Result<usize> {
        let channel = self.open_channel(id)?;

        channel.reserve_message();
        let len = {
            let mut ring = self.waiting_on(LockHandle::Mailbox(id), || channel.lock());
            let (len, stored) = channel.read(&mut ring, buf);
            self.trace_recv(id, len, stored);
            len
        };
        channel.release_cell();

        Ok(len)
    }

    fn open_channel(&self, id: MailboxId) -> Result<&Channel<P>> {
        let channel = self.mailboxes().channel(id)?;
        if !self.with_registry(|registry| registry.is_open(id)) {
            return Err(KernelError::InvalidMailbox { id });
        }
        Ok(channel)
    }

    fn trace_recv(&self, id: MailboxId, len: usize, stored: usize) {
        if len < stored {
            log::trace!("mbox {} recv truncated {} -> {} bytes", id, stored, len);
        } else {
            log::trace!("mbox {} recv {} bytes", id, len);
        }
    }
}
