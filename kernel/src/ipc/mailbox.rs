//! Mailbox registry
//!
//! Maps names to mailbox ids with a usage count per entry. An entry with a
//! zero count is free and may be handed out under a different name.
//!
//! The registry only tracks names and counts; buffers live in
//! [`Channel`](super::channel::Channel). The kernel reaches it through
//! `with_registry`, i.e. inside the critical section.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{KernelError, Result};
use crate::ipc::MailboxId;

#[derive(Debug, Default)]
struct Entry {
    name: String,
    usage_count: usize,
}

pub struct Registry {
    entries: Vec<Entry>,
    max_name_len: usize,
}

impl Registry {
    pub fn new(capacity: usize, max_name_len: usize) -> Self {
        Self {
            entries: (0..capacity).map(|_| Entry::default()).collect(),
            max_name_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Open `name`, allocating a free entry if no open entry has it.
    ///
    /// Returns the id and its usage count after the open.
    pub fn open(&mut self, name: &str) -> Result<(MailboxId, usize)> {
        let name = bounded(name, self.max_name_len);

        if let Some(slot) = self
            .entries
            .iter()
            .position(|entry| entry.usage_count > 0 && entry.name == name)
        {
            let entry = &mut self.entries[slot];
            entry.usage_count += 1;
            return Ok((MailboxId::new(slot), entry.usage_count));
        }

        let slot = self
            .entries
            .iter()
            .position(|entry| entry.usage_count == 0)
            .ok_or(KernelError::RegistryFull {
                capacity: self.capacity(),
            })?;

        let entry = &mut self.entries[slot];
        entry.name.clear();
        entry.name.push_str(name);
        entry.usage_count = 1;
        Ok((MailboxId::new(slot), 1))
    }

    /// Drop one use of `id`. Returns the remaining count; at zero the entry
    /// is free again.
    pub fn close(&mut self, id: MailboxId) -> Result<usize> {
        let entry = self
            .entries
            .get_mut(id.index())
            .filter(|entry| entry.usage_count > 0)
            .ok_or(KernelError::InvalidMailbox { id })?;

        entry.usage_count -= 1;
        if entry.usage_count == 0 {
            entry.name.clear();
        }
        Ok(entry.usage_count)
    }

    /// Usage count of `id`, `None` if out of range
    pub fn usage_count(&self, id: MailboxId) -> Option<usize> {
        self.entries.get(id.index()).map(|entry| entry.usage_count)
    }

    pub fn is_open(&self, id: MailboxId) -> bool {
        self.usage_count(id).is_some_and(|count| count > 0)
    }

    /// Name of an open entry
    pub fn name(&self, id: MailboxId) -> Option<&str> {
        self.entries
            .get(id.index())
            .filter(|entry| entry.usage_count > 0)
            .map(|entry| entry.name.as_str())
    }

    /// Ids of every open entry
    pub fn open_ids(&self) -> impl Iterator<Item = MailboxId> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.usage_count > 0)
            .map(|(slot, _)| MailboxId::new(slot))
    }
}

/// `name` cut to at most `max` bytes, on a char boundary
fn bounded(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
