//! Program registry standing in for the ramdisk loader

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::kernel::Kernel;
use crate::platform::ProgramLoader;
use crate::process::{EntryPoint, Launch};

use super::Hosted;

/// Body of a hosted program. Runs on the task's thread after its first
/// entry; returning ends the task.
pub type Program = Arc<dyn Fn(&Kernel<Hosted>, Launch) + Send + Sync>;

/// Spacing of synthetic entry points
const ENTRY_STRIDE: usize = 0x1000;

#[derive(Default)]
struct Catalog {
    entries: BTreeMap<String, EntryPoint>,
    programs: BTreeMap<usize, Program>,
}

#[derive(Default)]
pub struct HostedLoader {
    catalog: Mutex<Catalog>,
}

impl HostedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `name` with a program body. Returns its entry point.
    pub fn register<F>(&self, name: &str, program: F) -> EntryPoint
    where
        F: Fn(&Kernel<Hosted>, Launch) + Send + Sync + 'static,
    {
        let mut catalog = self.catalog();
        let entry = EntryPoint((catalog.programs.len() + 1) * ENTRY_STRIDE);
        catalog.entries.insert(name.to_string(), entry);
        catalog.programs.insert(entry.0, Arc::new(program));
        entry
    }

    /// Register `name` at a fixed entry point with no body
    pub fn register_entry(&self, name: &str, entry: EntryPoint) {
        self.catalog().entries.insert(name.to_string(), entry);
    }

    /// Body registered at `entry`
    pub fn program(&self, entry: EntryPoint) -> Option<Program> {
        self.catalog().programs.get(&entry.0).cloned()
    }
}

impl ProgramLoader for HostedLoader {
    fn resolve(&self, name: &str) -> Option<EntryPoint> {
        self.catalog().entries.get(name).copied()
    }
}
