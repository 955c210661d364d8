//! Hosted platform
//!
//! Runs the core on a host OS for tests and the simulator. Each task is an
//! OS thread; locks, semaphores and conditions block the thread; the
//! critical section is a reentrant process-wide mutex per platform
//! instance.
//!
//! ```rust,ignore
//! let platform = Hosted::new();
//! platform.loader().register("init", |kernel, launch| {
//!     log::info!("init running as pid {}", launch.pid);
//! });
//! let kernel = Arc::new(Kernel::new(KernelConfig::default(), platform)?);
//! let pid = kernel.boot("init")?;
//! hosted::run(&kernel);
//! ```

mod loader;
mod scheduler;
mod sync;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use loader::{HostedLoader, Program};
pub use scheduler::HostedScheduler;
pub use sync::{HostedCondition, HostedCriticalSection, HostedLock, HostedSemaphore};

use crate::kernel::Kernel;
use crate::platform::{CriticalSection, Platform};
use crate::process::{Pid, ProcessStatus};

/// How often [`run`] looks for newly spawned tasks
const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct Hosted {
    critical: HostedCriticalSection,
    scheduler: HostedScheduler,
    loader: HostedLoader,
    boot: Instant,
}

impl Hosted {
    pub fn new() -> Self {
        Self::with_loader(HostedLoader::new())
    }

    pub fn with_loader(loader: HostedLoader) -> Self {
        Self {
            critical: HostedCriticalSection::default(),
            scheduler: HostedScheduler::new(),
            loader,
            boot: Instant::now(),
        }
    }
}

impl Default for Hosted {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for Hosted {
    type Critical = HostedCriticalSection;
    type Scheduler = HostedScheduler;
    type Loader = HostedLoader;
    type Lock = HostedLock;
    type Semaphore = HostedSemaphore;
    type Condition = HostedCondition;

    fn critical_section(&self) -> &HostedCriticalSection {
        &self.critical
    }

    fn scheduler(&self) -> &HostedScheduler {
        &self.scheduler
    }

    fn loader(&self) -> &HostedLoader {
        &self.loader
    }

    /// Milliseconds since the platform was created
    fn ticks(&self) -> u64 {
        u64::try_from(self.boot.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Run `pid` on a new thread, the way the switch routine would run a
/// FirstTime task: bind it as current, enter the critical section and go
/// through the trampoline. When the program body returns the task exits,
/// unless it already did.
pub fn start(kernel: &Arc<Kernel<Hosted>>, pid: Pid) -> JoinHandle<()> {
    let kernel = Arc::clone(kernel);
    thread::spawn(move || {
        let platform = kernel.platform();
        platform.scheduler().set_current(Some(pid));
        let generation = kernel.pcb(pid).map(|pcb| pcb.generation());

        platform.critical_section().enter();
        kernel.first_entry(|launch| match platform.loader().program(launch.entry_point) {
            Some(program) => program(&kernel, launch),
            None => log::warn!("pid {}: nothing loaded at {}", pid, launch.entry_point),
        });

        let still_running = kernel
            .pcb(pid)
            .is_some_and(|pcb| Some(pcb.generation()) == generation);
        if still_running {
            if let Err(err) = kernel.exit(pid) {
                log::warn!("pid {}: exit after return failed: {}", pid, err);
            }
        }
        platform.scheduler().set_current(None);
    })
}

/// Drive the kernel until no task is live.
///
/// Stands in for the scheduler's first switch: every FirstTime task that
/// shows up on the ready queue is started on its own thread. Returns the
/// number of tasks started.
pub fn run(kernel: &Arc<Kernel<Hosted>>) -> usize {
    let mut started: HashSet<(Pid, u64)> = HashSet::new();
    let mut threads = Vec::new();

    loop {
        // Sampled before the scan so a child spawned by a task that then
        // finished is still seen below.
        let idle = threads.iter().all(JoinHandle::is_finished);
        let mut launched = false;
        for pid in kernel.platform().scheduler().ready_queue() {
            let Some(pcb) = kernel.pcb(pid) else { continue };
            if pcb.status() == ProcessStatus::FirstTime && started.insert((pid, pcb.generation())) {
                threads.push(start(kernel, pid));
                launched = true;
            }
        }

        if kernel.live_count() == 0 {
            break;
        }
        if idle && !launched {
            log::warn!("{} task(s) live with no running thread", kernel.live_count());
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    for handle in threads {
        if handle.join().is_err() {
            log::error!("task thread panicked");
        }
    }
    started.len()
}
