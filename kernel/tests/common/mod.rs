//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use segos_kernel::hosted::Hosted;
use segos_kernel::{EntryPoint, Kernel, KernelConfig, Pid, Platform};

/// Route kernel logs through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small tables, default mailbox geometry
pub fn small_config() -> KernelConfig {
    KernelConfig {
        num_pcbs: 4,
        max_mailboxes: 4,
        ..KernelConfig::default()
    }
}

/// A kernel whose loader knows `init` and `worker` (no bodies)
pub fn kernel(config: KernelConfig) -> Arc<Kernel<Hosted>> {
    init_logging();
    let platform = Hosted::new();
    platform.loader().register_entry("init", EntryPoint(0x1_0000));
    platform.loader().register_entry("worker", EntryPoint(0x2_0000));
    Arc::new(Kernel::new(config, platform).expect("valid config"))
}

/// Poll `condition` for up to five seconds
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Grace period for a thread to reach a blocking call
pub fn settle() {
    thread::sleep(Duration::from_millis(50));
}

/// How long a blocked operation must stay blocked
pub const BLOCKED: Duration = Duration::from_millis(100);

/// Upper bound for an unblocked operation to finish
pub const PROMPT: Duration = Duration::from_secs(5);

pub fn pids(kernel: &Kernel<Hosted>) -> Vec<Pid> {
    kernel.status_report().rows.iter().map(|row| row.pid).collect()
}
