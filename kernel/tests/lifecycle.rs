//! Integration tests for the process lifecycle
//!
//! These tests drive the core through the hosted platform:
//! - spawn / exit bookkeeping and the ready-priority counter
//! - wait blocking until the target exits
//! - first entry through the trampoline on a real thread
//! - scheduler hooks (block, unblock, priority, context)

mod common;

use std::num::NonZeroU32;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{eventually, kernel, pids, settle, small_config, BLOCKED, PROMPT};
use segos_kernel::hosted::{self, Hosted};
use segos_kernel::platform::CriticalSection;
use segos_kernel::{
    ConfigError, EntryPoint, Kernel, KernelConfig, KernelError, Launch, LockHandle, Pid, Platform,
    ProcessStatus, SavedContext, StackRegion, TaskType,
};

/// Spawning into a full table fails and changes nothing
#[test]
fn test_spawn_when_full_leaves_table_unchanged() {
    let kernel = kernel(small_config());
    for _ in 0..4 {
        kernel.spawn("worker").unwrap();
    }
    let before = kernel.status_report();
    let queue_before = kernel.platform().scheduler().ready_queue();

    assert_eq!(
        kernel.spawn("worker"),
        Err(KernelError::TableFull { capacity: 4 })
    );
    assert_eq!(kernel.status_report(), before);
    assert_eq!(kernel.platform().scheduler().ready_queue(), queue_before);
}

/// A failed load must not consume a slot
#[test]
fn test_spawn_unknown_program_allocates_nothing() {
    let kernel = kernel(small_config());
    assert_eq!(
        kernel.spawn("ghost"),
        Err(KernelError::ProgramNotFound {
            name: "ghost".to_string()
        })
    );
    assert_eq!(kernel.live_count(), 0);
    assert_eq!(kernel.total_ready_priority(), 0);
    assert_eq!(kernel.spawn("worker"), Ok(Pid::new(0)));
}

/// A spawned process is FirstTime, queued, and owns its two stacks
#[test]
fn test_spawn_initializes_pcb() {
    let kernel = kernel(small_config());
    kernel.spawn("init").unwrap();
    let pid = kernel.spawn("worker").unwrap();
    assert_eq!(pid, Pid::new(1));

    let pcb = kernel.pcb(pid).unwrap();
    let stacks = kernel.stacks();
    assert_eq!(pcb.status(), ProcessStatus::FirstTime);
    assert_eq!(pcb.task_type(), TaskType::Process);
    assert_eq!(pcb.priority(), 1);
    assert_eq!(pcb.nested_count(), 0);
    assert_eq!(pcb.entry_point(), EntryPoint(0x2_0000));
    assert_eq!(pcb.kernel_stack(), stacks.stack_top(pid, StackRegion::Kernel));
    assert_eq!(pcb.user_stack(), Some(stacks.stack_top(pid, StackRegion::User)));
    assert_eq!(pcb.kernel_stack(), 0x10_3000);
    assert_eq!(
        pcb.context(),
        SavedContext::FirstEntry {
            kernel_stack: 0x10_3000
        }
    );

    assert_eq!(
        kernel.platform().scheduler().ready_queue(),
        vec![Pid::new(0), pid]
    );
    assert_eq!(kernel.total_ready_priority(), 2);
}

/// Kernel threads get a kernel stack only and start nested
#[test]
fn test_spawn_kernel_thread() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn_kernel_thread(EntryPoint(0x4000)).unwrap();
    let pcb = kernel.pcb(pid).unwrap();
    assert_eq!(pcb.task_type(), TaskType::KernelThread);
    assert_eq!(pcb.user_stack(), None);
    assert_eq!(pcb.nested_count(), 1);
}

/// Exit frees the slot, dequeues it and drops its priority
#[test]
fn test_exit_releases_slot() {
    let kernel = kernel(small_config());
    let a = kernel.spawn("worker").unwrap();
    let b = kernel.spawn("worker").unwrap();
    kernel.set_priority(b, NonZeroU32::new(5).unwrap()).unwrap();
    assert_eq!(kernel.total_ready_priority(), 6);

    kernel.exit(b).unwrap();
    assert_eq!(kernel.pcb(b), None);
    assert_eq!(kernel.total_ready_priority(), 1);
    assert_eq!(kernel.platform().scheduler().ready_queue(), vec![a]);

    assert_eq!(kernel.exit(b), Err(KernelError::InvalidTarget { pid: b }));
    assert_eq!(
        kernel.exit(Pid::new(99)),
        Err(KernelError::InvalidTarget { pid: Pid::new(99) })
    );
}

/// Run `pid`'s first entry on this thread without starting a body
fn enter_first_time(kernel: &Kernel<Hosted>, pid: Pid) {
    kernel.platform().scheduler().set_current(Some(pid));
    kernel.platform().critical_section().enter();
    kernel.first_entry(|_| ());
    kernel.platform().scheduler().set_current(None);
}

/// Random spawn/exit/priority/block sequences keep the tables consistent
#[test]
fn test_random_sequences_keep_invariants() {
    let kernel = kernel(KernelConfig {
        num_pcbs: 8,
        ..KernelConfig::default()
    });

    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as usize
    };

    for _ in 0..500 {
        let live = pids(&kernel);
        match next() % 5 {
            0 | 1 => {
                let _ = kernel.spawn("worker");
            }
            2 if !live.is_empty() => {
                kernel.exit(live[next() % live.len()]).unwrap();
            }
            3 if !live.is_empty() => {
                let pid = live[next() % live.len()];
                let priority = NonZeroU32::new((next() % 9 + 1) as u32).unwrap();
                kernel.set_priority(pid, priority).unwrap();
            }
            4 if !live.is_empty() => {
                let pid = live[next() % live.len()];
                match kernel.pcb(pid).unwrap().status() {
                    ProcessStatus::Blocked => kernel.unblock(pid).unwrap(),
                    ProcessStatus::FirstTime => {
                        assert_eq!(kernel.block(pid), Err(KernelError::InvalidTarget { pid }));
                        enter_first_time(&kernel, pid);
                    }
                    _ => kernel.block(pid).unwrap(),
                }
            }
            _ => {}
        }

        assert_eq!(kernel.check_invariants(), vec![]);
        let report = kernel.status_report();
        let ready_sum: u64 = report
            .rows
            .iter()
            .filter(|row| row.status.is_ready())
            .map(|row| u64::from(row.priority))
            .sum();
        assert_eq!(report.total_ready_priority, ready_sum);

        let mut queued = kernel.platform().scheduler().ready_queue();
        queued.sort();
        let mut ready: Vec<Pid> = report
            .rows
            .iter()
            .filter(|row| row.status.is_ready())
            .map(|row| row.pid)
            .collect();
        ready.sort();
        assert_eq!(queued, ready);
    }
}

/// wait returns only once the target has exited
#[test]
fn test_wait_returns_after_target_exits() {
    let kernel = kernel(small_config());
    let target = kernel.spawn("worker").unwrap();

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let kernel = Arc::clone(&kernel);
        thread::spawn(move || {
            let result = kernel.wait(target);
            tx.send((result, kernel.pcb(target).is_none())).unwrap();
        })
    };

    assert!(rx.recv_timeout(BLOCKED).is_err(), "wait returned early");
    kernel.exit(target).unwrap();

    let (result, target_gone) = rx.recv_timeout(PROMPT).unwrap();
    assert_eq!(result, Ok(()));
    assert!(target_gone);
    waiter.join().unwrap();
}

/// Every waiter on one target is woken by its exit
#[test]
fn test_exit_wakes_all_waiters() {
    let kernel = kernel(small_config());
    let target = kernel.spawn("worker").unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.wait(target))
        })
        .collect();

    settle();
    kernel.exit(target).unwrap();
    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), Ok(()));
    }
}

/// Invalid targets are rejected without blocking
#[test]
fn test_wait_on_exited_or_invalid_pid() {
    let kernel = kernel(small_config());
    let exited = Pid::new(2);
    let out_of_range = Pid::new(4);
    assert_eq!(kernel.wait(exited), Err(KernelError::InvalidTarget { pid: exited }));
    assert_eq!(
        kernel.wait(out_of_range),
        Err(KernelError::InvalidTarget { pid: out_of_range })
    );
}

/// A process cannot wait for itself
#[test]
fn test_wait_on_self() {
    let kernel = kernel(small_config());
    let me = kernel.spawn("worker").unwrap();
    kernel.platform().scheduler().set_current(Some(me));
    assert_eq!(kernel.wait(me), Err(KernelError::InvalidTarget { pid: me }));
    kernel.platform().scheduler().set_current(None);
}

/// A waiter records what it is blocked on, and is not fooled when the
/// target's slot is reused straight away
#[test]
fn test_wait_survives_slot_reuse() {
    let kernel = kernel(small_config());
    let target = kernel.spawn("worker").unwrap();
    let waiter_pid = kernel.spawn("worker").unwrap();

    let waiter = {
        let kernel = Arc::clone(&kernel);
        thread::spawn(move || {
            kernel.platform().scheduler().set_current(Some(waiter_pid));
            kernel.wait(target)
        })
    };

    assert!(eventually(|| {
        kernel.pcb(waiter_pid).unwrap().waiting_for_lock() == Some(LockHandle::Exit(target))
    }));
    settle();

    kernel.exit(target).unwrap();
    assert_eq!(kernel.spawn("worker"), Ok(target));

    assert_eq!(waiter.join().unwrap(), Ok(()));
    assert_eq!(kernel.pcb(waiter_pid).unwrap().waiting_for_lock(), None);
    assert!(kernel.pcb(target).unwrap().generation() > 1);
}

/// A waiter exited while blocked stays exited when its wait returns
#[test]
fn test_waiter_exited_while_blocked() {
    let kernel = kernel(small_config());
    let target = kernel.spawn("worker").unwrap();
    let waiter_pid = kernel.spawn("worker").unwrap();

    let waiter = {
        let kernel = Arc::clone(&kernel);
        thread::spawn(move || {
            kernel.platform().scheduler().set_current(Some(waiter_pid));
            kernel.wait(target)
        })
    };
    assert!(eventually(|| {
        kernel.pcb(waiter_pid).unwrap().waiting_for_lock() == Some(LockHandle::Exit(target))
    }));

    kernel.exit(waiter_pid).unwrap();
    kernel.exit(target).unwrap();

    assert_eq!(waiter.join().unwrap(), Ok(()));
    assert_eq!(kernel.pcb(waiter_pid), None);
    assert_eq!(kernel.live_count(), 0);
    assert_eq!(kernel.check_invariants(), vec![]);
}

/// kill is reserved: it fails and the target keeps running
#[test]
fn test_kill_is_not_supported() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn("worker").unwrap();
    assert_eq!(kernel.kill(pid), Err(KernelError::NotSupported { pid }));
    assert_eq!(kernel.pcb(pid).unwrap().status(), ProcessStatus::FirstTime);
}

/// The trampoline launches a process on its user stack, outside the
/// critical section, and accounts the entry
#[test]
fn test_first_entry_launches_process() {
    let kernel = kernel(small_config());
    let (tx, rx) = mpsc::channel();
    let tx = std::sync::Mutex::new(tx);
    kernel
        .platform()
        .loader()
        .register("hello", move |kernel: &Kernel<Hosted>, launch: Launch| {
            let pcb = kernel.pcb(launch.pid).unwrap();
            let depth = kernel.platform().critical_section().depth();
            tx.lock().unwrap().send((launch, pcb, depth)).unwrap();
        });

    let pid = kernel.spawn("hello").unwrap();
    hosted::start(&kernel, pid).join().unwrap();

    let (launch, pcb, depth) = rx.recv_timeout(PROMPT).unwrap();
    assert_eq!(launch.pid, pid);
    assert_eq!(launch.task_type, TaskType::Process);
    assert_eq!(launch.stack, kernel.stacks().stack_top(pid, StackRegion::User));
    assert_eq!(pcb.status(), ProcessStatus::Ready);
    assert_eq!(pcb.entry_count(), 1);
    assert_eq!(depth, 0);

    // Returning from the body exits the task.
    assert_eq!(kernel.pcb(pid), None);
    assert_eq!(kernel.total_ready_priority(), 0);
}

/// Kernel threads are launched on their kernel stack
#[test]
fn test_first_entry_launches_kernel_thread() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn_kernel_thread(EntryPoint(0x4000)).unwrap();
    let section = kernel.platform().critical_section();

    kernel.platform().scheduler().set_current(Some(pid));
    section.enter();
    let launch = kernel.first_entry(|launch| launch);
    kernel.platform().scheduler().set_current(None);

    assert_eq!(section.depth(), 0);
    assert_eq!(launch.task_type, TaskType::KernelThread);
    assert_eq!(launch.entry_point, EntryPoint(0x4000));
    assert_eq!(launch.stack, kernel.stacks().stack_top(pid, StackRegion::Kernel));
}

/// Entering a task that already ran is table corruption
#[test]
#[should_panic(expected = "kernel halted")]
fn test_second_first_entry_halts() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn("worker").unwrap();
    kernel.platform().scheduler().set_current(Some(pid));

    kernel.platform().critical_section().enter();
    kernel.first_entry(|_| ());
    kernel.platform().critical_section().enter();
    kernel.first_entry(|_| ());
}

/// A program that exits itself is not exited twice
#[test]
fn test_program_exiting_itself() {
    let kernel = kernel(small_config());
    kernel
        .platform()
        .loader()
        .register("quitter", |kernel: &Kernel<Hosted>, launch: Launch| {
            kernel.exit(launch.pid).unwrap();
        });

    let pid = kernel.spawn("quitter").unwrap();
    hosted::start(&kernel, pid).join().unwrap();
    assert_eq!(kernel.pcb(pid), None);
    assert_eq!(kernel.check_invariants(), vec![]);
}

/// Blocking and unblocking move a process on and off the ready queue
#[test]
fn test_block_and_unblock() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn("worker").unwrap();
    enter_first_time(&kernel, pid);

    kernel.set_priority(pid, NonZeroU32::new(3).unwrap()).unwrap();
    assert_eq!(kernel.total_ready_priority(), 3);

    kernel.block(pid).unwrap();
    assert_eq!(kernel.pcb(pid).unwrap().status(), ProcessStatus::Blocked);
    assert_eq!(kernel.total_ready_priority(), 0);
    assert!(kernel.platform().scheduler().ready_queue().is_empty());
    assert_eq!(kernel.block(pid), Err(KernelError::InvalidTarget { pid }));

    kernel.unblock(pid).unwrap();
    assert_eq!(kernel.total_ready_priority(), 3);
    assert_eq!(kernel.platform().scheduler().ready_queue(), vec![pid]);
    assert_eq!(kernel.unblock(pid), Err(KernelError::InvalidTarget { pid }));
}

/// Priority changes apply only to live processes
#[test]
fn test_priority_accessors() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn("worker").unwrap();
    assert_eq!(kernel.priority(pid), Ok(1));
    assert_eq!(kernel.set_priority(pid, NonZeroU32::new(7).unwrap()), Ok(1));
    assert_eq!(kernel.priority(pid), Ok(7));

    let free = Pid::new(3);
    assert_eq!(kernel.priority(free), Err(KernelError::InvalidTarget { pid: free }));
    assert_eq!(
        kernel.set_priority(free, NonZeroU32::new(2).unwrap()),
        Err(KernelError::InvalidTarget { pid: free })
    );
}

/// Once switched out, a task resumes from its saved kernel stack
#[test]
fn test_save_context() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn("worker").unwrap();
    assert!(kernel.context(pid).unwrap().is_first_entry());

    kernel.save_context(pid, 0x10_0f80).unwrap();
    assert_eq!(
        kernel.context(pid),
        Some(SavedContext::Suspended {
            kernel_stack: 0x10_0f80
        })
    );

    kernel.exit(pid).unwrap();
    assert_eq!(kernel.context(pid), None);
    assert_eq!(
        kernel.save_context(pid, 0),
        Err(KernelError::InvalidTarget { pid })
    );
}

/// Switch hooks count every entry and charge the time spent running
#[test]
fn test_switch_hooks_account_entries_and_time() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn("worker").unwrap();
    // A never-run task goes through the trampoline, not resume.
    assert_eq!(kernel.resume(pid), Err(KernelError::InvalidTarget { pid }));

    enter_first_time(&kernel, pid);
    for _ in 0..3 {
        thread::sleep(Duration::from_millis(5));
        kernel.save_context(pid, 0x10_0f00).unwrap();
        kernel.resume(pid).unwrap();
    }

    let pcb = kernel.pcb(pid).unwrap();
    assert_eq!(pcb.entry_count(), 4);
    assert!(pcb.total_process_time() >= 15, "{pcb:?}");
    assert!(pcb.last_entry_time() >= 15, "{pcb:?}");

    let report = kernel.status_report();
    let row = report.rows.iter().find(|row| row.pid == pid).unwrap();
    assert_eq!(row.entry_count, 4);

    kernel.set_sleep_until(pid, 250).unwrap();
    assert_eq!(kernel.pcb(pid).unwrap().sleep_until(), 250);

    kernel.exit(pid).unwrap();
    assert_eq!(kernel.resume(pid), Err(KernelError::InvalidTarget { pid }));
    assert_eq!(
        kernel.set_sleep_until(pid, 1),
        Err(KernelError::InvalidTarget { pid })
    );
}

/// Saving the context of a task that never ran charges it nothing
#[test]
fn test_save_context_before_first_entry_charges_nothing() {
    let kernel = kernel(small_config());
    let pid = kernel.spawn("worker").unwrap();
    thread::sleep(Duration::from_millis(5));
    kernel.save_context(pid, 0x10_0f00).unwrap();
    assert_eq!(kernel.pcb(pid).unwrap().total_process_time(), 0);
}

#[test]
fn test_boot_and_status_report() {
    let kernel = kernel(small_config());
    let init = kernel.boot("init").unwrap();
    kernel.spawn_kernel_thread(EntryPoint(0x4000)).unwrap();

    let report = kernel.status_report();
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].pid, init);
    assert_eq!(report.rows[1].task_type, TaskType::KernelThread);

    let text = report.to_string();
    assert!(text.contains("Pid"));
    assert!(text.contains("Process"));
    assert!(text.contains("Thread"));
    assert_eq!(kernel.max_pcbs(), 4);
}

#[test]
fn test_boot_without_init_fails() {
    let kernel = kernel(small_config());
    assert!(matches!(
        kernel.boot("missing"),
        Err(KernelError::ProgramNotFound { .. })
    ));
}

/// A table larger than the stack window is rejected up front
#[test]
fn test_oversized_table_rejected() {
    let config = KernelConfig {
        num_pcbs: 129,
        ..KernelConfig::default()
    };
    assert!(matches!(
        Kernel::new(config, Hosted::new()),
        Err(ConfigError::StackWindowExceeded { .. })
    ));
}
