//! Producer/consumer scenario
//!
//! `init` opens the shared mailbox, spawns one consumer and the producers,
//! then waits for every child. Producers tag each message with their pid
//! and a sequence number so the consumer can check per-producer FIFO order.
//! All programs reach the core through syscalls only.

use std::collections::HashMap;
use std::iter;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use segos_kernel::hosted::{self, Hosted};
use segos_kernel::{
    dispatch, InvariantViolation, Kernel, Launch, MailboxId, Pid, Platform, StatusReport, Syscall,
};

use crate::config::SimConfig;

const MAX_LINE: usize = 64;

#[derive(Debug, Default)]
struct Tally {
    received: usize,
    out_of_order: usize,
    last_seq: HashMap<u32, usize>,
    snapshot: Option<StatusReport>,
}

/// What a run produced
#[derive(Debug)]
pub struct Outcome {
    pub tasks: usize,
    pub expected: usize,
    pub received: usize,
    pub out_of_order: usize,
    /// Process table while every child was live
    pub snapshot: Option<StatusReport>,
    pub violations: Vec<InvariantViolation>,
    pub elapsed: Duration,
}

impl Outcome {
    pub fn is_clean(&self) -> bool {
        self.received == self.expected && self.out_of_order == 0 && self.violations.is_empty()
    }
}

pub fn run(config: &SimConfig) -> Result<Outcome> {
    let scenario = config.scenario.clone();
    let needed = scenario.producers + 2;
    if needed > config.kernel.num_pcbs {
        bail!(
            "{} producers need {} process slots, table has {}",
            scenario.producers,
            needed,
            config.kernel.num_pcbs
        );
    }

    let kernel = Arc::new(
        Kernel::new(config.kernel.clone(), Hosted::new()).context("Failed to build kernel")?,
    );
    let tally = Arc::new(Mutex::new(Tally::default()));
    register_programs(&kernel, config, &tally);

    let started = Instant::now();
    kernel.boot("init").context("Failed to boot init")?;
    let tasks = hosted::run(&kernel);
    let elapsed = started.elapsed();

    let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(Outcome {
        tasks,
        expected: scenario.producers * scenario.messages,
        received: tally.received,
        out_of_order: tally.out_of_order,
        snapshot: tally.snapshot.take(),
        violations: kernel.check_invariants(),
        elapsed,
    })
}

fn register_programs(kernel: &Kernel<Hosted>, config: &SimConfig, tally: &Arc<Mutex<Tally>>) {
    let loader = kernel.platform().loader();
    let scenario = &config.scenario;

    let (name, producers, snapshot) = (
        scenario.mailbox.clone(),
        scenario.producers,
        Arc::clone(tally),
    );
    loader.register("init", move |kernel: &Kernel<Hosted>, _: Launch| {
        let Some(id) = open(kernel, &name) else { return };

        let mut children = Vec::new();
        let programs = iter::once("consumer").chain(iter::repeat("producer").take(producers));
        for program in programs {
            let code = dispatch(kernel, Syscall::Spawn(program));
            if code < 0 {
                log::error!("init: spawn {} failed ({})", program, code);
                continue;
            }
            children.push(Pid::new(code as usize));
        }

        snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot = Some(kernel.status_report());

        for child in children {
            // -3: the child already exited
            let code = dispatch(kernel, Syscall::Wait(child));
            log::debug!("init: wait({}) = {}", child, code);
        }
        dispatch(kernel, Syscall::MboxClose(id));
    });

    let (name, messages) = (scenario.mailbox.clone(), scenario.messages);
    loader.register("producer", move |kernel: &Kernel<Hosted>, launch: Launch| {
        let Some(id) = open(kernel, &name) else { return };
        for seq in 0..messages {
            let line = format!("{}:{}", launch.pid, seq);
            dispatch(kernel, Syscall::MboxSend(id, line.as_bytes()));
        }
        dispatch(kernel, Syscall::MboxClose(id));
    });

    let (name, total, tally) = (
        scenario.mailbox.clone(),
        producers * messages,
        Arc::clone(tally),
    );
    loader.register("consumer", move |kernel: &Kernel<Hosted>, _: Launch| {
        let Some(id) = open(kernel, &name) else { return };
        let mut buf = [0u8; MAX_LINE];
        for _ in 0..total {
            let len = dispatch(kernel, Syscall::MboxRecv(id, &mut buf));
            if len < 0 {
                log::error!("consumer: recv failed ({})", len);
                break;
            }
            let line = String::from_utf8_lossy(&buf[..len as usize]);
            tally
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(&line);
        }
        dispatch(kernel, Syscall::MboxClose(id));
    });
}

fn open(kernel: &Kernel<Hosted>, name: &str) -> Option<MailboxId> {
    let code = dispatch(kernel, Syscall::MboxOpen(name));
    if code < 0 {
        log::error!("mbox_open({}) failed ({})", name, code);
        return None;
    }
    Some(MailboxId::new(code as usize))
}

impl Tally {
    /// Account one `pid:seq` line
    fn record(&mut self, line: &str) {
        self.received += 1;
        let parsed = line
            .split_once(':')
            .and_then(|(pid, seq)| Some((pid.parse::<u32>().ok()?, seq.parse::<usize>().ok()?)));

        let Some((pid, seq)) = parsed else {
            log::warn!("consumer: malformed message {:?}", line);
            self.out_of_order += 1;
            return;
        };

        let expected = self.last_seq.get(&pid).map_or(0, |last| last + 1);
        if seq != expected {
            log::warn!("consumer: pid {} sent {} after {}", pid, seq, expected);
            self.out_of_order += 1;
        }
        self.last_seq.insert(pid, seq);
    }
}
