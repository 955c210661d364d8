//! System call interface
//!
//! The trap layer decodes registers into a [`Syscall`] and calls
//! [`dispatch`], which returns the value for the caller's return register:
//! non-negative on success, the error's negative code on failure.

pub mod numbers;

use core::num::NonZeroU32;

use crate::error::Result;
use crate::halt;
use crate::ipc::MailboxId;
use crate::kernel::Kernel;
use crate::platform::Platform;
use crate::process::Pid;

/// A decoded system call served by the core
#[derive(Debug, PartialEq, Eq)]
pub enum Syscall<'a> {
    Exit,
    GetPid,
    GetPriority,
    /// Zero is raised to the minimum priority
    SetPriority(u32),
    Spawn(&'a str),
    Kill(Pid),
    Wait(Pid),
    MboxOpen(&'a str),
    MboxClose(MailboxId),
    MboxSend(MailboxId, &'a [u8]),
    MboxRecv(MailboxId, &'a mut [u8]),
}

impl Syscall<'_> {
    pub const fn number(&self) -> usize {
        match self {
            Syscall::Exit => numbers::SYS_EXIT,
            Syscall::GetPid => numbers::SYS_GETPID,
            Syscall::GetPriority => numbers::SYS_GETPRIORITY,
            Syscall::SetPriority(_) => numbers::SYS_SETPRIORITY,
            Syscall::Spawn(_) => numbers::SYS_SPAWN,
            Syscall::Kill(_) => numbers::SYS_KILL,
            Syscall::Wait(_) => numbers::SYS_WAIT,
            Syscall::MboxOpen(_) => numbers::SYS_MBOX_OPEN,
            Syscall::MboxClose(_) => numbers::SYS_MBOX_CLOSE,
            Syscall::MboxSend(..) => numbers::SYS_MBOX_SEND,
            Syscall::MboxRecv(..) => numbers::SYS_MBOX_RECV,
        }
    }
}

/// Serve `call` on behalf of the current process
pub fn dispatch<P: Platform>(kernel: &Kernel<P>, call: Syscall<'_>) -> i32 {
    let number = call.number();
    log::trace!(
        "syscall {} ({})",
        number,
        numbers::name(number).unwrap_or("?")
    );

    let result = match call {
        Syscall::Exit => kernel.exit(caller(kernel)).map(|()| 0),
        Syscall::GetPid => Ok(caller(kernel).index()),
        Syscall::GetPriority => kernel.priority(caller(kernel)).map(|p| p as usize),
        Syscall::SetPriority(priority) => {
            let priority = NonZeroU32::new(priority).unwrap_or(NonZeroU32::MIN);
            kernel.set_priority(caller(kernel), priority).map(|_| 0)
        }
        Syscall::Spawn(name) => kernel.spawn(name).map(Pid::index),
        Syscall::Kill(pid) => kernel.kill(pid).map(|()| 0),
        Syscall::Wait(pid) => kernel.wait(pid).map(|()| 0),
        Syscall::MboxOpen(name) => kernel.mbox_open(name).map(MailboxId::index),
        Syscall::MboxClose(id) => kernel.mbox_close(id).map(|()| 0),
        Syscall::MboxSend(id, data) => kernel.mbox_send(id, data),
        Syscall::MboxRecv(id, buf) => kernel.mbox_recv_into(id, buf),
    };

    encode(result)
}

/// Syscalls arrive through a trap taken by a running process
fn caller<P: Platform>(kernel: &Kernel<P>) -> Pid {
    match kernel.getpid() {
        Some(pid) => pid,
        None => halt!("syscall with no current process"),
    }
}

fn encode(result: Result<usize>) -> i32 {
    match result {
        Ok(value) => i32::try_from(value).unwrap_or(i32::MAX),
        Err(err) => {
            log::debug!("syscall failed: {}", err);
            err.errno()
        }
    }
}
