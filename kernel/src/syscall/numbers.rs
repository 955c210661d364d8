//! System call numbers
//!
//! Numbering is the trap table order. Calls from 0 to 8 belong to the rest
//! of the kernel (scheduler, timer, drivers); the core serves exit, the
//! pid/priority queries and everything from 9 up.

/// Give up the CPU to the scheduler
pub const SYS_YIELD: usize = 0;

/// Terminate the calling process
pub const SYS_EXIT: usize = 1;

/// Pid of the calling process
pub const SYS_GETPID: usize = 2;

/// Priority of the calling process
pub const SYS_GETPRIORITY: usize = 3;

/// Change the calling process's priority (0 is raised to 1)
pub const SYS_SETPRIORITY: usize = 4;

/// Sleep for a number of ticks (scheduler)
pub const SYS_SLEEP: usize = 5;

/// Halt the machine
pub const SYS_SHUTDOWN: usize = 6;

/// Write a buffer to the serial port (driver)
pub const SYS_WRITE_SERIAL: usize = 7;

/// Read one character from the console (driver)
pub const SYS_GET_CHAR: usize = 8;

/// Load a program by name into a new process
pub const SYS_SPAWN: usize = 9;

/// Terminate another process (not supported)
pub const SYS_KILL: usize = 10;

/// Block until a process exits
pub const SYS_WAIT: usize = 11;

/// Open a mailbox by name
pub const SYS_MBOX_OPEN: usize = 12;

/// Drop one use of a mailbox
pub const SYS_MBOX_CLOSE: usize = 13;

/// Send a message, blocking while the mailbox is full
pub const SYS_MBOX_SEND: usize = 14;

/// Receive a message, blocking while the mailbox is empty
pub const SYS_MBOX_RECV: usize = 15;

/// Size of the trap table
pub const NUM_SYSCALLS: usize = 16;

/// Name of a syscall number, for diagnostics
pub const fn name(number: usize) -> Option<&'static str> {
    Some(match number {
        SYS_YIELD => "yield",
        SYS_EXIT => "exit",
        SYS_GETPID => "getpid",
        SYS_GETPRIORITY => "getpriority",
        SYS_SETPRIORITY => "setpriority",
        SYS_SLEEP => "sleep",
        SYS_SHUTDOWN => "shutdown",
        SYS_WRITE_SERIAL => "write_serial",
        SYS_GET_CHAR => "get_char",
        SYS_SPAWN => "spawn",
        SYS_KILL => "kill",
        SYS_WAIT => "wait",
        SYS_MBOX_OPEN => "mbox_open",
        SYS_MBOX_CLOSE => "mbox_close",
        SYS_MBOX_SEND => "mbox_send",
        SYS_MBOX_RECV => "mbox_recv",
        _ => return None,
    })
}
