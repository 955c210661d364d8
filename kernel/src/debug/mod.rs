//! Debug output and fatal halts
//!
//! Ordinary diagnostics go through the `log` facade; the platform decides
//! where records end up (serial port on hardware, `env_logger` when hosted).

/// Stop the kernel after a detected invariant violation.
///
/// Logs the reason at error level, then panics. The bare-metal panic
/// handler never returns, so this is the kernel's `HALT`.
#[macro_export]
macro_rules! halt {
    ($($arg:tt)*) => ({
        $crate::__log::error!("[halt] {}", format_args!($($arg)*));
        panic!("kernel halted: {}", format_args!($($arg)*));
    });
}

/// Trace a scheduler-visible state change
#[macro_export]
macro_rules! ksched_trace {
    ($($arg:tt)*) => ({
        $crate::__log::trace!(target: "segos::sched", $($arg)*);
    });
}
