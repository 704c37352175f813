use crate::config::{AbortAction, AbortPolicy};
use crate::diag;
use crate::fault::FaultClass;
use crate::hardware::Platform;
use crate::runtime::{self, Abort};
use crate::startup::StartupError;
use core::fmt;

/// Why the system stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Fault(FaultClass),
    /// a fault taken while a fault handler was already running
    NestedFault,
    Startup(StartupError),
    /// the application entry point returned
    EntryReturned,
    /// an exception or interrupt with no handler; carries the IPSR number
    Unhandled(u16),
    Panic,
    /// `abort` called directly by software
    Requested,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Fault(class) => write!(f, "{}", class),
            AbortReason::NestedFault => f.write_str("nested fault"),
            AbortReason::Startup(err) => write!(f, "startup failed: {}", err),
            AbortReason::EntryReturned => f.write_str("application entry returned"),
            AbortReason::Unhandled(number) => write!(f, "unhandled exception {}", number),
            AbortReason::Panic => f.write_str("panic"),
            AbortReason::Requested => f.write_str("abort requested"),
        }
    }
}

/// Bring the system to a terminal state.
///
/// Interrupts go off first so nothing else runs on top of whatever state
/// caused the abort. The status line is only written when the abort comes
/// out of normal operation: before statics are initialised the debug channel
/// is garbage, and after a fault the fault record has already been reported.
pub fn abort<P: Platform>(platform: &mut P, policy: &AbortPolicy, reason: AbortReason) -> ! {
    platform.disable_interrupts();

    let before = runtime::phase();

    Abort(reason).send();

    if policy.report && before.can_report() && reason != AbortReason::NestedFault {
        diag::emit(platform, format_args!("abort: {}", reason));
    }

    if policy.breakpoint && platform.debugger_attached() {
        platform.breakpoint();
    }

    match policy.action {
        AbortAction::Halt => platform.halt(),
        AbortAction::Reset => platform.reset(),
    }
}
