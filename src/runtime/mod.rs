use crate::abort::AbortReason;
use crate::fault::FaultClass;
use core::cell::Cell;
use critical_section::Mutex;

pub use Event::*;
pub use Phase::*;

static PHASE: Mutex<Cell<Phase>> = Mutex::new(Cell::new(Reset));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StaticsReady,
    Entered,
    Fault(FaultClass),
    Abort(AbortReason),
}

impl Event {
    /// apply the event to the process-wide phase and return the new phase.
    pub fn send(self) -> Phase {
        critical_section::with(|cs| {
            let phase = PHASE.borrow(cs);
            let next = phase.get().recv(self);

            phase.set(next);
            next
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// out of reset, statics not yet trustworthy
    Reset,
    /// statics initialised and fault reporting on, interrupts still masked
    Initialised,
    /// the application entry point has been called
    Running,
    Faulted(FaultClass),
    Aborted(AbortReason),
}

impl Phase {
    #[must_use]
    pub fn recv(self, event: Event) -> Phase {
        match (self, event) {
            // nothing leaves aborted
            (Aborted(reason), _) => Aborted(reason),

            (_, Abort(reason)) => Aborted(reason),

            // the first fault wins, nested ones are handled by the guard
            (Faulted(class), Fault(_)) => Faulted(class),

            (_, Fault(class)) => Faulted(class),

            (Reset, StaticsReady) => Initialised,

            (Initialised, Entered) => Running,

            (phase, _) => phase,
        }
    }

    /// whether statics, and the debug channel living in them, can be
    /// trusted. once a fault or abort is underway they are suspect.
    pub fn can_report(&self) -> bool {
        matches!(self, Initialised | Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Aborted(_))
    }
}

/// the current process-wide phase.
pub fn phase() -> Phase {
    critical_section::with(|cs| PHASE.borrow(cs).get())
}

/// force the phase back to [`Phase::Reset`].
///
/// On hardware a reset does this through `.data` initialisation; on the host
/// the simulator calls it to model a power cycle.
#[cfg_attr(target_os = "none", allow(dead_code))]
pub(crate) fn reset() {
    critical_section::with(|cs| PHASE.borrow(cs).set(Reset));
}
