//! A host-side stand-in for the processor.
//!
//! Every effect the core has on the hardware is recorded so tests can assert
//! on it. The terminal operations (`halt` and `reset`) record the outcome and
//! then unwind, so a test wraps the code under test in [`Sim::run`] and
//! inspects the simulator afterwards.

use crate::hardware::{ExceptionFrame, FaultStatus, Platform, Traps};
use std::panic::{self, AssertUnwindSafe};
use std::string::String;

/// upper bound on platform operations a single run may perform. this stands
/// in for an instruction budget: unbounded fault recursion trips it.
pub const DEFAULT_BUDGET: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    Reset,
}

/// how a [`Sim::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// the closure returned normally.
    Returned,
    /// a terminal operation was reached.
    Terminated(Outcome),
    /// the step budget ran out before anything terminated.
    Exhausted,
}

pub struct Sim {
    pub interrupts_enabled: bool,
    pub traps: Option<Traps>,
    pub status: FaultStatus,
    pub frame: Option<ExceptionFrame>,
    pub tick_reload: Option<u32>,
    pub output: String,
    pub debugger: bool,
    pub breakpoints: u32,
    pub outcome: Option<Outcome>,
    pub steps: u32,
    pub budget: u32,
    /// called on every fault status read; lets a test raise a fault from
    /// inside a fault handler.
    pub on_status_read: Option<fn(&mut Sim)>,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Sim {
    /// a processor fresh out of reset: interrupts enabled (PRIMASK clear),
    /// nothing configured.
    pub fn new() -> Self {
        Self {
            interrupts_enabled: true,
            traps: None,
            status: FaultStatus::default(),
            frame: None,
            tick_reload: None,
            output: String::new(),
            debugger: false,
            breakpoints: 0,
            outcome: None,
            steps: 0,
            budget: DEFAULT_BUDGET,
            on_status_read: None,
        }
    }

    pub fn with_fault(mut self, status: FaultStatus, frame: Option<ExceptionFrame>) -> Self {
        self.status = status;
        self.frame = frame;
        self
    }

    /// run `f` against this simulator, catching the unwind raised by the
    /// terminal operations.
    pub fn run<F>(&mut self, f: F) -> Exit
    where
        F: FnOnce(&mut Sim),
    {
        self.outcome = None;
        self.steps = 0;

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(self)));

        match (result, self.outcome) {
            (Ok(()), _) => Exit::Returned,
            (Err(_), Some(outcome)) => Exit::Terminated(outcome),
            (Err(payload), None) if payload.downcast_ref::<Exhausted>().is_some() => {
                Exit::Exhausted
            }
            (Err(payload), None) => panic::resume_unwind(payload),
        }
    }

    fn step(&mut self) {
        self.steps += 1;

        if self.steps > self.budget {
            panic::panic_any(Exhausted);
        }
    }

    fn terminate(&mut self, outcome: Outcome) -> ! {
        self.outcome = Some(outcome);
        panic::panic_any(Terminated(outcome));
    }
}

/// put every process-wide static of the core back in its power-on state,
/// as `.bss`/`.data` initialisation would on hardware.
pub fn power_cycle() {
    crate::runtime::reset();
    crate::tick::reset();
    crate::fault::reset();
}

struct Terminated(#[allow(dead_code)] Outcome);
struct Exhausted;

impl Platform for Sim {
    fn disable_interrupts(&mut self) {
        self.step();
        self.interrupts_enabled = false;
    }

    fn enable_interrupts(&mut self) {
        self.step();
        self.interrupts_enabled = true;
    }

    fn enable_fault_reporting(&mut self, traps: Traps) {
        self.step();
        self.traps = Some(traps);
    }

    fn fault_status(&mut self) -> FaultStatus {
        self.step();

        if let Some(hook) = self.on_status_read {
            hook(self);
        }

        self.status
    }

    fn exception_frame(&mut self) -> Option<ExceptionFrame> {
        self.step();
        self.frame
    }

    fn start_tick(&mut self, reload: u32) {
        self.step();
        self.tick_reload = Some(reload);
    }

    fn debug_write(&mut self, line: &str) {
        self.step();
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn debugger_attached(&mut self) -> bool {
        self.step();
        self.debugger
    }

    fn breakpoint(&mut self) {
        self.step();
        self.breakpoints += 1;
    }

    fn halt(&mut self) -> ! {
        self.terminate(Outcome::Halted)
    }

    fn reset(&mut self) -> ! {
        self.terminate(Outcome::Reset)
    }
}
