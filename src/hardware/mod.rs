#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;
pub mod scb;
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub mod sim;

pub use crate::hardware::scb::*;

/// fault and interrupt traps enabled at boot in addition to the
/// MemManage, BusFault and UsageFault exceptions themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traps {
    pub divide_by_zero: bool,
    pub unaligned: bool,
}

/// Everything the boot and fault core needs from the processor.
///
/// Implementations must not allocate and must not block; fault handlers call
/// into this with a possibly corrupted stack.
pub trait Platform {
    fn disable_interrupts(&mut self);
    fn enable_interrupts(&mut self);

    /// enable the configurable fault exceptions so they no longer escalate
    /// to HardFault.
    fn enable_fault_reporting(&mut self, traps: Traps);

    fn fault_status(&mut self) -> FaultStatus;

    /// the frame stacked by the faulting context, if one was captured.
    fn exception_frame(&mut self) -> Option<ExceptionFrame>;

    /// program the system tick timer with the given reload value and start it.
    fn start_tick(&mut self, reload: u32);

    fn debug_write(&mut self, line: &str);
    fn debugger_attached(&mut self) -> bool;
    fn breakpoint(&mut self);

    fn halt(&mut self) -> !;
    fn reset(&mut self) -> !;
}
