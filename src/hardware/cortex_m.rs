use crate::hardware::{ExceptionFrame, FaultStatus, Platform, Traps};
use cortex_m::asm;
use cortex_m::peripheral::{DCB, SCB, SYST};
use rtt_target::rprintln;

const SHCSR_MEMFAULTENA: u32 = 1 << 16;
const SHCSR_BUSFAULTENA: u32 = 1 << 17;
const SHCSR_USGFAULTENA: u32 = 1 << 18;

const CCR_UNALIGN_TRP: u32 = 1 << 3;
const CCR_DIV_0_TRP: u32 = 1 << 4;

const SYST_CSR_ENABLE: u32 = 1 << 0;
const SYST_CSR_TICKINT: u32 = 1 << 1;
const SYST_CSR_CLKSOURCE: u32 = 1 << 2;

/// The real processor.
///
/// Register blocks are reached through their raw pointers rather than the
/// `cortex_m::Peripherals` singleton: fault handlers run with no idea who
/// owns what, and `take()` would need a critical section and RAM state we
/// cannot trust.
pub struct CortexM {
    frame: *const ExceptionFrame,
}

impl CortexM {
    pub const fn new() -> Self {
        Self {
            frame: core::ptr::null(),
        }
    }

    /// a handle for a fault handler entered with `frame` as the stacked
    /// exception frame.
    pub const fn with_frame(frame: *const ExceptionFrame) -> Self {
        Self { frame }
    }

    fn scb() -> &'static cortex_m::peripheral::scb::RegisterBlock {
        unsafe { &*SCB::PTR }
    }
}

impl Platform for CortexM {
    #[inline(always)]
    fn disable_interrupts(&mut self) {
        cortex_m::interrupt::disable();
    }

    #[inline(always)]
    fn enable_interrupts(&mut self) {
        unsafe { cortex_m::interrupt::enable() };
    }

    fn enable_fault_reporting(&mut self, traps: Traps) {
        let scb = Self::scb();

        let mut ccr = 0;

        if traps.divide_by_zero {
            ccr |= CCR_DIV_0_TRP;
        }

        if traps.unaligned {
            ccr |= CCR_UNALIGN_TRP;
        }

        unsafe {
            scb.ccr.modify(|bits| bits | ccr);
            scb.shcsr
                .modify(|bits| bits | SHCSR_MEMFAULTENA | SHCSR_BUSFAULTENA | SHCSR_USGFAULTENA);
        }

        asm::dsb();
        asm::isb();
    }

    fn fault_status(&mut self) -> FaultStatus {
        let scb = Self::scb();

        FaultStatus {
            cfsr: scb.cfsr.read(),
            hfsr: scb.hfsr.read(),
            mmfar: scb.mmfar.read(),
            bfar: scb.bfar.read(),
        }
    }

    fn exception_frame(&mut self) -> Option<ExceptionFrame> {
        if self.frame.is_null() || self.frame as usize % 4 != 0 {
            return None;
        }

        // a bad stack pointer faults here, which the nesting guard turns
        // into a direct abort
        Some(unsafe { core::ptr::read_volatile(self.frame) })
    }

    fn start_tick(&mut self, reload: u32) {
        let syst = unsafe { &*SYST::PTR };

        unsafe {
            syst.rvr.write(reload);
            syst.cvr.write(0);
            syst.csr
                .write(SYST_CSR_CLKSOURCE | SYST_CSR_TICKINT | SYST_CSR_ENABLE);
        }
    }

    fn debug_write(&mut self, line: &str) {
        rprintln!("{}", line);
    }

    fn debugger_attached(&mut self) -> bool {
        DCB::is_debugger_attached()
    }

    fn breakpoint(&mut self) {
        asm::bkpt();
    }

    fn halt(&mut self) -> ! {
        loop {
            asm::nop();
        }
    }

    fn reset(&mut self) -> ! {
        SCB::sys_reset()
    }
}
