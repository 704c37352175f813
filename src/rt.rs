//! The hardware-facing entry points.
//!
//! The application links this crate, provides `memory.x`, and defines
//!
//! ```ignore
//! #[no_mangle]
//! pub extern "Rust" fn boot_config() -> bootfault::Config { ... }
//!
//! #[no_mangle]
//! pub extern "Rust" fn app_main() { ... }
//! ```

use crate::abort::AbortReason;
use crate::config::{Config, ABORT_POLICY, FAULT_POLICY};
use crate::fault::{self, FaultClass};
use crate::hardware::cortex_m::CortexM;
use crate::hardware::ExceptionFrame;
use crate::startup::{self, Layout, Region};
use crate::tick;
use crate::vector::{Handlers, VectorTable};
use core::arch::global_asm;
use core::ptr::{addr_of, addr_of_mut};
use cortex_m::peripheral::SCB;
use rtt_target::rtt_init_print;

extern "C" {
    fn start();
    fn hard_fault_handler();
    fn mem_fault_handler();
    fn bus_fault_handler();
    fn usage_fault_handler();

    static mut __sbss: u32;
    static mut __ebss: u32;
    static mut __sdata: u32;
    static mut __edata: u32;
    static __sidata: u32;
}

extern "Rust" {
    fn boot_config() -> Config;
    fn app_main();
}

#[link_section = ".vector_table.exceptions"]
#[no_mangle]
pub static VECTOR_TABLE: VectorTable = VectorTable::new(Handlers {
    reset: start,
    hard_fault: hard_fault_handler,
    mem_fault: mem_fault_handler,
    bus_fault: bus_fault_handler,
    usage_fault: usage_fault_handler,
    systick: isr_systick,
    default: DefaultHandler,
});

// `start` sets MSP itself in case a bootloader jumped here with its own
// stack. The fault handlers pass the active stack pointer on to Rust so the
// stacked frame can be read.
global_asm!(
    ".section .text.start, \"ax\"
     .global start
     .type start, %function
     .thumb_func
     start:
        ldr r0, =__stack_top
        msr msp, r0
        bl start_rust
        b abort

     .macro fault_entry name, target
     .section .text.\\name, \"ax\"
     .global \\name
     .type \\name, %function
     .thumb_func
     \\name:
        tst lr, #4
        ite eq
        mrseq r0, msp
        mrsne r0, psp
        b \\target
     .endm

     fault_entry hard_fault_handler, hard_fault_rust
     fault_entry mem_fault_handler, mem_fault_rust
     fault_entry bus_fault_handler, bus_fault_rust
     fault_entry usage_fault_handler, usage_fault_rust"
);

#[no_mangle]
unsafe extern "C" fn start_rust() -> ! {
    let layout = Layout {
        bss: Region::new(addr_of_mut!(__sbss), addr_of_mut!(__ebss)),
        data: Region::new(addr_of_mut!(__sdata), addr_of_mut!(__edata)),
        image: addr_of!(__sidata),
    };

    let mut platform = CortexM::new();

    startup::boot(
        &mut platform,
        &VECTOR_TABLE,
        &layout,
        || boot_config(),
        &ABORT_POLICY,
        |_| {
            rtt_init_print!();
            app_main();
        },
    )
}

#[no_mangle]
pub extern "C" fn abort() -> ! {
    crate::abort::abort(&mut CortexM::new(), &ABORT_POLICY, AbortReason::Requested)
}

#[no_mangle]
pub extern "C" fn isr_systick() {
    tick::isr();
}

#[no_mangle]
unsafe extern "C" fn hard_fault_rust(frame: *const ExceptionFrame) -> ! {
    fault::dispatch(&mut CortexM::with_frame(frame), &FAULT_POLICY, FaultClass::Hard)
}

#[no_mangle]
unsafe extern "C" fn mem_fault_rust(frame: *const ExceptionFrame) -> ! {
    fault::dispatch(&mut CortexM::with_frame(frame), &FAULT_POLICY, FaultClass::Memory)
}

#[no_mangle]
unsafe extern "C" fn bus_fault_rust(frame: *const ExceptionFrame) -> ! {
    fault::dispatch(&mut CortexM::with_frame(frame), &FAULT_POLICY, FaultClass::Bus)
}

#[no_mangle]
unsafe extern "C" fn usage_fault_rust(frame: *const ExceptionFrame) -> ! {
    fault::dispatch(&mut CortexM::with_frame(frame), &FAULT_POLICY, FaultClass::Usage)
}

/// Target of every slot nobody claimed, core or device.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn DefaultHandler() {
    let icsr = (*SCB::PTR).icsr.read();

    crate::abort::abort(
        &mut CortexM::new(),
        &ABORT_POLICY,
        AbortReason::Unhandled((icsr & 0x1ff) as u16),
    )
}

#[cfg(feature = "panic-handler")]
#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("{}", info);

    crate::abort::abort(&mut CortexM::new(), &ABORT_POLICY, AbortReason::Panic)
}
