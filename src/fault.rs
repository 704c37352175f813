//! Fault capture and dispatch.
//!
//! All four fault handlers funnel into [`dispatch`], which never returns.
//! The class of the fault only decides which status bits and which address
//! register end up in the [`FaultRecord`]; the terminal action is always
//! [`abort`](crate::abort::abort).
//!
//! A fault raised while a handler is already running (a bad stacked frame,
//! a debug channel that faults, ...) re-enters `dispatch`. The activation
//! depth is tracked in an atomic so that the nested activation can skip
//! straight to abort instead of recursing.

use crate::abort::{abort, AbortReason};
use crate::config::FaultPolicy;
use crate::diag;
use crate::hardware::{Cfsr, ExceptionFrame, FaultStatus, Hfsr, Platform};
use crate::runtime::{self, Fault};
use crate::vector::Exception;
use core::cell::Cell;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use critical_section::Mutex;
use derivative::Derivative;

static DEPTH: AtomicU8 = AtomicU8::new(0);
static RECORD: Mutex<Cell<Option<FaultRecord>>> = Mutex::new(Cell::new(None));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Hard,
    Memory,
    Bus,
    Usage,
}

impl FaultClass {
    pub const ALL: [FaultClass; 4] = [
        FaultClass::Hard,
        FaultClass::Memory,
        FaultClass::Bus,
        FaultClass::Usage,
    ];

    pub const fn exception(self) -> Exception {
        match self {
            FaultClass::Hard => Exception::HardFault,
            FaultClass::Memory => Exception::MemManage,
            FaultClass::Bus => Exception::BusFault,
            FaultClass::Usage => Exception::UsageFault,
        }
    }

    /// the part of the CFSR that belongs to this class.
    fn cfsr_mask(self) -> Cfsr {
        match self {
            FaultClass::Hard => Cfsr::MMFSR.union(Cfsr::BFSR).union(Cfsr::UFSR),
            FaultClass::Memory => Cfsr::MMFSR,
            FaultClass::Bus => Cfsr::BFSR,
            FaultClass::Usage => Cfsr::UFSR,
        }
    }
}

impl fmt::Display for FaultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultClass::Hard => "hard fault",
            FaultClass::Memory => "memory fault",
            FaultClass::Bus => "bus fault",
            FaultClass::Usage => "usage fault",
        })
    }
}

/// What the processor told us about a fault.
#[derive(Derivative, Clone, Copy, PartialEq, Eq)]
#[derivative(Debug)]
pub struct FaultRecord {
    pub class: FaultClass,
    /// status registers, reduced to the bits relevant to `class`
    pub status: FaultStatus,
    /// faulting data address, when the hardware latched a valid one
    #[derivative(Debug(format_with = "hex_opt"))]
    pub address: Option<u32>,
    /// stacked registers, absent when stacking itself failed
    pub frame: Option<ExceptionFrame>,
    /// handler activation depth this was captured at
    pub depth: u8,
}

fn hex_opt(value: &Option<u32>, f: &mut fmt::Formatter) -> fmt::Result {
    match value {
        Some(value) => write!(f, "Some({:#010x})", value),
        None => f.write_str("None"),
    }
}

impl FaultRecord {
    pub fn capture<P: Platform>(platform: &mut P, class: FaultClass, depth: u8) -> Self {
        let raw = platform.fault_status();
        let cfsr = raw.cfsr();
        let hfsr = raw.hfsr();

        // a hard fault only has configurable status worth reading when it
        // was escalated from one of the other three
        let forced = class == FaultClass::Hard && hfsr.contains(Hfsr::FORCED);

        let cfsr = match class {
            FaultClass::Hard if !forced => Cfsr::empty(),
            _ => cfsr & class.cfsr_mask(),
        };

        let mmfar = cfsr.contains(Cfsr::MMARVALID).then_some(raw.mmfar);
        let bfar = cfsr.contains(Cfsr::BFARVALID).then_some(raw.bfar);

        let address = match class {
            FaultClass::Memory => mmfar,
            FaultClass::Bus => bfar,
            FaultClass::Hard => mmfar.or(bfar),
            FaultClass::Usage => None,
        };

        let status = FaultStatus {
            cfsr: cfsr.bits(),
            hfsr: if class == FaultClass::Hard { raw.hfsr } else { 0 },
            mmfar: mmfar.unwrap_or(0),
            bfar: bfar.unwrap_or(0),
        };

        let frame = if cfsr.stacking_failed() {
            None
        } else {
            platform.exception_frame()
        };

        Self {
            class,
            status,
            address,
            frame,
            depth,
        }
    }

    pub fn pc(&self) -> Option<u32> {
        self.frame.map(|frame| frame.pc)
    }
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: cfsr={:#010x}", self.class, self.status.cfsr)?;

        if self.class == FaultClass::Hard {
            write!(f, " hfsr={:#010x}", self.status.hfsr)?;
        }

        if let Some(address) = self.address {
            write!(f, " addr={:#010x}", address)?;
        }

        match self.frame {
            Some(frame) => write!(
                f,
                " pc={:#010x} lr={:#010x} xpsr={:#010x}",
                frame.pc, frame.lr, frame.xpsr
            ),
            None => f.write_str(" frame=lost"),
        }
    }
}

/// the record captured by the outermost fault handler, if any.
pub fn record() -> Option<FaultRecord> {
    critical_section::with(|cs| RECORD.borrow(cs).get())
}

/// number of fault handler activations since reset.
pub fn depth() -> u8 {
    DEPTH.load(Ordering::Relaxed)
}

#[cfg_attr(target_os = "none", allow(dead_code))]
pub(crate) fn reset() {
    DEPTH.store(0, Ordering::SeqCst);
    critical_section::with(|cs| RECORD.borrow(cs).set(None));
}

/// Common body of every fault handler.
pub fn dispatch<P: Platform>(platform: &mut P, policy: &FaultPolicy, class: FaultClass) -> ! {
    let depth = DEPTH.fetch_add(1, Ordering::SeqCst).saturating_add(1);

    if depth > policy.capture_depth {
        abort(platform, &policy.abort, AbortReason::NestedFault);
    }

    let can_report = runtime::phase().can_report();

    Fault(class).send();

    let record = FaultRecord::capture(platform, class, depth);

    critical_section::with(|cs| RECORD.borrow(cs).set(Some(record)));

    if can_report {
        diag::emit(platform, format_args!("{}", record));
    }

    abort(platform, &policy.abort, AbortReason::Fault(class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AbortAction, AbortPolicy};
    use crate::hardware::sim::{power_cycle, Exit, Outcome, Sim};
    use crate::runtime::{Aborted, Entered, StaticsReady};
    use serial_test::serial;

    const POLICY: FaultPolicy = FaultPolicy {
        capture_depth: 1,
        abort: AbortPolicy {
            action: AbortAction::Halt,
            breakpoint: false,
            report: true,
        },
    };

    const FRAME: ExceptionFrame = ExceptionFrame {
        r0: 0,
        r1: 1,
        r2: 2,
        r3: 3,
        r12: 12,
        lr: 0x0800_0301,
        pc: 0x0800_0410,
        xpsr: 0x0100_0000,
    };

    fn running() {
        power_cycle();
        StaticsReady.send();
        Entered.send();
    }

    #[test]
    #[serial]
    fn every_class_ends_in_abort() {
        for class in FaultClass::ALL {
            running();

            let mut sim = Sim::new().with_fault(FaultStatus::default(), Some(FRAME));
            let exit = sim.run(|sim| dispatch(sim, &POLICY, class));

            assert_eq!(exit, Exit::Terminated(Outcome::Halted));
            assert_eq!(runtime::phase(), Aborted(AbortReason::Fault(class)));
            assert_eq!(record().map(|record| record.class), Some(class));
            assert!(!sim.interrupts_enabled);
        }
    }

    #[test]
    #[serial]
    fn bus_fault_latches_bfar() {
        running();

        let status = FaultStatus {
            cfsr: (Cfsr::PRECISERR | Cfsr::BFARVALID).bits(),
            bfar: 0x4002_1000,
            mmfar: 0xdead_beef,
            ..Default::default()
        };

        let mut sim = Sim::new().with_fault(status, Some(FRAME));
        sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Bus));

        let record = record().unwrap();

        assert_eq!(record.address, Some(0x4002_1000));
        assert_eq!(record.status.mmfar, 0);
        assert_eq!(record.pc(), Some(0x0800_0410));
        assert_eq!(
            sim.output,
            "bus fault: cfsr=0x00008200 addr=0x40021000 pc=0x08000410 lr=0x08000301 xpsr=0x01000000\n"
        );
    }

    #[test]
    #[serial]
    fn address_needs_its_valid_bit() {
        running();

        let status = FaultStatus {
            cfsr: Cfsr::DACCVIOL.bits(),
            mmfar: 0x2000_0000,
            ..Default::default()
        };

        let mut sim = Sim::new().with_fault(status, Some(FRAME));
        sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Memory));

        assert_eq!(record().unwrap().address, None);
    }

    #[test]
    #[serial]
    fn classes_only_see_their_own_bits() {
        running();

        let status = FaultStatus {
            cfsr: (Cfsr::DIVBYZERO | Cfsr::BFARVALID | Cfsr::IACCVIOL).bits(),
            bfar: 0x1000,
            ..Default::default()
        };

        let mut sim = Sim::new().with_fault(status, None);
        sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Usage));

        let record = record().unwrap();
        assert_eq!(record.status.cfsr, Cfsr::DIVBYZERO.bits());
        assert_eq!(record.address, None);
        assert_eq!(record.frame, None);
    }

    #[test]
    #[serial]
    fn escalated_hard_fault_keeps_cfsr() {
        running();

        let status = FaultStatus {
            cfsr: (Cfsr::DACCVIOL | Cfsr::MMARVALID).bits(),
            hfsr: Hfsr::FORCED.bits(),
            mmfar: 0x2000_4000,
            ..Default::default()
        };

        let mut sim = Sim::new().with_fault(status, Some(FRAME));
        sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Hard));

        let record = record().unwrap();
        assert_eq!(record.status.hfsr, Hfsr::FORCED.bits());
        assert_eq!(record.status.cfsr, status.cfsr);
        assert_eq!(record.address, Some(0x2000_4000));
    }

    #[test]
    #[serial]
    fn reserved_status_bits_are_recorded() {
        running();

        // bit 14 of the BFSR and bit 0 of the HFSR have no name
        let status = FaultStatus {
            cfsr: 0x0000_4000 | Cfsr::PRECISERR.bits(),
            hfsr: 0x0000_0001 | Hfsr::FORCED.bits(),
            ..Default::default()
        };

        let mut sim = Sim::new().with_fault(status, Some(FRAME));
        sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Hard));

        let record = record().unwrap();
        assert_eq!(record.status.cfsr, status.cfsr);
        assert_eq!(record.status.hfsr, status.hfsr);
    }

    #[test]
    #[serial]
    fn plain_hard_fault_ignores_cfsr() {
        running();

        let status = FaultStatus {
            cfsr: Cfsr::UNDEFINSTR.bits(),
            hfsr: Hfsr::VECTTBL.bits(),
            ..Default::default()
        };

        let mut sim = Sim::new().with_fault(status, Some(FRAME));
        sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Hard));

        let record = record().unwrap();
        assert_eq!(record.status.cfsr, 0);
        assert_eq!(record.status.hfsr, Hfsr::VECTTBL.bits());
    }

    #[test]
    #[serial]
    fn stacking_error_skips_the_frame() {
        running();

        let status = FaultStatus {
            cfsr: Cfsr::STKERR.bits(),
            ..Default::default()
        };

        let mut sim = Sim::new().with_fault(status, Some(FRAME));
        sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Bus));

        assert_eq!(record().unwrap().frame, None);
        assert!(sim.output.starts_with("bus fault: cfsr=0x00001000 frame=lost\n"));
    }

    #[test]
    #[serial]
    fn nested_fault_aborts_without_capture() {
        running();

        let mut sim = Sim::new().with_fault(FaultStatus::default(), Some(FRAME));
        sim.on_status_read = Some(|sim| dispatch(sim, &POLICY, FaultClass::Bus));

        let exit = sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Memory));

        assert_eq!(exit, Exit::Terminated(Outcome::Halted));
        assert_eq!(depth(), 2);
        assert_eq!(record(), None);
        assert_eq!(runtime::phase(), Aborted(AbortReason::NestedFault));
        assert!(sim.output.is_empty());
    }

    #[test]
    #[serial]
    fn silent_before_statics() {
        power_cycle();

        let mut sim = Sim::new().with_fault(FaultStatus::default(), Some(FRAME));
        let exit = sim.run(|sim| dispatch(sim, &POLICY, FaultClass::Hard));

        assert_eq!(exit, Exit::Terminated(Outcome::Halted));
        assert!(sim.output.is_empty());
        assert!(record().is_some());
    }
}
