use bootfault::abort::AbortReason;
use bootfault::config::{AbortAction, AbortPolicy, FaultPolicy};
use bootfault::fault::{self, FaultClass};
use bootfault::hardware::sim::{power_cycle, Exit, Outcome, Sim};
use bootfault::hardware::{Cfsr, ExceptionFrame, FaultStatus};
use bootfault::runtime::{self, Aborted, Entered, StaticsReady};
use bootfault::tick;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

// pinned here so the outcome does not depend on the abort features
const FAULT_POLICY: FaultPolicy = FaultPolicy {
    capture_depth: 1,
    abort: AbortPolicy {
        action: AbortAction::Halt,
        breakpoint: false,
        report: true,
    },
};

const FRAME: ExceptionFrame = ExceptionFrame {
    r0: 0x2000_0100,
    r1: 0,
    r2: 0,
    r3: 0,
    r12: 0,
    lr: 0x0800_1235,
    pc: 0x0800_1240,
    xpsr: 0x2100_0000,
};

fn running() {
    power_cycle();
    StaticsReady.send();
    Entered.send();
}

#[test]
#[serial]
fn no_fault_handler_returns() {
    for class in FaultClass::ALL {
        running();

        let mut sim = Sim::new().with_fault(FaultStatus::default(), Some(FRAME));

        let exit = sim.run(|sim| fault::dispatch(sim, &FAULT_POLICY, class));

        assert_eq!(exit, Exit::Terminated(Outcome::Halted), "{}", class);
        assert_eq!(runtime::phase(), Aborted(AbortReason::Fault(class)));
    }
}

#[test]
#[serial]
fn bus_fault_records_the_injected_address() {
    running();

    let status = FaultStatus {
        cfsr: (Cfsr::PRECISERR | Cfsr::BFARVALID).bits(),
        bfar: 0x6000_0004,
        ..Default::default()
    };

    let mut sim = Sim::new().with_fault(status, Some(FRAME));
    let exit = sim.run(|sim| fault::dispatch(sim, &FAULT_POLICY, FaultClass::Bus));

    let record = fault::record().expect("bus fault was not recorded");

    assert_eq!(exit, Exit::Terminated(Outcome::Halted));
    assert_eq!(record.class, FaultClass::Bus);
    assert_eq!(record.address, Some(0x6000_0004));
    assert_eq!(record.pc(), Some(0x0800_1240));
    assert_eq!(record.depth, 1);
    assert_eq!(
        runtime::phase(),
        Aborted(AbortReason::Fault(FaultClass::Bus))
    );
    assert!(sim.output.contains("addr=0x60000004"), "{}", sim.output);
}

fn fault_again(sim: &mut Sim) {
    fault::dispatch(sim, &FAULT_POLICY, FaultClass::Hard)
}

#[test]
#[serial]
fn fault_inside_fault_handler_terminates() {
    running();

    let mut sim = Sim::new().with_fault(FaultStatus::default(), Some(FRAME));

    // every status read faults again, which would recurse forever without
    // the nesting bound
    sim.on_status_read = Some(fault_again);
    sim.budget = 32;

    let exit = sim.run(|sim| fault::dispatch(sim, &FAULT_POLICY, FaultClass::Usage));

    assert_eq!(exit, Exit::Terminated(Outcome::Halted));
    assert!(sim.steps < 32);
    assert_eq!(fault::depth(), 2);
    assert_eq!(runtime::phase(), Aborted(AbortReason::NestedFault));
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static FAULT_EXIT: AtomicBool = AtomicBool::new(false);

fn fault_mid_tick(_: tick::TickInstant) {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        return;
    }

    let mut sim = Sim::new().with_fault(FaultStatus::default(), None);
    let exit = sim.run(|sim| fault::dispatch(sim, &FAULT_POLICY, FaultClass::Hard));

    FAULT_EXIT.store(exit == Exit::Terminated(Outcome::Halted), Ordering::SeqCst);
}

#[test]
#[serial]
fn ticks_survive_an_interrupting_fault() {
    running();
    INTERRUPTED.store(false, Ordering::SeqCst);
    FAULT_EXIT.store(false, Ordering::SeqCst);

    tick::set_hook(Some(fault_mid_tick));

    for _ in 0..100 {
        tick::isr();
    }

    tick::set_hook(None);

    assert!(FAULT_EXIT.load(Ordering::SeqCst));
    assert_eq!(tick::ticks(), 100);
}

static NESTED: AtomicU32 = AtomicU32::new(0);

fn reenter(_: tick::TickInstant) {
    // one level of re-entry per outer tick
    if NESTED.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
        tick::isr();
    }
}

#[test]
#[serial]
fn reentrant_ticks_are_all_counted() {
    running();
    NESTED.store(0, Ordering::SeqCst);

    tick::set_hook(Some(reenter));

    for _ in 0..50 {
        tick::isr();
    }

    tick::set_hook(None);

    assert_eq!(NESTED.load(Ordering::SeqCst), 100);
    assert_eq!(tick::ticks(), 100);
}
