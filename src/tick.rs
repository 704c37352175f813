use crate::config::TICK_HZ;
use core::cell::Cell;
use critical_section::Mutex;

pub type TickInstant = fugit::TimerInstantU64<TICK_HZ>;
pub type TickDuration = fugit::TimerDurationU64<TICK_HZ>;

/// Called from the tick interrupt with the new time, after the counter has
/// been advanced. Runs in interrupt context: it must not block.
pub type TickHook = fn(TickInstant);

// ARMv7-M has no 64-bit atomics, so the counter lives behind a critical
// section; the SysTick handler is the only writer.
static TICKS: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));
static HOOK: Mutex<Cell<Option<TickHook>>> = Mutex::new(Cell::new(None));

/// Body of the SysTick interrupt.
pub fn isr() {
    let (now, hook) = critical_section::with(|cs| {
        let ticks = TICKS.borrow(cs);
        let now = ticks.get().wrapping_add(1);

        ticks.set(now);

        (now, HOOK.borrow(cs).get())
    });

    if let Some(hook) = hook {
        hook(TickInstant::from_ticks(now));
    }
}

pub fn ticks() -> u64 {
    critical_section::with(|cs| TICKS.borrow(cs).get())
}

pub fn now() -> TickInstant {
    TickInstant::from_ticks(ticks())
}

/// time since `earlier`, saturating at zero for instants in the future.
pub fn elapsed(earlier: TickInstant) -> TickDuration {
    now()
        .checked_duration_since(earlier)
        .unwrap_or(TickDuration::from_ticks(0))
}

/// Register the scheduler's time-slice hook, replacing any previous one.
pub fn set_hook(hook: Option<TickHook>) {
    critical_section::with(|cs| HOOK.borrow(cs).set(hook));
}

#[cfg_attr(target_os = "none", allow(dead_code))]
pub(crate) fn reset() {
    critical_section::with(|cs| {
        TICKS.borrow(cs).set(0);
        HOOK.borrow(cs).set(None);
    });
}
