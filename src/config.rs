use crate::hardware::Traps;
use fugit::HertzU32;
use thiserror::Error;

/// resolution of the system tick (in hertz)
pub const TICK_HZ: u32 = 1_000;

/// the SysTick reload register is 24 bits wide
pub const SYSTICK_MAX_RELOAD: u32 = 0x00ff_ffff;

/// Settings the application hands to `start` through `boot_config`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub core_clock: HertzU32,
    pub tick_rate: HertzU32,
    pub traps: Traps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("tick rate must be non-zero")]
    ZeroTickRate,
    #[error("tick rate {tick_hz} Hz exceeds core clock {core_hz} Hz")]
    TickFasterThanCore { tick_hz: u32, core_hz: u32 },
    #[error("SysTick reload {0:#x} does not fit in 24 bits")]
    ReloadOutOfRange(u32),
}

impl Config {
    /// 16 MHz core (the reset clock of most STM32 parts), ticking at
    /// [`TICK_HZ`], no extra traps.
    pub const fn new() -> Self {
        Self {
            core_clock: HertzU32::from_raw(16_000_000),
            tick_rate: HertzU32::from_raw(TICK_HZ),
            traps: Traps {
                divide_by_zero: false,
                unaligned: false,
            },
        }
    }

    pub const fn core_clock(mut self, core_clock: HertzU32) -> Self {
        self.core_clock = core_clock;
        self
    }

    pub const fn tick_rate(mut self, tick_rate: HertzU32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub const fn traps(mut self, traps: Traps) -> Self {
        self.traps = traps;
        self
    }

    /// SysTick reload value producing one interrupt per tick.
    pub fn systick_reload(&self) -> Result<u32, ConfigError> {
        let core_hz = self.core_clock.raw();
        let tick_hz = self.tick_rate.raw();

        if tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }

        if tick_hz > core_hz {
            return Err(ConfigError::TickFasterThanCore { tick_hz, core_hz });
        }

        let reload = core_hz / tick_hz - 1;

        if reload > SYSTICK_MAX_RELOAD {
            return Err(ConfigError::ReloadOutOfRange(reload));
        }

        Ok(reload)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// What the abort routine does once interrupts are off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortAction {
    /// spin forever, leaving state intact for a debugger.
    Halt,
    /// request a system reset through AIRCR.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortPolicy {
    pub action: AbortAction,
    /// execute `bkpt` before the terminal action when a debugger is attached
    pub breakpoint: bool,
    /// emit a one-line status message
    pub report: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPolicy {
    /// number of fault handler activations allowed to capture diagnostics;
    /// a fault nested deeper than this aborts immediately.
    pub capture_depth: u8,
    pub abort: AbortPolicy,
}

/// The abort path reads its policy from flash, never from RAM that might be
/// uninitialised or corrupted.
pub const ABORT_POLICY: AbortPolicy = AbortPolicy {
    action: if cfg!(feature = "reset-on-abort") {
        AbortAction::Reset
    } else {
        AbortAction::Halt
    },
    breakpoint: cfg!(feature = "breakpoint-on-abort"),
    report: true,
};

pub const FAULT_POLICY: FaultPolicy = FaultPolicy {
    capture_depth: 1,
    abort: ABORT_POLICY,
};
