use bitflags::bitflags;
use derivative::Derivative;

bitflags! {
    /// Configurable Fault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Cfsr: u32 {
        // MMFSR
        const IACCVIOL = 1 << 0;
        const DACCVIOL = 1 << 1;
        const MUNSTKERR = 1 << 3;
        const MSTKERR = 1 << 4;
        const MLSPERR = 1 << 5;
        const MMARVALID = 1 << 7;

        // BFSR
        const IBUSERR = 1 << 8;
        const PRECISERR = 1 << 9;
        const IMPRECISERR = 1 << 10;
        const UNSTKERR = 1 << 11;
        const STKERR = 1 << 12;
        const LSPERR = 1 << 13;
        const BFARVALID = 1 << 15;

        // UFSR
        const UNDEFINSTR = 1 << 16;
        const INVSTATE = 1 << 17;
        const INVPC = 1 << 18;
        const NOCP = 1 << 19;
        const UNALIGNED = 1 << 24;
        const DIVBYZERO = 1 << 25;
    }
}

bitflags! {
    /// HardFault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Hfsr: u32 {
        const VECTTBL = 1 << 1;
        const FORCED = 1 << 30;
        const DEBUGEVT = 1 << 31;
    }
}

impl Cfsr {
    pub const MMFSR: Cfsr = Cfsr::from_bits_retain(0x0000_00ff);
    pub const BFSR: Cfsr = Cfsr::from_bits_retain(0x0000_ff00);
    pub const UFSR: Cfsr = Cfsr::from_bits_retain(0xffff_0000);

    /// the hardware failed to push the exception frame, so the stacked
    /// registers are garbage (or unreadable).
    pub fn stacking_failed(&self) -> bool {
        self.intersects(Cfsr::MSTKERR | Cfsr::STKERR)
    }
}

/// raw fault registers as read at fault entry.
#[derive(Derivative, Clone, Copy, Default, PartialEq, Eq)]
#[derivative(Debug)]
pub struct FaultStatus {
    #[derivative(Debug(format_with = "hex"))]
    pub cfsr: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub hfsr: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub mmfar: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub bfar: u32,
}

impl FaultStatus {
    pub fn cfsr(&self) -> Cfsr {
        Cfsr::from_bits_retain(self.cfsr)
    }

    pub fn hfsr(&self) -> Hfsr {
        Hfsr::from_bits_retain(self.hfsr)
    }
}

/// registers the processor pushes on exception entry.
#[derive(Derivative, Clone, Copy, Default, PartialEq, Eq)]
#[derivative(Debug)]
#[repr(C)]
pub struct ExceptionFrame {
    #[derivative(Debug(format_with = "hex"))]
    pub r0: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub r1: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub r2: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub r3: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub r12: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub lr: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub pc: u32,
    #[derivative(Debug(format_with = "hex"))]
    pub xpsr: u32,
}

pub(crate) fn hex(value: &u32, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    write!(f, "{:#010x}", value)
}
