//! The ARMv7-M core exception table.
//!
//! Slot 0 (the initial stack pointer) is emitted by `link.x`; this module
//! lays out the fifteen handler slots that follow it. Device interrupts are
//! appended by the device crate in `.vector_table.interrupts`.

use crate::fault::FaultClass;
use crate::startup::StartupError;

pub type Handler = unsafe extern "C" fn();

/// number of core exception slots after the stack pointer
pub const EXCEPTION_SLOTS: usize = 15;

#[derive(Clone, Copy)]
#[repr(C)]
pub union Vector {
    pub handler: Handler,
    pub reserved: usize,
}

impl Vector {
    pub const RESERVED: Vector = Vector { reserved: 0 };

    pub const fn handler(handler: Handler) -> Self {
        Vector { handler }
    }

    pub fn address(&self) -> usize {
        // both fields are pointer sized and always initialised
        unsafe { self.reserved }
    }
}

/// Core exceptions, numbered the way IPSR numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Exception {
    Reset = 1,
    Nmi = 2,
    HardFault = 3,
    MemManage = 4,
    BusFault = 5,
    UsageFault = 6,
    SVCall = 11,
    DebugMonitor = 12,
    PendSV = 14,
    SysTick = 15,
}

impl Exception {
    pub const ALL: [Exception; 10] = [
        Exception::Reset,
        Exception::Nmi,
        Exception::HardFault,
        Exception::MemManage,
        Exception::BusFault,
        Exception::UsageFault,
        Exception::SVCall,
        Exception::DebugMonitor,
        Exception::PendSV,
        Exception::SysTick,
    ];

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u16) -> Option<Exception> {
        Exception::ALL
            .iter()
            .copied()
            .find(|exception| u16::from(exception.number()) == number)
    }

    /// index into [`VectorTable`]'s slots
    pub const fn slot(self) -> usize {
        self as usize - 1
    }

    /// exceptions whose slot the boot core fills itself; the rest go to the
    /// default handler.
    pub const fn is_owned(self) -> bool {
        matches!(
            self,
            Exception::Reset
                | Exception::HardFault
                | Exception::MemManage
                | Exception::BusFault
                | Exception::UsageFault
                | Exception::SysTick
        )
    }

    pub const fn fault_class(self) -> Option<FaultClass> {
        match self {
            Exception::HardFault => Some(FaultClass::Hard),
            Exception::MemManage => Some(FaultClass::Memory),
            Exception::BusFault => Some(FaultClass::Bus),
            Exception::UsageFault => Some(FaultClass::Usage),
            _ => None,
        }
    }
}

/// Handlers for the slots the boot core owns, plus the catch-all every other
/// slot is routed to.
#[derive(Clone, Copy)]
pub struct Handlers {
    pub reset: Handler,
    pub hard_fault: Handler,
    pub mem_fault: Handler,
    pub bus_fault: Handler,
    pub usage_fault: Handler,
    pub systick: Handler,
    pub default: Handler,
}

#[repr(C)]
pub struct VectorTable {
    slots: [Vector; EXCEPTION_SLOTS],
}

unsafe impl Sync for VectorTable {}

impl VectorTable {
    pub const fn new(handlers: Handlers) -> Self {
        let default = Vector::handler(handlers.default);
        let mut slots = [Vector::RESERVED; EXCEPTION_SLOTS];

        slots[Exception::Reset.slot()] = Vector::handler(handlers.reset);
        slots[Exception::Nmi.slot()] = default;
        slots[Exception::HardFault.slot()] = Vector::handler(handlers.hard_fault);
        slots[Exception::MemManage.slot()] = Vector::handler(handlers.mem_fault);
        slots[Exception::BusFault.slot()] = Vector::handler(handlers.bus_fault);
        slots[Exception::UsageFault.slot()] = Vector::handler(handlers.usage_fault);
        slots[Exception::SVCall.slot()] = default;
        slots[Exception::DebugMonitor.slot()] = default;
        slots[Exception::PendSV.slot()] = default;
        slots[Exception::SysTick.slot()] = Vector::handler(handlers.systick);

        Self { slots }
    }

    pub fn get(&self, exception: Exception) -> Vector {
        self.slots[exception.slot()]
    }

    /// Every slot the hardware can dispatch to holds a code address, and
    /// every reserved slot is zero.
    pub fn validate(&self) -> Result<(), StartupError> {
        for (index, slot) in self.slots.iter().enumerate() {
            // slot index is one less than the exception number
            let number = index as u16 + 1;
            let dispatchable = Exception::from_number(number).is_some();

            match (dispatchable, slot.address()) {
                (true, 0) => return Err(StartupError::EmptyVector(number)),
                (false, address) if address != 0 => {
                    return Err(StartupError::ReservedVector(number));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
