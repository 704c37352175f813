//! Boot and fault-dispatch core for ARMv7-M microcontrollers.
//!
//! On the target this crate owns the reset vector, the four fault vectors and
//! SysTick. Everything below `rt` is plain Rust over the [`Platform`] trait
//! and runs on the host against [`hardware::sim::Sim`].
//!
//! [`Platform`]: hardware::Platform

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std)]

pub mod abort;
pub mod config;
pub mod diag;
pub mod fault;
pub mod hardware;
pub mod runtime;
pub mod startup;
pub mod tick;
pub mod vector;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod rt;

pub use crate::abort::AbortReason;
pub use crate::config::{Config, TICK_HZ};
pub use crate::fault::{FaultClass, FaultRecord};
pub use crate::hardware::Traps;
pub use crate::tick::{TickDuration, TickInstant};
