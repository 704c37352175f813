//! Everything `start` does between reset and the application entry point.

use crate::abort::{abort, AbortReason};
use crate::config::{AbortPolicy, Config, ConfigError};
use crate::hardware::Platform;
use crate::runtime::{Entered, StaticsReady};
use crate::vector::VectorTable;
use core::mem;
use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};
use thiserror::Error;

const WORD: usize = mem::size_of::<u32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartupError {
    #[error("region ends before it starts")]
    InvertedRegion,
    #[error("region bounds are not word aligned")]
    Misaligned,
    #[error(".bss, .data and the .data image overlap")]
    Overlap,
    #[error(".data mismatch at byte offset {offset}")]
    DataMismatch { offset: usize },
    #[error("exception {0} has no handler")]
    EmptyVector(u16),
    #[error("reserved vector slot {0} is not zero")]
    ReservedVector(u16),
    #[error("bad tick configuration: {0}")]
    Tick(#[from] ConfigError),
}

/// A `[start, end)` span of RAM words, as delimited by linker symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: *mut u32,
    pub end: *mut u32,
}

impl Region {
    pub const fn new(start: *mut u32, end: *mut u32) -> Self {
        Self { start, end }
    }

    fn validate(&self) -> Result<(), StartupError> {
        let (start, end) = (self.start as usize, self.end as usize);

        if start % WORD != 0 || end % WORD != 0 {
            return Err(StartupError::Misaligned);
        }

        if end < start {
            return Err(StartupError::InvertedRegion);
        }

        Ok(())
    }

    pub fn len_words(&self) -> usize {
        (self.end as usize).saturating_sub(self.start as usize) / WORD
    }

    fn span(&self) -> (usize, usize) {
        (self.start as usize, self.end as usize)
    }
}

fn overlaps((a_start, a_end): (usize, usize), (b_start, b_end): (usize, usize)) -> bool {
    a_start < b_end && b_start < a_end
}

/// Where the statics live: `.bss` gets zeroed, `.data` gets a copy of the
/// image the linker left in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub bss: Region,
    pub data: Region,
    pub image: *const u32,
}

impl Layout {
    pub fn validate(&self) -> Result<(), StartupError> {
        self.bss.validate()?;
        self.data.validate()?;

        if self.image as usize % WORD != 0 {
            return Err(StartupError::Misaligned);
        }

        let image = (
            self.image as usize,
            self.image as usize + self.data.len_words() * WORD,
        );

        if overlaps(self.bss.span(), self.data.span())
            || overlaps(self.bss.span(), image)
            || overlaps(self.data.span(), image)
        {
            return Err(StartupError::Overlap);
        }

        Ok(())
    }
}

/// Zero `.bss`, copy `.data` from its image, and read `.data` back.
///
/// # Safety
///
/// The layout must describe memory that is valid for writes (both regions)
/// and reads (the image) and that nothing else is using: on hardware, this
/// runs before any static is touched.
pub unsafe fn init_statics(layout: &Layout) -> Result<(), StartupError> {
    layout.validate()?;

    for index in 0..layout.bss.len_words() {
        ptr::write_volatile(layout.bss.start.add(index), 0);
    }

    for index in 0..layout.data.len_words() {
        let word = ptr::read_volatile(layout.image.add(index));
        ptr::write_volatile(layout.data.start.add(index), word);
    }

    compiler_fence(Ordering::SeqCst);

    for index in 0..layout.data.len_words() {
        let expected = ptr::read_volatile(layout.image.add(index));

        if ptr::read_volatile(layout.data.start.add(index)) != expected {
            return Err(StartupError::DataMismatch {
                offset: index * WORD,
            });
        }
    }

    Ok(())
}

/// Steps 1 to 3 of startup: vectors checked, statics initialised, then the
/// configuration fetched and applied. Interrupts stay masked.
///
/// `config` runs only once `.bss` and `.data` hold their initial values, so
/// the provider may read statics.
///
/// # Safety
///
/// Same contract as [`init_statics`].
pub unsafe fn prepare<P, C>(
    platform: &mut P,
    vectors: &VectorTable,
    layout: &Layout,
    config: C,
) -> Result<(), StartupError>
where
    P: Platform,
    C: FnOnce() -> Config,
{
    vectors.validate()?;

    init_statics(layout)?;

    StaticsReady.send();

    let config = config();
    let reload = config.systick_reload()?;

    platform.enable_fault_reporting(config.traps);
    platform.start_tick(reload);

    Ok(())
}

/// The whole startup sequence: prepare, unmask interrupts, run `entry`.
///
/// Never returns. A failed step and an `entry` that returns both end in
/// [`abort`].
///
/// # Safety
///
/// Same contract as [`init_statics`]; `entry` must not rely on statics being
/// initialised any earlier than this call.
pub unsafe fn boot<P, C, F>(
    platform: &mut P,
    vectors: &VectorTable,
    layout: &Layout,
    config: C,
    policy: &AbortPolicy,
    entry: F,
) -> !
where
    P: Platform,
    C: FnOnce() -> Config,
    F: FnOnce(&mut P),
{
    platform.disable_interrupts();

    if let Err(err) = prepare(platform, vectors, layout, config) {
        abort(platform, policy, AbortReason::Startup(err));
    }

    platform.enable_interrupts();

    Entered.send();

    entry(platform);

    abort(platform, policy, AbortReason::EntryReturned)
}
