use crate::hardware::Platform;
use core::fmt::{self, Write};
use heapless::String;

/// longest diagnostic line; anything past it is cut off
pub const LINE_LEN: usize = 160;

pub type Line = String<LINE_LEN>;

/// Format `args` on the stack and hand the line to the platform's debug
/// channel. Overlong lines are truncated rather than dropped.
pub fn emit<P: Platform>(platform: &mut P, args: fmt::Arguments) {
    let mut line = Line::new();

    // a full buffer is the only error and what was written is still useful
    line.write_fmt(args).ok();

    platform.debug_write(&line);
}
