//! The 1024 byte circular dictionary and its addressing rules.
//!
//! Every position handed to the window is reduced modulo [`WINDOW_SIZE`], so the
//! encoder and decoder never mask positions themselves.

use crate::format::{OFFSET_BIAS, WINDOW_SIZE};

/// Reduce any position to a slot in the window
#[inline]
pub const fn wrap(pos: usize) -> usize {
    pos & (WINDOW_SIZE - 1)
}

/// The window slot that an encoded match `offset` starts reading from
#[inline]
pub const fn read_position(offset: u16) -> usize {
    wrap(offset as usize + OFFSET_BIAS)
}

/// The encoded match offset that reads from window slot `pos`.
///
/// This is the inverse of [`read_position`]; `pos` may be any absolute
/// position, since the window holds byte `n` of the output at slot `n % 1024`.
#[inline]
pub const fn match_offset(pos: usize) -> u16 {
    wrap(pos + WINDOW_SIZE - OFFSET_BIAS) as u16
}

/// A fixed size dictionary of the most recent output bytes
///
/// The window starts out filled with zeros, so matches that reach "before" the
/// start of the data read zeros on both the encoding and decoding side.
#[derive(Clone)]
pub struct CircularWindow {
    buf: [u8; WINDOW_SIZE],
    cursor: usize,
}

impl CircularWindow {
    pub fn new() -> Self {
        Self {
            buf: [0; WINDOW_SIZE],
            cursor: 0,
        }
    }

    #[inline]
    pub fn read(&self, pos: usize) -> u8 {
        self.buf[wrap(pos)]
    }

    #[inline]
    pub fn write(&mut self, pos: usize, byte: u8) {
        self.buf[wrap(pos)] = byte;
    }

    /// Write `byte` at the cursor, then move the cursor forward
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.write(self.cursor, byte);
        self.cursor = wrap(self.cursor + 1);
    }

    /// The slot the next pushed byte will be written to
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Default for CircularWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CircularWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CircularWindow")
            .field("cursor", &self.cursor)
            .finish()
    }
}
