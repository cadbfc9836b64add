//! Information and structures for compressed Mario Party data.
//!
//! A compressed file is an eight byte header followed by a stream of
//! control bytes and tokens. There is no trailer and no checksum.
//!
//! ## Header
//! The header holds the size of the decompressed data and a format version.
//! The key data can be extracted into an [`MpHeader`] by using [`mp_info()`].
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | size in big endian bytes of decompressed data |
//! | 4..8     | format version in big endian bytes (always `1`) |
//!
//! ## Control Bytes
//! Every group of up to eight tokens is preceded by one control byte. The bits
//! are read from least to most significant: a `1` bit means the next token is a
//! literal, a `0` bit means it is a match. The final group of a file may hold
//! fewer than eight tokens; its unused high bits are zero.
//!
//! ## Tokens
//! A literal is a single uncoded byte. A match is two bytes that copy from the
//! 1024 byte window of previously decoded output:
//! ```text
//!  b1        b2
//! ┌────────┐┌──┬──────┐
//!  oooooooo  OO llllll
//! ```
//! The ten bit offset is `OO oooooooo`, and the copy length is `llllll + 3`, so
//! between 3 and 66 bytes. The window position read from is the offset plus
//! [`OFFSET_BIAS`], modulo the window size.
//!
//! ## An Example
//! Let's encode the exciting and useful ascii string "AAAAAAAAAA" (10 bytes).
//! ```text
//! Header
//! 0000000A <- original file size of 10 bytes
//! 00000001 <- format version
//!
//! Encoded Data
//! 01       <- control byte: literal, then match
//! 41       <- uncoded ascii 'A'
//! BE C6    <- match: offset 0x3BE (window 0x000) | 6 + 3 = 9 bytes
//! ```
//! The match reads from the window position it is writing to minus one, so
//! the single 'A' is repeated nine more times.
//!
//! [`mp_info()`]: crate::mp_info

use crate::errors::MpError;
use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, BE};
use smallvec::SmallVec;
use std::convert::TryInto;
use std::fmt;
use std::io::{self, Read, Write};

/// Size of the circular dictionary shared by the encoder and decoder
pub const WINDOW_SIZE: usize = 0x400;
/// Constant added to an encoded match offset to get the window read position.
///
/// This comes from the buffer layout of the game's own decompressor, and every
/// compressed asset in a ROM depends on it.
pub const OFFSET_BIAS: usize = 66;
/// Shortest copy a match token can describe
pub const MIN_MATCH: usize = 3;
/// Longest copy a match token can describe
pub const MAX_MATCH: usize = 0x3F + MIN_MATCH;
/// Longest match the original compression tool emits
pub const MAX_ENCODED_MATCH: usize = 0x40;
/// The only known format version
pub const FORMAT_VERSION: u32 = 1;
/// Size in bytes of the [`MpHeader`]
pub const HEADER_SIZE: usize = 8;

/// The information stored at the start of compressed data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpHeader {
    /// size of decompressed data
    pub size: u32,
}

impl MpHeader {
    /// Parse the header from a byte array
    fn from_array(arr: &[u8; HEADER_SIZE]) -> Result<Self, MpError> {
        let size = u32::from_be_bytes(arr[0..4].try_into().unwrap());
        let version = u32::from_be_bytes(arr[4..8].try_into().unwrap());

        if version != FORMAT_VERSION {
            return Err(MpError::InvalidVersion(version));
        }

        Ok(Self { size })
    }
    /// Convenience function to read the header from a bitstream
    pub(crate) fn from_bitreader<R: Read>(reader: &mut BitReader<R, BE>) -> Result<Self, MpError> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_bytes(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => MpError::MissingHeader,
            _ => e.into(),
        })?;

        Self::from_array(&header)
    }
    /// Write out `self` to the big endian `BitWriter`
    pub(crate) fn write<W: Write>(&self, wtr: &mut BitWriter<W, BE>) -> Result<(), MpError> {
        wtr.write(32, self.size)?; // 0..4
        wtr.write(32, FORMAT_VERSION)?; // 4..8

        Ok(())
    }
}

/// One instruction in the compressed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// A single uncoded byte
    Literal(u8),
    /// Copy `length` bytes from the window, starting at `offset + OFFSET_BIAS`
    Match { offset: u16, length: u8 },
}

impl Token {
    /// Total number of bytes this token produces in the decompressed output
    pub fn size(&self) -> usize {
        match self {
            Self::Literal(..) => 1,
            Self::Match { length, .. } => *length as usize,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(..))
    }

    /// Unpack the two bytes of an encoded match
    pub(crate) fn from_match_bytes(b1: u8, b2: u8) -> Self {
        let offset = ((((b2 & 0xC0) as u16) << 2) | b1 as u16) & 0x3FF;
        let length = (b2 & 0x3F) + MIN_MATCH as u8;

        Self::Match { offset, length }
    }

    /// Read one token from `rdr`. The kind is decided by the control byte.
    pub(crate) fn from_bitreader<R: Read>(
        rdr: &mut BitReader<R, BE>,
        literal: bool,
    ) -> io::Result<Self> {
        if literal {
            rdr.read::<u8>(8).map(Self::Literal)
        } else {
            let mut bytes = [0u8; 2];
            rdr.read_bytes(&mut bytes)?;
            Ok(Self::from_match_bytes(bytes[0], bytes[1]))
        }
    }

    /// Write `self` to the big endian `BitWriter` in its encoded form
    pub(crate) fn write<W: Write>(&self, wtr: &mut BitWriter<W, BE>) -> io::Result<()> {
        match *self {
            Self::Literal(byte) => wtr.write(8, byte),
            Self::Match { offset, length } => {
                let code = (length - MIN_MATCH as u8) & 0x3F;
                let b1 = (offset & 0xFF) as u8;
                let b2 = ((offset & 0x300) >> 2) as u8 | code;
                wtr.write_bytes(&[b1, b2])
            }
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Literal(b) => write!(f, "Literal: {:02x}", b),
            Self::Match { offset, length } => write!(f, "Match: offset: {:03x} size: {}", offset, length),
        }
    }
}

/// A control byte being consumed by the decoder, lowest bit first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ControlByte(u8);

impl ControlByte {
    pub(crate) const TOKENS: usize = 8;

    pub(crate) fn new(byte: u8) -> Self {
        Self(byte)
    }
    /// Is the current token a literal?
    pub(crate) fn is_literal(&self) -> bool {
        self.0 & 1 == 1
    }
    /// Move on to the flag of the next token
    pub(crate) fn advance(&mut self) {
        self.0 >>= 1;
    }
}

/// Up to eight tokens waiting on their shared control byte
#[derive(Debug, Default)]
pub(crate) struct ControlGroup {
    flags: u8,
    tokens: SmallVec<[Token; ControlByte::TOKENS]>,
}

impl ControlGroup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `token` to the group. Each new flag enters at the top of the
    /// accumulator, so the first token of a full group ends up in bit 0.
    pub(crate) fn push(&mut self, token: Token) {
        debug_assert!(!self.is_full());
        self.flags >>= 1;
        if token.is_literal() {
            self.flags |= 0x80;
        }
        self.tokens.push(token);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.tokens.len() == ControlByte::TOKENS
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The control byte for the tokens currently in the group. A partial group is
    /// shifted down so the decoder still finds its first flag in bit 0.
    pub(crate) fn control_byte(&self) -> u8 {
        let missing = ControlByte::TOKENS - self.tokens.len();
        if missing == ControlByte::TOKENS {
            0
        } else {
            self.flags >> missing
        }
    }

    /// Write the control byte and the grouped tokens, then empty the group
    pub(crate) fn flush<W: Write>(&mut self, wtr: &mut BitWriter<W, BE>) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        wtr.write(8, self.control_byte())?;
        for token in &self.tokens {
            token.write(wtr)?;
        }

        self.flags = 0;
        self.tokens.clear();
        Ok(())
    }

    /// Write the last group of a stream. A stream that ended on a full group
    /// still gets a closing control byte, which is then 0 with no tokens.
    pub(crate) fn finish<W: Write>(&mut self, wtr: &mut BitWriter<W, BE>) -> io::Result<()> {
        if self.is_empty() {
            return wtr.write(8, 0u8);
        }

        self.flush(wtr)
    }
}
