use std::io;
use thiserror::Error;

/// Possible errors that arise from attempting to convert compressed Mario Party
/// data into its decompressed form, or from working with the ROM archive and text
/// banks around it.
#[derive(Error, Debug)]
pub enum MpError {
    #[error("Input is too short to hold the 8 byte compression header")]
    MissingHeader,

    #[error("Format version {0} is invalid and not supported")]
    InvalidVersion(u32),

    #[error("Compressed data ended prematurely after {decoded} of {expected} bytes")]
    TruncatedStream { decoded: usize, expected: usize },

    #[error("Input of {0} bytes is too large for the 32 bit size in the header")]
    InputTooLarge(usize),

    #[error("ROM has swapped data; unswap it with another tool first")]
    ByteSwappedRom,

    #[error("Not a known Mario Party ROM (header CRC {0:02x?})")]
    UnknownRom([u8; 8]),

    #[error("Archive pointer at {position:#010x} points outside the ROM: {reason}")]
    BadArchive { position: usize, reason: &'static str },

    #[error("Recompressed data does not decompress to the original data")]
    RoundTripMismatch,

    #[error("Worker thread panicked before finishing this entry")]
    WorkerPanicked,

    #[error("Text table line {line}: {reason}")]
    BadTable { line: usize, reason: String },

    #[error("\"{0}\" was not found in the text table")]
    UnknownText(String),

    #[error("Malformed text: {0}")]
    BadText(String),

    #[error("{expected} texts are needed, but {found} were provided")]
    TextCountMismatch { expected: usize, found: usize },

    #[error("Text bank needs {needed} bytes but only {available} are available")]
    TextBankTooLarge { needed: usize, available: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl MpError {
    /// Does this error mean the compressed data itself is malformed?
    ///
    /// Batch tools use this to tell "not compressed data" apart from a failing
    /// reader or writer.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader | Self::InvalidVersion(..) | Self::TruncatedStream { .. }
        )
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::TruncatedStream { .. })
    }
}
