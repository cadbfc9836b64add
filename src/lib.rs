//! Compress and decompress the LZ data found in the N64 Mario Party ROM.
//!
//! ```
//! let original = b"mario mario mario luigi";
//! let compressed = mpcomp::compress(original);
//! let decompressed = mpcomp::decompress(&compressed).unwrap();
//! assert_eq!(&original[..], &decompressed[..]);
//! ```
//! See [`format`] for how the data is laid out.

mod decode;
mod encode;
mod errors;
pub mod format;
pub mod rom;
pub mod table;
pub mod texts;
pub mod window;

pub use decode::{decode, decompress, mp_info, Decoder};
pub use encode::{compress, encode, Encoder};
pub use errors::MpError;
pub use format::{MpHeader, Token};
pub use window::CircularWindow;
