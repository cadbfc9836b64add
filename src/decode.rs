use crate::errors::MpError;
use crate::format::{ControlByte, MpHeader, Token};
use crate::window::{self, CircularWindow};
use bitstream_io::{BigEndian, BitRead, BitReader};
use std::{
    fs::File,
    io::{self, BufReader, Cursor, Read, Write},
    path::Path,
};

type LogWtr<'a> = &'a mut dyn Write;

const MAX_RESERVE: usize = 1 << 20;

/// Specify the decoding settings, such as logging, input, and output.
///
/// To create a new `Decoder`, use [`for_reader()`], [`for_bytes()`], or
/// [`for_file()`]. Then, change any of the decoder settings.
/// Finally, decode the input data with [`decode()`].
/// ```
/// # use mpcomp::{Encoder, Decoder};
/// let original = b"ABBACABBACD";
/// let compressed = Encoder::for_bytes(original)
///     .encode_to_vec()
///     .unwrap();
/// let decompressed = Decoder::for_bytes(&compressed)
///     .decode()
///     .unwrap();
/// assert_eq!(&original[..], decompressed);
/// ```
/// You can use a `Decoder` to get the [`MpHeader`] with [`header()`]:
/// ```
/// # use mpcomp::{Encoder, Decoder};
/// # let original = b"ABBACABBACD";
/// # let compressed = Encoder::for_bytes(original).encode_to_vec().unwrap();
/// let mut decoder = Decoder::for_bytes(&compressed);
/// let size = decoder.header().unwrap().size as usize;
/// assert_eq!(size, original.len());
/// ```
/// A `Decoder` consumes its input, so only one of [`decode()`] or [`tokens()`]
/// can be called on it.
///
/// [`for_reader()`]: Decoder::for_reader
/// [`for_bytes()`]: Decoder::for_bytes
/// [`for_file()`]: Decoder::for_file
/// [`decode()`]: Decoder::decode
/// [`header()`]: Decoder::header
/// [`tokens()`]: Decoder::tokens
pub struct Decoder<'a, R: Read> {
    src: BitReader<R, BigEndian>,
    log: Option<LogWtr<'a>>,
    header: Option<MpHeader>,
}

impl<'a, R: Read> Decoder<'a, R> {
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            src: BitReader::endian(rdr, BigEndian),
            log: None,
            header: None,
        }
    }

    /// Write every decoded token to `wtr` while decoding.
    #[inline]
    pub fn with_logging<W: Write>(&mut self, wtr: &'a mut W) -> &mut Self {
        self.log = Some(wtr as LogWtr);
        self
    }

    #[inline]
    pub fn header(&mut self) -> Result<MpHeader, MpError> {
        match self.header {
            Some(hdr) => Ok(hdr),
            None => {
                let hdr = MpHeader::from_bitreader(&mut self.src)?;
                self.header = Some(hdr);
                Ok(hdr)
            }
        }
    }

    /// Decompress the input into a `Vec<u8>` of exactly the size in the header
    #[inline]
    pub fn decode(&mut self) -> Result<Vec<u8>, MpError> {
        do_decode(self, None)
    }

    /// Decompress the input, but return the tokens that make up the stream
    /// instead of the decompressed bytes.
    ///
    /// A final match that runs past the size in the header is reported as
    /// written in the stream.
    pub fn tokens(&mut self) -> Result<Vec<Token>, MpError> {
        let mut tokens = Vec::new();
        do_decode(self, Some(&mut tokens))?;
        Ok(tokens)
    }
}

impl<'a> Decoder<'a, Cursor<&'a [u8]>> {
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

impl<'a> Decoder<'a, BufReader<File>> {
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, MpError> {
        File::open(p)
            .map(BufReader::new)
            .map(Self::for_reader)
            .map_err(Into::into)
    }
}

/// Decompress Mario Party data into a `Vec<u8>`
///
/// This is a convenience function to decode a `Read`er without
/// having to import and set up a [`Decoder`]
pub fn decode<R: Read>(rdr: R) -> Result<Vec<u8>, MpError> {
    Decoder::for_reader(rdr).decode()
}

/// Decompress a byte slice of Mario Party data.
///
/// Any bytes after the end of the compressed stream are ignored.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, MpError> {
    Decoder::for_bytes(bytes).decode()
}

/// Extract the [`MpHeader`] from compressed data
///
/// This is a convenience function to check the header without having
/// to set up a [`Decoder`]
pub fn mp_info<R: Read>(rdr: R) -> Result<MpHeader, MpError> {
    Decoder::for_reader(rdr).header()
}

fn do_decode<R: Read>(
    opt: &mut Decoder<R>,
    mut tokens: Option<&mut Vec<Token>>,
) -> Result<Vec<u8>, MpError> {
    let header = opt.header()?;
    let Decoder { src, log, .. } = opt;

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "# Header\n{:?}\n", &header)?;
    }

    let expected = header.size as usize;
    let mut output: Vec<u8> = Vec::with_capacity(initial_capacity(expected));
    let mut window = CircularWindow::new();

    while output.len() < expected {
        let mut control = src
            .read::<u8>(8)
            .map(ControlByte::new)
            .map_err(|e| truncated(e, output.len(), expected))?;

        for _ in 0..ControlByte::TOKENS {
            if output.len() >= expected {
                break;
            }

            let token = Token::from_bitreader(src, control.is_literal())
                .map_err(|e| truncated(e, output.len(), expected))?;

            if let Some(wtr) = log.as_mut() {
                writeln!(wtr, "{:04x} - {}", output.len(), token)?;
            }

            match token {
                Token::Literal(byte) => {
                    window.push(byte);
                    output.push(byte);
                }
                Token::Match { offset, length } => {
                    let start = output.len();
                    let mut read_pos = window::read_position(offset);
                    let length = (length as usize).min(expected - start);

                    // the copy can read bytes it has just written
                    for _ in 0..length {
                        let byte = window.read(read_pos);
                        window.push(byte);
                        output.push(byte);
                        read_pos += 1;
                    }

                    if let Some(wtr) = log.as_mut() {
                        writeln!(wtr, "\t{:02x?}", &output[start..])?;
                    }
                }
            }

            if let Some(list) = tokens.as_mut() {
                list.push(token);
            }

            control.advance();
        }
    }

    Ok(output)
}

/// How much output to reserve up front. The header size is not trusted, since
/// raw data can look like a header; the output grows past this as needed.
fn initial_capacity(expected: usize) -> usize {
    expected.min(MAX_RESERVE)
}

/// Running out of input in the middle of the token stream means the data was cut short
fn truncated(err: io::Error, decoded: usize, expected: usize) -> MpError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => MpError::TruncatedStream { decoded, expected },
        _ => err.into(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_literal_then_run() {
        // 'A' then a nine byte match reading the slot just written
        let data = [0, 0, 0, 10, 0, 0, 0, 1, 0x01, 0x41, 0xBE, 0xC6];
        let decoded = decompress(&data).unwrap();

        assert_eq!(decoded, [0x41; 10]);
    }

    #[test]
    fn match_before_start_reads_zeros() {
        // offset 0x3BE reads window slot 0, which is still zero seeded
        let data = [0, 0, 0, 4, 0, 0, 0, 1, 0x00, 0xBE, 0xC1];
        let decoded = decompress(&data).unwrap();

        assert_eq!(decoded, [0; 4]);
    }

    #[test]
    fn match_is_clipped_to_header_size() {
        let data = [0, 0, 0, 5, 0, 0, 0, 1, 0x01, 0x41, 0xBE, 0xC6];
        let decoded = decompress(&data).unwrap();

        assert_eq!(decoded, [0x41; 5]);
    }

    #[test]
    fn empty_output_reads_no_tokens() {
        let data = [0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(decompress(&data).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn cut_off_match_is_truncated() {
        let data = [0, 0, 0, 10, 0, 0, 0, 1, 0x01, 0x41, 0xBE];
        match decompress(&data) {
            Err(MpError::TruncatedStream { decoded: 1, expected: 10 }) => (),
            other => panic!("expected truncated stream, got {:?}", other),
        }
    }

    #[test]
    fn missing_control_byte_is_truncated() {
        let data = [0, 0, 0, 2, 0, 0, 0, 1];
        let err = decompress(&data).unwrap_err();

        assert!(err.is_truncated());
        assert!(err.is_format_error());
    }

    #[test]
    fn huge_size_is_not_reserved() {
        assert_eq!(initial_capacity(10), 10);
        assert_eq!(initial_capacity(u32::MAX as usize), MAX_RESERVE);

        // raw data whose header fields happen to look valid
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 1, 0xFF, 0x41];
        match decompress(&data) {
            Err(MpError::TruncatedStream { decoded: 1, expected }) => {
                assert_eq!(expected, u32::MAX as usize)
            }
            other => panic!("expected truncated stream, got {:?}", other),
        }
    }

    #[test]
    fn short_header() {
        let err = decompress(&[0, 0, 0, 2, 0]).unwrap_err();
        assert!(matches!(err, MpError::MissingHeader));
    }

    #[test]
    fn decoder_log_lists_tokens() {
        let data = [0, 0, 0, 10, 0, 0, 0, 1, 0x01, 0x41, 0xBE, 0xC6];
        let mut log = Vec::new();
        Decoder::for_bytes(&data)
            .with_logging(&mut log)
            .decode()
            .unwrap();
        let log = String::from_utf8(log).unwrap();

        assert!(log.contains("0000 - Literal: 41"));
        assert!(log.contains("0001 - Match: offset: 3be size: 9"));
    }
}
