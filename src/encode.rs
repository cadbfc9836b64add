use crate::{
    errors::MpError,
    format::{ControlGroup, MpHeader},
};
use bitstream_io::{BigEndian, BitWriter};
use std::{
    convert::TryFrom,
    fs::File,
    io::Write,
    io::{BufReader, BufWriter, Cursor, Read},
    path::Path,
};

pub(crate) mod lzss;

use self::lzss::LzssPass;

type LogWtr<'a> = &'a mut dyn Write;

/// Specify the encoding settings, such as logging, input, and output
///
/// To create a new `Encoder`, use [`for_reader()`], [`for_file()`], or [`for_bytes()`].
/// Then, optionally turn on logging with [`with_logging()`].
/// Finally, encode the input data with [`encode_to_writer()`], [`encode_to_file()`], or [`encode_to_vec()`].
/// ```
/// # use mpcomp::Encoder;
/// let input = b"ABBACABBCADFEGABA";
/// let compressed = Encoder::for_bytes(input)
///     .with_logging(&mut ::std::io::stdout())
///     .encode_to_vec()
///     .unwrap();
/// assert_eq!(&compressed[0..8], &[0, 0, 0, 17, 0, 0, 0, 1]);
/// ```
///
/// There are no compression settings. The window (1024 bytes), the minimum
/// match (3 bytes), and the longest emitted match (64 bytes) are fixed by the
/// game, and the match search always picks the first of the longest matches
/// so that the output is byte for byte what the original tool produces.
///
/// [`for_reader()`]: Encoder::for_reader
/// [`for_file()`]: Encoder::for_file
/// [`for_bytes()`]: Encoder::for_bytes
/// [`with_logging()`]: Encoder::with_logging
/// [`encode_to_writer()`]: Encoder::encode_to_writer
/// [`encode_to_file()`]: Encoder::encode_to_file
/// [`encode_to_vec()`]: Encoder::encode_to_vec
pub struct Encoder<'a, R> {
    rdr: R,
    log: Option<LogWtr<'a>>,
}

impl<'a, R: Read> Encoder<'a, R> {
    /// Create a new `Encoder` for the data in `rdr`.
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self { rdr, log: None }
    }

    /// Write debugging and diagnotic information to `log` while the input is
    /// being encoded.
    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        let log = Some(log as &'a mut dyn Write);
        self.log = log;
        self
    }

    /// Start the encoding and write the compressed data out to `wtr`
    #[inline]
    pub fn encode_to_writer<W: Write>(&mut self, wtr: W) -> Result<(), MpError> {
        do_encode(self, wtr)
    }

    /// Start the encoding and write the compressed data out to the newly created
    /// `File` `f`
    #[inline]
    pub fn encode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), MpError> {
        let mut wtr = BufWriter::new(File::create(f)?);
        self.encode_to_writer(&mut wtr)?;
        wtr.flush().map_err(Into::into)
    }

    /// Start the encoding and return the compressed data in a `Vec<u8>`.
    #[inline]
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, MpError> {
        let data = Vec::new();
        let mut csr = Cursor::new(data);
        self.encode_to_writer(&mut csr).map(|_| csr.into_inner())
    }
}

impl<'a> Encoder<'a, BufReader<File>> {
    /// Create a new `Encoder` for the file at `p`.
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, MpError> {
        let rdr = BufReader::new(File::open(p)?);
        Ok(Self::for_reader(rdr))
    }
}

impl<'a> Encoder<'a, Cursor<&'a [u8]>> {
    /// Create a new `Encoder` for the data the `bytes` slice.
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

/// Compress data into a `Vec<u8>`
///
/// This is a convenience function to encode a `Read`er without having to
/// import and set up an [`Encoder`].
pub fn encode<R: Read>(rdr: R) -> Result<Vec<u8>, MpError> {
    Encoder::for_reader(rdr).encode_to_vec()
}

/// Compress a byte slice.
///
/// # Panics
/// Panics if `bytes` is longer than `u32::MAX`, since the header cannot hold
/// its size. Use an [`Encoder`] to get an [`MpError::InputTooLarge`] instead.
pub fn compress(bytes: &[u8]) -> Vec<u8> {
    match Encoder::for_bytes(bytes).encode_to_vec() {
        Ok(data) => data,
        Err(err) => panic!("{}", err),
    }
}

fn do_encode<R: Read, W: Write>(opts: &mut Encoder<'_, R>, mut wtr: W) -> Result<(), MpError> {
    let Encoder {
        rdr,
        ref mut log,
    } = opts;

    let mut input = Vec::new();
    rdr.read_to_end(&mut input)?;

    let header = MpHeader {
        size: u32::try_from(input.len()).map_err(|_| MpError::InputTooLarge(input.len()))?,
    };

    let lzss = lzss::compress_buf(&input, log)?;

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "{}", &lzss)?;
    }

    write_file(&mut wtr, header, &lzss)
}

fn write_file(
    wtr: &mut dyn Write,
    header: MpHeader,
    encoded_data: &LzssPass,
) -> Result<(), MpError> {
    let mut out = BitWriter::endian(wtr, BigEndian);

    header.write(&mut out)?;

    let mut group = ControlGroup::new();
    for &token in &encoded_data.buf {
        group.push(token);
        if group.is_full() {
            group.flush(&mut out)?;
        }
    }
    if !encoded_data.buf.is_empty() {
        group.finish(&mut out)?;
    }

    Ok(())
}
