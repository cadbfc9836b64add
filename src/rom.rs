//! Finding the compressed data inside a Mario Party ROM.
//!
//! ## ROM identification
//! The eight bytes at `0x10` in the ROM header (the header CRC) identify which
//! release an image is. ROMs in byte-swapped (`.v64`) order are recognized but
//! rejected; they have to be converted to big endian first.
//!
//! ## Archive layout
//! All of the game's data files live between `data_start` and `data_end`:
//! ```text
//! data_start: file count (u32 BE)
//!             file pointers (u32 BE each, relative to data_start)
//! file:       sub-file count (u32 BE)
//!             sub-file pointers (u32 BE each, relative to the file)
//! ```
//! A sub-file runs until the next sub-file, or the next file, or `data_end`.
//! Most sub-files are compressed, but not all of them, and each one may carry
//! some padding after its compressed stream.

use crate::errors::MpError;
use crate::{compress, decompress};
use std::{
    borrow::Cow,
    convert::TryInto,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

const CRC_POSITION: usize = 0x10;
const CRC_SIZE: usize = 8;

/// Release of the game that a ROM image belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    NtscJ,
    NtscU,
    Pal,
}

/// Location of one language's text bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub texts_start: usize,
    pub texts_end: usize,
}

impl Language {
    /// Space available for this language's text bank
    pub fn capacity(&self) -> usize {
        self.texts_end - self.texts_start
    }
}

/// Layout of a known ROM image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomInfo {
    pub region: Region,
    pub region_name: &'static str,
    pub crc: [u8; CRC_SIZE],
    pub data_start: usize,
    pub data_end: usize,
    pub number_of_texts: usize,
    pub languages: &'static [Language],
}

pub static KNOWN_ROMS: [RomInfo; 3] = [
    RomInfo {
        region: Region::NtscJ,
        region_name: "NTSC-J",
        crc: [0xad, 0xa8, 0x15, 0xbe, 0x60, 0x28, 0x62, 0x2f],
        data_start: 0x31ba80,
        data_end: 0xfb47a0,
        number_of_texts: 0x52C,
        languages: &[Language {
            name: "Japanese",
            texts_start: 0xfb47a0,
            texts_end: 0xfc4930,
        }],
    },
    RomInfo {
        region: Region::NtscU,
        region_name: "NTSC-U",
        crc: [0x28, 0x29, 0x65, 0x7e, 0xa0, 0x62, 0x18, 0x77],
        data_start: 0x31c7e0,
        data_end: 0xfcb860,
        number_of_texts: 0x52F,
        languages: &[Language {
            name: "English",
            texts_start: 0xfcb860,
            texts_end: 0xfe2310,
        }],
    },
    RomInfo {
        region: Region::Pal,
        region_name: "PAL",
        crc: [0x9c, 0x66, 0x30, 0x69, 0x80, 0xf2, 0x4a, 0x80],
        data_start: 0x3373c0,
        data_end: 0xff0850,
        number_of_texts: 0x52F,
        languages: &[
            Language {
                name: "English",
                texts_start: 0xff0850,
                texts_end: 0x1007310,
            },
            Language {
                name: "German",
                texts_start: 0x1007310,
                texts_end: 0x101f110,
            },
            Language {
                name: "French",
                texts_start: 0x101f110,
                texts_end: 0x10357d0,
            },
        ],
    },
];

/// Find which known release `rom` is
pub fn identify(rom: &[u8]) -> Result<&'static RomInfo, MpError> {
    let crc: [u8; CRC_SIZE] = rom
        .get(CRC_POSITION..CRC_POSITION + CRC_SIZE)
        .and_then(|s| s.try_into().ok())
        .ok_or(MpError::BadArchive {
            position: CRC_POSITION,
            reason: "ROM is too small to hold a header",
        })?;
    let swapped = swap_pairs(crc);

    for info in KNOWN_ROMS.iter() {
        if info.crc == swapped {
            return Err(MpError::ByteSwappedRom);
        }
        if info.crc == crc {
            return Ok(info);
        }
    }

    Err(MpError::UnknownRom(crc))
}

fn swap_pairs(mut bytes: [u8; CRC_SIZE]) -> [u8; CRC_SIZE] {
    for pair in bytes.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    bytes
}

/// Read a big endian `u32` at `position`
pub(crate) fn read_u32(rom: &[u8], position: usize) -> Result<u32, MpError> {
    rom.get(position..position + 4)
        .and_then(|s| s.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or(MpError::BadArchive {
            position,
            reason: "read past the end of the ROM",
        })
}

/// Read a count followed by that many big endian `u32` pointers
pub(crate) fn read_pointer_table(rom: &[u8], position: usize) -> Result<Vec<usize>, MpError> {
    let count = read_u32(rom, position)? as usize;
    (0..count)
        .map(|i| read_u32(rom, position + 4 + i * 4).map(|p| p as usize))
        .collect()
}

/// One sub-file of the ROM archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveEntry<'a> {
    /// pointer to the file, relative to the start of the archive
    pub file: u32,
    /// pointer to the sub-file, relative to its file
    pub sub_file: u32,
    /// absolute position in the ROM
    pub position: usize,
    pub data: &'a [u8],
}

impl<'a> ArchiveEntry<'a> {
    /// Where mass extraction stores this entry: `FILE/SUBFILE`, as eight hex digits each
    pub fn relative_path(&self) -> PathBuf {
        [format!("{:08X}", self.file), format!("{:08X}", self.sub_file)]
            .iter()
            .collect()
    }
}

/// A ROM image that has been identified as Mario Party
#[derive(Debug, Clone, Copy)]
pub struct Archive<'a> {
    rom: &'a [u8],
    info: &'static RomInfo,
}

impl<'a> Archive<'a> {
    pub fn open(rom: &'a [u8]) -> Result<Self, MpError> {
        identify(rom).map(|info| Self { rom, info })
    }

    pub fn info(&self) -> &'static RomInfo {
        self.info
    }

    pub fn rom(&self) -> &'a [u8] {
        self.rom
    }

    /// Walk the file and sub-file pointer tables and collect every sub-file
    pub fn entries(&self) -> Result<Vec<ArchiveEntry<'a>>, MpError> {
        archive_entries(self.rom, self.info.data_start, self.info.data_end)
    }
}

/// Collect every sub-file of the archive that lives in `rom[data_start..data_end]`
pub fn archive_entries(
    rom: &[u8],
    data_start: usize,
    data_end: usize,
) -> Result<Vec<ArchiveEntry<'_>>, MpError> {
    if data_end > rom.len() {
        return Err(MpError::BadArchive {
            position: data_end,
            reason: "data section ends past the end of the ROM",
        });
    }

    let files = read_pointer_table(rom, data_start)?;
    let mut entries = Vec::new();

    for (f, &file) in files.iter().enumerate() {
        let file_position = data_start + file;
        let sub_files = read_pointer_table(rom, file_position)?;

        let file_end = files
            .get(f + 1)
            .map(|&next| data_start + next)
            .unwrap_or(data_end);

        for (sf, &sub_file) in sub_files.iter().enumerate() {
            let position = file_position + sub_file;
            let end = sub_files
                .get(sf + 1)
                .map(|&next| file_position + next)
                .unwrap_or(file_end);

            if position > end || end > data_end {
                return Err(MpError::BadArchive {
                    position,
                    reason: "sub-file pointers are out of order",
                });
            }

            entries.push(ArchiveEntry {
                file: file as u32,
                sub_file: sub_file as u32,
                position,
                data: &rom[position..end],
            });
        }
    }

    Ok(entries)
}

/// The bytes of an entry after mass extraction
#[derive(Debug)]
pub struct Extracted<'a> {
    pub entry: ArchiveEntry<'a>,
    pub data: Cow<'a, [u8]>,
    /// why the entry was kept as-is, if decompression was attempted and failed
    pub raw_reason: Option<MpError>,
}

/// Decompress an entry, or fall back to its raw bytes if it is not compressed data
pub fn extract_entry(entry: ArchiveEntry<'_>, decompress_data: bool) -> Extracted<'_> {
    if !decompress_data {
        return Extracted {
            entry,
            data: Cow::Borrowed(entry.data),
            raw_reason: None,
        };
    }

    match decompress(entry.data) {
        Ok(data) => Extracted {
            entry,
            data: Cow::Owned(data),
            raw_reason: None,
        },
        Err(err) => Extracted {
            entry,
            data: Cow::Borrowed(entry.data),
            raw_reason: Some(err),
        },
    }
}

/// Result of round tripping one archive entry
#[derive(Debug)]
pub struct EntryReport {
    pub position: usize,
    /// `recompressed size / original size`, or why the entry failed
    pub ratio: Result<f32, MpError>,
}

#[derive(Debug)]
pub struct BenchmarkReport {
    pub entries: Vec<EntryReport>,
    pub elapsed: Duration,
}

impl BenchmarkReport {
    pub fn processed(&self) -> usize {
        self.entries.iter().filter(|e| e.ratio.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.processed()
    }

    /// Mean compression ratio over the entries that round tripped
    pub fn average_ratio(&self) -> Option<f32> {
        let ratios: Vec<f32> = self
            .entries
            .iter()
            .filter_map(|e| e.ratio.as_ref().ok().copied())
            .collect();

        if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f32>() / ratios.len() as f32)
        }
    }
}

/// Decompress `compressed`, compress it again, and check that the new data
/// decompresses to the same bytes. Returns the new size over the old size.
pub fn round_trip(compressed: &[u8]) -> Result<f32, MpError> {
    let original = decompress(compressed)?;
    let recompressed = compress(&original);
    let decompressed = decompress(&recompressed)?;

    if decompressed != original {
        return Err(MpError::RoundTripMismatch);
    }

    Ok(recompressed.len() as f32 / compressed.len() as f32)
}

/// Round trip every entry, spread across `workers` threads.
///
/// Failing entries are recorded in the report and do not stop the others.
pub fn benchmark(entries: &[ArchiveEntry<'_>], workers: usize) -> BenchmarkReport {
    let start = Instant::now();
    let workers = workers.max(1);
    let chunk_size = ((entries.len() + workers - 1) / workers).max(1);

    let reports: Vec<EntryReport> = thread::scope(|s| {
        let handles: Vec<_> = entries
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = s.spawn(move || {
                    chunk
                        .iter()
                        .map(|e| EntryReport {
                            position: e.position,
                            ratio: round_trip(e.data),
                        })
                        .collect::<Vec<_>>()
                });
                (chunk, handle)
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|(chunk, h)| chunk_reports(chunk, h.join()))
            .collect()
    });

    BenchmarkReport {
        entries: reports,
        elapsed: start.elapsed(),
    }
}

/// A worker that panicked fails every entry of its chunk
fn chunk_reports(
    chunk: &[ArchiveEntry<'_>],
    joined: thread::Result<Vec<EntryReport>>,
) -> Vec<EntryReport> {
    match joined {
        Ok(reports) => reports,
        Err(_) => chunk
            .iter()
            .map(|e| EntryReport {
                position: e.position,
                ratio: Err(MpError::WorkerPanicked),
            })
            .collect(),
    }
}
