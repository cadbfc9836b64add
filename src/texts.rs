//! Reading and rebuilding the per-language text banks.
//!
//! Text banks are not compressed. Each one is laid out as:
//! ```text
//! count (u32 BE)
//! pointers (u32 BE each, relative to the start of the bank)
//! texts: length (u16 BE), then `length` bytes of table codes ending in 0x00
//! ```
//! Every text starts on an even address.

use crate::errors::MpError;
use crate::rom::{read_pointer_table, Language, RomInfo};
use crate::table::Table;
use std::convert::{TryFrom, TryInto};

/// Read the raw binary strings of the bank at `start`
pub fn read_bank(rom: &[u8], start: usize) -> Result<Vec<&[u8]>, MpError> {
    read_pointer_table(rom, start)?
        .into_iter()
        .map(|pointer| {
            let position = start + pointer;
            let len = rom
                .get(position..position + 2)
                .and_then(|s| s.try_into().ok())
                .map(u16::from_be_bytes)
                .ok_or(MpError::BadArchive {
                    position,
                    reason: "text pointer is past the end of the ROM",
                })? as usize;

            rom.get(position + 2..position + 2 + len)
                .ok_or(MpError::BadArchive {
                    position,
                    reason: "text runs past the end of the ROM",
                })
        })
        .collect()
}

/// Lay out binary strings as a text bank
pub fn build_bank<T: AsRef<[u8]>>(texts: &[T]) -> Result<Vec<u8>, MpError> {
    let count = texts.len();
    let mut bank = Vec::new();
    bank.extend_from_slice(&(count as u32).to_be_bytes());
    bank.resize(4 + count * 4, 0);

    let mut data_position = bank.len();

    for (i, text) in texts.iter().enumerate() {
        let text = text.as_ref();
        let len = u16::try_from(text.len())
            .map_err(|_| MpError::BadText(format!("text {} is {} bytes long", i, text.len())))?;

        let pointer = 4 + i * 4;
        bank[pointer..pointer + 4].copy_from_slice(&(data_position as u32).to_be_bytes());

        bank.resize(data_position, 0);
        bank.extend_from_slice(&len.to_be_bytes());
        bank.extend_from_slice(text);

        data_position += text.len() + 2;
        if data_position & 1 == 1 {
            data_position += 1;
        }
    }

    Ok(bank)
}

/// Replace `language`'s text bank with `bank`, and clear the rest of its space
pub fn write_bank(rom: &mut [u8], language: &Language, bank: &[u8]) -> Result<(), MpError> {
    let available = language.capacity();
    if bank.len() > available {
        return Err(MpError::TextBankTooLarge {
            needed: bank.len(),
            available,
        });
    }

    let space = rom
        .get_mut(language.texts_start..language.texts_end)
        .ok_or(MpError::BadArchive {
            position: language.texts_start,
            reason: "text bank is past the end of the ROM",
        })?;

    let (used, rest) = space.split_at_mut(bank.len());
    used.copy_from_slice(bank);
    for byte in rest {
        *byte = 0;
    }

    Ok(())
}

/// Decode every text of `language` with `table`
pub fn extract_texts(rom: &[u8], language: &Language, table: &Table) -> Result<Vec<String>, MpError> {
    read_bank(rom, language.texts_start)?
        .into_iter()
        .map(|text| table.decode_text(text))
        .collect()
}

/// Encode `lines` with `table` and write them over `language`'s text bank.
///
/// There must be exactly as many lines as the ROM has texts, and none of them
/// may be empty.
pub fn insert_texts<S: AsRef<str>>(
    rom: &mut [u8],
    info: &RomInfo,
    language: &Language,
    lines: &[S],
    table: &Table,
) -> Result<(), MpError> {
    if lines.len() != info.number_of_texts {
        return Err(MpError::TextCountMismatch {
            expected: info.number_of_texts,
            found: lines.len(),
        });
    }

    let texts = lines
        .iter()
        .enumerate()
        .map(|(i, line)| match line.as_ref() {
            "" => Err(MpError::BadText(format!("line {} is empty", i + 1))),
            line => table.encode_text(line),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let bank = build_bank(texts.as_slice())?;
    write_bank(rom, language, &bank)
}
