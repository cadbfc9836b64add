use mpcomp::{
    compress,
    rom::{self, ArchiveEntry, Language, Region, RomInfo, KNOWN_ROMS},
    table::Table,
    texts, MpError,
};

fn be(n: u32) -> [u8; 4] {
    n.to_be_bytes()
}

/// Two files: the first with two sub-files, the second with one
fn synthetic_archive() -> Vec<u8> {
    let mut rom = Vec::new();
    // file table
    rom.extend_from_slice(&be(2));
    rom.extend_from_slice(&be(12));
    rom.extend_from_slice(&be(40));
    // file 0 at 12
    rom.extend_from_slice(&be(2));
    rom.extend_from_slice(&be(12));
    rom.extend_from_slice(&be(20));
    rom.extend_from_slice(&[0xA0; 8]);
    rom.extend_from_slice(&[0xA1; 8]);
    // file 1 at 40
    rom.extend_from_slice(&be(1));
    rom.extend_from_slice(&be(8));
    rom.extend_from_slice(&[0xB0; 8]);
    // outside of the data section
    rom.extend_from_slice(&[0xFF; 4]);
    rom
}

#[test]
fn walk_archive() {
    let rom = synthetic_archive();
    let entries = rom::archive_entries(&rom, 0, 56).unwrap();

    let summary: Vec<(u32, u32, usize, &[u8])> = entries
        .iter()
        .map(|e| (e.file, e.sub_file, e.position, e.data))
        .collect();

    assert_eq!(
        summary,
        [
            (12, 12, 24, &[0xA0u8; 8][..]),
            (12, 20, 32, &[0xA1u8; 8][..]),
            (40, 8, 48, &[0xB0u8; 8][..]),
        ]
    );
}

#[test]
fn archive_past_the_rom() {
    let rom = synthetic_archive();

    let err = rom::archive_entries(&rom, 0, rom.len() + 1).unwrap_err();
    assert!(matches!(err, MpError::BadArchive { .. }));

    let err = rom::archive_entries(&rom[..20], 0, 20).unwrap_err();
    assert!(matches!(err, MpError::BadArchive { .. }));
}

#[test]
fn identify_roms() {
    let ntsc_u = &KNOWN_ROMS[1];
    let mut image = vec![0u8; 0x40];
    image[0x10..0x18].copy_from_slice(&ntsc_u.crc);

    let info = rom::identify(&image).unwrap();
    assert_eq!(info.region, Region::NtscU);
    assert_eq!(info.languages.len(), 1);

    for pair in image.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    assert!(matches!(rom::identify(&image), Err(MpError::ByteSwappedRom)));

    let unknown = vec![0x5A; 0x40];
    assert!(matches!(rom::identify(&unknown), Err(MpError::UnknownRom(..))));
    assert!(matches!(rom::identify(&[0; 4]), Err(MpError::BadArchive { .. })));
}

#[test]
fn known_roms_are_consistent() {
    for info in KNOWN_ROMS.iter() {
        assert!(info.data_start < info.data_end, "{}", info.region_name);
        assert_eq!(info.languages[0].texts_start, info.data_end, "{}", info.region_name);
        for pair in info.languages.windows(2) {
            assert_eq!(pair[0].texts_end, pair[1].texts_start);
        }
    }
}

#[test]
fn extract_compressed_entries() {
    let compressed = compress(b"mario mario mario mario");
    let entry = ArchiveEntry {
        file: 4,
        sub_file: 8,
        position: 0x100,
        data: &compressed,
    };

    let extracted = rom::extract_entry(entry, true);
    assert!(extracted.raw_reason.is_none());
    assert_eq!(&*extracted.data, b"mario mario mario mario");

    let extracted = rom::extract_entry(entry, false);
    assert_eq!(&*extracted.data, compressed.as_slice());
}

#[test]
fn benchmark_reports_each_entry() {
    let first = compress(&[0x41; 500]);
    let second = compress(b"luigi luigi luigi");
    let bad = [0u8, 0, 0, 9, 0, 0, 0, 1];

    let entries: Vec<ArchiveEntry> = [&first[..], &second[..], &bad[..]]
        .iter()
        .enumerate()
        .map(|(i, &data)| ArchiveEntry {
            file: 0,
            sub_file: i as u32,
            position: i,
            data,
        })
        .collect();

    let report = rom::benchmark(&entries, 2);

    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.processed(), 2);
    assert_eq!(report.failed(), 1);

    let positions: Vec<usize> = report.entries.iter().map(|e| e.position).collect();
    assert_eq!(positions, [0, 1, 2]);

    // data made by this crate recompresses to exactly the same size
    assert_eq!(report.average_ratio(), Some(1.0));
    assert!(matches!(
        report.entries[2].ratio,
        Err(MpError::TruncatedStream { .. })
    ));
}

#[test]
fn round_trip_is_checked() {
    let compressed = compress(b"bowser");
    assert_eq!(rom::round_trip(&compressed).unwrap(), 1.0);

    let mut bad = compressed;
    bad[7] = 3;
    assert!(matches!(rom::round_trip(&bad), Err(MpError::InvalidVersion(3))));
}

static TEST_LANGUAGES: [Language; 1] = [Language {
    name: "Test",
    texts_start: 4,
    texts_end: 40,
}];

fn test_rom_info() -> RomInfo {
    RomInfo {
        region: Region::NtscU,
        region_name: "Test",
        crc: [0; 8],
        data_start: 0,
        data_end: 4,
        number_of_texts: 3,
        languages: &TEST_LANGUAGES,
    }
}

#[test]
fn insert_then_extract_texts() {
    let table: Table = "0A=\\n\n\
                        41=A\n\
                        42=B\n\
                        43=C"
        .parse()
        .unwrap();
    let info = test_rom_info();
    let language = &info.languages[0];
    let mut image = vec![0xEEu8; 44];

    let lines = ["AB", "C\\nC", "<7F>"];
    texts::insert_texts(&mut image, &info, language, &lines[..], &table).unwrap();

    // everything outside of the bank is untouched
    assert_eq!(&image[..4], &[0xEE; 4]);
    assert_eq!(&image[40..], &[0xEE; 4]);

    let extracted = texts::extract_texts(&image, language, &table).unwrap();
    assert_eq!(extracted, lines);
}

#[test]
fn insert_checks_texts() {
    let table: Table = "41=A".parse().unwrap();
    let info = test_rom_info();
    let language = &info.languages[0];
    let mut image = vec![0u8; 44];

    let err = texts::insert_texts(&mut image, &info, language, &["A", "A"][..], &table).unwrap_err();
    assert!(matches!(err, MpError::TextCountMismatch { expected: 3, found: 2 }));

    let err = texts::insert_texts(&mut image, &info, language, &["A", "", "A"][..], &table).unwrap_err();
    assert!(matches!(err, MpError::BadText(..)));

    let long = "A".repeat(40);
    let lines = [long.as_str(), "A", "A"];
    let err = texts::insert_texts(&mut image, &info, language, &lines[..], &table).unwrap_err();
    assert!(matches!(err, MpError::TextBankTooLarge { available: 36, .. }));
}
