#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Open-time failures and per-file integrity handling
//!
//! Damaged or foreign input must fail the open with the right error kind;
//! damaged payloads must only fail the file they belong to.

use cake_formats::archive::{BuilderOptions, CakeArchive, CakeBuilder, OpenOptions};
use cake_formats::toc::{HeaderFlags, PREFIX_SIZE, RegistryType, Section, header_size};
use cake_formats::{CakeError, CakeVersion, ErrorKind};
use std::io::Cursor;
use tempfile::TempDir;

const NAME: &str = "data.cak";

const ENCRYPTABLE: [CakeVersion; 2] = [CakeVersion::V9_1, CakeVersion::V9_2];

fn build(version: CakeVersion, encrypted: bool) -> Vec<u8> {
    let options = BuilderOptions::new(version).with_header_encryption(encrypted);
    let mut builder = CakeBuilder::new(options);
    builder
        .add_bytes("scripts/boot.lua", b"-- boot\nprint('ready')\n".to_vec())
        .unwrap();
    builder
        .add_bytes("scripts/table.csv", "id,name\n".repeat(200).into_bytes())
        .unwrap();
    builder.add_bytes("empty.txt", Vec::new()).unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.bake_to_writer(&mut cursor, NAME).unwrap();
    cursor.into_inner()
}

fn open(bytes: Vec<u8>) -> Result<CakeArchive<Cursor<Vec<u8>>>, CakeError> {
    CakeArchive::from_reader(Cursor::new(bytes), NAME, OpenOptions::default())
}

/// Byte offset of a section descriptor's checksum inside a plain header
fn checksum_position(version: CakeVersion, section: Section) -> usize {
    let descriptors = header_size(version) - 5 * 12 - 2 * 4 - 4;
    let index = Section::ALL.iter().position(|&s| s == section).unwrap();
    descriptors + index * 12 + 4
}

fn section_range(bytes: &[u8], version: CakeVersion, section: Section) -> (usize, usize) {
    let archive = open(bytes.to_vec()).unwrap();
    let descriptor = archive.header().section(section);
    assert_eq!(archive.version(), version);
    (descriptor.offset as usize, descriptor.size as usize)
}

#[test]
fn corrupt_file_info_fails_open_with_integrity_error() {
    let mut bytes = build(CakeVersion::V9_2, true);
    let (offset, size) = section_range(&bytes, CakeVersion::V9_2, Section::FileInfo);
    bytes[offset + size / 2] ^= 0x40;

    let err = open(bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(matches!(
        err,
        CakeError::SectionChecksum {
            section: Section::FileInfo,
            ..
        }
    ));
}

fn assert_flips_detected(version: CakeVersion, encrypted: bool) {
    let pristine = build(version, encrypted);
    for section in Section::ALL {
        let (offset, size) = section_range(&pristine, version, section);
        for position in [offset, offset + size - 1] {
            let mut bytes = pristine.clone();
            bytes[position] ^= 0x01;
            let err = open(bytes).unwrap_err();
            assert_eq!(
                err.kind(),
                ErrorKind::Integrity,
                "{version} {section} encrypted={encrypted}: {err}"
            );
        }
    }
}

#[test]
fn any_flipped_section_byte_is_detected() {
    for version in ENCRYPTABLE {
        assert_flips_detected(version, true);
    }
}

#[test]
fn flipped_bytes_in_plain_sections_are_detected() {
    for version in CakeVersion::ALL {
        assert_flips_detected(version, false);
    }
}

#[test]
fn placeholder_section_checksums_are_not_verified() {
    for version in [CakeVersion::V6_7, CakeVersion::V8_7, CakeVersion::V9_3] {
        let pristine = build(version, false);
        for placeholder in [0u32, 1] {
            let mut bytes = pristine.clone();
            for section in Section::ALL {
                let at = checksum_position(version, section);
                bytes[at..at + 4].copy_from_slice(&placeholder.to_le_bytes());
            }
            let mut archive = open(bytes).unwrap();
            assert_eq!(archive.header().section(Section::FileInfo).checksum, placeholder);
            assert_eq!(
                archive.extract_file("scripts/boot.lua").unwrap(),
                b"-- boot\nprint('ready')\n",
                "{version}"
            );
        }
    }
}

#[test]
fn wrong_plain_checksum_is_ignored_when_forced() {
    let mut bytes = build(CakeVersion::V8_3, false);
    let at = checksum_position(CakeVersion::V8_3, Section::Strings);
    bytes[at] ^= 0x10;
    assert!(matches!(
        open(bytes.clone()).unwrap_err(),
        CakeError::SectionChecksum {
            section: Section::Strings,
            ..
        }
    ));

    let options = OpenOptions::default().with_force_no_encryption(true);
    assert!(CakeArchive::from_reader(Cursor::new(bytes), NAME, options).is_ok());
}

#[test]
fn encrypted_cakes_need_a_key_schedule() {
    for version in CakeVersion::ALL {
        let options = BuilderOptions::new(version).with_header_encryption(true);
        let mut builder = CakeBuilder::new(options);
        builder.add_bytes("a.txt", b"abc".to_vec()).unwrap();
        let mut cursor = Cursor::new(Vec::new());
        let result = builder.bake_to_writer(&mut cursor, NAME);
        if version.has_key_schedule() {
            assert!(result.is_ok(), "{version}");
        } else {
            assert!(
                matches!(result, Err(CakeError::KeyScheduleUnavailable(v)) if v == version),
                "{version}"
            );
        }
    }
}

#[test]
fn encrypted_payloads_are_refused_without_override() {
    let version = CakeVersion::V8_7;
    let mut bytes = build(version, false);
    let file_bit = HeaderFlags::new(version, RegistryType::Regular, false, true).raw();
    let flags = u16::from_le_bytes([bytes[6], bytes[7]]) | file_bit;
    bytes[6..8].copy_from_slice(&flags.to_le_bytes());

    let mut archive = open(bytes.clone()).unwrap();
    assert!(archive.header().file_encrypted());
    assert!(matches!(
        archive.extract_file("scripts/boot.lua"),
        Err(CakeError::PayloadCipherUnavailable(CakeVersion::V8_7))
    ));
    let temp = TempDir::new().unwrap();
    assert!(archive.extract_all(temp.path()).is_err());

    let options = OpenOptions::default().with_force_no_encryption(true);
    let mut archive = CakeArchive::from_reader(Cursor::new(bytes), NAME, options).unwrap();
    assert_eq!(
        archive.extract_file("scripts/boot.lua").unwrap(),
        b"-- boot\nprint('ready')\n"
    );
}

#[test]
fn too_short_stream() {
    let err = open(b"FDI".to_vec()).unwrap_err();
    assert!(matches!(err, CakeError::TooShort { .. }));

    let bytes = build(CakeVersion::V8_1, false);
    let err = open(bytes[..PREFIX_SIZE + 4].to_vec()).unwrap_err();
    assert!(matches!(err, CakeError::TooShort { .. }));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn bad_magic() {
    let mut bytes = build(CakeVersion::V9_2, false);
    bytes[..4].copy_from_slice(b"KCAP");
    let err = open(bytes).unwrap_err();
    assert!(matches!(err, CakeError::InvalidMagic(magic) if &magic == b"KCAP"));
}

#[test]
fn unsupported_version() {
    let mut bytes = build(CakeVersion::V9_2, false);
    bytes[4..6].copy_from_slice(&0x0705u16.to_le_bytes());
    let err = open(bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
}

#[test]
fn truncated_toc() {
    let bytes = build(CakeVersion::V9_3, false);
    let archive = open(bytes.clone()).unwrap();
    let toc = archive.header().total_toc_size as usize;
    let err = open(bytes[..toc - 1].to_vec()).unwrap_err();
    assert!(matches!(err, CakeError::TocTruncated { .. }));
}

#[test]
fn misleading_encryption_flag_needs_override() {
    let mut bytes = build(CakeVersion::V9_2, false);
    // 8.7 and later keep header encryption in bit 0 of the flags word
    bytes[6] |= 0x01;
    assert!(open(bytes.clone()).is_err());

    let options = OpenOptions::default().with_force_no_encryption(true);
    let mut archive = CakeArchive::from_reader(Cursor::new(bytes), NAME, options).unwrap();
    assert!(!archive.is_toc_encrypted());
    assert_eq!(archive.xor_key(), None);
    assert_eq!(
        archive.extract_file("scripts/boot.lua").unwrap(),
        b"-- boot\nprint('ready')\n"
    );
}

#[test]
fn encryption_flag_without_schedule_fails_open() {
    let mut bytes = build(CakeVersion::V9_3, false);
    bytes[6] |= 0x01;
    let err = open(bytes).unwrap_err();
    assert!(matches!(err, CakeError::KeyScheduleUnavailable(CakeVersion::V9_3)));
    assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
}

#[test]
fn corrupt_payload_is_skipped_by_extract_all() {
    for version in [CakeVersion::V6_8, CakeVersion::V8_2] {
        let mut bytes = build(version, false);
        let archive = open(bytes.clone()).unwrap();
        let (entry, _) = archive.lookup_file("scripts/boot.lua").unwrap();
        let offset = entry.data_offset as usize;
        bytes[offset] ^= 0xFF;

        let mut archive = open(bytes).unwrap();
        let err = archive.extract_file("scripts/boot.lua").unwrap_err();
        assert!(matches!(err, CakeError::PayloadChecksum { .. }), "{version}");

        let temp = TempDir::new().unwrap();
        let summary = archive.extract_all(temp.path()).unwrap();
        assert_eq!(summary.extracted, 2, "{version}");
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0, "scripts/boot.lua");
        assert!(!temp.path().join("scripts/boot.lua").exists());
        assert!(temp.path().join("scripts/table.csv").exists());
    }
}

#[test]
fn checksums_can_be_ignored() {
    let mut bytes = build(CakeVersion::V8_7, false);
    let archive = open(bytes.clone()).unwrap();
    let (entry, _) = archive.lookup_file("scripts/boot.lua").unwrap();
    bytes[entry.data_offset as usize] = b'#';

    let options = OpenOptions::default().with_payload_checksums(false);
    let mut archive = CakeArchive::from_reader(Cursor::new(bytes), NAME, options).unwrap();
    let data = archive.extract_file("scripts/boot.lua").unwrap();
    assert_eq!(data[0], b'#');
}

#[test]
fn broken_chunk_is_a_codec_error() {
    let mut bytes = build(CakeVersion::V9_1, false);
    let archive = open(bytes.clone()).unwrap();
    let (entry, _) = archive.lookup_file("scripts/table.csv").unwrap();
    assert!(entry.is_compressed(CakeVersion::V9_1));
    let start = entry.data_offset as usize;
    let end = start + entry.compressed_size as usize;
    bytes[start..end].fill(0);

    let mut archive = open(bytes).unwrap();
    let err = archive.extract_file("scripts/table.csv").unwrap_err();
    assert!(err.is_skippable(), "{err}");
}

#[test]
fn absent_paths_are_not_found() {
    let mut archive = open(build(CakeVersion::V9_2, true)).unwrap();
    assert!(archive.lookup_file("scripts/missing.lua").is_none());
    assert!(matches!(
        archive.extract_file("scripts/missing.lua"),
        Err(CakeError::FileNotFound(_))
    ));
    assert_eq!(
        archive.extract_file("SCRIPTS\\BOOT.LUA").unwrap(),
        b"-- boot\nprint('ready')\n"
    );
}

#[test]
fn payload_checksums_match_known_vectors() {
    for (version, expected) in [
        (CakeVersion::V6_7, 0xCBF4_3926),
        (CakeVersion::V8_2, 0xE306_9283),
    ] {
        let mut builder = CakeBuilder::new(BuilderOptions::new(version));
        builder.add_bytes("check.bin", b"123456789".to_vec()).unwrap();
        let mut cursor = Cursor::new(Vec::new());
        builder.bake_to_writer(&mut cursor, NAME).unwrap();

        let archive = open(cursor.into_inner()).unwrap();
        let (entry, _) = archive.lookup_file("check.bin").unwrap();
        assert_eq!(entry.checksum, expected, "{version}");
    }
}
