//! Index parsing against synthetic fixtures.

mod common;

use b2extract::index::{IndexError, IndexFile, CONTAINER_EXT};
use common::ArchiveBuilder;
use tempfile::TempDir;

#[test]
fn header_and_name_walk() {
    let dir = TempDir::new().unwrap();
    let index_path = ArchiveBuilder::new()
        .stored_entry("alpha.bin", b"aaaa")
        .stored_entry("beta.bin", b"bbbb")
        .dir("Content")
        .write(dir.path());

    let idx = IndexFile::open(&index_path).unwrap();
    assert_eq!(idx.entry_count_hint, 2);
    assert_eq!(idx.name_count_hint, 3);

    let records = idx.read_names();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].name, "alpha.bin");
    assert_eq!(records[0].file_number, 0);
    assert!(!records[0].is_directory());
    assert_eq!(records[1].name, "beta.bin");
    assert!(records[2].is_directory());
    assert_eq!(records[2].name, "Content");
}

#[test]
fn entry_layout_resolves_container_and_chunks() {
    let dir = TempDir::new().unwrap();
    let comp_base = vec![1u8; 400];
    let comp_extra = vec![2u8; 500];
    let index_path = ArchiveBuilder::new()
        .entry(
            "thing.bin",
            &[(&comp_base, 1024), (&comp_extra, 1024)],
            0,
            2048,
        )
        .write(dir.path());

    let idx = IndexFile::open(&index_path).unwrap();
    let row = idx.entry_row(0).unwrap();
    let layout = idx.entry_layout(0, &row).unwrap();

    // The bare stem in the index gets the extension appended.
    assert_eq!(
        layout.container_path.file_name().unwrap().to_string_lossy(),
        format!("payload.{CONTAINER_EXT}")
    );
    assert_eq!(layout.chunks.len(), 2);
    assert_eq!(layout.chunks[0].container_offset, 0);
    assert_eq!(layout.chunks[0].comp_size, 400);
    assert_eq!(layout.chunks[0].unc_size, 1024);
    assert_eq!(layout.chunks[1].container_offset, 400);
    assert_eq!(layout.chunks[1].comp_size, 500);
    assert_eq!(layout.chunks[1].unc_size, 1024);
    assert_eq!(layout.total_uncompressed, 2048);
    assert!(!layout.chunks[0].is_store());
}

#[test]
fn full_container_name_is_not_doubled() {
    let dir = TempDir::new().unwrap();
    let index_path = ArchiveBuilder::new()
        .full_container_ref()
        .stored_entry("a.bin", b"data")
        .write(dir.path());

    let idx = IndexFile::open(&index_path).unwrap();
    let row = idx.entry_row(0).unwrap();
    let layout = idx.entry_layout(0, &row).unwrap();
    assert_eq!(
        layout.container_path.file_name().unwrap().to_string_lossy(),
        "payload.b2container"
    );
}

#[test]
fn store_mode_chunk_detected() {
    let dir = TempDir::new().unwrap();
    let index_path = ArchiveBuilder::new()
        .stored_entry("a.bin", b"0123456789abcdef")
        .write(dir.path());

    let idx = IndexFile::open(&index_path).unwrap();
    let layout = idx.entry_layout(0, &idx.entry_row(0).unwrap()).unwrap();
    assert_eq!(layout.chunks.len(), 1);
    assert!(layout.chunks[0].is_store());
}

#[test]
fn tiny_file_is_malformed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiny.b2index");
    std::fs::write(&path, [0u8; 40]).unwrap();
    assert!(matches!(
        IndexFile::open(&path),
        Err(IndexError::Malformed { .. })
    ));
}

#[test]
fn out_of_range_header_offsets_are_malformed() {
    let dir = TempDir::new().unwrap();
    let mut idx = vec![0u8; 128];
    idx[68..72].copy_from_slice(&10_000u32.to_le_bytes());
    idx[92..96].copy_from_slice(&64u32.to_le_bytes());
    let path = dir.path().join("bad.b2index");
    std::fs::write(&path, &idx).unwrap();
    assert!(matches!(
        IndexFile::open(&path),
        Err(IndexError::Malformed { .. })
    ));
}

#[test]
fn name_walk_survives_bad_records() {
    let dir = TempDir::new().unwrap();
    let index_path = ArchiveBuilder::new()
        .stored_entry("good.bin", b"data")
        .write(dir.path());

    // Splice two garbage records (zero name offset / negative file number)
    // in front of the real table and point the header at them.
    let mut idx = std::fs::read(&index_path).unwrap();
    let names_off = u32::from_le_bytes(idx[92..96].try_into().unwrap()) as usize;
    let real_table: Vec<u8> = idx[names_off..].to_vec();
    let mut spliced = idx[..names_off].to_vec();
    spliced.extend_from_slice(&[0u8; 16]); // name_offset 0
    spliced.extend_from_slice(&u64::MAX.to_le_bytes());
    spliced.extend_from_slice(&(-1i32).to_le_bytes());
    spliced.extend_from_slice(&0i32.to_le_bytes());
    spliced.extend_from_slice(&real_table);
    idx = spliced;
    idx[92..96].copy_from_slice(&(names_off as u32).to_le_bytes());

    std::fs::write(&index_path, &idx).unwrap();
    let parsed = IndexFile::open(&index_path).unwrap();
    let records = parsed.read_names();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "good.bin");
}

#[test]
fn negative_extent_rejected_per_entry() {
    let dir = TempDir::new().unwrap();
    let index_path = ArchiveBuilder::new()
        .entry("bad.bin", &[(b"xxxx", 4)], -8, 4)
        .write(dir.path());

    let idx = IndexFile::open(&index_path).unwrap();
    assert!(matches!(
        idx.entry_row(0),
        Err(IndexError::EntryOutOfRange { .. })
    ));
}

#[test]
fn zero_block_offset_rejected_per_entry() {
    let dir = TempDir::new().unwrap();
    let index_path = ArchiveBuilder::new()
        .stored_entry("a.bin", b"data")
        .write(dir.path());

    let mut idx = std::fs::read(&index_path).unwrap();
    let entry_table = u32::from_le_bytes(idx[68..72].try_into().unwrap()) as usize;
    idx[entry_table..entry_table + 4].copy_from_slice(&0i32.to_le_bytes());
    std::fs::write(&index_path, &idx).unwrap();

    let parsed = IndexFile::open(&index_path).unwrap();
    let row = parsed.entry_row(0).unwrap();
    assert!(matches!(
        parsed.entry_layout(0, &row),
        Err(IndexError::EntryOutOfRange { .. })
    ));
}
