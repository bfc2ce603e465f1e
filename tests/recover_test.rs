//! Recovery strategies against golden byte vectors.

mod common;

use b2extract::recover::{self, AssetClass};
use common::{asset_payload, push_string, PACKAGE_TAG};

// ── Header strategy ──────────────────────────────────────────────────────────

#[test]
fn folder_name_alone_recovers_path() {
    let payload = asset_payload("/Game/Props/", &["Package", "M_Foo"]);
    let found = recover::recover(&payload, "M_Foo", true, false).unwrap();
    assert_eq!(found.path, "/Game/Props/M_Foo");
}

#[test]
fn name_table_path_beats_folder_when_it_ends_in_stem() {
    let payload = asset_payload("/Game/Other/", &["/Game/Props/M_Foo", "Misc"]);
    let found = recover::recover(&payload, "M_Foo", true, false).unwrap();
    assert_eq!(found.path, "/Game/Props/M_Foo");
}

#[test]
fn object_suffix_is_trimmed() {
    let payload = asset_payload("", &["/Game/Props/M_Foo.M_Foo"]);
    let found = recover::recover(&payload, "M_Foo", true, false).unwrap();
    assert_eq!(found.path, "/Game/Props/M_Foo");
}

#[test]
fn classification_from_name_tokens() {
    let material = asset_payload("/Game/X/", &["Texture2D", "/Game/X/M_Bar"]);
    let found = recover::recover(&material, "M_Bar", true, false).unwrap();
    assert_eq!(found.class, AssetClass::Material);

    let mesh = asset_payload("/Game/X/", &["StaticMesh", "/Game/X/Rock"]);
    let found = recover::recover(&mesh, "Rock", true, false).unwrap();
    assert_eq!(found.class, AssetClass::Mesh);

    let unknown = asset_payload("/Game/X/", &["/Game/X/Thing"]);
    let found = recover::recover(&unknown, "Thing", true, false).unwrap();
    assert_eq!(found.class, AssetClass::Unknown);
}

#[test]
fn wrong_tag_is_rejected() {
    let mut payload = asset_payload("/Game/Props/", &["M_Foo"]);
    payload[0] ^= 0xFF;
    assert!(recover::recover(&payload, "M_Foo", true, false).is_none());
}

#[test]
fn utf16_folder_name_is_read() {
    // Hand-build a header whose folder name uses the negative-length
    // (UTF-16) convention.
    let folder: Vec<u16> = "/Game/Wide/\0".encode_utf16().collect();
    let mut buf = Vec::new();
    buf.extend_from_slice(&PACKAGE_TAG.to_le_bytes());
    buf.extend_from_slice(&(-4i32).to_le_bytes());
    buf.extend_from_slice(&400i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(-(folder.len() as i32)).to_le_bytes());
    for u in &folder {
        buf.extend_from_slice(&u.to_le_bytes());
    }
    buf.extend_from_slice(&0u32.to_le_bytes()); // package flags
    buf.extend_from_slice(&1i32.to_le_bytes()); // name count
    let offset_at = buf.len();
    buf.extend_from_slice(&0i32.to_le_bytes());
    let table_off = buf.len() as i32;
    buf[offset_at..offset_at + 4].copy_from_slice(&table_off.to_le_bytes());
    push_string(&mut buf, "Package");
    buf.extend_from_slice(&[0u8; 4]);

    let found = recover::recover(&buf, "Sword", true, false).unwrap();
    assert_eq!(found.path, "/Game/Wide/Sword");
}

#[test]
fn swapped_name_pair_is_tolerated() {
    // A non-positive first int forces the swap path; the folder name must
    // still carry recovery even though the swapped table is unreadable.
    let mut buf = Vec::new();
    buf.extend_from_slice(&PACKAGE_TAG.to_le_bytes());
    buf.extend_from_slice(&(-4i32).to_le_bytes());
    buf.extend_from_slice(&400i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    push_string(&mut buf, "/Game/Swapped/");
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes()); // first int non-positive
    buf.extend_from_slice(&1i32.to_le_bytes()); // becomes the count

    let found = recover::recover(&buf, "Axe", true, false).unwrap();
    assert_eq!(found.path, "/Game/Swapped/Axe");
}

// ── Content strategy ─────────────────────────────────────────────────────────

#[test]
fn content_scan_finds_embedded_path() {
    let mut payload = vec![0u8; 64];
    payload.extend_from_slice(b"/Game/Maps/Level01/Theater");
    payload.push(0);
    payload.extend_from_slice(&[7u8; 32]);

    let found = recover::recover(&payload, "Theater", false, true).unwrap();
    assert_eq!(found.path, "/Game/Maps/Level01/Theater");
    assert_eq!(found.class, AssetClass::Unknown);
}

#[test]
fn content_scan_prefers_stem_match() {
    let mut payload = Vec::new();
    payload.extend_from_slice(b"\x00/Engine/Shared/Deep/Longer/Other\x00");
    payload.extend_from_slice(b"\x00/Game/Props/Crate\x00");
    let found = recover::recover(&payload, "Crate", false, true).unwrap();
    assert_eq!(found.path, "/Game/Props/Crate");
}

#[test]
fn content_scan_normalizes_backslashes() {
    let payload = b"..\\Game\\Weapons\\Sword\x00".to_vec();
    let found = recover::recover(&payload, "Sword", false, true).unwrap();
    // The candidate begins at the first separator.
    assert_eq!(found.path, "/Game/Weapons/Sword");
}

#[test]
fn content_scan_requires_two_separators() {
    let payload = b"  /lonely  ".to_vec();
    assert!(recover::recover(&payload, "lonely", false, true).is_none());
}

#[test]
fn content_scan_is_the_fallback() {
    // No package tag, but a usable embedded path: only the content
    // strategy can answer, and only when enabled.
    let payload = b"xx/Game/Audio/Cue/Ring\x00".to_vec();
    assert!(recover::recover(&payload, "Ring", true, false).is_none());
    assert!(recover::recover(&payload, "Ring", true, true).is_some());
}
