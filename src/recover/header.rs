//! Header strategy — parse the asset's package summary and mine its name
//! table for the original package path.
//!
//! The summary layout shifts with the engine version; this parser follows
//! the handful of shapes the target titles ship:
//!   - a signed legacy version whose sign says whether a separate engine
//!     version int follows (`-4` suppresses it),
//!   - two file version ints, where the sentinel pair `(502, 67)` brings a
//!     custom-version block of five-int records,
//!   - signed length-prefixed strings (positive = UTF-8 bytes, negative =
//!     UTF-16 code units, trailing NUL trimmed),
//!   - a name count/offset pair accepted in either order,
//!   - version-dependent skips for the localization id and gatherable-text
//!     metadata.
//!
//! Only the name table feeds recovery; export and import tables are never
//! read.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use super::{anchor_to_stem, classify, last_segment, normalize_candidate, AssetClass, RecoveredPath};

/// Package file magic.
const PACKAGE_TAG: u32 = 0x9E2A_83C1;
/// Legacy version value that suppresses the separate engine-version int.
const LEGACY_NO_ENGINE_VERSION: i32 = -4;
/// File version pair that introduces the custom-version block.
const CUSTOM_VERSION_SENTINEL: (i32, i32) = (502, 67);
/// Engine versions above this carry a localization id and gatherable-text
/// metadata between the name pair and the export table.
const LOCALIZATION_MIN_VERSION: i32 = 459;

const MAX_STRING_UNITS:    usize = 64 * 1024;
const MAX_CUSTOM_VERSIONS: i32 = 10_000;
const MAX_NAME_COUNT:      i32 = 500_000;

/// Everything the summary parse yields that recovery cares about.
struct Summary {
    folder_name: String,
    name_count:  i32,
    name_offset: i32,
}

/// Run the full header strategy: parse the summary, scan the name table,
/// score the path-like candidates.
pub fn header_path(payload: &[u8], stem: &str) -> Option<RecoveredPath> {
    let summary = parse_summary(payload)?;
    // A truncated or absent name table still leaves the folder name usable.
    let names = scan_name_table(payload, &summary).unwrap_or_default();
    let class = classify(&names);

    let mut candidates: Vec<String> = names
        .iter()
        .filter_map(|n| normalize_candidate(n))
        .collect();
    if let Some(folder) = normalize_candidate(&summary.folder_name) {
        candidates.push(folder);
    }

    let best = candidates
        .into_iter()
        .max_by_key(|c| score(c, stem, class))?;
    Some(RecoveredPath {
        path: anchor_to_stem(&best, stem),
        class,
    })
}

fn parse_summary(payload: &[u8]) -> Option<Summary> {
    let mut cur = Cursor::new(payload);

    let tag = cur.read_u32::<LittleEndian>().ok()?;
    if tag != PACKAGE_TAG {
        return None;
    }

    let legacy_version = cur.read_i32::<LittleEndian>().ok()?;
    if legacy_version < 0 && legacy_version != LEGACY_NO_ENGINE_VERSION {
        let _legacy_engine = cur.read_i32::<LittleEndian>().ok()?;
    }

    let file_version = cur.read_i32::<LittleEndian>().ok()?;
    let licensee_version = cur.read_i32::<LittleEndian>().ok()?;

    let sentinel = (file_version, licensee_version) == CUSTOM_VERSION_SENTINEL;
    if sentinel {
        let count = cur.read_i32::<LittleEndian>().ok()?;
        if !(0..=MAX_CUSTOM_VERSIONS).contains(&count) {
            return None;
        }
        skip(&mut cur, count as u64 * 20)?;
    }

    let _total_header_size = cur.read_i32::<LittleEndian>().ok()?;
    let folder_name = read_prefixed_string(&mut cur)?;
    let _package_flags = cur.read_u32::<LittleEndian>().ok()?;

    // Count/offset pair, tolerated in either order.
    let a = cur.read_i32::<LittleEndian>().ok()?;
    let b = cur.read_i32::<LittleEndian>().ok()?;
    let (name_count, name_offset) = if a > 0 && b > 0 { (a, b) } else { (b, a) };

    if file_version > LOCALIZATION_MIN_VERSION {
        let _localization_id = read_prefixed_string(&mut cur)?;
        skip(&mut cur, 8)?; // gatherable-text count + offset
        if sentinel {
            skip(&mut cur, 4)?;
        }
    }
    // Export and import pairs follow; recovery never reads them.

    Some(Summary { folder_name, name_count, name_offset })
}

fn scan_name_table(payload: &[u8], summary: &Summary) -> Option<Vec<String>> {
    if summary.name_count <= 0 || summary.name_count > MAX_NAME_COUNT {
        return None;
    }
    let offset = usize::try_from(summary.name_offset).ok()?;
    if offset >= payload.len() {
        return None;
    }

    let mut cur = Cursor::new(payload);
    cur.set_position(offset as u64);

    let mut names = Vec::with_capacity(summary.name_count as usize);
    for _ in 0..summary.name_count {
        match read_prefixed_string(&mut cur) {
            Some(s) => names.push(s),
            // Truncated table: keep what was collected so far.
            None => break,
        }
        if skip(&mut cur, 4).is_none() {
            break;
        }
    }

    if names.is_empty() { None } else { Some(names) }
}

/// `5·stem-match + 3·rooted + 2·game-or-engine + 2·class-appropriate +
/// min(10, slashes) + min(10, length)`.
fn score(candidate: &str, stem: &str, class: AssetClass) -> i32 {
    let folded = candidate.to_lowercase();
    let mut score = 0i32;

    if last_segment(candidate).eq_ignore_ascii_case(stem) {
        score += 5;
    }
    if candidate.starts_with('/') {
        score += 3;
    }
    if folded.contains("/game/") || folded.contains("/engine/") {
        score += 2;
    }
    if class.scoring_tokens().iter().any(|t| folded.contains(t)) {
        score += 2;
    }
    score += (candidate.matches('/').count() as i32).min(10);
    score += (candidate.len() as i32).min(10);
    score
}

// ── Shared string reader ─────────────────────────────────────────────────────

/// Signed length-prefixed string: positive = UTF-8 code units, negative =
/// UTF-16 code units with magnitude = unit count.  A trailing NUL is
/// trimmed.  The single reader for this convention — both the summary
/// parser and the name-table scanner go through here.
pub(crate) fn read_prefixed_string(cur: &mut Cursor<&[u8]>) -> Option<String> {
    let len = cur.read_i32::<LittleEndian>().ok()?;
    if len == 0 {
        return Some(String::new());
    }

    let mut s = if len > 0 {
        let n = len as usize;
        if n > MAX_STRING_UNITS {
            return None;
        }
        let mut buf = vec![0u8; n];
        cur.read_exact(&mut buf).ok()?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        let n = usize::try_from(-(len as i64)).ok()?;
        if n > MAX_STRING_UNITS {
            return None;
        }
        let mut units = vec![0u16; n];
        for u in units.iter_mut() {
            *u = cur.read_u16::<LittleEndian>().ok()?;
        }
        String::from_utf16_lossy(&units)
    };

    while s.ends_with('\0') {
        s.pop();
    }
    Some(s)
}

fn skip(cur: &mut Cursor<&[u8]>, bytes: u64) -> Option<()> {
    let target = cur.position().checked_add(bytes)?;
    if target > cur.get_ref().len() as u64 {
        return None;
    }
    cur.set_position(target);
    Some(())
}
