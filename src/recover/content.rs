//! Content strategy — fallback byte scan for separator-led printable runs.
//!
//! Used only when the header strategy yields nothing: some payloads carry
//! usable paths in string tables the summary does not reach (cooked data,
//! script references, import blobs).

use super::{anchor_to_stem, normalize_candidate};

/// Longest run accepted as a candidate.
const MAX_CANDIDATE_LEN: usize = 512;
/// A candidate must contain at least this many separators.
const MIN_SEPARATORS: usize = 2;

/// Scan the decompressed payload for path-like byte runs and return the
/// best-scoring candidate anchored to `stem`.
pub fn content_path(payload: &[u8], stem: &str) -> Option<String> {
    let mut best: Option<(i32, String)> = None;

    let mut i = 0usize;
    while i < payload.len() {
        let b = payload[i];
        if b != b'/' && b != b'\\' {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        let mut separators = 0usize;
        while end < payload.len() && end - start < MAX_CANDIDATE_LEN {
            let c = payload[end];
            if !is_path_byte(c) {
                break;
            }
            if c == b'/' || c == b'\\' {
                separators += 1;
            }
            end += 1;
        }
        // Every separator begins its own candidate; overlapping runs are
        // settled by the scoring below.
        i = start + 1;

        if separators < MIN_SEPARATORS {
            continue;
        }
        let raw = match std::str::from_utf8(&payload[start..end]) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let candidate = match normalize_candidate(raw) {
            Some(c) => c,
            None => continue,
        };

        let s = score(&candidate, stem);
        if best.as_ref().map_or(true, |(b, _)| s > *b) {
            best = Some((s, candidate));
        }
    }

    best.map(|(_, c)| anchor_to_stem(&c, stem))
}

/// `10·ends-with-stem + slash-count`.
fn score(candidate: &str, stem: &str) -> i32 {
    let mut score = candidate.matches('/').count() as i32;
    let suffix = format!("/{stem}");
    if candidate.to_lowercase().ends_with(&suffix.to_lowercase()) {
        score += 10;
    }
    score
}

/// Printable, non-quote, non-whitespace.
#[inline]
fn is_path_byte(b: u8) -> bool {
    (0x21..0x7F).contains(&b) && b != b'"'
}
