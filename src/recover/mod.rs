//! Path recovery — reconstructs an asset's original relative path from its
//! decompressed bytes.
//!
//! Two independent strategies run in a fixed order:
//!   1. [`header`] parses the asset's package header and scans its name
//!      table for path-like strings.
//!   2. [`content`] is the fallback: a raw byte scan for separator-led
//!      printable runs anywhere in the payload.
//!
//! Both are lossy heuristics with explicit tie-breaking; both return an
//! extensionless relative path whose final segment is the asset's stem.
//! The driver appends the entry's original extension.  Only `.uasset`,
//! `.uasset2`, and `.umap` entries are ever scanned.

pub mod content;
pub mod header;

/// Coarse classification mined from an asset's name table.  Anchors the
/// class-appropriate scoring term and the router's material detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Material,
    Mesh,
    Unknown,
}

/// A recovered relative path plus what the names suggested the asset is.
#[derive(Debug, Clone)]
pub struct RecoveredPath {
    /// Forward-slash relative path ending in the asset stem, no extension.
    pub path:  String,
    pub class: AssetClass,
}

/// Run the enabled strategies in order and return the first hit.
pub fn recover(
    payload:        &[u8],
    stem:           &str,
    header_enabled: bool,
    content_enabled: bool,
) -> Option<RecoveredPath> {
    if header_enabled {
        if let Some(found) = header::header_path(payload, stem) {
            return Some(found);
        }
    }
    if content_enabled {
        if let Some(path) = content::content_path(payload, stem) {
            return Some(RecoveredPath { path, class: AssetClass::Unknown });
        }
    }
    None
}

/// Token scan over every collected name, case-folded.  First family hit
/// wins; material tokens are checked first.
pub fn classify(names: &[String]) -> AssetClass {
    const MATERIAL_TOKENS: &[&str] = &["materialexpression", "texture2d", "shader", "material"];
    const MESH_TOKENS:     &[&str] = &["agggeom", "staticmesh", "skeletalmesh"];

    for name in names {
        let folded = name.to_lowercase();
        if MATERIAL_TOKENS.iter().any(|t| folded.contains(t)) {
            return AssetClass::Material;
        }
        if MESH_TOKENS.iter().any(|t| folded.contains(t)) {
            return AssetClass::Mesh;
        }
    }
    AssetClass::Unknown
}

impl AssetClass {
    /// Substrings that make a candidate path "class-appropriate" for
    /// scoring purposes.
    pub(crate) fn scoring_tokens(self) -> &'static [&'static str] {
        match self {
            AssetClass::Material => &["material", "texture", "shader"],
            AssetClass::Mesh     => &["mesh", "geom"],
            AssetClass::Unknown  => &[],
        }
    }
}

// ── Candidate plumbing shared by both strategies ─────────────────────────────

/// Normalize a raw candidate into a path-like string, or reject it.
///
/// Backslashes become forward slashes; the result must still contain a
/// separator.  A trailing `.Last` duplicate suffix (the `Foo/Bar.Bar`
/// package-object idiom) is trimmed, and a leading double slash collapses
/// to one.
pub(crate) fn normalize_candidate(raw: &str) -> Option<String> {
    let mut s = raw.replace('\\', "/");
    if !s.contains('/') {
        return None;
    }
    while s.starts_with("//") {
        s.remove(0);
    }
    s = trim_object_suffix(&s);
    Some(s)
}

/// `A/B/Foo.Foo` → `A/B/Foo`.
fn trim_object_suffix(path: &str) -> String {
    let (dir, seg) = match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    };
    if let Some((base, suffix)) = seg.rsplit_once('.') {
        if !base.is_empty() && suffix.eq_ignore_ascii_case(base) {
            return format!("{dir}{base}");
        }
    }
    path.to_owned()
}

/// Last path segment, ignoring a trailing slash.
pub(crate) fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Anchor the winning candidate to the asset stem: a candidate already
/// ending in the stem is used as-is; anything else is treated as a folder
/// and the stem appended.
pub(crate) fn anchor_to_stem(candidate: &str, stem: &str) -> String {
    let trimmed = candidate.trim_end_matches('/');
    if last_segment(trimmed).eq_ignore_ascii_case(stem) {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/{stem}")
    }
}
