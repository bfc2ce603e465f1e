//! Router — decides where each extracted entry lands.
//!
//! Rules run in priority order; the first match wins:
//!   1. user-toggle skips (only-assets, res/ace, configs, bink, wwise),
//!   2. existing-output basename skip,
//!   3. localization skip (container name or entry path),
//!   4. extension-less entries are never emitted,
//!   5. configs → `Configs/`,
//!   6. bulk satellites → the memoized owner directory or `_ubulks/`,
//!   7. material assets → suggested subdir or `Materials/` (memoized),
//!   8. everything else → suggested subdir or `misc/`.
//!
//! The material-directory memo and the used-path set live here for exactly
//! one run; the driver builds a fresh `Router` per run.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::extract::ExtractOptions;
use crate::outputs::OutputIndex;
use crate::recover::{AssetClass, RecoveredPath};

/// Asset family routed through path recovery.
pub const ASSET_EXTS: &[&str] = &["uasset", "uasset2", "umap"];

/// Configuration-file extensions routed to `Configs/`.
pub const CONFIG_EXTS: &[&str] = &[
    "ini", "json", "cfg", "xml", "toml", "yaml", "yml", "properties", "conf",
];

const WWISE_SEGMENTS: &[&str] = &["wwiseaudio", "wwisetriton"];

const LOC_TOKENS: &[&str] = &["localized", "unlocalized", "localisation", "localization", "loc"];

/// Two- and four-character language segments treated as localization.
const LANG_CODES: &[&str] = &[
    "en", "fr", "de", "es", "it", "ja", "ko", "pl", "pt", "ru", "zh", "ar",
    "cs", "da", "fi", "hu", "nl", "no", "sv", "th", "tr",
    "enus", "engb", "frfr", "dede", "eses", "esmx", "itit", "jajp", "kokr",
    "plpl", "ptbr", "ruru", "zhcn", "zhtw",
];

/// Staging directory for bulk files whose owner is not yet known.
pub const BULK_STAGING_DIR: &str = "_ubulks";

// ── Extension helpers ────────────────────────────────────────────────────────

/// Lowercased extension of a file name, if any.
pub fn ext_of(name: &str) -> Option<String> {
    let base = base_name(name);
    match base.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

/// File-name stem (basename without its last extension).
pub fn stem_of(name: &str) -> &str {
    let base = base_name(name);
    match base.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => base,
    }
}

/// Final component of a slash- or backslash-separated name.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// `.ubulk` plus the numbered `.ubulk0`, `.ubulk1`, … variants.
pub fn is_bulk_ext(ext: &str) -> bool {
    match ext.strip_prefix("ubulk") {
        Some(rest) => rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

pub fn is_asset_ext(ext: &str) -> bool {
    ASSET_EXTS.contains(&ext)
}

pub fn is_config_ext(ext: &str) -> bool {
    CONFIG_EXTS.contains(&ext)
}

// ── Path predicates ──────────────────────────────────────────────────────────

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty())
}

/// Any path segment naming a Wwise audio folder.
pub fn under_wwise(path: &str) -> bool {
    segments(path).any(|s| {
        let folded = s.to_ascii_lowercase();
        WWISE_SEGMENTS.contains(&folded.as_str())
    })
}

/// Any full path segment that is a localization token or language code.
pub fn has_localization_segment(path: &str) -> bool {
    segments(path).any(|s| {
        let folded = s.to_ascii_lowercase();
        LOC_TOKENS.contains(&folded.as_str()) || LANG_CODES.contains(&folded.as_str())
    })
}

/// Material detection: the recovered class, a materials folder anywhere in
/// the routed path, or a conventional material stem prefix.
pub fn is_material(class: Option<AssetClass>, routed_path: &str, stem: &str) -> bool {
    if class == Some(AssetClass::Material) {
        return true;
    }
    let folded = format!("/{}", routed_path.to_lowercase());
    if folded.contains("/material") {
        return true;
    }
    let upper = stem.to_uppercase();
    ["M_", "MI_", "MIC_", "MF_"].iter().any(|p| upper.starts_with(p))
}

// ── Name sanitization ────────────────────────────────────────────────────────

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Make a recovered path safe to join under the output root: forward
/// slashes, no drive prefix, no leading slashes, no empty or dot segments,
/// no platform-invalid characters, reserved device names prefixed with `_`.
/// Dropping `.`/`..` keeps every emitted path a descendant of the root.
pub fn sanitize_rel_path(path: &str) -> String {
    let mut s = path.replace('\\', "/");
    s = s.trim_start_matches('/').to_owned();
    if s.len() >= 2 && s.as_bytes()[1] == b':' && s.as_bytes()[0].is_ascii_alphabetic() {
        s = s[2..].trim_start_matches('/').to_owned();
    }

    s.split('/')
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .map(sanitize_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize_segment(seg: &str) -> String {
    let mut out: String = seg
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || (c as u32) < 0x20 {
                '_'
            } else {
                c
            }
        })
        .collect();
    if is_reserved_name(&out) {
        out.insert(0, '_');
    }
    out
}

/// `CON`, `PRN`, `AUX`, `NUL`, `COM1..9`, `LPT1..9` — checked against the
/// segment's pre-dot stem, case-insensitively.
fn is_reserved_name(seg: &str) -> bool {
    let stem = seg.split('.').next().unwrap_or(seg).to_ascii_uppercase();
    match stem.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => {
            stem.len() == 4
                && (stem.starts_with("COM") || stem.starts_with("LPT"))
                && matches!(stem.as_bytes()[3], b'1'..=b'9')
        }
    }
}

// ── Routing decision ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Skip { reason: String },
    /// Directory-like entry: create the (possibly empty) directory.
    Directory(PathBuf),
    File {
        path:        PathBuf,
        is_material: bool,
    },
}

// ── Router ───────────────────────────────────────────────────────────────────

pub struct Router {
    out_root: PathBuf,
    /// Asset stem (lowercased) → output directory relative to the root.
    material_dirs: HashMap<String, String>,
    /// Relative paths (lowercased) written this run.
    used_paths: HashSet<String>,
}

impl Router {
    pub fn new(out_root: &Path) -> Self {
        Self {
            out_root: out_root.to_path_buf(),
            material_dirs: HashMap::new(),
            used_paths: HashSet::new(),
        }
    }

    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    pub fn material_dir(&self, stem: &str) -> Option<&str> {
        self.material_dirs.get(&stem.to_lowercase()).map(String::as_str)
    }

    /// The run's material memo (stem, lowercased → relative directory),
    /// handed to the reconcile pass as its seed.
    pub fn material_memo(&self) -> &HashMap<String, String> {
        &self.material_dirs
    }

    pub fn remember_material(&mut self, stem: &str, rel_dir: String) {
        self.material_dirs.insert(stem.to_lowercase(), rel_dir);
    }

    /// Pre-read filters — rules 1 and 2, the parts that need no payload.
    /// Returns a skip reason, or `None` to continue.
    pub fn pre_filter(
        opts:     &ExtractOptions,
        existing: &OutputIndex,
        entry_name: &str,
    ) -> Option<String> {
        let ext = ext_of(entry_name);

        if opts.only_assets {
            let keep = ext
                .as_deref()
                .map(|e| is_asset_ext(e) || is_bulk_ext(e))
                .unwrap_or(false);
            if !keep {
                return Some(format!("Skipping (Only Assets Mode): {entry_name}"));
            }
        }
        if let Some(ext) = ext.as_deref() {
            if opts.skip_res_ace() && (ext == "res" || ext == "ace") {
                return Some(format!("Skipping (res/ace): {entry_name}"));
            }
            if opts.skip_configs() && is_config_ext(ext) {
                return Some(format!("Skipping (config): {entry_name}"));
            }
            if opts.skip_bink() && (ext == "bik" || ext == "bk2") {
                return Some(format!("Skipping (bink video): {entry_name}"));
            }
        }
        if opts.skip_wem() && under_wwise(entry_name) {
            return Some(format!("Skipping (Wwise audio): {entry_name}"));
        }
        if opts.skip_existing() && existing.has_basename(base_name(entry_name)) {
            return Some(format!("Skipping (already extracted): {entry_name}"));
        }
        None
    }

    /// Rule 3 — localization skip, once the owning container is known.
    pub fn localization_filter(
        opts:           &ExtractOptions,
        entry_name:     &str,
        container_name: &str,
    ) -> Option<String> {
        if !(opts.only_assets || opts.skip_wem()) {
            return None;
        }
        if has_localization_segment(entry_name) || has_localization_segment(container_name) {
            return Some(format!("Skipping (localized): {entry_name}"));
        }
        None
    }

    /// Rules 4–8 plus the final Wwise check and collision resolution.
    pub fn route(
        &mut self,
        opts:       &ExtractOptions,
        entry_name: &str,
        recovered:  Option<&RecoveredPath>,
    ) -> RouteDecision {
        if entry_name.ends_with('/') || entry_name.ends_with('\\') {
            let rel = sanitize_rel_path(entry_name);
            return RouteDecision::Directory(self.out_root.join(rel));
        }

        let basename = base_name(entry_name);
        let stem = stem_of(basename);
        let ext = match ext_of(basename) {
            Some(e) => e,
            None => {
                return RouteDecision::Skip {
                    reason: format!("Skipping (no extension): {entry_name}"),
                }
            }
        };
        let safe_base = sanitize_rel_path(basename);

        let suggested = recovered
            .map(|r| sanitize_rel_path(&r.path))
            .filter(|rel| !rel.is_empty())
            .map(|rel| format!("{rel}.{ext}"));
        let material = is_asset_ext(&ext)
            && is_material(recovered.map(|r| r.class), suggested.as_deref().unwrap_or(""), stem);

        let rel = if is_config_ext(&ext) {
            format!("Configs/{safe_base}")
        } else if is_bulk_ext(&ext) {
            match self.material_dir(stem) {
                Some(dir) if !dir.is_empty() => format!("{dir}/{safe_base}"),
                Some(_) => safe_base.clone(),
                None => format!("{BULK_STAGING_DIR}/{safe_base}"),
            }
        } else {
            match suggested {
                Some(rel) => rel,
                None if material => format!("Materials/{safe_base}"),
                None => format!("misc/{safe_base}"),
            }
        };

        if opts.skip_wem() && under_wwise(&rel) {
            return RouteDecision::Skip {
                reason: format!("Skipping (Wwise audio): {entry_name}"),
            };
        }

        let material = material || (is_asset_ext(&ext) && is_material(None, &rel, stem));
        let (final_rel, abs) = self.unique_path(&rel);

        if material {
            let rel_dir = match final_rel.rsplit_once('/') {
                Some((dir, _)) => dir.to_owned(),
                None => String::new(),
            };
            self.remember_material(stem, rel_dir);
        }

        RouteDecision::File { path: abs, is_material: material }
    }

    /// Resolve collisions against both the filesystem and this run's
    /// written set by appending `_1`, `_2`, … before the extension.
    pub fn unique_path(&mut self, rel: &str) -> (String, PathBuf) {
        let mut candidate = rel.to_owned();
        let mut n = 0u32;
        loop {
            let abs = self.out_root.join(&candidate);
            let key = candidate.to_lowercase();
            if !abs.exists() && !self.used_paths.contains(&key) {
                self.used_paths.insert(key);
                return (candidate, abs);
            }
            n += 1;
            candidate = numbered(rel, n);
        }
    }
}

/// `Models/Mesh.uasset` + 2 → `Models/Mesh_2.uasset`.
fn numbered(rel: &str, n: u32) -> String {
    let (dir, base) = match rel.rsplit_once('/') {
        Some((d, b)) => (Some(d), b),
        None => (None, rel),
    };
    let renamed = match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
        None => format!("{base}_{n}"),
    };
    match dir {
        Some(d) => format!("{d}/{renamed}"),
        None => renamed,
    }
}
