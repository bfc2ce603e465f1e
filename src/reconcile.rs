//! Bulk reconcile pass — re-homes orphaned `.ubulk` satellites after the
//! main loop.
//!
//! Satellites processed before their owning asset land in the `_ubulks/`
//! staging directory.  This pass re-scans the output tree, rebuilds the
//! material-directory memo from what is actually on disk (the run's memo is
//! the seed, so run decisions win), and moves each staged file next to its
//! owner.  Stems are matched exactly first, then through up to three
//! stripped index-like suffixes (`_0`, `-2`, `.3`, `_lod1`, …), against the
//! material memo before the all-assets memo.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use walkdir::WalkDir;

use crate::route::{ext_of, is_material, stem_of, BULK_STAGING_DIR};

/// How many trailing index-like suffixes a stem variant may shed.
const MAX_SUFFIX_STRIPS: usize = 3;

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub moved:    usize,
    pub stranded: usize,
}

/// Run the pass.  `run_materials` is the router's memo from the extraction
/// loop (stem, lowercased → relative directory).  Every decision is logged
/// through `log`; filesystem faults strand the file rather than failing
/// the run.
pub fn reconcile_bulks(
    out_root:      &Path,
    run_materials: &HashMap<String, String>,
    log:           &mut dyn FnMut(&str),
) -> ReconcileOutcome {
    let staging = out_root.join(BULK_STAGING_DIR);
    if !staging.is_dir() {
        return ReconcileOutcome::default();
    }

    // Rebuild the memos from disk, seeded by the run's own decisions.
    let mut materials: HashMap<String, String> = run_materials.clone();
    let mut all_assets: HashMap<String, String> = HashMap::new();

    for entry in WalkDir::new(out_root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(out_root) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        if rel.starts_with(BULK_STAGING_DIR) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match ext_of(&name).as_deref() {
            Some("uasset") | Some("uasset2") => {}
            _ => continue,
        }
        let stem = stem_of(&name);
        let rel_dir = match rel.rsplit_once('/') {
            Some((dir, _)) => dir.to_owned(),
            None => String::new(),
        };
        let key = stem.to_lowercase();
        all_assets.entry(key.clone()).or_insert_with(|| rel_dir.clone());
        if is_material(None, &rel, stem) {
            materials.entry(key).or_insert(rel_dir);
        }
    }

    let suffix = Regex::new(r"(?i)[_\-.](lod)?\d+$").expect("static pattern");
    let mut outcome = ReconcileOutcome::default();

    let staged: Vec<_> = match std::fs::read_dir(&staging) {
        Ok(rd) => rd
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .collect(),
        Err(_) => return outcome,
    };

    for entry in staged {
        let name = entry.file_name().to_string_lossy().into_owned();
        let stem = stem_of(&name).to_owned();

        let owner = lookup(&materials, &suffix, &stem)
            .or_else(|| lookup(&all_assets, &suffix, &stem));

        let Some(rel_dir) = owner else {
            outcome.stranded += 1;
            log(&format!("🧭 No owner found for {name}; leaving in {BULK_STAGING_DIR}"));
            continue;
        };

        let dest_dir = out_root.join(&rel_dir);
        let mut target = dest_dir.join(&name);
        let mut n = 0u32;
        while target.exists() {
            n += 1;
            target = dest_dir.join(numbered(&name, n));
        }

        match std::fs::rename(entry.path(), &target) {
            Ok(()) => {
                outcome.moved += 1;
                log(&format!("📦 Moved {name} → {}", display_rel(out_root, &target)));
            }
            Err(e) => {
                outcome.stranded += 1;
                log(&format!("⚠️ Could not move {name}: {e}"));
            }
        }
    }

    // Drop the staging directory once nothing is left in it.
    if std::fs::read_dir(&staging)
        .map(|mut rd| rd.next().is_none())
        .unwrap_or(false)
    {
        let _ = std::fs::remove_dir(&staging);
    }

    outcome
}

/// Exact stem first, then up to [`MAX_SUFFIX_STRIPS`] stripped variants.
fn lookup(memo: &HashMap<String, String>, suffix: &Regex, stem: &str) -> Option<String> {
    let mut variant = stem.to_lowercase();
    for _ in 0..=MAX_SUFFIX_STRIPS {
        if let Some(dir) = memo.get(&variant) {
            return Some(dir.clone());
        }
        let cut = match suffix.find(&variant) {
            Some(m) if m.start() > 0 => m.start(),
            _ => break,
        };
        variant.truncate(cut);
    }
    None
}

fn numbered(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
        None => format!("{name}_{n}"),
    }
}

fn display_rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|r| r.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| path.display().to_string())
}
