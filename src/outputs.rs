//! Existing-output index — one pre-scan of the destination tree.
//!
//! Built before the extraction loop when skip-existing is on, then
//! consulted read-only.  Never used to overwrite anything.

use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;

#[derive(Default)]
pub struct OutputIndex {
    /// Forward-slash relative paths, lowercased.
    rel_paths: HashSet<String>,
    /// File basenames, lowercased.
    basenames: HashSet<String>,
}

impl OutputIndex {
    /// An index that matches nothing (skip-existing off).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Enumerate every file under `root`.  Unreadable subtrees are skipped
    /// silently; an absent root yields an empty index.
    pub fn scan(root: &Path) -> Self {
        let mut index = Self::default();
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(root) {
                let rel = rel.to_string_lossy().replace('\\', "/").to_lowercase();
                index.rel_paths.insert(rel);
            }
            index
                .basenames
                .insert(entry.file_name().to_string_lossy().to_lowercase());
        }
        index
    }

    pub fn has_basename(&self, name: &str) -> bool {
        self.basenames.contains(&name.to_lowercase())
    }

    pub fn has_rel_path(&self, rel: &str) -> bool {
        self.rel_paths.contains(&rel.replace('\\', "/").to_lowercase())
    }

    pub fn file_count(&self) -> usize {
        self.rel_paths.len()
    }
}
