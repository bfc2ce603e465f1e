//! Extraction driver — the single-pass loop that ties the crate together.
//!
//! # Run shape
//! One background worker walks the name table in table order.  For each
//! non-directory record: pre-read filters, entry row, chunk assembly, path
//! recovery, routing, write.  Every per-entry fault is caught, logged as a
//! warning, and skipped — one bad entry never aborts the run.  After the
//! loop the container handles are released and the bulk reconcile pass
//! runs, on every exit path.
//!
//! # Callbacks
//! The driver owns two narrow host interfaces: `progress(0..100)` and
//! `log(&str)`.  Severity travels in the message prefix (✔/📦/🧭/🗃️/📁
//! info, ⏭️ skip, ⚠️ warning, ❌/💥 error, ✅ completion).  [`LogLevel`]
//! filtering is the host's business; the side log file written into the
//! output directory always receives the full trace.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::codec::{Codec, Oodle};
use crate::container::ContainerCache;
use crate::error::ExtractError;
use crate::index::{IndexFile, NameRecord};
use crate::outputs::OutputIndex;
use crate::reconcile::reconcile_bulks;
use crate::recover::{recover, RecoveredPath};
use crate::route::{base_name, ext_of, is_asset_ext, stem_of, RouteDecision, Router};
use crate::window::assemble;

// ── Log level ────────────────────────────────────────────────────────────────

/// Host-side throttling policy.  The driver itself never drops a message;
/// this is applied by the front-end to the `log` callback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Full,
    Warnings,
    Error,
    Minimal,
    Silent,
    None,
}

/// Message class derived from the emoji prefix convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Skip,
    Warning,
    Error,
    Completion,
}

impl Severity {
    pub fn of(message: &str) -> Self {
        if message.starts_with('✅') {
            Severity::Completion
        } else if message.starts_with('❌') || message.starts_with('💥') {
            Severity::Error
        } else if message.starts_with('⚠') {
            Severity::Warning
        } else if message.starts_with('⏭') {
            Severity::Skip
        } else {
            Severity::Info
        }
    }
}

impl LogLevel {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full"     => Some(LogLevel::Full),
            "warnings" => Some(LogLevel::Warnings),
            "error"    => Some(LogLevel::Error),
            "minimal"  => Some(LogLevel::Minimal),
            "silent"   => Some(LogLevel::Silent),
            "none"     => Some(LogLevel::None),
            _          => Option::None,
        }
    }

    /// Whether a message of this severity reaches the host log.
    pub fn allows(self, severity: Severity) -> bool {
        match self {
            LogLevel::Full => true,
            LogLevel::Warnings => matches!(
                severity,
                Severity::Warning | Severity::Error | Severity::Completion
            ),
            LogLevel::Error => matches!(severity, Severity::Error | Severity::Completion),
            LogLevel::Minimal => matches!(severity, Severity::Completion),
            LogLevel::Silent | LogLevel::None => false,
        }
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Configuration record consumed from the host front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractOptions {
    pub output_directory:    PathBuf,
    pub enable_header_path:  bool,
    pub enable_content_path: bool,
    pub skip_wem_files:      bool,
    pub skip_bink_files:     bool,
    pub skip_existing_files: bool,
    pub skip_res_and_ace:    bool,
    pub skip_config_files:   bool,
    /// Emit only asset/map/bulk families; implies every other skip.
    pub only_assets:         bool,
    pub log_level:           LogLevel,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_directory:    PathBuf::from("extracted"),
            enable_header_path:  true,
            enable_content_path: true,
            skip_wem_files:      false,
            skip_bink_files:     false,
            skip_existing_files: false,
            skip_res_and_ace:    false,
            skip_config_files:   false,
            only_assets:         false,
            log_level:           LogLevel::Full,
        }
    }
}

impl ExtractOptions {
    pub fn skip_wem(&self) -> bool {
        self.skip_wem_files || self.only_assets
    }
    pub fn skip_bink(&self) -> bool {
        self.skip_bink_files || self.only_assets
    }
    pub fn skip_existing(&self) -> bool {
        self.skip_existing_files || self.only_assets
    }
    pub fn skip_res_ace(&self) -> bool {
        self.skip_res_and_ace || self.only_assets
    }
    pub fn skip_configs(&self) -> bool {
        self.skip_config_files || self.only_assets
    }
}

// ── Callbacks ────────────────────────────────────────────────────────────────

pub type ProgressFn<'a> = dyn FnMut(f64) + 'a;
pub type LogFn<'a> = dyn FnMut(&str) + 'a;

// ── Report ───────────────────────────────────────────────────────────────────

/// Counters for one extraction run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExtractReport {
    pub entries_seen:      usize,
    pub files_written:     usize,
    pub directories:       usize,
    pub skipped:           usize,
    pub failed:            usize,
    pub recovered_paths:   usize,
    pub degraded_entries:  usize,
    pub bulk_moved:        usize,
    pub bulk_stranded:     usize,
    pub bytes_written:     u64,
    pub containers_opened: usize,
}

impl ExtractReport {
    /// One-line completion summary.
    pub fn summary(&self) -> String {
        format!(
            "{} file(s) written ({:.2} MiB), {} skipped, {} failed, \
             {} path(s) recovered, {} bulk file(s) re-homed",
            self.files_written,
            self.bytes_written as f64 / 1024.0 / 1024.0,
            self.skipped,
            self.failed,
            self.recovered_paths,
            self.bulk_moved,
        )
    }
}

// ── Run log ──────────────────────────────────────────────────────────────────

/// Fan-out for one run: every message goes to the side log file; the host
/// callback receives the same stream unfiltered.
struct RunLog<'s, 'a> {
    callback: Option<&'s mut (dyn FnMut(&str) + 'a)>,
    file:     Option<BufWriter<File>>,
}

impl RunLog<'_, '_> {
    fn emit(&mut self, message: &str) {
        if let Some(f) = &mut self.file {
            let _ = writeln!(f, "[{}] {}", Local::now().format("%H:%M:%S"), message);
        }
        if let Some(cb) = &mut self.callback {
            cb(message);
        }
    }
}

// ── Per-entry outcome ────────────────────────────────────────────────────────

enum EntryOutcome {
    Written { bytes: u64, degraded: bool, recovered: bool },
    Directory,
    Skipped,
}

// ── Extractor ────────────────────────────────────────────────────────────────

pub struct Extractor<'a> {
    options:  ExtractOptions,
    codec:    Box<dyn Codec + 'a>,
    progress: Option<Box<ProgressFn<'a>>>,
    log:      Option<Box<LogFn<'a>>>,
}

impl<'a> Extractor<'a> {
    /// Driver with the real Oodle shim (loaded lazily from the default
    /// candidate paths; a missing library degrades, it does not error).
    pub fn new(options: ExtractOptions) -> Self {
        Self::with_codec(options, Box::new(Oodle::load(Option::None)))
    }

    /// Driver with an injected codec — the headless-test seam.
    pub fn with_codec(options: ExtractOptions, codec: Box<dyn Codec + 'a>) -> Self {
        Self { options, codec, progress: Option::None, log: Option::None }
    }

    pub fn on_progress(mut self, f: impl FnMut(f64) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_log(mut self, f: impl FnMut(&str) + 'a) -> Self {
        self.log = Some(Box::new(f));
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Run a full extraction of `index_path`.
    ///
    /// Fatal errors are only those that prevent the loop from starting; all
    /// per-entry faults are demoted to warnings in the log stream.
    pub fn run(&mut self, index_path: &Path) -> Result<ExtractReport, ExtractError> {
        let index = IndexFile::open(index_path)?;

        let out_root = self.options.output_directory.clone();
        std::fs::create_dir_all(&out_root).map_err(|e| ExtractError::OutputDir {
            path: out_root.clone(),
            source: e,
        })?;

        let log_path = out_root.join(format!(
            "extract_log_{}.log",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let mut runlog = RunLog {
            callback: self.log.as_deref_mut(),
            file: File::create(&log_path).ok().map(BufWriter::new),
        };

        let existing = if self.options.skip_existing() {
            OutputIndex::scan(&out_root)
        } else {
            OutputIndex::empty()
        };

        let records = index.read_names();
        let entries: Vec<&NameRecord> = records.iter().filter(|r| !r.is_directory()).collect();
        let total = entries.len();

        runlog.emit(&format!(
            "📦 Extracting {total} entries from {} (codec: {})",
            index_path.display(),
            self.codec.describe(),
        ));
        if self.options.skip_existing() && existing.file_count() > 0 {
            runlog.emit(&format!(
                "🗃️ Found {} existing file(s) in the output tree",
                existing.file_count()
            ));
        }

        let mut report = ExtractReport::default();
        let mut containers = ContainerCache::new();
        let mut router = Router::new(&out_root);

        for (i, record) in entries.iter().enumerate() {
            if let Some(cb) = &mut self.progress {
                cb(i as f64 / total.max(1) as f64 * 100.0);
            }
            report.entries_seen += 1;

            let result = extract_one(
                &index,
                &mut containers,
                self.codec.as_ref(),
                &mut router,
                &self.options,
                &existing,
                record,
                &mut runlog,
            );

            match result {
                Ok(EntryOutcome::Written { bytes, degraded, recovered }) => {
                    report.files_written += 1;
                    report.bytes_written += bytes;
                    if degraded {
                        report.degraded_entries += 1;
                    }
                    if recovered {
                        report.recovered_paths += 1;
                    }
                }
                Ok(EntryOutcome::Directory) => report.directories += 1,
                Ok(EntryOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    runlog.emit(&format!("⚠️ {}: {e}", record.name));
                }
            }
        }

        // Handles are released before the reconcile pass touches the tree.
        report.containers_opened = containers.open_count();
        containers.close_all();

        let outcome = reconcile_bulks(&out_root, router.material_memo(), &mut |m| runlog.emit(m));
        report.bulk_moved = outcome.moved;
        report.bulk_stranded = outcome.stranded;

        if let Some(cb) = &mut self.progress {
            cb(100.0);
        }
        runlog.emit(&format!("✅ Done: {}", report.summary()));

        Ok(report)
    }
}

// ── Per-entry pipeline ───────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn extract_one(
    index:      &IndexFile,
    containers: &mut ContainerCache,
    codec:      &dyn Codec,
    router:     &mut Router,
    opts:       &ExtractOptions,
    existing:   &OutputIndex,
    record:     &NameRecord,
    runlog:     &mut RunLog<'_, '_>,
) -> Result<EntryOutcome, ExtractError> {
    let entry_name = record.name.as_str();
    let entry = record.file_number as u32;

    // Rules 1–2: no payload needed.
    if let Some(reason) = Router::pre_filter(opts, existing, entry_name) {
        runlog.emit(&format!("⏭️ {reason}"));
        return Ok(EntryOutcome::Skipped);
    }

    let row = index.entry_row(entry)?;
    let layout = index.entry_layout(entry, &row)?;

    // Rule 3: localization, once the owning container is known.
    let container_name = layout
        .container_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(reason) = Router::localization_filter(opts, entry_name, &container_name) {
        runlog.emit(&format!("⏭️ {reason}"));
        return Ok(EntryOutcome::Skipped);
    }

    let window = assemble(containers, codec, &layout, &row)?;

    // Degraded entries keep their compressed shape; carving a window of
    // passthrough bytes would emit garbage of the wrong length.
    let payload: &[u8] = if window.degraded {
        runlog.emit(&format!(
            "⚠️ Codec fallback for {entry_name}; writing compressed bytes as-is"
        ));
        window.produced()
    } else {
        window.carve(&row).ok_or_else(|| ExtractError::EntryMalformed {
            entry,
            reason: format!(
                "extent {}+{} exceeds assembled window of {} bytes",
                row.abs_offset,
                row.abs_size,
                window.data.len()
            ),
        })?
    };

    // Path recovery, asset family only.
    let basename = base_name(entry_name);
    let stem = stem_of(basename);
    let wants_recovery = ext_of(basename)
        .as_deref()
        .map(is_asset_ext)
        .unwrap_or(false);
    let recovered: Option<RecoveredPath> = if wants_recovery {
        recover(
            payload,
            stem,
            opts.enable_header_path,
            opts.enable_content_path,
        )
    } else {
        Option::None
    };
    if let Some(r) = &recovered {
        runlog.emit(&format!("🧭 Recovered path for {basename}: {}", r.path));
    }

    match router.route(opts, entry_name, recovered.as_ref()) {
        RouteDecision::Skip { reason } => {
            runlog.emit(&format!("⏭️ {reason}"));
            Ok(EntryOutcome::Skipped)
        }
        RouteDecision::Directory(path) => {
            std::fs::create_dir_all(&path)
                .map_err(|e| ExtractError::Write { path: path.clone(), source: e })?;
            runlog.emit(&format!("📁 Created {}", path.display()));
            Ok(EntryOutcome::Directory)
        }
        RouteDecision::File { path, .. } => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ExtractError::Write { path: path.clone(), source: e })?;
            }
            std::fs::write(&path, payload)
                .map_err(|e| ExtractError::Write { path: path.clone(), source: e })?;
            runlog.emit(&format!("✔ {} ({} bytes)", path.display(), payload.len()));
            Ok(EntryOutcome::Written {
                bytes: payload.len() as u64,
                degraded: window.degraded,
                recovered: recovered.is_some(),
            })
        }
    }
}
