//! Oodle LZ shim — the one native call in the crate, behind a soft-failure
//! boundary.
//!
//! # Failure semantics
//! Decompression never hard-fails an extraction run:
//!   - If the shared library cannot be located or loaded, or the
//!     `OodleLZ_Decompress` symbol is missing, the shim is `Disabled` and
//!     every call returns the compressed input unchanged (`Decoded::Stored`).
//!   - If a call returns a negative status, that chunk falls back to the
//!     compressed input and the consecutive-failure counter is bumped.
//!   - A status of exactly 0 is ambiguous; the output is accepted only if it
//!     passes [`looks_decompressed`] (at least 9 distinct byte values over a
//!     sampled stride).
//!
//! The failure counter is reported but never trips: the disable threshold is
//! effectively infinite, so a run keeps retrying the codec per chunk.
//!
//! # Call contract
//! `OodleLZ_Decompress` is invoked with fuzzSafe=1, checkCrc=0, verbosity=0,
//! no caller-provided decode buffers or callbacks, and threadPhase=0.  All
//! buffers are owned by the caller and passed with explicit lengths; the
//! library never allocates on our behalf.

use std::cell::Cell;
use std::env;
use std::ffi::c_void;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use thiserror::Error;

/// Environment variable naming a directory (or full path) to probe for the
/// Oodle shared library before the default candidates.
pub const OODLE_ENV_VAR: &str = "B2EXTRACT_OODLE";

#[cfg(windows)]
const LIB_NAMES: &[&str] = &["oo2core_9_win64.dll", "oo2core_8_win64.dll"];
#[cfg(not(windows))]
const LIB_NAMES: &[&str] = &["liboo2corelinux64.so.9", "liboo2corelinux64.so"];

/// Consecutive-failure disable threshold.  Present for future policy; the
/// current value never trips, so the codec is retried for every chunk.
const DISABLE_THRESHOLD: u32 = u32::MAX;

// OodleLZ_Decompress(src, srcLen, dst, dstLen, fuzzSafe, checkCrc, verbosity,
//                    decBufBase, decBufSize, fpCallback, cbContext,
//                    scratch, scratchSize, threadPhase) -> bytes written
type DecompressFn = unsafe extern "C" fn(
    *const u8, isize,
    *mut u8, isize,
    i32, i32, i32,
    *mut u8, isize,
    *const c_void, *mut c_void,
    *mut c_void, isize,
    i32,
) -> isize;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Oodle library not available: {0}")]
    Unavailable(String),
    #[error("Oodle returned status {status} for {comp_len} compressed bytes")]
    Failed { status: isize, comp_len: usize },
}

// ── Decoded outcome ──────────────────────────────────────────────────────────

/// Result of one decompression attempt.  `Stored` means the caller received
/// the compressed bytes unchanged because the codec was unavailable or the
/// native call failed; downstream tooling can decompress later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Plain(Vec<u8>),
    Stored(Vec<u8>),
}

impl Decoded {
    #[inline]
    pub fn is_stored(&self) -> bool {
        matches!(self, Decoded::Stored(_))
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Decoded::Plain(b) | Decoded::Stored(b) => b,
        }
    }
}

// ── Codec trait ──────────────────────────────────────────────────────────────

/// The seam between the extractor and the native codec.  Tests inject a
/// decompression-free stub here; production uses [`Oodle`].
pub trait Codec {
    /// Decompress `comp` into an `unc_len`-byte buffer, or hand back the
    /// input as `Decoded::Stored` when that is not possible.
    fn decompress(&self, comp: &[u8], unc_len: usize) -> Decoded;

    /// False once the shim has entered its per-run degraded decision.
    fn is_enabled(&self) -> bool;

    /// Human-readable identity for diagnostics only.
    fn describe(&self) -> String;
}

// ── Oodle shim ───────────────────────────────────────────────────────────────

pub struct OodleHandle {
    // Keeps the library mapped; `decompress` borrows from it.
    #[allow(dead_code)]
    lib:        Library,
    decompress: Symbol<'static, DecompressFn>,
    path:       PathBuf,
    failures:   Cell<u32>,
}

pub enum Oodle {
    Enabled(OodleHandle),
    Disabled { reason: String },
}

impl Oodle {
    /// Load the native library, probing `explicit` first, then the
    /// `B2EXTRACT_OODLE` environment variable, the executable's directory,
    /// and the working directory.  Never errors: an unlocatable library
    /// yields `Disabled` and extraction proceeds in passthrough mode.
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();

        if let Some(p) = explicit {
            candidates.push(p.to_path_buf());
        }
        if let Ok(dir) = env::var(OODLE_ENV_VAR) {
            let base = PathBuf::from(dir);
            if base.is_file() {
                candidates.push(base.clone());
            }
            for name in LIB_NAMES {
                candidates.push(base.join(name));
            }
        }
        if let Ok(exe) = env::current_exe() {
            if let Some(exe_dir) = exe.parent() {
                for name in LIB_NAMES {
                    candidates.push(exe_dir.join(name));
                    candidates.push(exe_dir.join("lib").join(name));
                }
            }
        }
        if let Ok(cwd) = env::current_dir() {
            for name in LIB_NAMES {
                candidates.push(cwd.join(name));
            }
        }

        for path in candidates.iter().filter(|p| p.is_file()) {
            match OodleHandle::open(path) {
                Ok(handle) => return Oodle::Enabled(handle),
                Err(e) => return Oodle::Disabled { reason: e.to_string() },
            }
        }

        Oodle::Disabled {
            reason: format!(
                "no Oodle library found (tried {} candidate paths; set {})",
                candidates.len(),
                OODLE_ENV_VAR,
            ),
        }
    }

    /// Consecutive failures observed so far (resets on success).
    pub fn failure_count(&self) -> u32 {
        match self {
            Oodle::Enabled(h) => h.failures.get(),
            Oodle::Disabled { .. } => 0,
        }
    }
}

impl OodleHandle {
    fn open(path: &Path) -> Result<Self, CodecError> {
        unsafe {
            let lib = Library::new(path)
                .map_err(|e| CodecError::Unavailable(format!("{}: {e}", path.display())))?;
            let sym: Symbol<DecompressFn> = lib
                .get(b"OodleLZ_Decompress\0")
                .map_err(|e| CodecError::Unavailable(format!("OodleLZ_Decompress: {e}")))?;
            // The symbol borrows from `lib`; both live and die together in
            // this struct, so widening the borrow is sound.
            let decompress: Symbol<'static, DecompressFn> = std::mem::transmute(sym);
            Ok(Self {
                lib,
                decompress,
                path: path.to_path_buf(),
                failures: Cell::new(0),
            })
        }
    }

    fn run(&self, comp: &[u8], unc_len: usize) -> Decoded {
        if unc_len == 0 {
            return Decoded::Plain(Vec::new());
        }
        let mut out = vec![0u8; unc_len];
        let status = unsafe {
            (self.decompress)(
                comp.as_ptr(),
                comp.len() as isize,
                out.as_mut_ptr(),
                unc_len as isize,
                1, // fuzzSafe
                0, // checkCrc
                0, // verbosity
                std::ptr::null_mut(),
                0,
                std::ptr::null(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                0,
                0, // threadPhase
            )
        };

        let ok = match status {
            s if s > 0 => true,
            0 => looks_decompressed(&out),
            _ => false,
        };

        if ok {
            self.failures.set(0);
            Decoded::Plain(out)
        } else {
            let n = self.failures.get().saturating_add(1);
            self.failures.set(n);
            Decoded::Stored(comp.to_vec())
        }
    }
}

impl Codec for Oodle {
    fn decompress(&self, comp: &[u8], unc_len: usize) -> Decoded {
        match self {
            Oodle::Enabled(h) => h.run(comp, unc_len),
            Oodle::Disabled { .. } => Decoded::Stored(comp.to_vec()),
        }
    }

    fn is_enabled(&self) -> bool {
        match self {
            Oodle::Enabled(h) => h.failures.get() < DISABLE_THRESHOLD,
            Oodle::Disabled { .. } => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Oodle::Enabled(h) => format!("oodle ({})", h.path.display()),
            Oodle::Disabled { reason } => format!("disabled: {reason}"),
        }
    }
}

// ── Success heuristic ────────────────────────────────────────────────────────

/// Accept a status-0 output only if it plausibly holds decompressed data:
/// at least 9 distinct byte values over a sampled stride.  A buffer the
/// decompressor never touched stays zero-filled and fails this test.
pub fn looks_decompressed(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }
    let stride = (buf.len() / 4096).max(1);
    let mut seen = [false; 256];
    let mut distinct = 0usize;
    let mut i = 0usize;
    while i < buf.len() {
        let b = buf[i] as usize;
        if !seen[b] {
            seen[b] = true;
            distinct += 1;
            if distinct >= 9 {
                return true;
            }
        }
        i += stride;
    }
    false
}
