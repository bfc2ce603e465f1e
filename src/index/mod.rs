//! `.b2index` parser — header, name table, entry rows, block descriptors.
//!
//! # On-disk layout (all fields little-endian)
//!
//! ```text
//! Index header (fixed offsets):
//!    68   u32  entry_table_offset
//!    72   i32  entry count        (advisory — capacity hint only)
//!    92   u32  names_section_offset
//!    96   i32  name count         (advisory — capacity hint only)
//!
//! Name record (16 B, packed from names_section_offset):
//!    (u64 name_offset, i32 file_number, i32 child)
//!    child > 0 marks a directory record; name_offset points at a
//!    NUL-terminated UTF-8 string.
//!
//! Entry row (16 B at entry_table_offset + file_number*16):
//!    (i32 block_offset, i32 reserved, i32 abs_offset, i32 abs_size)
//!
//! Block descriptor:
//!    @ block_offset        u64 archive_spec_ptr
//!    @ block_offset + 16   (u64 payload_offset, i32 container_id,
//!                           u64 size_table_offset, i32 extra_count)
//!
//! Size table @ size_table_offset:
//!    (u64 base_uncompressed, i32 base_compressed)
//!    then extra_count × (i32 unc, i32 start, i32 end)
//!    extra in-container offset = payload_offset + start,
//!    extra compressed size    = end - start
//!
//! Archive spec @ archive_spec_ptr:
//!    u32 name_offset → NUL-terminated container file name
//!    (".b2container" appended when missing)
//! ```
//!
//! The name walk does not trust the advisory counts: it reads records until
//! EOF or a run of [`MAX_BAD_RUN`] consecutive malformed records, where
//! malformed means a zero/out-of-bounds `name_offset`, a negative
//! `file_number`, or an empty name string.  One good record resets the run.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

/// Index file extension (without dot).
pub const INDEX_EXT: &str = "b2index";
/// Container file extension (without dot).
pub const CONTAINER_EXT: &str = "b2container";

const ENTRY_TABLE_OFFSET_AT: usize = 68;
const ENTRY_COUNT_HINT_AT:   usize = 72;
const NAMES_OFFSET_AT:       usize = 92;
const NAME_COUNT_HINT_AT:    usize = 96;

const NAME_RECORD_SIZE: usize = 16;
const ENTRY_ROW_SIZE:   usize = 16;

/// Consecutive malformed name records tolerated before the walk stops.
pub const MAX_BAD_RUN: u32 = 4096;

/// Upper bound applied to the advisory counts when used as capacity hints.
const MAX_COUNT_HINT: i32 = 1 << 20;

/// Extra chunk counts above this are treated as a corrupt descriptor.
const MAX_EXTRA_CHUNKS: i32 = 1 << 16;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum IndexError {
    /// Header offsets out of range — the run cannot start.
    #[error("malformed index {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    /// A single entry's row or block descriptor is unusable; the entry is
    /// skipped and the run continues.
    #[error("entry {entry}: {reason}")]
    EntryOutOfRange { entry: u32, reason: String },
    #[error("index I/O: {0}")]
    Io(#[from] std::io::Error),
}

// ── Records ──────────────────────────────────────────────────────────────────

/// One 16-byte record from the name table.
#[derive(Debug, Clone)]
pub struct NameRecord {
    pub name:        String,
    pub file_number: i32,
    pub child:       i32,
}

impl NameRecord {
    /// Directory records are retained for tree layout but never emitted as
    /// files.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.child > 0
    }
}

/// One 16-byte row from the entry table.
#[derive(Debug, Clone, Copy)]
pub struct EntryRow {
    pub block_offset: i32,
    pub abs_offset:   i32,
    pub abs_size:     i32,
}

/// One compressed run inside a container.
#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    pub container_offset: u64,
    pub comp_size:        usize,
    pub unc_size:         usize,
}

impl Chunk {
    /// Store-mode chunks are copied verbatim, never decompressed.
    #[inline]
    pub fn is_store(&self) -> bool {
        self.comp_size == self.unc_size
    }
}

/// Fully resolved chunk layout for one entry.
#[derive(Debug, Clone)]
pub struct EntryLayout {
    pub container_path: PathBuf,
    /// Parsed and preserved; nothing conditions behavior on it.
    pub container_id:   i32,
    pub chunks:         Vec<Chunk>,
    pub total_uncompressed: u64,
}

// ── Index file ───────────────────────────────────────────────────────────────

pub struct IndexFile {
    data: Vec<u8>,
    dir:  PathBuf,
    pub path: PathBuf,
    pub entry_table_offset:   u64,
    pub names_section_offset: u64,
    pub entry_count_hint:     i32,
    pub name_count_hint:      i32,
}

impl IndexFile {
    /// Read the whole index into memory and validate the header offsets.
    /// Index files are small descriptors; the payload lives in containers.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        if data.len() < NAME_COUNT_HINT_AT + 4 {
            return Err(IndexError::Malformed {
                path,
                reason: format!("file is {} bytes, header needs {}", data.len(), NAME_COUNT_HINT_AT + 4),
            });
        }

        let entry_table_offset   = read_u32(&data, ENTRY_TABLE_OFFSET_AT) as u64;
        let entry_count_hint     = read_i32(&data, ENTRY_COUNT_HINT_AT);
        let names_section_offset = read_u32(&data, NAMES_OFFSET_AT) as u64;
        let name_count_hint      = read_i32(&data, NAME_COUNT_HINT_AT);

        let file_len = data.len() as u64;
        if entry_table_offset >= file_len || names_section_offset >= file_len {
            return Err(IndexError::Malformed {
                path,
                reason: format!(
                    "header offsets out of range (entry table {entry_table_offset}, \
                     names {names_section_offset}, file {file_len} bytes)"
                ),
            });
        }

        Ok(Self {
            data,
            dir,
            path,
            entry_table_offset,
            names_section_offset,
            entry_count_hint,
            name_count_hint,
        })
    }

    /// Directory the index lives in; containers are resolved against it.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ── Name table ──────────────────────────────────────────────────────────

    /// Walk the name table: fixed 16-byte records until EOF or a run of
    /// [`MAX_BAD_RUN`] consecutive malformed records.
    pub fn read_names(&self) -> Vec<NameRecord> {
        let hint = self.name_count_hint.clamp(0, MAX_COUNT_HINT) as usize;
        let mut records = Vec::with_capacity(hint);

        let mut pos = self.names_section_offset as usize;
        let mut bad_run = 0u32;

        while pos + NAME_RECORD_SIZE <= self.data.len() && bad_run <= MAX_BAD_RUN {
            let name_offset = read_u64(&self.data, pos);
            let file_number = read_i32(&self.data, pos + 8);
            let child       = read_i32(&self.data, pos + 12);
            pos += NAME_RECORD_SIZE;

            let name = match self.cstr_at(name_offset) {
                Some(s) if !s.is_empty() && file_number >= 0 => s,
                _ => {
                    bad_run += 1;
                    continue;
                }
            };

            bad_run = 0;
            records.push(NameRecord {
                name: name.to_owned(),
                file_number,
                child,
            });
        }

        records
    }

    // ── Entry table ─────────────────────────────────────────────────────────

    pub fn entry_row(&self, entry: u32) -> Result<EntryRow, IndexError> {
        let at = self.entry_table_offset as usize + entry as usize * ENTRY_ROW_SIZE;
        if at + ENTRY_ROW_SIZE > self.data.len() {
            return Err(IndexError::EntryOutOfRange {
                entry,
                reason: format!("row offset {at} past end of index"),
            });
        }
        let block_offset = read_i32(&self.data, at);
        let abs_offset   = read_i32(&self.data, at + 8);
        let abs_size     = read_i32(&self.data, at + 12);

        if abs_offset < 0 || abs_size < 0 {
            return Err(IndexError::EntryOutOfRange {
                entry,
                reason: format!("negative extent (offset {abs_offset}, size {abs_size})"),
            });
        }
        Ok(EntryRow { block_offset, abs_offset, abs_size })
    }

    // ── Block descriptor ────────────────────────────────────────────────────

    /// Resolve the owning container and chunk layout for one entry row.
    pub fn entry_layout(&self, entry: u32, row: &EntryRow) -> Result<EntryLayout, IndexError> {
        let oob = |reason: String| IndexError::EntryOutOfRange { entry, reason };

        if row.block_offset <= 0 {
            return Err(oob(format!("block offset {} is not positive", row.block_offset)));
        }
        let block = row.block_offset as usize;
        if block + 16 + 24 > self.data.len() {
            return Err(oob(format!("block descriptor at {block} past end of index")));
        }

        let spec_ptr          = read_u64(&self.data, block);
        let payload_offset    = read_u64(&self.data, block + 16);
        let container_id      = read_i32(&self.data, block + 24);
        let size_table_offset = read_u64(&self.data, block + 28);
        let extra_count       = read_i32(&self.data, block + 36);

        if extra_count < 0 || extra_count > MAX_EXTRA_CHUNKS {
            return Err(oob(format!("implausible extra chunk count {extra_count}")));
        }

        let container_path = self
            .container_name_at(spec_ptr)
            .ok_or_else(|| oob(format!("unresolvable archive spec at {spec_ptr}")))?;

        // Base chunk: (u64 uncompressed, i32 compressed) at the size table.
        if size_table_offset.saturating_add(12) > self.data.len() as u64 {
            return Err(oob(format!("size table at {size_table_offset} past end of index")));
        }
        let st = size_table_offset as usize;
        let base_unc  = read_u64(&self.data, st);
        let base_comp = read_i32(&self.data, st + 8);
        if base_comp < 0 {
            return Err(oob(format!("negative base compressed size {base_comp}")));
        }

        let mut chunks = Vec::with_capacity(1 + extra_count as usize);
        chunks.push(Chunk {
            container_offset: payload_offset,
            comp_size: base_comp as usize,
            unc_size:  base_unc as usize,
        });
        let mut total_uncompressed = base_unc;

        // Extras follow immediately after the base pair.
        let mut cur = Cursor::new(&self.data[..]);
        cur.set_position((st + 12) as u64);
        for i in 0..extra_count {
            if cur.position() as usize + 12 > self.data.len() {
                return Err(oob(format!("extra chunk {i} past end of index")));
            }
            let unc   = cur.read_i32::<LittleEndian>()?;
            let start = cur.read_i32::<LittleEndian>()?;
            let end   = cur.read_i32::<LittleEndian>()?;
            if unc < 0 || start < 0 || end < start {
                return Err(oob(format!(
                    "extra chunk {i} has bad triple (unc {unc}, start {start}, end {end})"
                )));
            }
            chunks.push(Chunk {
                container_offset: payload_offset + start as u64,
                comp_size: (end - start) as usize,
                unc_size:  unc as usize,
            });
            total_uncompressed += unc as u64;
        }

        Ok(EntryLayout {
            container_path,
            container_id,
            chunks,
            total_uncompressed,
        })
    }

    /// Follow `archive_spec_ptr` → u32 name offset → NUL-terminated string,
    /// append the container extension when missing, and join with the
    /// index's directory.
    fn container_name_at(&self, spec_ptr: u64) -> Option<PathBuf> {
        if spec_ptr == 0 || spec_ptr.saturating_add(4) > self.data.len() as u64 {
            return None;
        }
        let at = spec_ptr as usize;
        let name_off = read_u32(&self.data, at) as u64;
        let raw = self.cstr_at(name_off)?;
        if raw.is_empty() {
            return None;
        }
        let dotted = format!(".{CONTAINER_EXT}");
        let mut name = raw.to_owned();
        if !name.to_ascii_lowercase().ends_with(&dotted) {
            name.push_str(&dotted);
        }
        Some(self.dir.join(name))
    }

    /// NUL-terminated UTF-8 string at `offset`, or `None` when the offset is
    /// zero, out of bounds, or the bytes are not UTF-8.
    fn cstr_at(&self, offset: u64) -> Option<&str> {
        if offset == 0 {
            return None;
        }
        let start = usize::try_from(offset).ok()?;
        if start >= self.data.len() {
            return None;
        }
        let rest = &self.data[start..];
        let end = rest.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&rest[..end]).ok()
    }
}

// ── Little-endian helpers over the in-memory index ───────────────────────────

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(data[at..at + 4].try_into().unwrap())
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(data[at..at + 4].try_into().unwrap())
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(data[at..at + 8].try_into().unwrap())
}
