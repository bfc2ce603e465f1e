//! Synthetic archive fixtures — builds `.b2index` + `.b2container` pairs
//! byte-by-byte so tests never depend on real game data or a real codec.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use b2extract::codec::{Codec, Decoded};

/// Package file magic used by the header-recovery golden vectors.
pub const PACKAGE_TAG: u32 = 0x9E2A_83C1;

// ── Stub codec ───────────────────────────────────────────────────────────────

/// Deterministic decompression-free stand-in: byte `i` of the output is
/// `comp[i % comp.len()]`.  Tests replicate this to predict window bytes.
pub struct StubCodec;

impl Codec for StubCodec {
    fn decompress(&self, comp: &[u8], unc_len: usize) -> Decoded {
        let mut out = vec![0u8; unc_len];
        if !comp.is_empty() {
            for (i, b) in out.iter_mut().enumerate() {
                *b = comp[i % comp.len()];
            }
        }
        Decoded::Plain(out)
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "stub".into()
    }
}

/// What [`StubCodec`] produces for `comp` expanded to `unc_len`.
pub fn stub_expand(comp: &[u8], unc_len: usize) -> Vec<u8> {
    StubCodec.decompress(comp, unc_len).into_bytes()
}

// ── Archive builder ──────────────────────────────────────────────────────────

struct EntrySpec {
    name:       String,
    /// (in-container offset, compressed length, uncompressed length)
    chunks:     Vec<(u64, usize, usize)>,
    abs_offset: i32,
    abs_size:   i32,
}

pub struct ArchiveBuilder {
    container:      Vec<u8>,
    entries:        Vec<EntrySpec>,
    dirs:           Vec<String>,
    /// Container name as written into the index.  The default omits the
    /// extension so every test also exercises the append rule.
    container_ref:  String,
    container_file: String,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            container:      Vec::new(),
            entries:        Vec::new(),
            dirs:           Vec::new(),
            container_ref:  "payload".into(),
            container_file: "payload.b2container".into(),
        }
    }

    /// Store the full container file name in the index instead of the bare
    /// stem.
    pub fn full_container_ref(mut self) -> Self {
        self.container_ref = self.container_file.clone();
        self
    }

    /// Add one entry.  Each chunk is `(compressed bytes, uncompressed
    /// length)`; compressed bytes are appended to the container in order.
    pub fn entry(
        mut self,
        name: &str,
        chunks: &[(&[u8], usize)],
        abs_offset: i32,
        abs_size: i32,
    ) -> Self {
        let mut spec_chunks = Vec::with_capacity(chunks.len());
        for (comp, unc) in chunks {
            let offset = self.container.len() as u64;
            self.container.extend_from_slice(comp);
            spec_chunks.push((offset, comp.len(), *unc));
        }
        self.entries.push(EntrySpec {
            name: name.to_owned(),
            chunks: spec_chunks,
            abs_offset,
            abs_size,
        });
        self
    }

    /// Convenience: one store-mode chunk holding exactly `data`.
    pub fn stored_entry(self, name: &str, data: &[u8]) -> Self {
        let len = data.len() as i32;
        self.entry(name, &[(data, data.len())], 0, len)
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.dirs.push(name.to_owned());
        self
    }

    /// Write both files into `dir` and return the index path.
    pub fn write(self, dir: &Path) -> PathBuf {
        let mut idx = vec![0u8; 100];

        // Container name string and the archive spec pointing at it.
        let cont_name_off = idx.len() as u32;
        idx.extend_from_slice(self.container_ref.as_bytes());
        idx.push(0);
        let spec_off = idx.len() as u64;
        idx.extend_from_slice(&cont_name_off.to_le_bytes());

        // Per entry: size table, then block descriptor.
        let mut block_offs = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            let (payload_offset, base_comp, base_unc) = e.chunks[0];

            let size_table_off = idx.len() as u64;
            idx.extend_from_slice(&(base_unc as u64).to_le_bytes());
            idx.extend_from_slice(&(base_comp as i32).to_le_bytes());
            for (off, comp, unc) in &e.chunks[1..] {
                let start = (*off - payload_offset) as i32;
                idx.extend_from_slice(&(*unc as i32).to_le_bytes());
                idx.extend_from_slice(&start.to_le_bytes());
                idx.extend_from_slice(&(start + *comp as i32).to_le_bytes());
            }

            let block_off = idx.len() as i32;
            idx.extend_from_slice(&spec_off.to_le_bytes());
            idx.extend_from_slice(&[0u8; 8]);
            idx.extend_from_slice(&payload_offset.to_le_bytes());
            idx.extend_from_slice(&0i32.to_le_bytes()); // container_id
            idx.extend_from_slice(&size_table_off.to_le_bytes());
            idx.extend_from_slice(&((e.chunks.len() - 1) as i32).to_le_bytes());
            block_offs.push(block_off);
        }

        // Entry table, indexed by file number.
        let entry_table_off = idx.len() as u32;
        for (i, e) in self.entries.iter().enumerate() {
            idx.extend_from_slice(&block_offs[i].to_le_bytes());
            idx.extend_from_slice(&0i32.to_le_bytes());
            idx.extend_from_slice(&e.abs_offset.to_le_bytes());
            idx.extend_from_slice(&e.abs_size.to_le_bytes());
        }

        // Name strings.
        let mut name_offs = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            name_offs.push(idx.len() as u64);
            idx.extend_from_slice(e.name.as_bytes());
            idx.push(0);
        }
        let mut dir_offs = Vec::with_capacity(self.dirs.len());
        for d in &self.dirs {
            dir_offs.push(idx.len() as u64);
            idx.extend_from_slice(d.as_bytes());
            idx.push(0);
        }

        // Name table: files first, then directory records.
        let names_off = idx.len() as u32;
        for (i, off) in name_offs.iter().enumerate() {
            idx.extend_from_slice(&off.to_le_bytes());
            idx.extend_from_slice(&(i as i32).to_le_bytes());
            idx.extend_from_slice(&0i32.to_le_bytes());
        }
        for off in &dir_offs {
            idx.extend_from_slice(&off.to_le_bytes());
            idx.extend_from_slice(&0i32.to_le_bytes());
            idx.extend_from_slice(&1i32.to_le_bytes()); // child > 0
        }

        // Header fields.
        idx[68..72].copy_from_slice(&entry_table_off.to_le_bytes());
        idx[72..76].copy_from_slice(&(self.entries.len() as i32).to_le_bytes());
        idx[92..96].copy_from_slice(&names_off.to_le_bytes());
        idx[96..100]
            .copy_from_slice(&((self.entries.len() + self.dirs.len()) as i32).to_le_bytes());

        let index_path = dir.join("test.b2index");
        std::fs::write(&index_path, &idx).unwrap();
        std::fs::write(dir.join(&self.container_file), &self.container).unwrap();
        index_path
    }
}

// ── Asset-header golden vectors ──────────────────────────────────────────────

/// Minimal package header: tag, legacy version -4, file versions (400, 0),
/// total header size, folder name, flags, name count/offset, then the name
/// table.  Enough for the header strategy, nothing more.
pub fn asset_payload(folder_name: &str, names: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&PACKAGE_TAG.to_le_bytes());
    buf.extend_from_slice(&(-4i32).to_le_bytes()); // legacy, no engine int
    buf.extend_from_slice(&400i32.to_le_bytes());  // file version
    buf.extend_from_slice(&0i32.to_le_bytes());    // licensee version
    buf.extend_from_slice(&0i32.to_le_bytes());    // total header size
    push_string(&mut buf, folder_name);
    buf.extend_from_slice(&0u32.to_le_bytes());    // package flags

    buf.extend_from_slice(&(names.len() as i32).to_le_bytes());
    let offset_at = buf.len();
    buf.extend_from_slice(&0i32.to_le_bytes()); // name table offset, patched

    // Export/import pairs would follow; recovery never reads them.
    let table_off = buf.len() as i32;
    buf[offset_at..offset_at + 4].copy_from_slice(&table_off.to_le_bytes());
    for name in names {
        push_string(&mut buf, name);
        buf.extend_from_slice(&[0u8; 4]); // auxiliary data
    }
    buf
}

/// UTF-8 length-prefixed string with the trailing NUL counted, as the
/// engine serializes them.
pub fn push_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&((s.len() + 1) as i32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}
