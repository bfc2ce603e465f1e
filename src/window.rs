//! Chunk assembler — gathers an entry's base and extra chunks into one
//! decompressed window.
//!
//! The window is allocated at `needed = min(total_uncompressed,
//! abs_offset + abs_size)` bytes; decompressing past what the caller will
//! carve out is wasted work.  This module is the sole place that interprets
//! store versus decompress: a chunk whose compressed size equals its
//! uncompressed size is copied verbatim.

use crate::codec::Codec;
use crate::container::{ContainerCache, ContainerError};
use crate::index::{EntryLayout, EntryRow};

/// Assembled decompressed window for one entry.
pub struct Window {
    pub data:     Vec<u8>,
    /// Bytes actually produced by the chunk loop; the tail past `filled`
    /// is zero fill.
    pub filled:   usize,
    /// True when any compressed chunk fell back to codec passthrough.
    pub degraded: bool,
}

impl Window {
    /// Carve the entry payload out of the window.  Returns `None` when the
    /// extent does not fit, which marks the entry malformed.
    pub fn carve(&self, row: &EntryRow) -> Option<&[u8]> {
        let start = row.abs_offset as usize;
        let len = row.abs_size as usize;
        let end = start.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        Some(&self.data[start..end])
    }

    /// The raw bytes produced so far — the passthrough payload when the
    /// codec is degraded.
    pub fn produced(&self) -> &[u8] {
        &self.data[..self.filled]
    }
}

/// Read, decompress, and concatenate every chunk of one entry.  The last
/// part is clipped so the window never overflows `needed`.
pub fn assemble(
    containers: &mut ContainerCache,
    codec:      &dyn Codec,
    layout:     &EntryLayout,
    row:        &EntryRow,
) -> Result<Window, ContainerError> {
    let wanted = row.abs_offset as u64 + row.abs_size as u64;
    let needed = layout.total_uncompressed.min(wanted) as usize;

    let mut data = vec![0u8; needed];
    let mut cursor = 0usize;
    let mut degraded = false;

    for chunk in &layout.chunks {
        if cursor >= needed {
            break;
        }
        let comp = containers.read(&layout.container_path, chunk.container_offset, chunk.comp_size)?;
        let part = if chunk.is_store() {
            comp
        } else {
            let decoded = codec.decompress(&comp, chunk.unc_size);
            degraded |= decoded.is_stored();
            decoded.into_bytes()
        };

        let take = part.len().min(needed - cursor);
        data[cursor..cursor + take].copy_from_slice(&part[..take]);
        cursor += take;
    }

    Ok(Window { data, filled: cursor, degraded })
}
