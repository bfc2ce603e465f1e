//! Container reader — cached random-access handles over `.b2container` files.
//!
//! Handles are opened on first use and kept for the lifetime of one
//! extraction run; the driver drops the cache on every exit path.  Caching is
//! strictly additive (no mid-run eviction), which bounds memory by the number
//! of distinct containers an index references.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Read buffer per open container.
const READ_BUF_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("container does not exist: {0}")]
    Missing(PathBuf),
    #[error("read of {len} bytes at {offset} falls outside container {path} ({size} bytes)")]
    OutOfRange { path: PathBuf, offset: u64, len: usize, size: u64 },
    #[error("container I/O on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

struct OpenContainer {
    reader: BufReader<File>,
    size:   u64,
}

/// Keyed map from absolute container path to an open read handle.
#[derive(Default)]
pub struct ContainerCache {
    open: HashMap<PathBuf, OpenContainer>,
}

impl ContainerCache {
    pub fn new() -> Self {
        Self { open: HashMap::new() }
    }

    /// Number of distinct containers opened so far.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Seek to `offset` and read exactly `len` bytes from the container at
    /// `path`, opening and caching the handle on first use.
    pub fn read(&mut self, path: &Path, offset: u64, len: usize) -> Result<Vec<u8>, ContainerError> {
        if !self.open.contains_key(path) {
            if !path.is_file() {
                return Err(ContainerError::Missing(path.to_path_buf()));
            }
            let file = File::open(path)
                .map_err(|e| ContainerError::Io { path: path.to_path_buf(), source: e })?;
            let size = file
                .metadata()
                .map_err(|e| ContainerError::Io { path: path.to_path_buf(), source: e })?
                .len();
            let reader = BufReader::with_capacity(READ_BUF_SIZE, file);
            self.open.insert(path.to_path_buf(), OpenContainer { reader, size });
        }

        let entry = self.open.get_mut(path).expect("inserted above");
        match offset.checked_add(len as u64) {
            Some(end) if end <= entry.size => {}
            _ => {
                return Err(ContainerError::OutOfRange {
                    path: path.to_path_buf(),
                    offset,
                    len,
                    size: entry.size,
                })
            }
        }

        entry
            .reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| ContainerError::Io { path: path.to_path_buf(), source: e })?;
        let mut buf = vec![0u8; len];
        entry
            .reader
            .read_exact(&mut buf)
            .map_err(|e| ContainerError::Io { path: path.to_path_buf(), source: e })?;
        Ok(buf)
    }

    /// Drop every cached handle.  Called by the driver when a run ends.
    pub fn close_all(&mut self) {
        self.open.clear();
    }
}
