//! # b2extract — .b2index / .b2container archive extractor
//!
//! Extraction guarantees:
//! - All on-disk numeric fields are little-endian; never negotiated
//! - The index header is trusted only for its two table offsets; the
//!   advisory counts are capacity hints, the name walk stops on a bad-run
//!   heuristic instead
//! - Every per-entry fault is isolated: one bad entry never aborts a run
//! - A missing or failing Oodle library degrades to passthrough of the
//!   compressed bytes; it never aborts or fabricates data
//! - No two writes in one run resolve to the same output path; collisions
//!   get `_1`, `_2`, … suffixes before the extension
//! - Every emitted path is a sanitized descendant of the output root
//! - Container handles are cached per run and released on every exit path
//! - Recovered paths are heuristic; when both strategies miss, the entry
//!   falls back to its logical name under `misc/`

pub mod codec;
pub mod container;
pub mod error;
pub mod extract;
pub mod index;
pub mod outputs;
pub mod reconcile;
pub mod recover;
pub mod route;
pub mod window;

// Flat re-exports for the most common types.
pub use codec::{Codec, CodecError, Decoded, Oodle};
pub use container::{ContainerCache, ContainerError};
pub use error::ExtractError;
pub use extract::{ExtractOptions, ExtractReport, Extractor, LogLevel, Severity};
pub use index::{Chunk, EntryLayout, EntryRow, IndexError, IndexFile, NameRecord,
                CONTAINER_EXT, INDEX_EXT};
pub use outputs::OutputIndex;
pub use recover::{AssetClass, RecoveredPath};
pub use route::{RouteDecision, Router};
pub use window::Window;
