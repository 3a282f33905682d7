//! Metadata document I/O for the load-order sorter.
//!
//! Implements the core's document-oracle trait over the structured text
//! formats: format detection by extension (RON, TOML, JSON), prelude
//! merging, and symmetric serialisation so documents round-trip.

mod codec;

pub use codec::{DocumentCodec, DocumentError, Format, detect_format, merge_prelude};
