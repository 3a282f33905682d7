//! Collaborator interfaces consumed by the core.
//!
//! The core never parses plugin binaries or metadata documents and never
//! touches the on-disk load order itself; callers supply implementations of
//! these traits. `loadstone-data` provides a document codec for the
//! structured text formats.

use crate::error::SortError;
use crate::metadata::{Group, Message, PluginMetadata};
use crate::plugin::PluginRecord;
use std::path::Path;

/// A parsed metadata document: the shape both the masterlist and the
/// userlist share.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetadataDocument {
    /// Known Bash Tag names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bash_tags: Vec<String>,
    /// General messages not attached to any plugin.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// Group definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    /// Per-plugin metadata entries, literal and regex names alike, in
    /// document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginMetadata>,
}

/// Reads and writes metadata documents.
pub trait MetadataDocumentIo {
    /// Parses the document at `path`, optionally merging a prelude document
    /// in first. Malformed input surfaces as [`SortError::Parse`].
    fn read(&self, path: &Path, prelude: Option<&Path>) -> Result<MetadataDocument, SortError>;

    /// Serialises `document` to `path`, replacing any existing file. The
    /// caller has already validated overwrite preconditions.
    fn write(&self, path: &Path, document: &MetadataDocument) -> Result<(), SortError>;
}

/// Parses plugin files into their runtime view.
pub trait PluginReader {
    /// Reads the plugin at `path`. With `headers_only`, record and asset
    /// identifiers may be left empty; flags and masters must still be
    /// accurate.
    fn read(&self, path: &Path, headers_only: bool) -> Result<PluginRecord, SortError>;
}

/// Reads and writes the on-disk installed-plugin order.
pub trait LoadOrderIo {
    fn read_order(&self) -> Result<Vec<String>, SortError>;
    fn write_order(&self, order: &[String]) -> Result<(), SortError>;
}
