//! The document codec: reads and writes metadata documents in RON, TOML,
//! or JSON, detected from the file extension.

use loadstone_core::error::SortError;
use loadstone_core::oracle::{MetadataDocument, MetadataDocumentIo};
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while reading or writing documents.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A serialization error occurred.
    #[error("cannot serialise to {file}: {detail}")]
    Serialize { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error("cannot access {file}: {source}")]
    Io {
        file: PathBuf,
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Maps this error onto the core's closed error set.
    fn into_sort_error(self) -> SortError {
        match self {
            DocumentError::UnsupportedFormat { file } => {
                SortError::parse(file, "unsupported document format")
            }
            DocumentError::Parse { file, detail } => SortError::parse(file, detail),
            DocumentError::Serialize { file, detail } => SortError::parse(file, detail),
            DocumentError::Io { file, source } => SortError::file_access(file, source.to_string()),
        }
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DocumentError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DocumentError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Prelude merging
// ===========================================================================

/// Merges a prelude document under the main one: prelude entries come
/// first, and the main document wins on group-name collisions.
pub fn merge_prelude(prelude: MetadataDocument, main: MetadataDocument) -> MetadataDocument {
    let mut groups = prelude.groups;
    for group in main.groups {
        match groups.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => *existing = group,
            None => groups.push(group),
        }
    }

    let mut bash_tags = prelude.bash_tags;
    for tag in main.bash_tags {
        if !bash_tags.contains(&tag) {
            bash_tags.push(tag);
        }
    }

    let mut messages = prelude.messages;
    messages.extend(main.messages);

    let mut plugins = prelude.plugins;
    plugins.extend(main.plugins);

    MetadataDocument {
        bash_tags,
        messages,
        groups,
        plugins,
    }
}

// ===========================================================================
// Codec
// ===========================================================================

/// Reads and writes metadata documents in the structured text formats.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentCodec;

impl DocumentCodec {
    pub fn new() -> Self {
        Self
    }

    /// Reads and deserialises one document according to its extension.
    pub fn read_document(&self, path: &Path) -> Result<MetadataDocument, DocumentError> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            file: path.to_path_buf(),
            source,
        })?;

        let parse_error = |detail: String| DocumentError::Parse {
            file: path.to_path_buf(),
            detail,
        };
        match format {
            Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
            Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Serialises one document according to the target extension.
    pub fn write_document(
        &self,
        path: &Path,
        document: &MetadataDocument,
    ) -> Result<(), DocumentError> {
        let format = detect_format(path)?;

        let serialize_error = |detail: String| DocumentError::Serialize {
            file: path.to_path_buf(),
            detail,
        };
        let content = match format {
            Format::Ron => ron::ser::to_string_pretty(document, ron::ser::PrettyConfig::new())
                .map_err(|e| serialize_error(e.to_string()))?,
            Format::Toml => {
                toml::to_string_pretty(document).map_err(|e| serialize_error(e.to_string()))?
            }
            Format::Json => serde_json::to_string_pretty(document)
                .map_err(|e| serialize_error(e.to_string()))?,
        };

        std::fs::write(path, content).map_err(|source| DocumentError::Io {
            file: path.to_path_buf(),
            source,
        })
    }
}

impl MetadataDocumentIo for DocumentCodec {
    fn read(&self, path: &Path, prelude: Option<&Path>) -> Result<MetadataDocument, SortError> {
        let document = self
            .read_document(path)
            .map_err(DocumentError::into_sort_error)?;

        match prelude {
            Some(prelude_path) => {
                let prelude_document = self
                    .read_document(prelude_path)
                    .map_err(DocumentError::into_sort_error)?;
                Ok(merge_prelude(prelude_document, document))
            }
            None => Ok(document),
        }
    }

    fn write(&self, path: &Path, document: &MetadataDocument) -> Result<(), SortError> {
        self.write_document(path, document)
            .map_err(DocumentError::into_sort_error)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
