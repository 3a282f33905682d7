//! Metadata value types shared by the masterlist and userlist, and the
//! merge algebra that combines them.
//!
//! Every merge is ordered: `merge_from(newer)` lets the newer entry
//! override scalars and append to collections. The userlist is always the
//! newer side, so user metadata wins without the merge ever needing to be
//! commutative. Collection union is an order-preserving
//! append-without-duplicates, never a hash-set union, so merged output is
//! deterministic.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Item types
// ---------------------------------------------------------------------------

/// Severity of a metadata message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Say,
    Warn,
    Error,
}

/// A message attached to a plugin or to a whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Message {
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Say,
            text: text.into(),
            condition: None,
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Warn,
            text: text.into(),
            condition: None,
        }
    }
}

/// A reference to another plugin file, used by load-after, requirement, and
/// incompatibility lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Filename of the referenced plugin.
    pub name: String,
    /// Display name to use in messages instead of the filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl FileRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display: None,
            condition: None,
        }
    }
}

/// A Bash Tag suggestion: either an addition or a removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_addition: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Tag {
    pub fn addition(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_addition: true,
            condition: None,
        }
    }

    pub fn removal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_addition: false,
            condition: None,
        }
    }
}

/// Dirty or clean plugin information for one specific file revision,
/// identified by CRC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningData {
    pub crc: u32,
    /// Name of the cleaning utility the data was produced with.
    pub utility: String,
    #[serde(default)]
    pub itm_count: u32,
    #[serde(default)]
    pub deleted_reference_count: u32,
    #[serde(default)]
    pub deleted_navmesh_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl CleaningData {
    pub fn new(crc: u32, utility: impl Into<String>) -> Self {
        Self {
            crc,
            utility: utility.into(),
            itm_count: 0,
            deleted_reference_count: 0,
            deleted_navmesh_count: 0,
            detail: None,
            condition: None,
        }
    }
}

/// A location the plugin can be obtained from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// A named cohort of plugins with declarative "loads after group X"
/// ordering. The `default` group always exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
}

impl Group {
    /// Name of the group every plugin belongs to unless told otherwise.
    pub const DEFAULT_NAME: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            after: Vec::new(),
        }
    }

    pub fn with_after(name: impl Into<String>, after: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            after: after.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for Group {
    fn default() -> Self {
        Group::new(Group::DEFAULT_NAME)
    }
}

/// Merges the userlist's groups into the masterlist's, matched by name.
///
/// The user description replaces the masterlist description only when
/// non-empty; after-group lists are concatenated masterlist-first,
/// preserving order and duplicates (the group graph deduplicates edges).
/// Unmatched user groups are appended after all masterlist groups, and the
/// `default` group is materialised if neither side declares it.
pub fn merge_groups(masterlist_groups: &[Group], user_groups: &[Group]) -> Vec<Group> {
    let mut merged = masterlist_groups.to_vec();

    let mut new_groups = Vec::new();
    for user_group in user_groups {
        match merged.iter_mut().find(|g| g.name == user_group.name) {
            None => new_groups.push(user_group.clone()),
            Some(existing) => {
                if !user_group.description.is_empty() {
                    existing.description = user_group.description.clone();
                }
                existing.after.extend(user_group.after.iter().cloned());
            }
        }
    }
    merged.extend(new_groups);

    if !merged.iter().any(|g| g.name == Group::DEFAULT_NAME) {
        merged.insert(0, Group::default());
    }

    merged
}

// ---------------------------------------------------------------------------
// Plugin metadata
// ---------------------------------------------------------------------------

/// Metadata for one plugin, or for every plugin matching a regex name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// A literal filename or, if it contains one of `: \ * ? |`, a regular
    /// expression matched case-insensitively against whole filenames.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incompatibilities: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dirty: Vec<CleaningData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clean: Vec<CleaningData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether the name is to be interpreted as a regular expression.
    pub fn is_regex_name(&self) -> bool {
        self.name
            .chars()
            .any(|c| matches!(c, ':' | '\\' | '*' | '?' | '|'))
    }

    /// Case-insensitive comparison of a literal (non-regex) name.
    pub fn name_matches(&self, filename: &str) -> bool {
        self.name.to_lowercase() == filename.to_lowercase()
    }

    /// Whether the entry carries nothing beyond its name.
    pub fn is_name_only(&self) -> bool {
        self.group.is_none()
            && self.after.is_empty()
            && self.requirements.is_empty()
            && self.incompatibilities.is_empty()
            && self.messages.is_empty()
            && self.tags.is_empty()
            && self.dirty.is_empty()
            && self.clean.is_empty()
            && self.locations.is_empty()
    }

    /// Merges `newer` into `self`, with `newer` overriding.
    ///
    /// The newer group wins when set; load-after, requirements,
    /// incompatibilities, tags, and locations are set-unioned; messages are
    /// concatenated self-then-newer; dirty and clean info are set-unioned
    /// keyed by CRC, first entry winning.
    pub fn merge_from(&mut self, newer: &PluginMetadata) {
        if newer.group.is_some() {
            self.group = newer.group.clone();
        }
        merge_dedup(&mut self.after, &newer.after);
        merge_dedup(&mut self.requirements, &newer.requirements);
        merge_dedup(&mut self.incompatibilities, &newer.incompatibilities);
        merge_dedup(&mut self.tags, &newer.tags);
        merge_dedup(&mut self.locations, &newer.locations);
        self.messages.extend(newer.messages.iter().cloned());
        merge_cleaning(&mut self.dirty, &newer.dirty);
        merge_cleaning(&mut self.clean, &newer.clean);
    }
}

// ---------------------------------------------------------------------------
// Union helpers
// ---------------------------------------------------------------------------

/// Appends elements of `second` to `first`, skipping any already present in
/// `first`. Although this is O(U * M), both inputs are expected to be small
/// (tens of elements is unusually large).
pub(crate) fn merge_dedup<T: PartialEq + Clone>(first: &mut Vec<T>, second: &[T]) {
    let initial_len = first.len();
    for element in second {
        if !first[..initial_len].contains(element) {
            first.push(element.clone());
        }
    }
}

/// Like [`merge_dedup`], but keyed by CRC: an incoming entry is dropped when
/// an entry for the same file revision already exists.
fn merge_cleaning(first: &mut Vec<CleaningData>, second: &[CleaningData]) {
    let initial_len = first.len();
    for entry in second {
        if !first[..initial_len].iter().any(|e| e.crc == entry.crc) {
            first.push(entry.clone());
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
