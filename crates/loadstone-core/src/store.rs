//! A metadata store: one document's worth of plugin and group metadata
//! with regex-expanded lookup.
//!
//! The masterlist and userlist are two independent stores of identical
//! shape. A store owns exact-name entries (keyed case-insensitively) and
//! regex-name entries (kept in document order), and produces owned
//! snapshots so callers never observe internal state.

use crate::error::SortError;
use crate::metadata::{Group, Message, PluginMetadata};
use crate::oracle::{MetadataDocument, MetadataDocumentIo};
use crate::plugin::normalize_filename;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::path::Path;

/// Compiles a regex plugin name: anchored to the whole filename and
/// case-insensitive.
fn compile_name_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
}

/// Validates the filesystem preconditions for writing to `path`: the
/// parent directory must exist (`InvalidArgument` otherwise) and an
/// existing file is only replaced when `overwrite` is set (`FileAccess`
/// otherwise).
pub(crate) fn validate_output_path(path: &Path, overwrite: bool) -> Result<(), SortError> {
    let parent_exists = path
        .parent()
        .map(|dir| dir.as_os_str().is_empty() || dir.exists())
        .unwrap_or(false);
    if !parent_exists {
        return Err(SortError::InvalidArgument(
            "output directory does not exist".to_string(),
        ));
    }
    if path.exists() && !overwrite {
        return Err(SortError::file_access(
            path,
            "output file exists and overwrite is not set",
        ));
    }
    Ok(())
}

/// One collection of metadata: either the masterlist or the userlist.
#[derive(Debug, Default)]
pub struct MetadataStore {
    groups: Vec<Group>,
    /// Exact-name entries, keyed by case-folded filename. A `BTreeMap`
    /// keeps snapshots deterministic.
    plugins: BTreeMap<String, PluginMetadata>,
    /// Regex-name entries in document order.
    regex_plugins: Vec<(Regex, PluginMetadata)>,
    messages: Vec<Message>,
    bash_tags: Vec<String>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Loading and saving
    // -----------------------------------------------------------------------

    /// Replaces the store's contents with the document at `path`. The store
    /// is untouched if reading or validation fails.
    pub fn load(&mut self, path: &Path, io: &dyn MetadataDocumentIo) -> Result<(), SortError> {
        if !path.exists() {
            return Err(SortError::file_access(path, "metadata document not found"));
        }
        let document = io.read(path, None)?;
        let fresh = Self::from_document(document, path)?;
        *self = fresh;
        Ok(())
    }

    /// Like [`MetadataStore::load`], with a prelude document merged in
    /// before interpretation.
    pub fn load_with_prelude(
        &mut self,
        path: &Path,
        prelude_path: &Path,
        io: &dyn MetadataDocumentIo,
    ) -> Result<(), SortError> {
        if !path.exists() {
            return Err(SortError::file_access(path, "metadata document not found"));
        }
        if !prelude_path.exists() {
            return Err(SortError::file_access(prelude_path, "prelude not found"));
        }
        let document = io.read(path, Some(prelude_path))?;
        let fresh = Self::from_document(document, path)?;
        *self = fresh;
        Ok(())
    }

    /// Builds a store from an already-parsed document, validating regex
    /// names. Duplicate exact entries merge, later entries overriding.
    pub fn from_document(document: MetadataDocument, origin: &Path) -> Result<Self, SortError> {
        let mut store = Self {
            groups: document.groups,
            messages: document.messages,
            bash_tags: document.bash_tags,
            ..Self::default()
        };

        for metadata in document.plugins {
            if metadata.is_regex_name() {
                let regex = compile_name_regex(&metadata.name).map_err(|e| {
                    SortError::parse(origin, format!("invalid regex name '{}': {e}", metadata.name))
                })?;
                store.regex_plugins.push((regex, metadata));
            } else {
                let key = normalize_filename(&metadata.name);
                match store.plugins.get_mut(&key) {
                    Some(existing) => existing.merge_from(&metadata),
                    None => {
                        store.plugins.insert(key, metadata);
                    }
                }
            }
        }

        Ok(store)
    }

    /// Serialises the store to `path`. Fails with `InvalidArgument` when
    /// the output directory does not exist, and with `FileAccess` when the
    /// file exists and `overwrite` is false.
    pub fn save(
        &self,
        path: &Path,
        overwrite: bool,
        io: &dyn MetadataDocumentIo,
    ) -> Result<(), SortError> {
        validate_output_path(path, overwrite)?;
        io.write(path, &self.to_document())
    }

    /// The store's contents as a document: regex entries in document order,
    /// then exact entries in name order.
    pub fn to_document(&self) -> MetadataDocument {
        MetadataDocument {
            bash_tags: self.bash_tags.clone(),
            messages: self.messages.clone(),
            groups: self.groups.clone(),
            plugins: self.plugins_snapshot(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Owned snapshot of the group definitions.
    pub fn groups(&self) -> Vec<Group> {
        self.groups.clone()
    }

    /// Owned snapshot of every plugin entry, regex entries first in
    /// document order, then exact entries in name order.
    pub fn plugins(&self) -> Vec<PluginMetadata> {
        self.plugins_snapshot()
    }

    /// Owned snapshot of the general messages.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Owned snapshot of the known Bash Tag names.
    pub fn bash_tags(&self) -> Vec<String> {
        self.bash_tags.clone()
    }

    fn plugins_snapshot(&self) -> Vec<PluginMetadata> {
        let mut out: Vec<PluginMetadata> = self
            .regex_plugins
            .iter()
            .map(|(_, meta)| meta.clone())
            .collect();
        out.extend(self.plugins.values().cloned());
        out
    }

    /// The effective metadata for `name`: the merge, in order, of every
    /// regex entry matching the filename (document order) and then the
    /// exact entry, later entries overriding. `None` when nothing matches.
    pub fn find_plugin(&self, name: &str) -> Option<PluginMetadata> {
        let mut merged = PluginMetadata::new(name);
        let mut found = false;

        for (regex, metadata) in &self.regex_plugins {
            if regex.is_match(name) {
                merged.merge_from(metadata);
                found = true;
            }
        }
        if let Some(exact) = self.plugins.get(&normalize_filename(name)) {
            merged.merge_from(exact);
            found = true;
        }

        found.then_some(merged)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Adds one plugin entry. Fails with `InvalidArgument` if an exact
    /// entry for the name already exists or a regex name does not compile.
    pub fn add_plugin(&mut self, metadata: PluginMetadata) -> Result<(), SortError> {
        if metadata.is_regex_name() {
            let regex = compile_name_regex(&metadata.name).map_err(|e| {
                SortError::InvalidArgument(format!(
                    "invalid regex name '{}': {e}",
                    metadata.name
                ))
            })?;
            self.regex_plugins.push((regex, metadata));
            return Ok(());
        }

        let key = normalize_filename(&metadata.name);
        if self.plugins.contains_key(&key) {
            return Err(SortError::InvalidArgument(format!(
                "metadata for '{}' already exists",
                metadata.name
            )));
        }
        self.plugins.insert(key, metadata);
        Ok(())
    }

    /// Removes the exact entry for `name`, if any. Regex entries are left
    /// alone.
    pub fn erase_plugin(&mut self, name: &str) {
        self.plugins.remove(&normalize_filename(name));
    }

    /// Replaces the group definitions.
    pub fn set_groups(&mut self, groups: Vec<Group>) {
        self.groups = groups;
    }

    /// Empties the store.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FileRef, Tag};

    fn doc_with_plugins(plugins: Vec<PluginMetadata>) -> MetadataDocument {
        MetadataDocument {
            plugins,
            ..MetadataDocument::default()
        }
    }

    fn store_of(plugins: Vec<PluginMetadata>) -> MetadataStore {
        MetadataStore::from_document(doc_with_plugins(plugins), Path::new("test.json")).unwrap()
    }

    // -----------------------------------------------------------------------
    // Exact lookup
    // -----------------------------------------------------------------------
    #[test]
    fn find_plugin_is_case_insensitive() {
        let mut meta = PluginMetadata::new("Some Mod.esp");
        meta.group = Some("late".to_string());
        let store = store_of(vec![meta]);

        let found = store.find_plugin("SOME MOD.ESP").unwrap();
        assert_eq!(found.group.as_deref(), Some("late"));
        assert!(store.find_plugin("missing.esp").is_none());
    }

    // -----------------------------------------------------------------------
    // Regex expansion
    // -----------------------------------------------------------------------
    #[test]
    fn regex_entries_match_whole_filenames() {
        let mut meta = PluginMetadata::new(r"Patch.*\.esp");
        meta.tags = vec![Tag::addition("Relev")];
        let store = store_of(vec![meta]);

        assert!(store.find_plugin("Patch One.esp").is_some());
        assert!(store.find_plugin("patch two.ESP").is_some());
        // Substring matches are not whole-filename matches.
        assert!(store.find_plugin("My Patch One.esp").is_none());
    }

    #[test]
    fn lookup_merges_regex_then_exact_in_order() {
        let mut regex_meta = PluginMetadata::new(r".*\.esp");
        regex_meta.group = Some("from regex".to_string());
        regex_meta.after = vec![FileRef::new("base.esp")];

        let mut exact_meta = PluginMetadata::new("Target.esp");
        exact_meta.group = Some("from exact".to_string());
        exact_meta.after = vec![FileRef::new("extra.esp")];

        let store = store_of(vec![regex_meta, exact_meta]);
        let found = store.find_plugin("Target.esp").unwrap();

        // The exact entry merges last, so its group wins.
        assert_eq!(found.group.as_deref(), Some("from exact"));
        let names: Vec<&str> = found.after.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["base.esp", "extra.esp"]);
        assert_eq!(found.name, "Target.esp");
    }

    #[test]
    fn invalid_regex_fails_the_load() {
        let result = MetadataStore::from_document(
            doc_with_plugins(vec![PluginMetadata::new(r"*broken")]),
            Path::new("bad.json"),
        );
        assert!(matches!(result, Err(SortError::Parse { .. })));
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------
    #[test]
    fn add_plugin_rejects_duplicates() {
        let mut store = MetadataStore::new();
        store.add_plugin(PluginMetadata::new("A.esp")).unwrap();
        let result = store.add_plugin(PluginMetadata::new("a.ESP"));
        assert!(matches!(result, Err(SortError::InvalidArgument(_))));
    }

    #[test]
    fn erase_plugin_removes_exact_entry_only() {
        let mut regex_meta = PluginMetadata::new(r".*\.esp");
        regex_meta.tags = vec![Tag::addition("Relev")];
        let mut store = store_of(vec![regex_meta, PluginMetadata::new("A.esp")]);

        store.erase_plugin("A.ESP");
        // The regex entry still matches.
        let found = store.find_plugin("A.esp").unwrap();
        assert_eq!(found.tags.len(), 1);
        assert_eq!(store.plugins().len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let mut store = store_of(vec![PluginMetadata::new("A.esp")]);
        store.set_groups(vec![Group::new("late")]);
        store.clear();
        assert!(store.plugins().is_empty());
        assert!(store.groups().is_empty());
    }

    #[test]
    fn duplicate_exact_document_entries_merge() {
        let mut first = PluginMetadata::new("A.esp");
        first.after = vec![FileRef::new("B.esp")];
        let mut second = PluginMetadata::new("a.esp");
        second.after = vec![FileRef::new("C.esp")];

        let store = store_of(vec![first, second]);
        let found = store.find_plugin("A.esp").unwrap();
        assert_eq!(found.after.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Save preconditions
    // -----------------------------------------------------------------------
    struct NoopIo;

    impl MetadataDocumentIo for NoopIo {
        fn read(&self, _: &Path, _: Option<&Path>) -> Result<MetadataDocument, SortError> {
            Ok(MetadataDocument::default())
        }
        fn write(&self, _: &Path, _: &MetadataDocument) -> Result<(), SortError> {
            Ok(())
        }
    }

    #[test]
    fn save_requires_existing_directory() {
        let store = MetadataStore::new();
        let result = store.save(
            Path::new("/definitely/not/a/real/dir/userlist.json"),
            true,
            &NoopIo,
        );
        assert!(matches!(result, Err(SortError::InvalidArgument(_))));
    }

    #[test]
    fn load_requires_existing_file() {
        let mut store = MetadataStore::new();
        let result = store.load(Path::new("/definitely/not/a/real/list.json"), &NoopIo);
        assert!(matches!(result, Err(SortError::FileAccess { .. })));
    }
}
