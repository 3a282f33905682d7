//! The public façades: a metadata database over the masterlist/userlist
//! pair, and a game handle combining the database with the plugin and
//! load-order oracles.

use crate::condition::{ConditionEvaluator, ConditionHook};
use crate::error::SortError;
use crate::game::GameContext;
use crate::group_graph::{GroupGraph, GroupPathNode};
use crate::metadata::{Group, Message, PluginMetadata, merge_groups};
use crate::oracle::{LoadOrderIo, MetadataDocument, MetadataDocumentIo, PluginReader};
use crate::plugin::PluginRecord;
use crate::sort;
use crate::store::{MetadataStore, validate_output_path};
use std::path::Path;

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Access to the loaded masterlist and userlist and everything derived
/// from them.
pub struct Database {
    masterlist: MetadataStore,
    userlist: MetadataStore,
    conditions: ConditionHook,
    documents: Box<dyn MetadataDocumentIo>,
}

impl Database {
    pub fn new(
        evaluator: Box<dyn ConditionEvaluator>,
        documents: Box<dyn MetadataDocumentIo>,
    ) -> Self {
        Self {
            masterlist: MetadataStore::new(),
            userlist: MetadataStore::new(),
            conditions: ConditionHook::new(evaluator),
            documents,
        }
    }

    // -----------------------------------------------------------------------
    // Loading and writing
    // -----------------------------------------------------------------------

    /// Replaces the masterlist with the document at `path`.
    pub fn load_masterlist(&mut self, path: &Path) -> Result<(), SortError> {
        self.masterlist.load(path, self.documents.as_ref())
    }

    /// Replaces the masterlist, merging a prelude document in first.
    pub fn load_masterlist_with_prelude(
        &mut self,
        path: &Path,
        prelude_path: &Path,
    ) -> Result<(), SortError> {
        self.masterlist
            .load_with_prelude(path, prelude_path, self.documents.as_ref())
    }

    /// Replaces the userlist with the document at `path`.
    pub fn load_userlist(&mut self, path: &Path) -> Result<(), SortError> {
        self.userlist.load(path, self.documents.as_ref())
    }

    /// Writes the userlist to `path`.
    pub fn write_user_metadata(&self, path: &Path, overwrite: bool) -> Result<(), SortError> {
        self.userlist
            .save(path, overwrite, self.documents.as_ref())
    }

    /// Writes a minimal masterlist holding only tag suggestions and dirty
    /// info, for the downstream merging tool.
    pub fn write_minimal_list(&self, path: &Path, overwrite: bool) -> Result<(), SortError> {
        validate_output_path(path, overwrite)?;

        let mut plugins = Vec::new();
        for metadata in self.masterlist.plugins() {
            let mut minimal = PluginMetadata::new(metadata.name.clone());
            minimal.tags = metadata.tags.clone();
            minimal.dirty = metadata.dirty.clone();
            if !minimal.is_name_only() {
                plugins.push(minimal);
            }
        }

        let document = MetadataDocument {
            plugins,
            ..MetadataDocument::default()
        };
        self.documents.write(path, &document)
    }

    // -----------------------------------------------------------------------
    // Conditions
    // -----------------------------------------------------------------------

    /// Evaluates one condition string through the cached hook.
    pub fn evaluate(&self, condition: &str) -> Result<bool, SortError> {
        self.conditions.evaluate(condition)
    }

    pub fn conditions(&self) -> &ConditionHook {
        &self.conditions
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn masterlist(&self) -> &MetadataStore {
        &self.masterlist
    }

    pub fn userlist(&self) -> &MetadataStore {
        &self.userlist
    }

    /// Masterlist tag names followed by userlist tag names.
    pub fn get_known_bash_tags(&self) -> Vec<String> {
        let mut tags = self.masterlist.bash_tags();
        tags.extend(self.userlist.bash_tags());
        tags
    }

    /// Masterlist general messages followed by userlist general messages.
    /// With `evaluate_conditions` the cache is cleared first and messages
    /// whose condition fails are dropped.
    pub fn get_general_messages(
        &self,
        evaluate_conditions: bool,
    ) -> Result<Vec<Message>, SortError> {
        let mut messages = self.masterlist.messages();
        messages.extend(self.userlist.messages());

        if evaluate_conditions {
            self.conditions.clear_cache();
            let mut kept = Vec::with_capacity(messages.len());
            for message in messages {
                if self.conditions.evaluate_opt(message.condition.as_deref())? {
                    kept.push(message);
                }
            }
            messages = kept;
        }

        Ok(messages)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Group definitions, with userlist groups merged in when asked for.
    /// The `default` group is always present.
    pub fn get_groups(&self, include_user: bool) -> Vec<Group> {
        if include_user {
            merge_groups(&self.masterlist.groups(), &self.userlist.groups())
        } else {
            merge_groups(&self.masterlist.groups(), &[])
        }
    }

    pub fn get_user_groups(&self) -> Vec<Group> {
        self.userlist.groups()
    }

    pub fn set_user_groups(&mut self, groups: Vec<Group>) {
        self.userlist.set_groups(groups);
    }

    /// The shortest path between two groups in the combined group graph,
    /// with each edge labelled by its source document.
    pub fn get_groups_path(
        &self,
        from_group: &str,
        to_group: &str,
    ) -> Result<Vec<GroupPathNode>, SortError> {
        let graph = GroupGraph::build(&self.masterlist.groups(), &self.userlist.groups())?;
        graph.shortest_path(from_group, to_group)
    }

    // -----------------------------------------------------------------------
    // Plugin metadata
    // -----------------------------------------------------------------------

    /// The effective metadata for one plugin: regex-expanded masterlist
    /// metadata, optionally overridden by userlist metadata, optionally
    /// filtered through the condition evaluator.
    pub fn get_plugin_metadata(
        &self,
        plugin_name: &str,
        include_user: bool,
        evaluate_conditions: bool,
    ) -> Result<Option<PluginMetadata>, SortError> {
        let mut metadata = self.masterlist.find_plugin(plugin_name);

        if include_user
            && let Some(user) = self.userlist.find_plugin(plugin_name)
        {
            metadata = Some(match metadata {
                Some(mut merged) => {
                    merged.merge_from(&user);
                    merged
                }
                None => user,
            });
        }

        match (evaluate_conditions, metadata) {
            (true, Some(metadata)) => Ok(Some(self.conditions.evaluate_all(&metadata)?)),
            (_, metadata) => Ok(metadata),
        }
    }

    /// Userlist-only metadata for one plugin.
    pub fn get_plugin_user_metadata(
        &self,
        plugin_name: &str,
        evaluate_conditions: bool,
    ) -> Result<Option<PluginMetadata>, SortError> {
        match (evaluate_conditions, self.userlist.find_plugin(plugin_name)) {
            (true, Some(metadata)) => Ok(Some(self.conditions.evaluate_all(&metadata)?)),
            (_, metadata) => Ok(metadata),
        }
    }

    /// Replaces the userlist entry for the plugin the metadata names.
    pub fn set_plugin_user_metadata(
        &mut self,
        metadata: PluginMetadata,
    ) -> Result<(), SortError> {
        self.userlist.erase_plugin(&metadata.name);
        self.userlist.add_plugin(metadata)
    }

    pub fn discard_plugin_user_metadata(&mut self, plugin_name: &str) {
        self.userlist.erase_plugin(plugin_name);
    }

    pub fn discard_all_user_metadata(&mut self) {
        self.userlist.clear();
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A game installation plus its database and oracles. Owns the installed
/// plugin snapshot the sort operates on.
pub struct Game {
    context: GameContext,
    database: Database,
    plugins: Vec<PluginRecord>,
    plugin_reader: Box<dyn PluginReader>,
    load_order: Box<dyn LoadOrderIo>,
}

impl Game {
    pub fn new(
        context: GameContext,
        evaluator: Box<dyn ConditionEvaluator>,
        documents: Box<dyn MetadataDocumentIo>,
        plugin_reader: Box<dyn PluginReader>,
        load_order: Box<dyn LoadOrderIo>,
    ) -> Self {
        Self {
            context,
            database: Database::new(evaluator, documents),
            plugins: Vec::new(),
            plugin_reader,
            load_order,
        }
    }

    pub fn context(&self) -> &GameContext {
        &self.context
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    /// Re-reads the installed plugins in their on-disk order through the
    /// plugin oracle. With `headers_only` the oracle may skip record and
    /// asset data.
    pub fn load_plugins(&mut self, headers_only: bool) -> Result<(), SortError> {
        let order = self.load_order.read_order()?;
        let mut plugins = Vec::with_capacity(order.len());
        for name in &order {
            let path = self.context.plugin_path(name);
            plugins.push(self.plugin_reader.read(&path, headers_only)?);
        }
        self.plugins = plugins;
        Ok(())
    }

    pub fn plugins(&self) -> &[PluginRecord] {
        &self.plugins
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginRecord> {
        self.plugins.iter().find(|p| p.matches_name(name))
    }

    /// Sorts the named plugins, taken in the given order. Every name must
    /// refer to a loaded plugin.
    pub fn sort_plugins(&self, plugin_names: &[String]) -> Result<Vec<String>, SortError> {
        let mut records = Vec::with_capacity(plugin_names.len());
        for name in plugin_names {
            let record = self.plugin(name).cloned().ok_or_else(|| {
                SortError::InvalidArgument(format!("plugin '{name}' is not loaded"))
            })?;
            records.push(record);
        }

        sort::sort_plugins(
            &records,
            &self.database.masterlist,
            &self.database.userlist,
            &self.database.conditions,
            &self.context.game_type.hardcoded_plugins(),
        )
    }

    /// Persists a load order through the load-order oracle.
    pub fn save_load_order(&mut self, order: &[String]) -> Result<(), SortError> {
        self.load_order.write_order(order)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
