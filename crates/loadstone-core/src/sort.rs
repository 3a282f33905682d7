//! The sort driver: one sort call from installed plugins to a total order.
//!
//! The pipeline is fixed: clear the condition cache, snapshot the caller's
//! plugin order, resolve and filter each plugin's effective metadata, build
//! the group graph, build the plugin graph tier by tier, then linearise.
//! The caller's installed order is never mutated; failures surface as
//! typed errors before anything is written anywhere.

use crate::condition::ConditionHook;
use crate::error::SortError;
use crate::group_graph::GroupGraph;
use crate::metadata::{Group, PluginMetadata};
use crate::plugin::PluginRecord;
use crate::plugin_graph::{PluginGraph, SortingPlugin};
use crate::store::MetadataStore;

/// Computes the load order for `records`, which are taken in the caller's
/// current order (the order the final tie-break preserves).
pub fn sort_plugins(
    records: &[PluginRecord],
    masterlist: &MetadataStore,
    userlist: &MetadataStore,
    conditions: &ConditionHook,
    hardcoded: &[String],
) -> Result<Vec<String>, SortError> {
    conditions.clear_cache();

    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut plugins = Vec::with_capacity(records.len());
    for record in records {
        plugins.push(prepare_plugin(record, masterlist, userlist, conditions)?);
    }

    let group_graph = GroupGraph::build(&masterlist.groups(), &userlist.groups())?;

    let mut graph = PluginGraph::new(plugins)?;

    graph.add_hardcoded_edges(hardcoded);
    graph.check_for_cycles()?;

    graph.add_master_flag_edges();
    graph.check_for_cycles()?;

    graph.add_master_edges();
    graph.check_for_cycles()?;

    graph.add_masterlist_metadata_edges();
    graph.add_user_metadata_edges();
    graph.check_for_cycles()?;

    graph.add_group_edges(&group_graph)?;
    graph.check_for_cycles()?;

    graph.add_overlap_edges();
    graph.check_for_cycles()?;

    graph.add_tie_break_edges();

    log::debug!(
        "sorting {} plugins over {} edges",
        graph.len(),
        graph.edge_count()
    );
    graph.topological_sort()
}

/// Resolves one plugin's effective metadata from both stores, filters it
/// through the condition hook, and settles its group (userlist wins, then
/// masterlist, then the plugin's own declaration, then `default`).
fn prepare_plugin(
    record: &PluginRecord,
    masterlist: &MetadataStore,
    userlist: &MetadataStore,
    conditions: &ConditionHook,
) -> Result<SortingPlugin, SortError> {
    let masterlist_meta = match masterlist.find_plugin(&record.name) {
        Some(meta) => conditions.evaluate_all(&meta)?,
        None => PluginMetadata::new(record.name.clone()),
    };
    let userlist_meta = match userlist.find_plugin(&record.name) {
        Some(meta) => conditions.evaluate_all(&meta)?,
        None => PluginMetadata::new(record.name.clone()),
    };

    let group = userlist_meta
        .group
        .clone()
        .or_else(|| masterlist_meta.group.clone())
        .or_else(|| record.group.clone())
        .unwrap_or_else(|| Group::DEFAULT_NAME.to_string());

    Ok(SortingPlugin {
        record: record.clone(),
        masterlist: masterlist_meta,
        userlist: userlist_meta,
        group,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::AcceptAll;
    use crate::metadata::FileRef;
    use crate::oracle::MetadataDocument;
    use std::path::Path;

    fn hook() -> ConditionHook {
        ConditionHook::new(Box::new(AcceptAll))
    }

    fn empty_store() -> MetadataStore {
        MetadataStore::new()
    }

    fn store_with(document: MetadataDocument) -> MetadataStore {
        MetadataStore::from_document(document, Path::new("test.json")).unwrap()
    }

    #[test]
    fn empty_input_sorts_to_empty_output() {
        let order =
            sort_plugins(&[], &empty_store(), &empty_store(), &hook(), &[]).unwrap();
        assert!(order.is_empty());
    }

    #[test]
    fn no_metadata_preserves_order_modulo_master_flags() {
        let mut a = PluginRecord::new("A.esp");
        a.is_master = true;
        let b = PluginRecord::new("B.esp");
        let mut c = PluginRecord::new("C.esp");
        c.is_master = true;

        let order = sort_plugins(
            &[a, b, c],
            &empty_store(),
            &empty_store(),
            &hook(),
            &[],
        )
        .unwrap();
        assert_eq!(order, vec!["A.esp", "C.esp", "B.esp"]);
    }

    #[test]
    fn userlist_load_after_is_honoured() {
        let mut meta = PluginMetadata::new("A.esp");
        meta.after = vec![FileRef::new("B.esp")];
        let userlist = store_with(MetadataDocument {
            plugins: vec![meta],
            ..MetadataDocument::default()
        });

        let order = sort_plugins(
            &[PluginRecord::new("B.esp"), PluginRecord::new("A.esp")],
            &empty_store(),
            &userlist,
            &hook(),
            &[],
        )
        .unwrap();
        assert_eq!(order, vec!["B.esp", "A.esp"]);
    }

    #[test]
    fn caller_order_is_not_mutated() {
        let records = vec![PluginRecord::new("B.esp"), PluginRecord::new("A.esp")];
        let before = records.clone();
        let _ = sort_plugins(&records, &empty_store(), &empty_store(), &hook(), &[]);
        assert_eq!(records, before);
    }

    #[test]
    fn sorting_a_sorted_list_returns_the_same_list() {
        let mut meta = PluginMetadata::new("C.esp");
        meta.after = vec![FileRef::new("A.esp")];
        let userlist = store_with(MetadataDocument {
            plugins: vec![meta],
            ..MetadataDocument::default()
        });

        let records = vec![
            PluginRecord::new("B.esp"),
            PluginRecord::new("A.esp"),
            PluginRecord::new("C.esp"),
        ];
        let first = sort_plugins(&records, &empty_store(), &userlist, &hook(), &[]).unwrap();

        let reordered: Vec<PluginRecord> = first
            .iter()
            .map(|name| PluginRecord::new(name.clone()))
            .collect();
        let second =
            sort_plugins(&reordered, &empty_store(), &userlist, &hook(), &[]).unwrap();
        assert_eq!(first, second);
    }
}
