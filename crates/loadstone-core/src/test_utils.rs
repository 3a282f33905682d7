//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these
//! builders are available in unit tests, integration tests, and benchmarks
//! (via the `test-utils` feature).

use crate::condition::{AcceptAll, ConditionHook};
use crate::metadata::{FileRef, PluginMetadata};
use crate::oracle::MetadataDocument;
use crate::plugin::PluginRecord;
use crate::store::MetadataStore;
use std::path::Path;

// ===========================================================================
// Plugin record builders
// ===========================================================================

pub fn record(name: &str) -> PluginRecord {
    PluginRecord::new(name)
}

pub fn master(name: &str) -> PluginRecord {
    let mut record = PluginRecord::new(name);
    record.is_master = true;
    record
}

pub fn blueprint_master(name: &str) -> PluginRecord {
    let mut record = master(name);
    record.is_blueprint_master = true;
    record
}

pub fn with_masters(name: &str, masters: &[&str]) -> PluginRecord {
    let mut record = PluginRecord::new(name);
    record.masters = masters.iter().map(|m| m.to_string()).collect();
    record
}

pub fn with_overrides(name: &str, overrides: &[u64]) -> PluginRecord {
    let mut record = PluginRecord::new(name);
    record.override_records = overrides.to_vec();
    record
}

// ===========================================================================
// Metadata builders
// ===========================================================================

pub fn meta(name: &str) -> PluginMetadata {
    PluginMetadata::new(name)
}

pub fn meta_after(name: &str, after: &[&str]) -> PluginMetadata {
    let mut meta = PluginMetadata::new(name);
    meta.after = after.iter().map(|f| FileRef::new(*f)).collect();
    meta
}

pub fn meta_requires(name: &str, requirements: &[&str]) -> PluginMetadata {
    let mut meta = PluginMetadata::new(name);
    meta.requirements = requirements.iter().map(|f| FileRef::new(*f)).collect();
    meta
}

pub fn meta_in_group(name: &str, group: &str) -> PluginMetadata {
    let mut meta = PluginMetadata::new(name);
    meta.group = Some(group.to_string());
    meta
}

// ===========================================================================
// Store and hook builders
// ===========================================================================

/// A store built from a document, panicking on invalid input.
pub fn store_from(document: MetadataDocument) -> MetadataStore {
    MetadataStore::from_document(document, Path::new("test-document.json"))
        .expect("test document must be valid")
}

/// A store holding only the given plugin entries.
pub fn store_of_plugins(plugins: Vec<PluginMetadata>) -> MetadataStore {
    store_from(MetadataDocument {
        plugins,
        ..MetadataDocument::default()
    })
}

/// A condition hook that accepts every condition.
pub fn accept_all_hook() -> ConditionHook {
    ConditionHook::new(Box::new(AcceptAll))
}

/// Names as owned strings, for order assertions.
pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
