//! The condition hook: a narrow, caching front-end over the external
//! condition evaluator.
//!
//! Conditions are opaque strings; this crate never inspects their grammar.
//! The hook caches results keyed by the condition string for the duration
//! of one sort call, and is cleared at the start of each sort.

use crate::error::SortError;
use crate::metadata::PluginMetadata;
use std::cell::RefCell;
use std::collections::HashMap;

/// External evaluator of metadata condition strings.
pub trait ConditionEvaluator {
    /// Evaluates one condition string to a boolean. Rejecting the string
    /// surfaces as [`SortError::ConditionSyntax`].
    fn evaluate(&self, condition: &str) -> Result<bool, SortError>;

    /// Fills in any dynamic metadata fields the evaluator knows how to
    /// resolve, after condition filtering. The default leaves the metadata
    /// unchanged.
    fn expand(&self, metadata: PluginMetadata) -> Result<PluginMetadata, SortError> {
        Ok(metadata)
    }
}

/// An evaluator that treats every condition as true. Useful when no
/// evaluator is available and conditions should not filter anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ConditionEvaluator for AcceptAll {
    fn evaluate(&self, _condition: &str) -> Result<bool, SortError> {
        Ok(true)
    }
}

/// Caching wrapper around a [`ConditionEvaluator`].
pub struct ConditionHook {
    evaluator: Box<dyn ConditionEvaluator>,
    cache: RefCell<HashMap<String, bool>>,
}

impl ConditionHook {
    pub fn new(evaluator: Box<dyn ConditionEvaluator>) -> Self {
        Self {
            evaluator,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Drops all cached results. Called at the start of every sort and on
    /// explicit request.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Evaluates a condition, consulting the cache first. An absent or
    /// blank condition is vacuously true.
    pub fn evaluate(&self, condition: &str) -> Result<bool, SortError> {
        if condition.trim().is_empty() {
            return Ok(true);
        }
        if let Some(&hit) = self.cache.borrow().get(condition) {
            return Ok(hit);
        }
        let value = self.evaluator.evaluate(condition)?;
        self.cache
            .borrow_mut()
            .insert(condition.to_string(), value);
        Ok(value)
    }

    /// Evaluates an optional condition; `None` is vacuously true.
    pub fn evaluate_opt(&self, condition: Option<&str>) -> Result<bool, SortError> {
        match condition {
            Some(condition) => self.evaluate(condition),
            None => Ok(true),
        }
    }

    /// Returns a copy of the metadata with every item whose condition
    /// evaluates to false removed.
    pub fn evaluate_all(&self, metadata: &PluginMetadata) -> Result<PluginMetadata, SortError> {
        let mut out = PluginMetadata::new(metadata.name.clone());
        out.group = metadata.group.clone();

        for file in &metadata.after {
            if self.evaluate_opt(file.condition.as_deref())? {
                out.after.push(file.clone());
            }
        }
        for file in &metadata.requirements {
            if self.evaluate_opt(file.condition.as_deref())? {
                out.requirements.push(file.clone());
            }
        }
        for file in &metadata.incompatibilities {
            if self.evaluate_opt(file.condition.as_deref())? {
                out.incompatibilities.push(file.clone());
            }
        }
        for message in &metadata.messages {
            if self.evaluate_opt(message.condition.as_deref())? {
                out.messages.push(message.clone());
            }
        }
        for tag in &metadata.tags {
            if self.evaluate_opt(tag.condition.as_deref())? {
                out.tags.push(tag.clone());
            }
        }
        for entry in &metadata.dirty {
            if self.evaluate_opt(entry.condition.as_deref())? {
                out.dirty.push(entry.clone());
            }
        }
        for entry in &metadata.clean {
            if self.evaluate_opt(entry.condition.as_deref())? {
                out.clean.push(entry.clone());
            }
        }
        for location in &metadata.locations {
            if self.evaluate_opt(location.condition.as_deref())? {
                out.locations.push(location.clone());
            }
        }

        self.evaluator.expand(out)
    }
}

impl std::fmt::Debug for ConditionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionHook")
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
