//! Aegis Historian Tag Registry
//!
//! Owns every tag definition. The store and the simulators refer to tags by
//! name only and read definitions through this registry.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::{Tag, TagFilter, TagPatch};
use aegis_common::{HistorianError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

// =============================================================================
// Tag Registry
// =============================================================================

/// Thread-safe registry of tag definitions.
pub struct TagRegistry {
    tags: RwLock<HashMap<String, Tag>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            tags: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new tag. Fails with `DuplicateTag` if the name is taken.
    pub fn create(&self, tag: Tag) -> Result<Tag> {
        tag.validate()?;

        let mut tags = self.tags.write();
        if tags.contains_key(&tag.name) {
            return Err(HistorianError::DuplicateTag(tag.name));
        }

        tracing::debug!(tag = %tag.name, data_type = %tag.data_type, "registered tag");
        tags.insert(tag.name.clone(), tag.clone());
        Ok(tag)
    }

    /// Get a tag by name.
    pub fn get(&self, name: &str) -> Option<Tag> {
        self.tags.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.read().contains_key(name)
    }

    /// Apply a partial update in place.
    pub fn update(&self, name: &str, patch: &TagPatch) -> Result<Tag> {
        let mut tags = self.tags.write();
        let existing = tags
            .get(name)
            .ok_or_else(|| HistorianError::TagNotFound(name.to_string()))?;

        let updated = patch.apply_to(existing);
        updated.validate()?;

        tags.insert(name.to_string(), updated.clone());
        Ok(updated)
    }

    /// Remove a tag definition. Sample deletion is the caller's concern.
    pub fn remove(&self, name: &str) -> Result<Tag> {
        self.tags
            .write()
            .remove(name)
            .ok_or_else(|| HistorianError::TagNotFound(name.to_string()))
    }

    /// List tags matching a filter, sorted by name.
    pub fn list(&self, filter: &TagFilter) -> Vec<Tag> {
        let tags = self.tags.read();
        let mut matched: Vec<Tag> = tags.values().filter(|t| filter.matches(t)).cloned().collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        matched
    }

    /// Names of every registered tag.
    pub fn names(&self) -> Vec<String> {
        self.tags.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.read().is_empty()
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
