//! Documents opened alongside the active one

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque reference to an external resource a document was opened from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub String);

/// A linked document, either by reference or inlined
#[derive(Debug, Clone, PartialEq)]
pub enum LinkedEntry {
    Handle(Handle),
    Inline(Value),
}

/// Ordered set of linked documents keyed by display name.
///
/// Keys are unique and at most one entry is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedDocumentSet {
    entries: Vec<(String, LinkedEntry)>,
    active: Option<String>,
}

impl LinkedDocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&LinkedEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Key of the active entry
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_entry(&self) -> Option<&LinkedEntry> {
        self.active().and_then(|key| self.get(key))
    }

    /// Insert or replace the entry under `key`, keeping its position
    pub fn insert(&mut self, key: String, entry: LinkedEntry) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((key, entry)),
        }
    }

    /// Make `key` the active entry; returns false if there is no such entry
    pub fn select(&mut self, key: &str) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.active = Some(key.to_string());
        true
    }

    /// Rename an entry unless the new key is already taken
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.contains(to) {
            return false;
        }
        let Some((key, _)) = self.entries.iter_mut().find(|(k, _)| k == from) else {
            return false;
        };
        *key = to.to_string();
        if self.active.as_deref() == Some(from) {
            self.active = Some(to.to_string());
        }
        true
    }

    /// Bring the set in line with a freshly decoded active document.
    ///
    /// `selected` is the entry the caller considers active. An empty set is
    /// seeded with the document under `title`. An inline active entry takes
    /// the new content and follows the title; an entry opened from a handle
    /// keeps its key.
    pub fn sync_active(&mut self, title: &str, document: &Value, selected: Option<&str>) {
        if let Some(selected) = selected {
            self.select(selected);
        }

        let active = match self.active.clone() {
            Some(active) if self.contains(&active) => active,
            _ => {
                self.insert(title.to_string(), LinkedEntry::Inline(document.clone()));
                self.active = Some(title.to_string());
                return;
            }
        };

        if let Some((_, LinkedEntry::Inline(content))) =
            self.entries.iter_mut().find(|(k, _)| *k == active)
        {
            *content = document.clone();
            if !self.rename(&active, title) && active != title {
                tracing::debug!("Linked document '{}' already exists, keeping '{}'", title, active);
            }
        }
    }
}
