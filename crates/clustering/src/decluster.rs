use std::collections::BTreeSet;

/// Region names currently forced to per-point rendering.
///
/// Ordered so iteration (and anything logged from it) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclusterSet {
    names: BTreeSet<String>,
}

impl DeclusterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the region was not already declustered.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Keeps only the names for which `keep` returns true; returns the removed names.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let (kept, removed): (BTreeSet<String>, BTreeSet<String>) =
            std::mem::take(&mut self.names)
                .into_iter()
                .partition(|name| keep(name));
        self.names = kept;
        removed.into_iter().collect()
    }
}
