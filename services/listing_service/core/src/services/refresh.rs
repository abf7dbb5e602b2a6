//! Keyword set driving the periodic refresh task.
//!
//! Process-wide state wrapped in a type so tests and the background task
//! share an injectable handle instead of a global.

use std::collections::BTreeSet;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct RefreshKeywords {
    inner: RwLock<BTreeSet<String>>,
}

impl RefreshKeywords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        let mut set = self.inner.write().expect("refresh keyword lock poisoned");
        if set.insert(keyword.clone()) {
            tracing::info!(keyword = %keyword, total = set.len(), "keyword added to auto-refresh");
        }
    }

    pub fn remove(&self, keyword: &str) {
        let mut set = self.inner.write().expect("refresh keyword lock poisoned");
        if set.remove(keyword) {
            tracing::info!(keyword = %keyword, total = set.len(), "keyword removed from auto-refresh");
        }
    }

    pub fn list(&self) -> Vec<String> {
        self.inner
            .read()
            .expect("refresh keyword lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .expect("refresh keyword lock poisoned")
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove_list() {
        let keywords = RefreshKeywords::new();
        assert!(keywords.is_empty());
        keywords.add("dress");
        keywords.add("dress");
        keywords.add("bag");
        assert_eq!(keywords.list(), vec!["bag", "dress"]);
        keywords.remove("dress");
        assert_eq!(keywords.list(), vec!["bag"]);
    }
}
