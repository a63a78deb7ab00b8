use crate::NormalizedPath;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// First example seen for a normalized path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub path: NormalizedPath,
    pub value: String,
    pub action: String,
    pub event_id: String,
}

/// Insertion-ordered, first-write-wins map from normalized path to its first example.
///
/// The cache has no interior locking. It is meant to be owned by a single
/// writer and handed to readers only once that writer is done with it.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    index: HashMap<NormalizedPath, usize>,
    records: Vec<DiscoveryRecord>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            records: Vec::with_capacity(capacity),
        }
    }

    /// Record `value` for `path` unless the path already has an example.
    ///
    /// Returns `false` (and leaves the cache untouched) when the path was
    /// already present.
    pub fn try_insert(
        &mut self,
        path: NormalizedPath,
        value: impl Into<String>,
        action: impl Into<String>,
        event_id: impl Into<String>,
    ) -> bool {
        if self.index.contains_key(&path) {
            return false;
        }
        self.index.insert(path.clone(), self.records.len());
        self.records.push(DiscoveryRecord {
            path,
            value: value.into(),
            action: action.into(),
            event_id: event_id.into(),
        });
        true
    }

    #[must_use]
    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.index.contains_key(path)
    }

    #[must_use]
    pub fn get(&self, path: &NormalizedPath) -> Option<&DiscoveryRecord> {
        self.index.get(path).map(|&pos| &self.records[pos])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveryRecord> {
        self.records.iter()
    }

    /// Copy of every record in first-seen order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DiscoveryRecord> {
        self.records.clone()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<DiscoveryRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_write_wins() {
        let mut cache = DiscoveryCache::new();
        let key = normalize("resources.0.ARN");

        assert!(cache.try_insert(key.clone(), "arn:aws:s3:::first", "PutObject", "e1"));
        assert!(!cache.try_insert(
            normalize("resources.3.ARN"),
            "arn:aws:s3:::second",
            "GetObject",
            "e2"
        ));

        assert_eq!(cache.len(), 1);
        let record = cache.get(&key).unwrap();
        assert_eq!(record.value, "arn:aws:s3:::first");
        assert_eq!(record.action, "PutObject");
        assert_eq!(record.event_id, "e1");
    }

    #[test]
    fn snapshot_keeps_first_seen_order() {
        let mut cache = DiscoveryCache::with_capacity(4);
        cache.try_insert(normalize("z.arn"), "arn:z", "A", "1");
        cache.try_insert(normalize("a.arn"), "arn:a", "B", "2");
        cache.try_insert(normalize("m.id"), "i-12345678", "C", "3");
        cache.try_insert(normalize("z.arn"), "arn:zz", "D", "4");

        let keys: Vec<String> = cache
            .snapshot()
            .into_iter()
            .map(|r| r.path.into_string())
            .collect();
        assert_eq!(keys, vec!["z.arn", "a.arn", "m.id"]);
        assert!(!cache.is_empty());
        assert!(cache.contains(&normalize("m.id")));
        assert!(!cache.contains(&normalize("m.arn")));
    }
}
