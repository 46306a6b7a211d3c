//! Partition records by key, the building block of every grouped reduction.

use std::collections::BTreeMap;

/// Partition `items` into groups keyed by `key`, preserving input order
/// within each group. Groups iterate in key order.
pub fn group_by<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}
