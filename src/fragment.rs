//! Value containers and per-window keyed fragments.
//!
//! A *fragment* maps each key seen inside one window to the values collected
//! for it. Two flavors exist:
//!
//! - [`UnsafeFragment`] / [`UnsafeValueContainer`]: no internal
//!   synchronization. Used for task-local accumulation, where one evaluator
//!   invocation owns the fragment exclusively.
//! - [`SafeFragment`] / [`SafeValueContainer`]: appendable through `&self`
//!   from many threads. Used for the shared state of stateful transforms.
//!
//! Every container tracks the minimum timestamp of the values added to it,
//! which stateful transforms use to bound how stale their retained state is.

use crate::window::{MAX_TIMESTAMP, TimestampMs};
use std::collections::HashMap;
use std::collections::hash_map;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Read-side view shared by both container flavors.
pub trait ValueContainer<V> {
    /// Number of values held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Minimum timestamp of any value ever added; [`MAX_TIMESTAMP`] when empty.
    fn min_ts(&self) -> TimestampMs;

    /// Owned snapshot of the values in insertion order.
    fn values(&self) -> Vec<V>;
}

/* ===================== unsafe flavor ===================== */

/// Append-only values for one key, owned by a single task.
#[derive(Clone, Debug, PartialEq)]
pub struct UnsafeValueContainer<V> {
    vals: Vec<V>,
    min_ts: TimestampMs,
}

impl<V> Default for UnsafeValueContainer<V> {
    fn default() -> Self {
        Self { vals: Vec::new(), min_ts: MAX_TIMESTAMP }
    }
}

impl<V> UnsafeValueContainer<V> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, value: V, ts: TimestampMs) {
        self.vals.push(value);
        self.min_ts = self.min_ts.min(ts);
    }

    /// Container union: moves every value of `other` onto `self`.
    pub fn append(&mut self, mut other: UnsafeValueContainer<V>) {
        self.vals.append(&mut other.vals);
        self.min_ts = self.min_ts.min(other.min_ts);
    }

    pub fn as_slice(&self) -> &[V] {
        &self.vals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.vals.iter()
    }

    pub fn into_vec(self) -> Vec<V> {
        self.vals
    }
}

impl<V: Clone> ValueContainer<V> for UnsafeValueContainer<V> {
    fn len(&self) -> usize {
        self.vals.len()
    }

    fn min_ts(&self) -> TimestampMs {
        self.min_ts
    }

    fn values(&self) -> Vec<V> {
        self.vals.clone()
    }
}

/// Per-window mapping `key -> values` without synchronization.
#[derive(Clone, Debug)]
pub struct UnsafeFragment<K, V> {
    vals: HashMap<K, UnsafeValueContainer<V>>,
}

impl<K, V> Default for UnsafeFragment<K, V> {
    fn default() -> Self {
        Self { vals: HashMap::new() }
    }
}

impl<K: Eq + Hash, V> UnsafeFragment<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, value: V, ts: TimestampMs) {
        self.vals.entry(key).or_default().add(value, ts);
    }

    /// Union `other` into `self`, key by key.
    pub fn merge(&mut self, other: UnsafeFragment<K, V>) {
        for (k, c) in other.vals {
            match self.vals.entry(k) {
                hash_map::Entry::Occupied(mut e) => e.get_mut().append(c),
                hash_map::Entry::Vacant(e) => {
                    e.insert(c);
                }
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&UnsafeValueContainer<V>> {
        self.vals.get(key)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, UnsafeValueContainer<V>> {
        self.vals.iter()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// Total number of values across keys.
    pub fn record_count(&self) -> usize {
        self.vals.values().map(|c| c.vals.len()).sum()
    }

    pub fn min_ts(&self) -> TimestampMs {
        self.vals.values().map(|c| c.min_ts).min().unwrap_or(MAX_TIMESTAMP)
    }
}

impl<K, V> IntoIterator for UnsafeFragment<K, V> {
    type Item = (K, UnsafeValueContainer<V>);
    type IntoIter = hash_map::IntoIter<K, UnsafeValueContainer<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.vals.into_iter()
    }
}

/* ===================== safe flavor ===================== */

/// Append-only values for one key; appends may race from many threads.
#[derive(Debug)]
pub struct SafeValueContainer<V> {
    vals: Mutex<Vec<V>>,
    min_ts: AtomicI64,
}

impl<V> Default for SafeValueContainer<V> {
    fn default() -> Self {
        Self { vals: Mutex::new(Vec::new()), min_ts: AtomicI64::new(MAX_TIMESTAMP) }
    }
}

impl<V> SafeValueContainer<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, value: V, ts: TimestampMs) {
        self.vals.lock().expect("value container lock poisoned").push(value);
        self.min_ts.fetch_min(ts, Ordering::AcqRel);
    }

    /// Container union with a task-local container.
    pub fn append_unsafe(&self, mut other: UnsafeValueContainer<V>) {
        if other.vals.is_empty() {
            return;
        }
        self.vals.lock().expect("value container lock poisoned").append(&mut other.vals);
        self.min_ts.fetch_min(other.min_ts, Ordering::AcqRel);
    }
}

impl<V: Clone> SafeValueContainer<V> {
    /// Independent copy; later appends to either side are not shared.
    pub fn deep_clone(&self) -> Self {
        Self {
            vals: Mutex::new(self.values()),
            min_ts: AtomicI64::new(self.min_ts()),
        }
    }

    pub fn to_unsafe(&self) -> UnsafeValueContainer<V> {
        UnsafeValueContainer { vals: self.values(), min_ts: self.min_ts() }
    }
}

impl<V: Clone> ValueContainer<V> for SafeValueContainer<V> {
    fn len(&self) -> usize {
        self.vals.lock().expect("value container lock poisoned").len()
    }

    fn min_ts(&self) -> TimestampMs {
        self.min_ts.load(Ordering::Acquire)
    }

    fn values(&self) -> Vec<V> {
        self.vals.lock().expect("value container lock poisoned").clone()
    }
}

/// Per-window mapping `key -> values`, shareable across threads.
#[derive(Debug)]
pub struct SafeFragment<K, V> {
    vals: RwLock<HashMap<K, Arc<SafeValueContainer<V>>>>,
    min_ts: AtomicI64,
}

impl<K, V> Default for SafeFragment<K, V> {
    fn default() -> Self {
        Self { vals: RwLock::new(HashMap::new()), min_ts: AtomicI64::new(MAX_TIMESTAMP) }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SafeFragment<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn container(&self, key: &K) -> Arc<SafeValueContainer<V>> {
        if let Some(c) = self.vals.read().expect("fragment lock poisoned").get(key) {
            return Arc::clone(c);
        }
        let mut w = self.vals.write().expect("fragment lock poisoned");
        Arc::clone(w.entry(key.clone()).or_default())
    }

    pub fn add(&self, key: K, value: V, ts: TimestampMs) {
        self.container(&key).add(value, ts);
        self.min_ts.fetch_min(ts, Ordering::AcqRel);
    }

    /// Container union of a task-local fragment into this one.
    pub fn merge_unsafe(&self, local: UnsafeFragment<K, V>) {
        let local_min = local.min_ts();
        for (k, c) in local {
            self.container(&k).append_unsafe(c);
        }
        self.min_ts.fetch_min(local_min, Ordering::AcqRel);
    }

    pub fn get(&self, key: &K) -> Option<Arc<SafeValueContainer<V>>> {
        self.vals.read().expect("fragment lock poisoned").get(key).cloned()
    }

    /// Snapshot of `(key, container)` handles.
    pub fn entries(&self) -> Vec<(K, Arc<SafeValueContainer<V>>)> {
        self.vals
            .read()
            .expect("fragment lock poisoned")
            .iter()
            .map(|(k, c)| (k.clone(), Arc::clone(c)))
            .collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.vals.read().expect("fragment lock poisoned").keys().cloned().collect()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.vals.read().expect("fragment lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record_count(&self) -> usize {
        self.vals
            .read()
            .expect("fragment lock poisoned")
            .values()
            .map(|c| c.len())
            .sum()
    }

    pub fn min_ts(&self) -> TimestampMs {
        self.min_ts.load(Ordering::Acquire)
    }

    /// Copy whose containers are detached from `self`.
    pub fn deep_clone(&self) -> Self {
        let vals = self
            .vals
            .read()
            .expect("fragment lock poisoned")
            .iter()
            .map(|(k, c)| (k.clone(), Arc::new(c.deep_clone())))
            .collect();
        Self { vals: RwLock::new(vals), min_ts: AtomicI64::new(self.min_ts()) }
    }

    pub fn to_unsafe(&self) -> UnsafeFragment<K, V> {
        let vals = self
            .vals
            .read()
            .expect("fragment lock poisoned")
            .iter()
            .map(|(k, c)| (k.clone(), c.to_unsafe()))
            .collect();
        UnsafeFragment { vals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_container_tracks_min_ts() {
        let mut c = UnsafeValueContainer::new();
        assert_eq!(c.min_ts(), MAX_TIMESTAMP);
        c.add(1u32, 30);
        c.add(2, 10);
        c.add(3, 20);
        assert_eq!(c.min_ts(), 10);
        assert_eq!(c.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn safe_fragment_union_keeps_both_sides() {
        let shared: SafeFragment<String, u32> = SafeFragment::new();
        shared.add("a".into(), 1, 5);

        let mut local = UnsafeFragment::new();
        local.add("a".to_string(), 2, 3);
        local.add("b".to_string(), 7, 4);
        shared.merge_unsafe(local);

        let mut a = shared.get(&"a".to_string()).unwrap().values();
        a.sort();
        assert_eq!(a, vec![1, 2]);
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.record_count(), 3);
        assert_eq!(shared.min_ts(), 3);
    }

    #[test]
    fn deep_clone_is_detached() {
        let shared: SafeFragment<u8, u8> = SafeFragment::new();
        shared.add(1, 1, 0);
        let copy = shared.deep_clone();
        shared.add(1, 2, 0);
        assert_eq!(copy.record_count(), 1);
        assert_eq!(shared.record_count(), 2);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let shared: Arc<SafeFragment<u8, u32>> = Arc::new(SafeFragment::new());
        std::thread::scope(|s| {
            for t in 0..4u32 {
                let shared = Arc::clone(&shared);
                s.spawn(move || {
                    for i in 0..250 {
                        shared.add((i % 3) as u8, t * 1000 + i, i64::from(i));
                    }
                });
            }
        });
        assert_eq!(shared.record_count(), 1000);
        assert_eq!(shared.min_ts(), 0);
    }
}
