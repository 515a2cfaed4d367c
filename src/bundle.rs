//! Bundles: typed batches of records moving between pipeline nodes.
//!
//! The execution context only ever sees a [`BundleHandle`], a type-erased
//! pointer to something implementing [`BundleBase`]. Evaluators recover the
//! concrete type they expect with [`downcast_bundle`]; receiving anything
//! else means the pipeline was wired wrong, which is a programming error and
//! therefore panics.

use crate::window::{MAX_TIMESTAMP, TimestampMs, Timestamped, Window};
use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Bound for any element carried in a bundle.
pub trait StreamData: 'static + Send + Sync + Clone + Debug {}
impl<T> StreamData for T where T: 'static + Send + Sync + Clone + Debug {}

/// Bound for keys of keyed fragments.
pub trait StreamKey: StreamData + Eq + Hash {}
impl<T> StreamKey for T where T: StreamData + Eq + Hash {}

/// A lightweight runtime type tag for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    /// Stable Rust type identifier.
    pub id: TypeId,
    /// Human-readable type name (best-effort).
    pub name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: type_name::<T>() }
    }
}

/// Minimal surface every bundle exposes to the engine.
pub trait BundleBase: Any + Send + Sync + Debug {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Minimum event timestamp carried; [`MAX_TIMESTAMP`] when empty.
    fn min_ts(&self) -> TimestampMs;

    /// Number of records carried.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate in-memory payload size, used for throughput reports.
    fn byte_size(&self) -> usize;

    fn type_tag(&self) -> TypeTag;
}

/// Type-erased bundle as passed through the execution context.
pub type BundleHandle = Arc<dyn BundleBase>;

/// Recover the concrete bundle type behind a handle.
///
/// # Panics
///
/// Panics if the handle holds a different bundle type.
pub fn downcast_bundle<B: BundleBase>(handle: BundleHandle) -> Arc<B> {
    let actual = handle.type_tag();
    match handle.into_any().downcast::<B>() {
        Ok(b) => b,
        Err(_) => panic!(
            "bundle type mismatch: evaluator expects {}, got {}",
            type_name::<B>(),
            actual.name
        ),
    }
}

/// A batch of raw timestamped records.
#[derive(Clone, Debug)]
pub struct RecordBundle<T> {
    records: Vec<Timestamped<T>>,
    min_ts: TimestampMs,
}

impl<T> Default for RecordBundle<T> {
    fn default() -> Self {
        Self { records: Vec::new(), min_ts: MAX_TIMESTAMP }
    }
}

impl<T> RecordBundle<T> {
    pub fn new(records: Vec<Timestamped<T>>) -> Self {
        let min_ts = records.iter().map(|r| r.ts).min().unwrap_or(MAX_TIMESTAMP);
        Self { records, min_ts }
    }

    pub fn push(&mut self, rec: Timestamped<T>) {
        self.min_ts = self.min_ts.min(rec.ts);
        self.records.push(rec);
    }

    pub fn records(&self) -> &[Timestamped<T>] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Timestamped<T>> {
        self.records.iter()
    }
}

impl<T> FromIterator<Timestamped<T>> for RecordBundle<T> {
    fn from_iter<I: IntoIterator<Item = Timestamped<T>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: Debug + Send + Sync + 'static> BundleBase for RecordBundle<T> {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
    fn min_ts(&self) -> TimestampMs {
        self.min_ts
    }
    fn len(&self) -> usize {
        self.records.len()
    }
    fn byte_size(&self) -> usize {
        self.records.len() * size_of::<Timestamped<T>>()
    }
    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<Self>()
    }
}

/// Records grouped by the window they fall into, windows in ascending order.
#[derive(Clone, Debug)]
pub struct WindowsBundle<T> {
    vals: BTreeMap<Window, Vec<Timestamped<T>>>,
    min_ts: TimestampMs,
}

impl<T> Default for WindowsBundle<T> {
    fn default() -> Self {
        Self { vals: BTreeMap::new(), min_ts: MAX_TIMESTAMP }
    }
}

impl<T> WindowsBundle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, window: Window, rec: Timestamped<T>) {
        self.min_ts = self.min_ts.min(rec.ts);
        self.vals.entry(window).or_default().push(rec);
    }

    pub fn get(&self, window: &Window) -> Option<&[Timestamped<T>]> {
        self.vals.get(window).map(Vec::as_slice)
    }

    pub fn windows(&self) -> Vec<Window> {
        self.vals.keys().copied().collect()
    }

    pub fn window_count(&self) -> usize {
        self.vals.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Window, Vec<Timestamped<T>>> {
        self.vals.iter()
    }

    pub fn into_inner(self) -> BTreeMap<Window, Vec<Timestamped<T>>> {
        self.vals
    }
}

impl<T: Debug + Send + Sync + 'static> BundleBase for WindowsBundle<T> {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
    fn min_ts(&self) -> TimestampMs {
        self.min_ts
    }
    fn len(&self) -> usize {
        self.vals.values().map(Vec::len).sum()
    }
    fn byte_size(&self) -> usize {
        self.len() * size_of::<Timestamped<T>>()
    }
    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<Self>()
    }
}
