//! Window-ordered shared state behind a single lock.
//!
//! [`WindowedState`] holds the triple every stateful transform needs:
//!
//! - `windows`: window → per-window result, ordered by window start, so the
//!   set of windows closed by a watermark is always a prefix;
//! - `window_count`: number of open windows, kept incrementally;
//! - `min_ts`: minimum timestamp over retained state (not the watermark).
//!
//! All three are guarded by one mutex and are only ever observed together.

use crate::config::MinTsPolicy;
use crate::window::{MAX_TIMESTAMP, TimestampMs, Window};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// What the shared state needs to know about a per-window result.
pub trait WindowFragment {
    /// Minimum timestamp of any value held.
    fn min_ts(&self) -> TimestampMs;

    /// A copy that later mutations of `self` do not reach.
    fn detach(&self) -> Self;
}

impl<K, V> WindowFragment for Arc<crate::fragment::SafeFragment<K, V>>
where
    K: Eq + std::hash::Hash + Clone,
    V: Clone,
{
    fn min_ts(&self) -> TimestampMs {
        crate::fragment::SafeFragment::min_ts(self)
    }

    fn detach(&self) -> Self {
        Arc::new(self.deep_clone())
    }
}

#[derive(Debug)]
struct Inner<R> {
    windows: BTreeMap<Window, R>,
    window_count: usize,
    min_ts: TimestampMs,
}

#[derive(Debug)]
pub struct WindowedState<R> {
    inner: Mutex<Inner<R>>,
    policy: MinTsPolicy,
}

impl<R> WindowedState<R> {
    pub fn new(policy: MinTsPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner { windows: BTreeMap::new(), window_count: 0, min_ts: MAX_TIMESTAMP }),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().expect("windowed state lock poisoned")
    }

    pub fn window_count(&self) -> usize {
        self.lock().window_count
    }

    pub fn min_ts(&self) -> TimestampMs {
        self.lock().min_ts
    }

    pub fn policy(&self) -> MinTsPolicy {
        self.policy
    }

    /// Open windows, oldest first.
    pub fn windows(&self) -> Vec<Window> {
        self.lock().windows.keys().copied().collect()
    }

    /// Run `f` over the window map under the lock.
    pub fn inspect<T>(&self, f: impl FnOnce(&BTreeMap<Window, R>) -> T) -> T {
        f(&self.lock().windows)
    }
}

impl<R: WindowFragment + Default> WindowedState<R> {
    /// Merge a task-local accumulator. Windows new to the state are opened
    /// lazily; `fold` performs the per-window union.
    pub fn merge<L: LocalFragment>(&self, local: BTreeMap<Window, L>, mut fold: impl FnMut(&R, L)) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        for (w, l) in local {
            let l_min = l.local_min_ts();
            let slot = match inner.windows.entry(w) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    inner.window_count += 1;
                    e.insert(R::default())
                }
            };
            fold(slot, l);
            if l_min < inner.min_ts {
                inner.min_ts = l_min;
            }
        }
        assert_eq!(inner.window_count, inner.windows.len(), "window count out of sync");
    }

    /// Take the prefix of windows whose end is at or before `watermark`.
    ///
    /// Scanning stops at the first window still open, or after `limit`
    /// windows. Without `purge` the returned windows are detached copies and
    /// the state is left untouched.
    pub fn retrieve(&self, purge: bool, watermark: TimestampMs, limit: Option<usize>) -> BTreeMap<Window, R> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let mut cut: Option<Window> = None;
        for (i, w) in inner.windows.keys().enumerate() {
            if watermark < w.end() {
                debug!(watermark, window_end = w.end(), "window still open, stop scanning");
                cut = Some(*w);
                break;
            }
            if limit == Some(i) {
                cut = Some(*w);
                break;
            }
        }

        if !purge {
            let taken = match cut {
                Some(c) => inner.windows.range(..c).map(|(w, r)| (*w, r.detach())).collect(),
                None => inner.windows.iter().map(|(w, r)| (*w, r.detach())).collect(),
            };
            return taken;
        }

        let taken = match cut {
            Some(c) => {
                let rest = inner.windows.split_off(&c);
                std::mem::replace(&mut inner.windows, rest)
            }
            None => std::mem::take(&mut inner.windows),
        };
        if taken.is_empty() {
            return taken;
        }

        assert!(inner.window_count >= taken.len(), "window count underflow");
        inner.window_count -= taken.len();
        inner.min_ts = match self.policy {
            MinTsPolicy::FirstWindow => inner.windows.values().next().map_or(MAX_TIMESTAMP, R::min_ts),
            MinTsPolicy::ScanAll => inner.windows.values().map(R::min_ts).min().unwrap_or(MAX_TIMESTAMP),
        };
        assert_eq!(inner.window_count, inner.windows.len(), "window count out of sync");
        taken
    }
}

/// Minimum timestamp of a local (task-owned) per-window accumulator.
pub trait LocalFragment {
    fn local_min_ts(&self) -> TimestampMs;
}

impl<K: Eq + std::hash::Hash, V> LocalFragment for crate::fragment::UnsafeFragment<K, V> {
    fn local_min_ts(&self) -> TimestampMs {
        self.min_ts()
    }
}
