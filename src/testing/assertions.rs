//! Assertion functions for windowed pipeline outputs.

use crate::window::Window;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that `actual` holds exactly the `expected` windows, each with the
/// same values in any order.
///
/// # Panics
///
/// Panics if a window is missing, unexpected, or holds different values.
///
/// # Example
///
/// ```
/// use ironstream::testing::assert_windows_equal;
/// use ironstream::Window;
/// use std::collections::BTreeMap;
///
/// let actual = BTreeMap::from([(Window::new(0, 10), vec![2, 1])]);
/// assert_windows_equal(&actual, &[(Window::new(0, 10), vec![1, 2])]);
/// ```
pub fn assert_windows_equal<T: Debug + Ord + Clone>(actual: &BTreeMap<Window, Vec<T>>, expected: &[(Window, Vec<T>)]) {
    let actual_windows: Vec<Window> = actual.keys().copied().collect();
    let mut expected_windows: Vec<Window> = expected.iter().map(|(w, _)| *w).collect();
    expected_windows.sort();
    assert_eq!(
        actual_windows, expected_windows,
        "Window set mismatch:\n  Expected: {expected_windows:?}\n  Actual: {actual_windows:?}"
    );

    for (w, want) in expected {
        let mut got = actual[w].clone();
        let mut want = want.clone();
        got.sort();
        want.sort();
        assert_eq!(got, want, "Values mismatch in window [{}, {})", w.start, w.end());
    }
}

/// Assert that two collections contain the same elements with the same
/// multiplicities, ignoring order.
///
/// # Panics
///
/// Panics if the collections differ in content.
///
/// # Example
///
/// ```
/// use ironstream::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 1], &[1, 3, 1]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    fn counts<T: Eq + Hash>(xs: &[T]) -> HashMap<&T, usize> {
        let mut m = HashMap::new();
        for x in xs {
            *m.entry(x).or_insert(0) += 1;
        }
        m
    }

    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    if counts(actual) != counts(expected) {
        panic!("Collection content mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}");
    }
}

/// Assert that every window in `actual` satisfies `pred`.
///
/// # Panics
///
/// Panics naming the first window that fails.
pub fn assert_all_windows<T: Debug, F>(actual: &BTreeMap<Window, Vec<T>>, pred: F)
where
    F: Fn(&Window, &[T]) -> bool,
{
    for (w, vs) in actual {
        assert!(pred(w, vs), "Predicate failed for window [{}, {}): {vs:?}", w.start, w.end());
    }
}
