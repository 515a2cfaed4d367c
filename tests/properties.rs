//! Property tests for window assignment and windowed state.

use ironstream::stateful::WindowedState;
use ironstream::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

type Shared = Arc<SafeFragment<u8, i64>>;
type Local = BTreeMap<Window, UnsafeFragment<u8, i64>>;

fn local_of(recs: &[(i64, u8)], duration: i64) -> Local {
    let mut acc: Local = BTreeMap::new();
    for &(ts, k) in recs {
        acc.entry(Window::fixed(ts, duration)).or_default().add(k, ts, ts);
    }
    acc
}

/// Window → key → sorted values, for order-insensitive comparison.
fn contents(state: &WindowedState<Shared>) -> BTreeMap<Window, BTreeMap<u8, Vec<i64>>> {
    state.inspect(|m| {
        m.iter()
            .map(|(w, f)| {
                let per_key = f
                    .entries()
                    .into_iter()
                    .map(|(k, c)| {
                        let mut vs = c.values();
                        vs.sort_unstable();
                        (k, vs)
                    })
                    .collect();
                (*w, per_key)
            })
            .collect()
    })
}

fn recs() -> impl Strategy<Value = Vec<(i64, u8)>> {
    prop::collection::vec((-1_000i64..1_000, 0u8..4), 0..60)
}

proptest! {
    #[test]
    fn assignment_is_total_and_contains(ts in any::<i64>(), duration in 1i64..10_000, offset in -10_000i64..10_000) {
        let w = Window::fixed_with_offset(ts, duration, offset);
        prop_assert!(w.contains(ts));
        prop_assert!(w.duration <= duration);
        if w.start != i64::MIN {
            prop_assert_eq!(w.duration, duration);
            prop_assert_eq!((i128::from(w.start) - i128::from(offset)).rem_euclid(i128::from(duration)), 0);
        }
        // every timestamp in the window maps back to the same window
        prop_assert_eq!(Window::fixed_with_offset(w.start, duration, offset), w);
        let last = i64::try_from((i128::from(w.start) + i128::from(w.duration) - 1).min(i128::from(i64::MAX))).unwrap();
        prop_assert_eq!(Window::fixed_with_offset(last, duration, offset), w);
    }

    #[test]
    fn assignment_is_total_at_the_extremes(
        ts in prop_oneof![i64::MIN..i64::MIN + 20_000, i64::MAX - 20_000..=i64::MAX],
        duration in 1i64..10_000,
    ) {
        let w = Window::fixed(ts, duration);
        prop_assert!(w.contains(ts));
        prop_assert_eq!(Window::fixed(w.start, duration), w);
    }

    #[test]
    fn combine_order_does_not_matter(a in recs(), b in recs()) {
        let ab: WindowedState<Shared> = WindowedState::new(MinTsPolicy::ScanAll);
        ab.merge(local_of(&a, 100), |s, l| s.merge_unsafe(l));
        ab.merge(local_of(&b, 100), |s, l| s.merge_unsafe(l));

        let ba: WindowedState<Shared> = WindowedState::new(MinTsPolicy::ScanAll);
        ba.merge(local_of(&b, 100), |s, l| s.merge_unsafe(l));
        ba.merge(local_of(&a, 100), |s, l| s.merge_unsafe(l));

        prop_assert_eq!(contents(&ab), contents(&ba));
        prop_assert_eq!(ab.min_ts(), ba.min_ts());
        prop_assert_eq!(ab.window_count(), ba.window_count());
    }

    #[test]
    fn purge_conserves_records(rs in recs(), wm in -1_200i64..1_200) {
        let r: WinKeyReducer<u8, i64, _> = WinKeyReducer::new("r", CombineReduce::new(Count));
        let mut b = WindowsBundle::new();
        for &(ts, k) in &rs {
            b.add(Window::fixed(ts, 100), Timestamped::new(ts, (k, ts)));
        }
        let mut acc = r.aggregate_init();
        r.aggregate(&mut acc, &b);
        r.combine(acc);

        let taken = r.retrieve_windows(true, wm, None);
        let taken_count: usize = taken.values().map(|f| f.record_count()).sum();
        prop_assert_eq!(taken_count + r.record_count(), rs.len());
        prop_assert_eq!(r.window_count(), r.windows().len());
        prop_assert!(taken.keys().all(|w| w.end() <= wm));
        prop_assert!(r.windows().iter().all(|w| w.end() > wm));
    }

    #[test]
    fn scan_all_min_ts_is_exact(a in recs(), wm in -1_200i64..1_200) {
        let state: WindowedState<Shared> = WindowedState::new(MinTsPolicy::ScanAll);
        state.merge(local_of(&a, 100), |s, l| s.merge_unsafe(l));
        state.retrieve(true, wm, None);

        let expected = a.iter().map(|&(ts, _)| ts).filter(|&ts| Window::fixed(ts, 100).end() > wm).min();
        prop_assert_eq!(state.min_ts(), expected.unwrap_or(i64::MAX));
    }

    #[test]
    fn first_window_min_ts_matches_scan_all_for_in_window_values(a in recs(), wm in -1_200i64..1_200) {
        // With values always inside their own window, the oldest window holds
        // the smallest timestamp, so both policies agree.
        let first: WindowedState<Shared> = WindowedState::new(MinTsPolicy::FirstWindow);
        let scan: WindowedState<Shared> = WindowedState::new(MinTsPolicy::ScanAll);
        first.merge(local_of(&a, 100), |s, l| s.merge_unsafe(l));
        scan.merge(local_of(&a, 100), |s, l| s.merge_unsafe(l));
        first.retrieve(true, wm, None);
        scan.retrieve(true, wm, None);
        prop_assert_eq!(first.min_ts(), scan.min_ts());
    }
}
