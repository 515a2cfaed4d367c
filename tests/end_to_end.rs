//! Records through window assignment and a keyed sum, driven by a runner.

use ironstream::testing::*;
use ironstream::*;
use std::sync::Arc;

type SumReducer = WinKeyReducer<&'static str, i64, CombineReduce<Sum<i64>, i64, i64>>;

fn sum_pipeline() -> (Pipeline, Arc<SumReducer>) {
    let p = Pipeline::default();
    p.apply(FixedWindowInto::<(&'static str, i64)>::new("window", 10));
    let reducer: Arc<SumReducer> = Arc::new(WinKeyReducer::new("sum", CombineReduce::new(Sum::<i64>::new())));
    p.apply_shared(reducer.clone());
    (p, reducer)
}

#[test]
fn watermark_releases_closed_windows_only() -> anyhow::Result<()> {
    let (p, reducer) = sum_pipeline();
    let runner = Runner::new(ExecMode::Sequential);

    let input = keyed_records_at("k", &[0, 1, 2, 10, 11, 20]);
    assert!(runner.run(&p, vec![Arc::new(input)])?.is_empty());
    assert_eq!(reducer.window_count(), 3);

    // [10, 20) is still open at 15.
    let out = collect_windows::<(&str, i64)>(&runner.advance_watermark(&p, 15)?);
    assert_windows_equal(&out, &[(Window::new(0, 10), vec![("k", 3)])]);
    assert_eq!(reducer.window_count(), 2);

    let out = collect_windows::<(&str, i64)>(&runner.advance_watermark(&p, 20)?);
    assert_windows_equal(&out, &[(Window::new(10, 10), vec![("k", 21)])]);

    assert_eq!(reducer.windows(), vec![Window::new(20, 10)]);
    assert_eq!(reducer.record_count(), 1);
    assert_eq!(reducer.min_ts(), 20);
    Ok(())
}

#[test]
fn refiring_same_watermark_emits_nothing() -> anyhow::Result<()> {
    let (p, reducer) = sum_pipeline();
    let runner = Runner::default();

    runner.run(&p, vec![Arc::new(keyed_records_at("k", &[1, 2, 3]))])?;
    assert_eq!(runner.advance_watermark(&p, 10)?.len(), 1);
    assert!(runner.advance_watermark(&p, 10)?.is_empty());
    assert_eq!(reducer.windows_fired(), 1);
    assert_eq!(reducer.window_count(), 0);
    Ok(())
}

#[test]
fn input_arriving_after_watermark_fires_on_arrival() -> anyhow::Result<()> {
    let (p, reducer) = sum_pipeline();
    let runner = Runner::new(ExecMode::Sequential);

    runner.advance_watermark(&p, 30)?;
    let out = runner.run(&p, vec![Arc::new(keyed_records_at("k", &[4, 5]))])?;
    let out = collect_windows::<(&str, i64)>(&out);

    assert_windows_equal(&out, &[(Window::new(0, 10), vec![("k", 9)])]);
    assert_eq!(reducer.late_records(), 2);
    assert_eq!(reducer.window_count(), 0);
    Ok(())
}

#[test]
fn sink_terminates_the_chain() -> anyhow::Result<()> {
    let (p, _) = sum_pipeline();
    let sink = Arc::new(WindowsBundleSink::<(&'static str, i64)>::new("sink"));
    p.apply_shared(sink.clone());
    let runner = Runner::new(ExecMode::Sequential);

    let out = runner.run_to_watermark(&p, vec![Arc::new(keyed_records_at("k", &[0, 1, 15, 25]))], 30)?;
    assert!(out.is_empty());
    // One output record per (window, key).
    assert_eq!(sink.throughput().total_records(), 3);
    Ok(())
}

#[test]
fn word_counts_per_window() -> anyhow::Result<()> {
    let p = Pipeline::default();
    p.apply(FixedWindowInto::<(String, u64)>::new("window", 100));
    p.apply(WinKeyReducer::<String, u64, _>::new("count", CombineReduce::new(Sum::<u64>::new())));

    // Ten words 20ms apart: five per window.
    let words = word_records("the cat and the hat The end of the tale", 0, 20);
    let out = Runner::default().run_to_watermark(&p, vec![Arc::new(words)], 200)?;
    let out = collect_windows::<(String, u64)>(&out);

    assert_windows_equal(
        &out,
        &[
            (
                Window::new(0, 100),
                vec![("the".into(), 2), ("cat".into(), 1), ("and".into(), 1), ("hat".into(), 1)],
            ),
            (
                Window::new(100, 100),
                vec![("the".into(), 2), ("end".into(), 1), ("of".into(), 1), ("tale".into(), 1)],
            ),
        ],
    );
    Ok(())
}
