use anyhow::Result;
use ironstream::runner::{ExecMode, Runner};
use ironstream::testing::*;
use ironstream::*;
use std::sync::Arc;

fn count_pipeline() -> Pipeline {
    let p = Pipeline::default();
    p.apply(FixedWindowInto::<(&'static str, i64)>::new("window", 10));
    p.apply(WinKeyReducer::<&str, i64, _>::new("count", CombineReduce::new(Count)));
    p
}

#[test]
fn run_on_empty_pipeline_passes_input_through() -> Result<()> {
    let p = Pipeline::default();
    let out = Runner::default().run(&p, vec![Arc::new(records_at(&[1]))])?;
    assert_eq!(out.len(), 1);
    Ok(())
}

#[test]
fn watermark_propagates_to_every_node() -> Result<()> {
    let p = count_pipeline();
    Runner::new(ExecMode::Sequential).advance_watermark(&p, 42)?;
    for (_, t) in p.chain()? {
        assert_eq!(t.watermark(), 42);
    }
    Ok(())
}

#[test]
fn sequential_and_parallel_agree() -> Result<()> {
    let input = || {
        RecordBundleBuilder::<(&'static str, i64)>::new()
            .every(0, 1, &[("a", 0), ("b", 0), ("a", 0), ("c", 0)])
            .repeated(12, ("a", 0), 5)
            .build_split(3)
    };

    let mut outs = Vec::new();
    for mode in [ExecMode::Sequential, ExecMode::Parallel { threads: Some(2) }, ExecMode::Parallel { threads: None }] {
        let p = count_pipeline();
        let out = Runner::new(mode).run_to_watermark(&p, input(), 20)?;
        outs.push(collect_windows::<(&str, u64)>(&out));
    }

    let expected = [
        (Window::new(0, 10), vec![("a", 2), ("b", 1), ("c", 1)]),
        (Window::new(10, 10), vec![("a", 5)]),
    ];
    for out in &outs {
        assert_windows_equal(out, &expected);
    }
    Ok(())
}

#[test]
fn watermark_before_data_keeps_windows_open() -> Result<()> {
    let p = count_pipeline();
    let runner = Runner::new(ExecMode::Sequential);
    runner.advance_watermark(&p, 5)?;
    let out = runner.run(&p, vec![Arc::new(keyed_records_at("a", &[6, 7]))])?;
    assert!(out.is_empty());
    assert_eq!(runner.advance_watermark(&p, 10)?.len(), 1);
    Ok(())
}

#[test]
fn parallel_pool_is_built_once_and_reused() -> Result<()> {
    let p = count_pipeline();
    let runner = Runner::new(ExecMode::Parallel { threads: Some(3) });
    assert_eq!(runner.pool_threads(), None);

    runner.run(&p, vec![Arc::new(keyed_records_at("a", &[1, 2]))])?;
    assert_eq!(runner.pool_threads(), Some(3));
    let out = runner.run_to_watermark(&p, vec![Arc::new(keyed_records_at("b", &[3]))], 10)?;
    assert_eq!(runner.pool_threads(), Some(3));

    let windows = collect_windows::<(&str, u64)>(&out);
    assert_windows_equal(&windows, &[(Window::new(0, 10), vec![("a", 2), ("b", 1)])]);
    Ok(())
}

#[test]
fn sequential_runner_never_builds_a_pool() -> Result<()> {
    let runner = Runner::new(ExecMode::Sequential);
    runner.run_to_watermark(&count_pipeline(), vec![Arc::new(keyed_records_at("a", &[1]))], 10)?;
    assert_eq!(runner.pool_threads(), None);
    Ok(())
}
