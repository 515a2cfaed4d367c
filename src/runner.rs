use crate::bundle::BundleHandle;
use crate::config::EngineConfig;
use crate::context::LocalContext;
use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::transform::Transform;
use crate::watermark::Advance;
use crate::window::TimestampMs;
use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    Sequential,
    /// Run a node's evaluators over all pending bundles on a rayon pool.
    /// `threads` defaults to the number of CPUs.
    Parallel { threads: Option<usize> },
}

impl Default for ExecMode {
    fn default() -> Self {
        ExecMode::Parallel { threads: None }
    }
}

/// Drives bundles and watermarks through a [`Pipeline`] stage by stage.
///
/// Within a stage, the same node may be evaluated concurrently on different
/// bundles; stages themselves run one after another. In parallel mode the
/// runner builds its rayon pool on first use and reuses it for every stage.
#[derive(Clone, Debug, Default)]
pub struct Runner {
    pub mode: ExecMode,
    pool: OnceLock<Arc<ThreadPool>>,
}

impl Runner {
    pub fn new(mode: ExecMode) -> Self {
        Self { mode, pool: OnceLock::new() }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.exec_mode)
    }

    /// Push `inputs` through every node and return what the last node emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline graph is broken or the thread pool
    /// cannot be built.
    pub fn run(&self, p: &Pipeline, inputs: Vec<BundleHandle>) -> Result<Vec<BundleHandle>> {
        let chain = p.chain()?;
        if let Some(m) = p.metrics() {
            m.record_start();
        }
        let mut pending = inputs;
        for (id, t) in &chain {
            let ctx = LocalContext::new();
            let n_in = pending.len();
            self.dispatch(*id, t.as_ref(), &ctx, pending)?;
            pending = ctx.take_bundles();
            debug!(node = %id, transform = t.name(), bundles_in = n_in, bundles_out = pending.len(), "stage done");
        }
        if let Some(m) = p.metrics() {
            m.record_end();
        }
        Ok(pending)
    }

    /// Advance the source watermark to `wm` and propagate it down the chain.
    ///
    /// Each node first evaluates whatever its upstream released, then sees
    /// the upstream watermark; stateful nodes fire the windows it closes.
    /// Returns what the last node emitted.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn advance_watermark(&self, p: &Pipeline, wm: TimestampMs) -> Result<Vec<BundleHandle>> {
        let chain = p.chain()?;
        let mut upstream = wm;
        let mut pending = Vec::new();
        for (id, t) in &chain {
            let ctx = LocalContext::new();
            self.dispatch(*id, t.as_ref(), &ctx, pending)?;
            if let Advance::Advanced { from, to } = t.on_watermark(*id, &ctx, upstream) {
                debug!(node = %id, transform = t.name(), from, to, "watermark advanced");
            }
            upstream = t.watermark();
            pending = ctx.take_bundles();
        }
        Ok(pending)
    }

    /// `run` followed by `advance_watermark`; returns both outputs in order.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_to_watermark(
        &self,
        p: &Pipeline,
        inputs: Vec<BundleHandle>,
        wm: TimestampMs,
    ) -> Result<Vec<BundleHandle>> {
        let mut out = self.run(p, inputs)?;
        out.extend(self.advance_watermark(p, wm)?);
        Ok(out)
    }

    fn dispatch(&self, id: NodeId, t: &dyn Transform, ctx: &LocalContext, bundles: Vec<BundleHandle>) -> Result<()> {
        if bundles.is_empty() {
            return Ok(());
        }
        match self.mode {
            ExecMode::Sequential => {
                for b in bundles {
                    t.exec_evaluator(id, ctx, b);
                }
            }
            ExecMode::Parallel { threads } => {
                let pool = self.pool(threads)?;
                pool.install(|| {
                    bundles.into_par_iter().for_each(|b| t.exec_evaluator(id, ctx, b));
                });
            }
        }
        Ok(())
    }

    fn pool(&self, threads: Option<usize>) -> Result<&ThreadPool> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool.as_ref());
        }
        let n = threads.unwrap_or_else(num_cpus::get).max(1);
        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("ironstream-eval-{i}"))
            .build()
            .context("building evaluator thread pool")?;
        debug!(threads = n, "evaluator pool built");
        // a racing caller may have installed its pool first
        Ok(self.pool.get_or_init(|| Arc::new(built)).as_ref())
    }

    /// Threads in the evaluator pool, once a parallel stage has built it.
    pub fn pool_threads(&self) -> Option<usize> {
        self.pool.get().map(|p| p.current_num_threads())
    }
}
