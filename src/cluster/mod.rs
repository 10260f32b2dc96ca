//! Cluster bootstrap: MPI universe setup, per-node speed benchmarking, and
//! the immutable [`ClusterContext`] every collective operation reads from.
//!
//! This module owns the messaging layer lifecycle, but every field it
//! produces is read-only once [`ClusterContext::init`] returns. No other
//! module mutates a `ClusterContext`.

use std::sync::Arc;
use std::time::Instant;

use mpi::environment::Universe;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;

use crate::partition::BlockSizing;
use crate::{DistseqError, Result};

/// User-tunable knobs, layered over compiled-in defaults by [`ClusterConfig::from_env`].
///
/// Defaults to `blocks_per_proc = 5`, `threads_per_proc = 2`, overridable
/// via `Distseq.toml` or `DISTSEQ_*` environment variables instead of
/// requiring a rebuild.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub blocks_per_proc: usize,
    pub threads_per_proc: usize,
    /// Reference benchmark: number of `array_size`-length allocate/zero
    /// passes used to estimate this node's relative speed.
    pub bench_comp_size: usize,
    pub bench_array_size: usize,
    pub partition: PartitionMode,
    /// Block sizing policy every [`crate::ParallelSequence`] constructor
    /// consults. Defaults to [`BlockSizing::Adjusted`].
    pub block_sizing: BlockSizing,
    pub get_protocol: GetProtocol,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            blocks_per_proc: 5,
            threads_per_proc: 2,
            bench_comp_size: 10_000,
            bench_array_size: 10_000,
            partition: PartitionMode::default(),
            block_sizing: BlockSizing::default(),
            get_protocol: GetProtocol::default(),
        }
    }
}

impl ClusterConfig {
    /// Layers an optional `Distseq.toml` under `DISTSEQ_*` environment
    /// overrides (`DISTSEQ_THREADS_PER_PROC=4`, ...) over the compiled-in
    /// defaults every field falls back to via `#[serde(default)]`.
    pub fn from_env() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("Distseq").required(false))
            .add_source(config::Environment::with_prefix("DISTSEQ"));
        Ok(builder.build()?.try_deserialize()?)
    }
}

/// Block-to-node assignment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMode {
    Interleaved,
    Randomized,
}

impl Default for PartitionMode {
    fn default() -> Self {
        PartitionMode::Randomized
    }
}

/// `get` protocol selection: fenced one-sided RMA, or a broadcast from the
/// owner — the latter is invariant to which rank calls `get`, at the cost
/// of an extra collective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GetProtocol {
    OneSidedWindow,
    Broadcast,
}

impl Default for GetProtocol {
    fn default() -> Self {
        GetProtocol::OneSidedWindow
    }
}

/// Process-wide, read-only cluster information. Identical on every rank
/// except `proc_id`.
pub struct ClusterContext {
    universe: Universe,
    world: SystemCommunicator,
    proc_id: i32,
    procs: i32,
    blocks_per_proc: usize,
    threads_per_proc: usize,
    /// Per-rank "time per reference work-item" estimate; larger = slower.
    proc_times: Vec<i64>,
    system_time: i64,
    config: ClusterConfig,
}

impl ClusterContext {
    /// Collective: initializes MPI, benchmarks a reference workload, and
    /// all-gathers the per-node timings. Must be called exactly once, at
    /// the same point in every rank's control flow.
    pub fn init(config: ClusterConfig) -> Result<Arc<Self>> {
        let universe = mpi::initialize()
            .ok_or_else(|| DistseqError::Mpi("mpi::initialize failed".to_string()))?;
        let world = universe.world();
        let procs = world.size();
        let proc_id = world.rank();

        let processor_name = mpi::environment::processor_name();
        tracing::info!(proc_id, procs, processor_name, "cluster node starting");

        let proc_time = benchmark_reference_workload(config.bench_comp_size, config.bench_array_size);

        let mut proc_times = vec![0i64; procs as usize];
        world.all_gather_into(&proc_time, &mut proc_times[..]);
        let system_time: i64 = proc_times.iter().sum();

        tracing::debug!(?proc_times, system_time, "gathered per-node speed weights");

        Ok(Arc::new(Self {
            universe,
            world,
            proc_id,
            procs,
            blocks_per_proc: config.blocks_per_proc,
            threads_per_proc: config.threads_per_proc,
            proc_times,
            system_time,
            config,
        }))
    }

    pub fn world(&self) -> &SystemCommunicator {
        &self.world
    }

    pub fn proc_id(&self) -> i32 {
        self.proc_id
    }

    pub fn procs(&self) -> i32 {
        self.procs
    }

    pub fn blocks_per_proc(&self) -> usize {
        self.blocks_per_proc
    }

    pub fn threads_per_proc(&self) -> usize {
        self.threads_per_proc
    }

    pub fn proc_times(&self) -> &[i64] {
        &self.proc_times
    }

    pub fn system_time(&self) -> i64 {
        self.system_time
    }

    pub fn total_blocks(&self) -> usize {
        self.procs as usize * self.blocks_per_proc
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Collective barrier. Every public [`crate::Sequence`] method ends
    /// with one of these so no caller ever observes a half-completed
    /// collective.
    pub fn barrier(&self) {
        self.world.barrier();
    }
}

impl Drop for ClusterContext {
    fn drop(&mut self) {
        tracing::info!(proc_id = self.proc_id, "cluster node shutting down");
        // `Universe`'s own Drop calls MPI_Finalize; nothing else to free here.
        let _ = &self.universe;
    }
}

/// Reference micro-benchmark: allocate and zero `comp_size` arrays of
/// `array_size` ints, in milliseconds, clamped to >= 1.
///
/// This is the "time-per-unit-work" sample fed into [`ClusterContext::proc_times`]
/// and, through it, into the adjusted block-sizing policy.
fn benchmark_reference_workload(comp_size: usize, array_size: usize) -> i64 {
    let start = Instant::now();
    for _ in 0..comp_size {
        let buf = vec![0i32; array_size];
        std::hint::black_box(&buf);
    }
    let elapsed_ms = start.elapsed().as_millis() as i64;
    elapsed_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_is_always_at_least_one_ms() {
        assert!(benchmark_reference_workload(1, 1) >= 1);
    }

    #[test]
    fn default_config_matches_reference_constants() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.blocks_per_proc, 5);
        assert_eq!(cfg.threads_per_proc, 2);
    }
}
