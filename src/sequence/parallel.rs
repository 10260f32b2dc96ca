//! The distributed sequence implementation: blocks partitioned across
//! ranks by [`crate::partition::PartitionPlanner`],
//! intra-node reduce/scan/transform/map handed to [`crate::reduce`], and
//! cross-node traffic going through [`crate::exchange`] (collectives) or
//! [`crate::window`] (one-sided `get`/`set`).

use std::sync::Arc;

use mpi::topology::SystemCommunicator;

use crate::cluster::{ClusterContext, GetProtocol};
use crate::exchange;
use crate::partition::{PartitionPlanner, Responsibility};
use crate::reduce;
use crate::sequence::{Element, SeqPart, Sequence};
use crate::window::{self, RemoteWindow};
use crate::Result;

/// A sequence distributed across every rank in `ctx`. Each rank holds only
/// the elements its owned [`SeqPart`]s cover, concatenated into
/// `local_buf` in the same order as `block_indices`.
///
/// `window` borrows `local_buf` and `ctx` under an erased `'static`
/// lifetime (see [`ParallelSequence::assemble`]); it is declared first so
/// Rust's field drop order - top to bottom, the reverse of a function's
/// local variables - tears it down (fencing any in-flight RMA) before the
/// buffer and context it points into are freed.
pub struct ParallelSequence<T: Element> {
    window: RemoteWindow<'static, T>,
    local_buf: Box<[T]>,
    ctx: Arc<ClusterContext>,
    responsibilities: Vec<Responsibility>,
    parts: Vec<SeqPart>,
    /// `responsibilities` index of `parts[i]`, i.e. this part's position in
    /// global block order. Needed to look up the right prefix in `scan`.
    block_indices: Vec<usize>,
    size: usize,
}

impl<T: Element> ParallelSequence<T> {
    /// Builds a distributed sequence from a full copy of `array` present
    /// on every rank, each rank keeping only the slice its partition owns.
    /// Block sizing follows `ctx.config().block_sizing` (default
    /// [`BlockSizing::Adjusted`]), same as [`ParallelSequence::from_generator`].
    pub fn from_array(ctx: Arc<ClusterContext>, array: &[T]) -> Result<Self> {
        let size = array.len();
        let proc_id = ctx.proc_id();
        tracing::debug!(proc_id, size, "building parallel sequence from array");

        let sizing = ctx.config().block_sizing;
        let responsibilities = PartitionPlanner::plan(&ctx, size, sizing)?;
        let (parts, block_indices, local_len) = owned_parts(&ctx, &responsibilities);

        let mut local_buf = vec![T::default(); local_len].into_boxed_slice();
        for part in &parts {
            let src = &array[part.start_index..part.start_index + part.num_elements];
            local_buf[part.local_range()].copy_from_slice(src);
        }

        Ok(Self::assemble(ctx, size, local_buf, responsibilities, parts, block_indices))
    }

    /// Builds a distributed sequence whose element `i` is `generator(i)`,
    /// generated directly into each rank's owned parts - no rank ever
    /// materializes the full sequence. Block sizing follows
    /// `ctx.config().block_sizing` (default [`BlockSizing::Adjusted`]).
    pub fn from_generator<F>(ctx: Arc<ClusterContext>, generator: F, n: usize) -> Result<Self>
    where
        F: Fn(usize) -> T + Sync,
    {
        let proc_id = ctx.proc_id();
        tracing::debug!(proc_id, n, "building parallel sequence from generator");

        let sizing = ctx.config().block_sizing;
        let responsibilities = PartitionPlanner::plan(&ctx, n, sizing)?;
        let (parts, block_indices, local_len) = owned_parts(&ctx, &responsibilities);
        let threads = ctx.threads_per_proc();

        let mut local_buf = vec![T::default(); local_len].into_boxed_slice();
        for part in &parts {
            let generated = reduce::parallel_tabulate(part.start_index, part.num_elements, &generator, threads);
            local_buf[part.local_range()].copy_from_slice(&generated);
        }

        Ok(Self::assemble(ctx, n, local_buf, responsibilities, parts, block_indices))
    }

    /// Elementwise map into a new element type, thread-parallel per owned
    /// block. Unlike [`Sequence::transform`], the result is a fresh
    /// sequence - deliberately an inherent method, not part of
    /// [`Sequence`], since its return type needs a second generic
    /// parameter a single trait method can't express without GATs.
    pub fn map<S, F>(&self, mapper: F) -> ParallelSequence<S>
    where
        S: Element,
        F: Fn(T) -> S + Sync,
    {
        let threads = self.ctx.threads_per_proc();
        let mapped: Box<[S]> = reduce::parallel_map(&self.local_buf, &mapper, threads).into_boxed_slice();
        ParallelSequence::assemble(
            self.ctx.clone(),
            self.size,
            mapped,
            self.responsibilities.clone(),
            self.parts.clone(),
            self.block_indices.clone(),
        )
    }

    /// Registers the RMA window over `local_buf` and assembles `Self`.
    ///
    /// # Safety rationale
    /// `ctx.world()` and `local_buf`'s backing slice are transmuted to
    /// `'static` so [`RemoteWindow`] can be stored alongside the data it
    /// borrows. This is sound because:
    /// - `local_buf` is a `Box<[T]>`; moving the `Box` moves only the
    ///   pointer, never the heap allocation the window points into.
    /// - `ctx` is an `Arc<ClusterContext>`; moving `Self` moves only the
    ///   `Arc`'s pointer, never the `ClusterContext` it refers to.
    /// - `window`'s field declaration precedes `local_buf` and `ctx`, so
    ///   it is always dropped (and fenced) first.
    fn assemble(
        ctx: Arc<ClusterContext>,
        size: usize,
        mut local_buf: Box<[T]>,
        responsibilities: Vec<Responsibility>,
        parts: Vec<SeqPart>,
        block_indices: Vec<usize>,
    ) -> Self {
        // SAFETY: see the rationale above; `ctx` and `local_buf` outlive
        // `window` by field declaration order.
        let world: &'static SystemCommunicator = unsafe { std::mem::transmute(ctx.world()) };
        let buf: &'static mut [T] = unsafe { std::mem::transmute(&mut local_buf[..]) };
        let window = RemoteWindow::create(world, buf);

        Self { window, local_buf, ctx, responsibilities, parts, block_indices, size }
    }
}

impl<T: Element> Drop for ParallelSequence<T> {
    fn drop(&mut self) {
        let proc_id = self.ctx.proc_id();
        tracing::debug!(proc_id, "parallel sequence dropped");
    }
}

impl<T: Element> Sequence<T> for ParallelSequence<T> {
    fn length(&self) -> usize {
        self.size
    }

    fn transform<F>(&mut self, mapper: F)
    where
        F: Fn(T) -> T + Sync,
    {
        let proc_id = self.ctx.proc_id();
        tracing::debug!(proc_id, "transform");
        let threads = self.ctx.threads_per_proc();
        reduce::transform_in_place(&mut self.local_buf, &mapper, threads);
        self.ctx.barrier();
    }

    fn reduce<F>(&self, combiner: F, init: T) -> T
    where
        F: Fn(T, T) -> T + Sync,
    {
        let proc_id = self.ctx.proc_id();
        tracing::debug!(proc_id, "reduce");
        let threads = self.ctx.threads_per_proc();
        let partial_reduces = self.gather_block_totals(&combiner, threads);
        let total = partial_reduces.iter().fold(init, |acc, &p| combiner(acc, p));
        self.ctx.barrier();
        total
    }

    fn scan<F>(&mut self, combiner: F, init: T)
    where
        F: Fn(T, T) -> T + Sync,
    {
        let proc_id = self.ctx.proc_id();
        tracing::debug!(proc_id, "scan");
        let threads = self.ctx.threads_per_proc();
        let partial_reduces = self.gather_block_totals(&combiner, threads);

        // block_prefix[b] is the combine of `init` with every block's raw
        // total before block b in global order - the external prefix each
        // block's own scan is seeded with.
        let mut block_prefix = vec![init; self.responsibilities.len()];
        for b in 1..self.responsibilities.len() {
            block_prefix[b] = combiner(block_prefix[b - 1], partial_reduces[b - 1]);
        }

        let parts = self.parts.clone();
        let block_indices = self.block_indices.clone();
        for (part, &resp_idx) in parts.iter().zip(block_indices.iter()) {
            let prefix = block_prefix[resp_idx];
            let slice = &mut self.local_buf[part.local_range()];
            reduce::block_scan_in_place(slice, &combiner, prefix, threads);
        }
        self.ctx.barrier();
    }

    fn get(&self, index: usize) -> T {
        let proc_id = self.ctx.proc_id();
        tracing::debug!(proc_id, index, "get");
        let (owner, disp) = window::resolve(index, &self.responsibilities);
        let value = match self.ctx.config().get_protocol {
            GetProtocol::OneSidedWindow => self.window.get(owner, disp),
            GetProtocol::Broadcast => {
                let local_value = if owner == self.ctx.proc_id() {
                    self.local_buf[disp]
                } else {
                    T::default()
                };
                window::broadcast_get(self.ctx.world(), owner, local_value)
            }
        };
        self.ctx.barrier();
        value
    }

    fn set(&mut self, index: usize, value: T) {
        let proc_id = self.ctx.proc_id();
        tracing::debug!(proc_id, index, "set");
        let (owner, disp) = window::resolve(index, &self.responsibilities);
        match self.ctx.config().get_protocol {
            GetProtocol::OneSidedWindow => self.window.set(owner, disp, value),
            GetProtocol::Broadcast => {
                if owner == self.ctx.proc_id() {
                    self.local_buf[disp] = value;
                }
            }
        }
        self.ctx.barrier();
    }

    fn print(&self) {
        for part in &self.parts {
            let slice = &self.local_buf[part.local_range()];
            let line = slice.iter().map(|x| format!("{x} ")).collect::<String>();
            println!("rank {} [{}..{}): {line}", self.ctx.proc_id(), part.start_index, part.start_index + part.num_elements);
        }
        self.ctx.barrier();
    }
}

impl<T: Element> ParallelSequence<T> {
    /// Each owned block's thread-parallel raw total, all-gathered and
    /// re-ordered into global block order - the shared first phase of both
    /// [`Sequence::reduce`] and [`Sequence::scan`].
    fn gather_block_totals<F>(&self, combiner: &F, threads: usize) -> Vec<T>
    where
        F: Fn(T, T) -> T + Sync,
    {
        let my_partials: Vec<T> = self
            .parts
            .iter()
            .map(|part| reduce::block_total(&self.local_buf[part.local_range()], combiner, threads))
            .collect();
        exchange::gather_and_reorder(&self.ctx, &my_partials, &self.responsibilities)
    }
}

/// Filters `responsibilities` down to this rank's own blocks, assigning
/// each a `local_offset` into the concatenated buffer the caller builds
/// (matching [`window::resolve`]'s displacement convention), and returns
/// the parts, their index into `responsibilities`, and the total length.
fn owned_parts(ctx: &ClusterContext, responsibilities: &[Responsibility]) -> (Vec<SeqPart>, Vec<usize>, usize) {
    let mut parts = Vec::new();
    let mut block_indices = Vec::new();
    let mut offset = 0usize;
    for (b, resp) in responsibilities.iter().enumerate() {
        if resp.proc_id == ctx.proc_id() {
            parts.push(SeqPart {
                start_index: resp.start_index,
                local_offset: offset,
                num_elements: resp.num_elements,
            });
            block_indices.push(b);
            offset += resp.num_elements;
        }
    }
    (parts, block_indices, offset)
}
