//! Partition planner: computes the global [`Responsibility`] table mapping
//! each block to its owning rank, start index, and element count.
//!
//! Every rank must compute an identical table - the randomized shuffle
//! achieves this by broadcasting its seed from rank 0 before any rank
//! draws from its RNG.

use mpi::traits::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::cluster::{ClusterConfig, ClusterContext, PartitionMode};
use crate::{DistseqError, Result};

/// One block of the logical sequence: who owns it, and its global range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Responsibility {
    pub proc_id: i32,
    pub start_index: usize,
    pub num_elements: usize,
}

/// Block size assignment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSizing {
    Uniform,
    /// Biases block size by the owning node's measured speed weight.
    Adjusted,
}

impl Default for BlockSizing {
    fn default() -> Self {
        BlockSizing::Adjusted
    }
}

pub use crate::cluster::PartitionMode as BlockAssignment;

/// Computes the [`Responsibility`] table for a sequence of length `size`.
///
/// Identical on every rank given the same `ctx` and `size` — callers must
/// invoke this at the same point in program order on every rank (it is
/// itself collective only when [`BlockAssignment::Randomized`] needs the
/// broadcast seed; [`BlockAssignment::Interleaved`] with
/// [`BlockSizing::Uniform`] requires no communication at all).
pub struct PartitionPlanner;

impl PartitionPlanner {
    pub fn plan(ctx: &ClusterContext, size: usize, sizing: BlockSizing) -> Result<Vec<Responsibility>> {
        let total_blocks = ctx.total_blocks();

        if size < total_blocks {
            tracing::warn!(size, total_blocks, "sequence too small to give every block an element");
            return Err(DistseqError::PartitionInvalid {
                block: total_blocks,
                num_elements: (size / total_blocks.max(1)) as i64,
            });
        }

        let mut part_to_node = interleaved_assignment(total_blocks, ctx.procs());

        if ctx.config().partition == PartitionMode::Randomized {
            shuffle_assignment(&mut part_to_node, ctx);
        }

        let sizes = match sizing {
            BlockSizing::Uniform => uniform_sizes(size, total_blocks),
            BlockSizing::Adjusted => adjusted_sizes(size, total_blocks, ctx.blocks_per_proc(), &part_to_node, ctx.proc_times(), ctx.system_time()),
        };

        let mut responsibilities = Vec::with_capacity(total_blocks);
        let mut cur_start = 0usize;
        for (block, &num_elements) in sizes.iter().enumerate() {
            if num_elements < 1 {
                tracing::warn!(block, num_elements, "partition would assign < 1 element to a block");
                return Err(DistseqError::PartitionInvalid {
                    block,
                    num_elements: num_elements as i64,
                });
            }
            responsibilities.push(Responsibility {
                proc_id: part_to_node[block],
                start_index: cur_start,
                num_elements,
            });
            cur_start += num_elements;
        }

        debug_assert_eq!(cur_start, size, "responsibility table must cover [0, size)");
        Ok(responsibilities)
    }
}

fn interleaved_assignment(total_blocks: usize, procs: i32) -> Vec<i32> {
    (0..total_blocks).map(|b| (b as i32) % procs).collect()
}

/// Fisher–Yates shuffle seeded identically on every rank: rank 0 draws a
/// seed, broadcasts it, and every rank runs the same deterministic PRNG
/// over the same starting assignment. Never relies on any platform RNG -
/// only `rand`'s `SmallRng`, so the permutation is identical across ranks
/// regardless of OS or libc.
fn shuffle_assignment(assignment: &mut [i32], ctx: &ClusterContext) {
    let mut seed_buf = [0u8; 8];
    if ctx.proc_id() == 0 {
        let seed: u64 = rand::thread_rng().gen();
        seed_buf = seed.to_le_bytes();
    }
    ctx.world().process_at_rank(0).broadcast_into(&mut seed_buf);
    let seed = u64::from_le_bytes(seed_buf);

    let mut rng = SmallRng::seed_from_u64(seed);
    for i in (1..assignment.len()).rev() {
        let j = rng.gen_range(0..=i);
        assignment.swap(i, j);
    }
}

fn uniform_sizes(size: usize, total_blocks: usize) -> Vec<usize> {
    let block_size = size / total_blocks;
    let leftover = size % total_blocks;
    (0..total_blocks)
        .map(|b| if b < leftover { block_size + 1 } else { block_size })
        .collect()
}

/// Block `b` owned by node `p` is tentatively sized
/// `floor(proc_times[p] * size / (blocks_per_proc * system_time))`, clamped
/// to >= 1; the residual is then spread round-robin over subsequent blocks.
/// This exact formula, including the round-robin residual step, must be
/// preserved bit-for-bit - callers compare speedup across backends against
/// it.
fn adjusted_sizes(
    size: usize,
    total_blocks: usize,
    blocks_per_proc: usize,
    part_to_node: &[i32],
    proc_times: &[i64],
    system_time: i64,
) -> Vec<usize> {
    let mut sizes: Vec<i64> = part_to_node
        .iter()
        .map(|&p| {
            let t = proc_times[p as usize];
            let tentative = (t as i128 * size as i128) / (blocks_per_proc as i128 * system_time as i128);
            (tentative as i64).max(1)
        })
        .collect();

    let total: i64 = sizes.iter().sum();
    let mut residual = size as i64 - total;

    let mut b = 0usize;
    while residual != 0 && total_blocks > 0 {
        let idx = b % total_blocks;
        if residual > 0 {
            sizes[idx] += 1;
            residual -= 1;
        } else if sizes[idx] > 1 {
            sizes[idx] -= 1;
            residual += 1;
        }
        b += 1;
    }

    sizes.into_iter().map(|s| s as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_cover_exactly_size() {
        let sizes = uniform_sizes(103, 10);
        assert_eq!(sizes.iter().sum::<usize>(), 103);
        assert_eq!(sizes.iter().filter(|&&s| s == 11).count(), 3);
        assert_eq!(sizes.iter().filter(|&&s| s == 10).count(), 7);
    }

    #[test]
    fn uniform_sizes_exact_division() {
        let sizes = uniform_sizes(100, 10);
        assert!(sizes.iter().all(|&s| s == 10));
    }

    #[test]
    fn adjusted_sizes_sum_to_size_and_favor_the_faster_node() {
        // 2 procs, 2 blocks each => 4 blocks. proc_times[0] = 30, proc_times[1] = 10.
        let part_to_node = vec![0, 1, 0, 1];
        let proc_times = vec![30i64, 10i64];
        let system_time = 40i64;
        let sizes = adjusted_sizes(1000, 4, 2, &part_to_node, &proc_times, system_time);
        assert_eq!(sizes.iter().sum::<usize>(), 1000);
        // proc_times[p] * size / (blocks_per_proc * system_time): the node with the
        // larger proc_times value gets proportionally more elements, not fewer - the
        // formula is preserved exactly even though it reads backwards from
        // "larger proc_times = slower".
        let proc0_total: usize = sizes[0] + sizes[2];
        let proc1_total: usize = sizes[1] + sizes[3];
        assert!(proc0_total > proc1_total);
    }

    #[test]
    fn adjusted_sizes_terminates_at_minimum_feasible_size() {
        // With equal proc_times every tentative size floors to 0 and clamps
        // to 1, so the residual loop must claw back (total_blocks - size)
        // worth of excess. At size == total_blocks that excess is zero, the
        // boundary `PartitionPlanner::plan` guards against going below.
        let part_to_node = vec![0, 1, 0, 1];
        let proc_times = vec![10i64, 10i64];
        let system_time = 20i64;
        let sizes = adjusted_sizes(4, 4, 2, &part_to_node, &proc_times, system_time);
        assert_eq!(sizes.iter().sum::<usize>(), 4);
        assert!(sizes.iter().all(|&s| s >= 1));
    }

    #[test]
    fn interleaved_assignment_round_robins() {
        let a = interleaved_assignment(6, 3);
        assert_eq!(a, vec![0, 1, 2, 0, 1, 2]);
    }
}
