//! Inter-node exchange: all-gather of each node's per-block partial
//! reductions, followed by a re-order into global block order.
//!
//! Every node contributes exactly `blocks_per_proc` values (one per owned
//! block, in owner order), so this is a fixed-count all-gather rather than
//! a variable-count one — `blocks_per_proc` is identical on every rank by
//! construction, a [`ClusterContext`] invariant.

use mpi::datatype::Equivalence;
use mpi::traits::*;

use crate::cluster::ClusterContext;
use crate::partition::Responsibility;

/// Gathers `my_partials` (this rank's per-owned-block reductions, in owner
/// order) from every rank and returns `partial_reduces[totalBlocks]`
/// ordered by global block index.
pub fn gather_and_reorder<T>(
    ctx: &ClusterContext,
    my_partials: &[T],
    responsibilities: &[Responsibility],
) -> Vec<T>
where
    T: Copy + Default + Equivalence,
{
    let blocks_per_proc = ctx.blocks_per_proc();
    debug_assert_eq!(my_partials.len(), blocks_per_proc);

    let mut recv = vec![T::default(); blocks_per_proc * ctx.procs() as usize];
    ctx.world().all_gather_into(my_partials, &mut recv[..]);

    let mut count_so_far = vec![0usize; ctx.procs() as usize];
    let mut partial_reduces = vec![T::default(); responsibilities.len()];
    for (b, resp) in responsibilities.iter().enumerate() {
        let p = resp.proc_id as usize;
        let slot = p * blocks_per_proc + count_so_far[p];
        partial_reduces[b] = recv[slot];
        count_so_far[p] += 1;
    }

    partial_reduces
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pure re-order logic, independent of the MPI all-gather itself:
    /// simulates a 2-rank/2-block-per-proc cluster's already-received
    /// buffer and checks the walk-and-reorder step.
    #[test]
    fn reorder_walk_matches_owner_order() {
        let responsibilities = vec![
            Responsibility { proc_id: 1, start_index: 0, num_elements: 5 },
            Responsibility { proc_id: 0, start_index: 5, num_elements: 5 },
            Responsibility { proc_id: 1, start_index: 10, num_elements: 5 },
            Responsibility { proc_id: 0, start_index: 15, num_elements: 5 },
        ];
        // recv is [rank0's blocks..., rank1's blocks...] = [100, 101, 200, 201]
        let recv = vec![100i64, 101, 200, 201];
        let blocks_per_proc = 2usize;
        let procs = 2usize;

        let mut count_so_far = vec![0usize; procs];
        let mut partial_reduces = vec![0i64; responsibilities.len()];
        for (b, resp) in responsibilities.iter().enumerate() {
            let p = resp.proc_id as usize;
            let slot = p * blocks_per_proc + count_so_far[p];
            partial_reduces[b] = recv[slot];
            count_so_far[p] += 1;
        }

        assert_eq!(partial_reduces, vec![200, 100, 201, 101]);
    }
}
