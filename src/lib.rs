//! # distseq — distributed, hybrid-parallel sequence library
//!
//! A [`Sequence`] is a large ordered collection of elements, partitioned
//! into contiguous blocks across a cluster of MPI ranks and, within each
//! rank, across a fixed-size thread pool. A small set of bulk-parallel
//! primitives (tabulate, transform, map, reduce, scan, get, set) operate
//! collectively over the whole distributed sequence.
//!
//! [`ParallelSequence`] is the distributed implementation: blocks are
//! assigned by [`partition::PartitionPlanner`], intra-node reduce/scan is
//! thread-parallel ([`reduce`]), and cross-node communication is a
//! collective all-gather followed by a one-sided remote-window protocol
//! for [`Sequence::get`]/[`Sequence::set`]. [`SerialSequence`] implements
//! the identical surface on a single thread for correctness comparison.

pub mod cluster;
pub mod exchange;
pub mod partition;
pub mod reduce;
pub mod sequence;
pub mod util;
pub mod window;

pub use cluster::{ClusterConfig, ClusterContext};
pub use partition::{BlockAssignment, BlockSizing, Responsibility};
pub use sequence::{ParallelSequence, SerialSequence, Sequence};

/// Top-level error type for every fallible operation in this crate.
///
/// Follows the taxonomy in the library's design notes: partition planning,
/// local-only index errors, and resource exhaustion are all represented;
/// collective-argument mismatch across ranks is deliberately *not* a
/// variant here, because the collective layer cannot detect it — see the
/// doc comments on [`Sequence::get`]/[`Sequence::set`].
#[derive(thiserror::Error, Debug)]
pub enum DistseqError {
    /// A block in the computed [`Responsibility`] table would hold fewer
    /// than one element. `size < total_blocks` is the usual cause.
    #[error("partition invalid: block {block} would hold {num_elements} elements (need >= 1)")]
    PartitionInvalid { block: usize, num_elements: i64 },

    /// `get`/`set` resolved to a local fast path but the index is not
    /// actually owned by this rank.
    #[error("index {index} is not local to rank {proc_id}")]
    IndexNotLocal { index: usize, proc_id: i32 },

    /// Allocation of a part buffer or window failed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("MPI error: {0}")]
    Mpi(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DistseqError>;
