//! The `Sequence` interface and its two implementations.
//!
//! The natural abstract base here would declare pure-virtual
//! *constructors*, which no language can express, so construction and
//! `map` are inherent methods per concrete type instead of trait methods:
//! [`ParallelSequence::from_generator`] needs a [`crate::ClusterContext`]
//! and a partition policy that [`SerialSequence::from_generator`] has no
//! use for, and `map`'s return type depends on a second generic parameter
//! `S` that a single trait method can't express without generic
//! associated types the rest of this codebase doesn't otherwise reach
//! for.

mod parallel;
mod part;
mod serial;

pub use parallel::ParallelSequence;
pub use part::SeqPart;
pub use serial::SerialSequence;

/// Element types [`ParallelSequence`] can hold: bit-copyable, MPI-transmissible
/// (so collectives and one-sided windows can move them without per-element
/// serialization), and displayable for [`Sequence::print`].
///
/// Blanket-implemented for anything satisfying the bounds, matching the
/// original's template parameter, which it used identically - no explicit
/// impl list to maintain.
pub trait Element: Copy + Default + Send + Sync + std::fmt::Display + mpi::datatype::Equivalence {}

impl<T> Element for T where T: Copy + Default + Send + Sync + std::fmt::Display + mpi::datatype::Equivalence {}

/// Operations common to every sequence backend, all collective when the
/// backend is distributed. Never exposes the backend's internal buffers.
pub trait Sequence<T>: Sized
where
    T: Copy + std::fmt::Display,
{
    /// Number of elements in the logical sequence. Node-local, no
    /// communication.
    fn length(&self) -> usize;

    /// In-place elementwise transform, thread-parallel over owned parts.
    fn transform<F>(&mut self, mapper: F)
    where
        F: Fn(T) -> T + Sync;

    /// Collective reduction; returns an identical value on every rank.
    fn reduce<F>(&self, combiner: F, init: T) -> T
    where
        F: Fn(T, T) -> T + Sync;

    /// Collective in-place inclusive scan seeded by `init`.
    fn scan<F>(&mut self, combiner: F, init: T)
    where
        F: Fn(T, T) -> T + Sync;

    /// Collective read of a single element; returns an identical value on
    /// every rank. Must be called from every rank.
    fn get(&self, index: usize) -> T;

    /// Collective write of a single element. Must be called from every
    /// rank with the same `(index, value)`.
    fn set(&mut self, index: usize, value: T);

    /// Debug dump of this rank's owned data, ending in a barrier.
    fn print(&self);
}
