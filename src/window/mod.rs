//! Remote window: one-sided access to every node's owned part buffers, via
//! `mpi`'s RMA window support bracketed by fences.
//!
//! This is the only cross-node data path for [`crate::Sequence::get`]/
//! [`crate::Sequence::set`] inside the core — not a point-to-point
//! send/recv, a one-sided memory-window read/write via
//! `MPI_Win_create`/`MPI_Get`/`MPI_Put`/`MPI_Win_fence`.

use mpi::datatype::Equivalence;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;
use mpi::window::WindowCreate;

use crate::partition::Responsibility;

/// Resolves a global element index to its owning rank and displacement
/// within that rank's window.
///
/// An owner's window covers its owned blocks concatenated in
/// `responsibilities` order (the same order [`crate::sequence::parallel`]
/// builds its local buffer in), so the displacement is not
/// `index - block.start_index` alone - it must also add the element
/// counts of every earlier block the same owner holds.
pub fn resolve(index: usize, responsibilities: &[Responsibility]) -> (i32, usize) {
    let block_idx = responsibilities
        .iter()
        .position(|r| index >= r.start_index && index < r.start_index + r.num_elements)
        .unwrap_or_else(|| panic!("index {index} not covered by any responsibility - partition is malformed"));

    let resp = responsibilities[block_idx];
    let preceding_owned: usize = responsibilities[..block_idx]
        .iter()
        .filter(|r| r.proc_id == resp.proc_id)
        .map(|r| r.num_elements)
        .sum();

    (resp.proc_id, preceding_owned + (index - resp.start_index))
}

/// A one-sided RMA window over this rank's concatenated owned-part
/// buffer. Registered once at construction, freed at destruction, each
/// bracketed by a fence - the only remote-memory path in the core.
pub struct RemoteWindow<'a, T: Equivalence> {
    window: mpi::window::Window<'a, T>,
}

impl<'a, T: Equivalence + Copy + Default> RemoteWindow<'a, T> {
    /// Collectively registers `local_buf` (this rank's concatenated owned
    /// parts) for one-sided access by every other rank.
    pub fn create(world: &'a SystemCommunicator, local_buf: &'a mut [T]) -> Self {
        // SAFETY: `local_buf` outlives the window (tied to `'a`), and every
        // rank calls `create` with the same communicator at the same point
        // in program order, satisfying MPI's collective window-creation
        // requirement.
        let window = unsafe { SystemCommunicator::window_create(world, local_buf) };
        window.fence(0);
        Self { window }
    }

    /// Fenced one-sided read from `owner`'s window at element
    /// displacement `disp`: issues the read, then fences to complete it.
    pub fn get(&self, owner: i32, disp: usize) -> T {
        let mut value = T::default();
        // SAFETY: the preceding and following fence bracket this RMA
        // operation, so no other rank observes a torn read/write.
        unsafe {
            self.window.process(owner).get(&mut value, disp as i32);
        }
        self.window.fence(0);
        value
    }

    /// Fenced one-sided write, symmetric with [`RemoteWindow::get`].
    pub fn set(&self, owner: i32, disp: usize, value: T) {
        // SAFETY: see `get` - the RMA op is bracketed by fences.
        unsafe {
            self.window.process(owner).put(&value, disp as i32);
        }
        self.window.fence(0);
    }

    /// Re-arms the window for a fresh round of one-sided traffic. Callers
    /// that batch several `get`/`set` calls without an intervening fence
    /// elsewhere must call this first.
    pub fn fence(&self) {
        self.window.fence(0);
    }
}

impl<'a, T: Equivalence> Drop for RemoteWindow<'a, T> {
    fn drop(&mut self) {
        self.window.fence(0);
    }
}

/// A simpler alternative `get` contract: rank `owner` broadcasts the value
/// to everyone. Invariant to which rank calls `get`, at the cost of a
/// collective broadcast instead of a one-sided read.
pub fn broadcast_get<T: Equivalence + Copy>(
    world: &SystemCommunicator,
    owner: i32,
    value_if_owner: T,
) -> T {
    let mut buf = value_if_owner;
    world.process_at_rank(owner).broadcast_into(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(proc_id: i32, start: usize, len: usize) -> Responsibility {
        Responsibility { proc_id, start_index: start, num_elements: len }
    }

    #[test]
    fn resolve_finds_owning_block_and_local_displacement() {
        let responsibilities = vec![resp(0, 0, 10), resp(1, 10, 10), resp(0, 20, 5)];
        assert_eq!(resolve(0, &responsibilities), (0, 0));
        assert_eq!(resolve(9, &responsibilities), (0, 9));
        assert_eq!(resolve(10, &responsibilities), (1, 0));
        // index 22 falls in rank 0's second block, which sits after its
        // first 10-element block in rank 0's concatenated window buffer.
        assert_eq!(resolve(22, &responsibilities), (0, 12));
    }
}
