//! Collective tests for [`distseq::ParallelSequence`]. These spin up real
//! MPI communication and so only make sense under `mpirun`; `cargo test`
//! alone runs them as a single rank, which exercises the code paths but
//! not the cross-rank exchange they are meant to check. Run for real with:
//!
//! ```sh
//! mpirun -n 4 cargo test --test parallel_sequence -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use distseq::{BlockAssignment, ClusterConfig, ClusterContext, ParallelSequence, Sequence};

fn test_ctx() -> Arc<ClusterContext> {
    let mut config = ClusterConfig::default();
    config.blocks_per_proc = 3;
    config.partition = BlockAssignment::Interleaved;
    ClusterContext::init(config).expect("cluster init")
}

fn plus(a: i64, b: i64) -> i64 {
    a + b
}

#[test]
#[ignore]
fn reduce_matches_closed_form_sum() {
    let ctx = test_ctx();
    let n = 10_000;
    let seq = ParallelSequence::from_generator(ctx, |i| i as i64, n).unwrap();
    let expected = (n as i64 - 1) * n as i64 / 2;
    assert_eq!(seq.reduce(plus, 0), expected);
}

#[test]
#[ignore]
fn scan_last_element_equals_reduce() {
    let ctx = test_ctx();
    let n = 5_000;
    let mut seq = ParallelSequence::from_generator(ctx, |i| i as i64, n).unwrap();
    let total = seq.reduce(plus, 0);
    seq.scan(plus, 0);
    assert_eq!(seq.get(n - 1), total);
}

#[test]
#[ignore]
fn get_after_set_is_visible_from_every_rank() {
    let ctx = test_ctx();
    let n = 2_000;
    let mut seq = ParallelSequence::from_generator(ctx, |_| 0i64, n).unwrap();
    seq.set(n / 2, 99);
    assert_eq!(seq.get(n / 2), 99);
    assert_eq!(seq.get(0), 0);
}

#[test]
#[ignore]
fn transform_then_reduce_matches_squares_sum() {
    let ctx = test_ctx();
    let n = 1_000;
    let mut seq = ParallelSequence::from_generator(ctx, |i| i as i64, n).unwrap();
    seq.transform(|x| x * x);
    let expected: i64 = (0..n as i64).map(|x| x * x).sum();
    assert_eq!(seq.reduce(plus, 0), expected);
}

#[test]
#[ignore]
fn map_to_new_sequence_preserves_length_and_values() {
    let ctx = test_ctx();
    let n = 512;
    let seq = ParallelSequence::from_generator(ctx, |i| i as i64, n).unwrap();
    let doubled = seq.map(|x| x * 2);
    assert_eq!(doubled.length(), n);
    assert_eq!(doubled.reduce(plus, 0), seq.reduce(plus, 0) * 2);
}

#[test]
#[ignore]
fn from_array_round_trips_through_get() {
    let ctx = test_ctx();
    let data: Vec<i64> = (0..777).collect();
    let seq = ParallelSequence::from_array(ctx, &data).unwrap();
    assert_eq!(seq.length(), data.len());
    for &i in &[0usize, 1, 300, 776] {
        assert_eq!(seq.get(i), data[i]);
    }
}
