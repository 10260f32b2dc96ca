//! Intra-node reducer: thread-parallel partial reduction and scan over a
//! single owned [`crate::sequence::SeqPart`], with cache-line padding on
//! per-thread scratch to avoid false sharing.

use crossbeam_utils::CachePadded;

/// Splits `num_elements` into `threads` contiguous sub-ranges using
/// "equal-split with remainder spread over low-id threads" — the same
/// rule the global partition planner uses for uniform block sizing.
///
/// When `num_elements < threads`, the trailing threads get an empty
/// range; callers must skip those rather than reading `data[range.0]`.
pub fn thread_ranges(num_elements: usize, threads: usize) -> Vec<(usize, usize)> {
    if threads == 0 {
        return Vec::new();
    }
    let base = num_elements / threads;
    let rem = num_elements % threads;
    let mut ranges = Vec::with_capacity(threads);
    let mut start = 0;
    for t in 0..threads {
        let len = base + if t < rem { 1 } else { 0 };
        ranges.push((start, len));
        start += len;
    }
    ranges
}

/// Splits `data` into one disjoint mutable sub-slice per entry of `ranges`,
/// in order. `ranges` must partition `data` exactly (as produced by
/// [`thread_ranges`]).
pub(crate) fn split_disjoint_mut<'a, T>(data: &'a mut [T], ranges: &[(usize, usize)]) -> Vec<&'a mut [T]> {
    let mut rest = data;
    let mut chunks = Vec::with_capacity(ranges.len());
    for &(_, len) in ranges {
        let (chunk, remainder) = rest.split_at_mut(len);
        chunks.push(chunk);
        rest = remainder;
    }
    chunks
}

/// Reduces a single block's data, thread-parallel, and returns one `T`.
/// This is the building block for both the reduce driver and the
/// per-block contribution fed into the inter-node exchange.
pub fn block_total<T, F>(data: &[T], combiner: &F, threads: usize) -> T
where
    T: Copy + Default + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    assert!(!data.is_empty(), "block_total requires at least one element");
    let ranges = thread_ranges(data.len(), threads);
    let active: Vec<(usize, usize)> = ranges.into_iter().filter(|&(_, len)| len > 0).collect();

    let mut partials: Vec<CachePadded<T>> = vec![CachePadded::new(T::default()); active.len()];
    std::thread::scope(|scope| {
        for (slot, &(start, len)) in partials.iter_mut().zip(active.iter()) {
            let slice = &data[start..start + len];
            scope.spawn(move || {
                let mut acc = slice[0];
                for &x in &slice[1..] {
                    acc = combiner(acc, x);
                }
                **slot = acc;
            });
        }
    });

    let mut acc = *partials[0];
    for p in &partials[1..] {
        acc = combiner(acc, **p);
    }
    acc
}

/// Applies an inclusive scan to `data` in place, seeded by an external
/// prefix `init` carried in from blocks before this one in global order,
/// and returns this block's total (to be combined into the running prefix
/// for the next block).
///
/// A parallel partial-reduce pass, a serial prefix-sum over the per-thread
/// partials, then a parallel application pass. The prefix-sum
/// step must fully complete — each `partials[t]` must already be the
/// reduce of threads `[0..=t]` — before any thread starts applying it;
/// `std::thread::scope`'s join between phases is exactly that fence.
pub fn block_scan_in_place<T, F>(data: &mut [T], combiner: &F, init: T, threads: usize) -> T
where
    T: Copy + Default + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    assert!(!data.is_empty(), "block_scan_in_place requires at least one element");
    let ranges = thread_ranges(data.len(), threads);

    let active_count = ranges.iter().filter(|&&(_, len)| len > 0).count();
    let mut partials: Vec<CachePadded<T>> = vec![CachePadded::new(T::default()); active_count];

    // Phase 1: parallel partial reduce, one slot per active thread.
    {
        let mut slot_idx = 0usize;
        std::thread::scope(|scope| {
            for &(start, len) in &ranges {
                if len == 0 {
                    continue;
                }
                let slice = &data[start..start + len];
                let slot = &mut partials[slot_idx];
                slot_idx += 1;
                scope.spawn(move || {
                    let mut acc = slice[0];
                    for &x in &slice[1..] {
                        acc = combiner(acc, x);
                    }
                    **slot = acc;
                });
            }
        });
    }

    // Phase 2: serial prefix-sum over the per-thread partials.
    for t in 1..partials.len() {
        let prev = *partials[t - 1];
        let cur = *partials[t];
        *partials[t] = combiner(prev, cur);
    }
    let block_total = if partials.is_empty() {
        init
    } else {
        *partials[partials.len() - 1]
    };

    // Phase 3: parallel application, each thread seeded by its own prefix.
    let chunks = split_disjoint_mut(data, &ranges);
    std::thread::scope(|scope| {
        let mut active_slot = 0usize;
        for (t, chunk) in chunks.into_iter().enumerate() {
            if chunk.is_empty() {
                continue;
            }
            let prefix = if t == 0 {
                init
            } else {
                combiner(init, *partials[active_slot - 1])
            };
            active_slot += 1;
            scope.spawn(move || {
                chunk[0] = combiner(prefix, chunk[0]);
                for i in 1..chunk.len() {
                    chunk[i] = combiner(chunk[i - 1], chunk[i]);
                }
            });
        }
    });

    block_total
}

/// Thread-parallel in-place elementwise transform over one owned block.
pub fn transform_in_place<T, F>(data: &mut [T], mapper: &F, threads: usize)
where
    T: Copy + Send,
    F: Fn(T) -> T + Sync,
{
    if data.is_empty() {
        return;
    }
    let ranges = thread_ranges(data.len(), threads);
    let chunks = split_disjoint_mut(data, &ranges);
    std::thread::scope(|scope| {
        for chunk in chunks {
            if chunk.is_empty() {
                continue;
            }
            scope.spawn(move || {
                for x in chunk {
                    *x = mapper(*x);
                }
            });
        }
    });
}

/// Thread-parallel map over one owned block into a freshly-tabulated
/// output block of a possibly different element type.
pub fn parallel_map<T, S, F>(data: &[T], mapper: &F, threads: usize) -> Vec<S>
where
    T: Copy + Send + Sync,
    S: Copy + Send + Default,
    F: Fn(T) -> S + Sync,
{
    if data.is_empty() {
        return Vec::new();
    }
    let ranges = thread_ranges(data.len(), threads);
    let mut out = vec![S::default(); data.len()];
    let out_chunks = split_disjoint_mut(&mut out, &ranges);
    std::thread::scope(|scope| {
        for ((start, len), out_chunk) in ranges.iter().zip(out_chunks) {
            if *len == 0 {
                continue;
            }
            let in_chunk = &data[*start..*start + *len];
            scope.spawn(move || {
                for (o, &x) in out_chunk.iter_mut().zip(in_chunk) {
                    *o = mapper(x);
                }
            });
        }
    });
    out
}

/// Thread-parallel generation of one owned block's elements from their
/// global indices, `base` being the block's global start index.
pub fn parallel_tabulate<T, F>(base: usize, num_elements: usize, generator: &F, threads: usize) -> Vec<T>
where
    T: Copy + Send + Default,
    F: Fn(usize) -> T + Sync,
{
    if num_elements == 0 {
        return Vec::new();
    }
    let ranges = thread_ranges(num_elements, threads);
    let mut out = vec![T::default(); num_elements];
    let out_chunks = split_disjoint_mut(&mut out, &ranges);
    std::thread::scope(|scope| {
        for ((start, len), out_chunk) in ranges.iter().zip(out_chunks) {
            if *len == 0 {
                continue;
            }
            let start = *start;
            scope.spawn(move || {
                for (i, o) in out_chunk.iter_mut().enumerate() {
                    *o = generator(base + start + i);
                }
            });
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus(a: i64, b: i64) -> i64 {
        a + b
    }

    #[test]
    fn thread_ranges_cover_all_elements_in_order() {
        let ranges = thread_ranges(10, 3);
        assert_eq!(ranges, vec![(0, 4), (4, 3), (7, 3)]);
    }

    #[test]
    fn thread_ranges_tolerates_more_threads_than_elements() {
        let ranges = thread_ranges(2, 4);
        assert_eq!(ranges, vec![(0, 1), (1, 1), (2, 0), (2, 0)]);
    }

    #[test]
    fn block_total_matches_serial_fold() {
        let data: Vec<i64> = (0..97).collect();
        let expected = data.iter().skip(1).fold(data[0], |a, &b| plus(a, b));
        assert_eq!(block_total(&data, &plus, 4), expected);
    }

    #[test]
    fn block_total_with_fewer_elements_than_threads() {
        let data = vec![5i64, 9i64];
        assert_eq!(block_total(&data, &plus, 8), 14);
    }

    #[test]
    fn block_scan_matches_serial_scan() {
        let mut data: Vec<i64> = (0..50).collect();
        let init = 7i64;
        let total = block_scan_in_place(&mut data, &plus, init, 4);

        let mut expected: Vec<i64> = (0..50).collect();
        expected[0] = plus(init, expected[0]);
        for i in 1..expected.len() {
            expected[i] = plus(expected[i - 1], expected[i]);
        }
        assert_eq!(data, expected);

        // the returned total is the unseeded block reduce, not the scanned last element
        let raw_total = block_total(&(0..50i64).collect::<Vec<_>>(), &plus, 4);
        assert_eq!(total, raw_total);
    }

    #[test]
    fn block_scan_single_element() {
        let mut data = vec![3i64];
        let total = block_scan_in_place(&mut data, &plus, 10, 4);
        assert_eq!(data, vec![13]);
        assert_eq!(total, 3);
    }

    #[test]
    fn transform_in_place_squares_every_element() {
        let mut data: Vec<i64> = (0..37).collect();
        transform_in_place(&mut data, &|x| x * x, 5);
        let expected: Vec<i64> = (0..37).map(|x: i64| x * x).collect();
        assert_eq!(data, expected);
    }

    #[test]
    fn transform_in_place_handles_empty_block() {
        let mut data: Vec<i64> = Vec::new();
        transform_in_place(&mut data, &|x| x + 1, 4);
        assert!(data.is_empty());
    }

    #[test]
    fn parallel_map_preserves_order_across_type_change() {
        let data: Vec<i64> = (0..41).collect();
        let out = parallel_map(&data, &|x: i64| format!("{x}").len() as i64, 6);
        let expected: Vec<i64> = data.iter().map(|x| format!("{x}").len() as i64).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn parallel_tabulate_matches_serial_generator_with_base_offset() {
        let out = parallel_tabulate(100, 23, &|i: usize| (i * 2) as i64, 4);
        let expected: Vec<i64> = (100..123).map(|i| (i * 2) as i64).collect();
        assert_eq!(out, expected);
    }
}
