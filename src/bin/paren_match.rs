//! Balanced-parentheses checker: treats a sequence of `1`/`-1` as open/close
//! parens and reports whether it is balanced, by scan + reduce over both
//! sequence backends, reporting each backend's wall time.

use std::sync::Arc;

use clap::Parser;
use distseq::{ClusterConfig, ClusterContext, ParallelSequence, Result, SerialSequence, Sequence};

#[derive(Parser, Debug)]
#[command(about = "Balanced-parentheses check over distseq sequences")]
struct Args {
    /// Sequence length to test on.
    #[arg(long, default_value_t = 1_000_000)]
    n: usize,
}

/// `data` is balanced iff its running sum never dips below zero and ends at
/// zero - the same scan+reduce shape [`paren_match`] runs distributed.
fn paren_match_fast(data: &[i64]) -> bool {
    let mut cum_sum = 0i64;
    for &x in data {
        cum_sum += x;
        if cum_sum < 0 {
            return false;
        }
    }
    cum_sum == 0
}

fn paren_match<S: Sequence<i64>>(seq: &mut S) -> bool {
    let plus = |a: i64, b: i64| a + b;
    let min = |a: i64, b: i64| a.min(b);

    seq.scan(plus, 0);
    seq.get(seq.length() - 1) == 0 && seq.reduce(min, i64::MAX) >= 0
}

struct Case {
    name: &'static str,
    generator: fn(usize, usize) -> i64,
    expected: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
    let args = Args::parse();

    let config = ClusterConfig::from_env()?;
    let ctx = ClusterContext::init(config)?;
    let n = args.n;

    let cases = [
        Case { name: "()()()()... (balanced, alternating)", generator: |i, _n| if i % 2 == 0 { 1 } else { -1 }, expected: true },
        Case { name: "(((...))) (balanced, nested)", generator: |i, n| if i < n / 2 { 1 } else { -1 }, expected: true },
        Case { name: ")()()()... (unbalanced, leading close)", generator: |i, _n| if i % 2 == 0 { -1 } else { 1 }, expected: false },
        Case { name: ")))...((( (unbalanced, all closes first)", generator: |i, n| if i <= n / 2 { -1 } else { 1 }, expected: false },
    ];

    for case in &cases {
        let generator = case.generator;
        let data: Vec<i64> = (0..n).map(|i| generator(i, n)).collect();

        let start = std::time::Instant::now();
        let rc = paren_match_fast(&data);
        let fast_time = start.elapsed();
        report(&ctx, case.name, "fast serial", rc, case.expected, fast_time);

        let start = std::time::Instant::now();
        let mut serial = SerialSequence::from_array(&data);
        let rc = paren_match(&mut serial);
        let serial_time = start.elapsed();
        report(&ctx, case.name, "sequential", rc, case.expected, serial_time);

        let start = std::time::Instant::now();
        let mut parallel = ParallelSequence::from_generator(ctx.clone(), move |i| generator(i, n), n)?;
        let rc = paren_match(&mut parallel);
        let parallel_time = start.elapsed();
        report(&ctx, case.name, "parallel", rc, case.expected, parallel_time);

        if ctx.proc_id() == 0 {
            println!("  speedup (sequential/parallel): {:.2}x", serial_time.as_secs_f64() / parallel_time.as_secs_f64());
        }
    }

    Ok(())
}

fn report(ctx: &Arc<ClusterContext>, case: &str, label: &str, rc: bool, expected: bool, elapsed: std::time::Duration) {
    if ctx.proc_id() != 0 {
        return;
    }
    let outcome = if rc == expected { "PASS" } else { "FAIL" };
    println!("[{outcome}] {case} ({label}): {elapsed:?}");
}
