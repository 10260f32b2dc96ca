//! Mandelbrot set renderer: tabulates escape-iteration counts over a pixel
//! grid using both sequence backends and reports the minimum of several
//! timed runs, the classic workload this library's design notes point to
//! for demonstrating distributed tabulate/transform speedup.

use clap::Parser;
use distseq::{ClusterConfig, ClusterContext, ParallelSequence, Result, SerialSequence, Sequence};

#[derive(Parser, Debug)]
#[command(about = "Mandelbrot set render benchmark over distseq sequences")]
struct Args {
    #[arg(long, default_value_t = 1200)]
    width: usize,
    #[arg(long, default_value_t = 800)]
    height: usize,
    #[arg(long, default_value_t = 256)]
    max_iters: u32,
    /// Timed runs per backend; the minimum is reported.
    #[arg(long, default_value_t = 3)]
    runs: u32,
}

/// Escape-time iteration count for one complex-plane point, taken directly
/// from the reference mandelbrot kernel this benchmark exists to exercise.
fn mandel(c_re: f32, c_im: f32, max_iters: u32) -> i64 {
    let (mut z_re, mut z_im) = (c_re, c_im);
    let mut i = 0;
    while i < max_iters {
        if z_re * z_re + z_im * z_im > 4.0 {
            break;
        }
        let new_re = z_re * z_re - z_im * z_im;
        let new_im = 2.0 * z_re * z_im;
        z_re = c_re + new_re;
        z_im = c_im + new_im;
        i += 1;
    }
    i as i64
}

/// Maps a flat pixel index in `[0, width*height)` to its escape count over
/// the complex-plane window `(x0, y0)..(x1, y1)`.
fn pixel_generator(x0: f32, y0: f32, x1: f32, y1: f32, width: usize, height: usize, max_iters: u32) -> impl Fn(usize) -> i64 {
    let dx = (x1 - x0) / width as f32;
    let dy = (y1 - y0) / height as f32;
    move |i: usize| {
        let row = (i / width) as f32;
        let col = (i % width) as f32;
        mandel(x0 + col * dx, y0 + row * dy, max_iters)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
    let args = Args::parse();

    let config = ClusterConfig::from_env()?;
    let ctx = ClusterContext::init(config)?;

    let (x0, y0, x1, y1) = (-2.0f32, -1.0f32, 1.0f32, 1.0f32);
    let n = args.width * args.height;
    let generator = pixel_generator(x0, y0, x1, y1, args.width, args.height, args.max_iters);

    let mut min_serial = std::time::Duration::MAX;
    for _ in 0..args.runs {
        let start = std::time::Instant::now();
        let seq = SerialSequence::from_generator(&generator, n);
        std::hint::black_box(&seq);
        min_serial = min_serial.min(start.elapsed());
    }

    let mut min_parallel = std::time::Duration::MAX;
    for _ in 0..args.runs {
        let start = std::time::Instant::now();
        let seq = ParallelSequence::from_generator(ctx.clone(), &generator, n)?;
        std::hint::black_box(&seq);
        min_parallel = min_parallel.min(start.elapsed());
    }

    if ctx.proc_id() == 0 {
        println!("mandelbrot {}x{}, {} iters, {} procs", args.width, args.height, args.max_iters, ctx.procs());
        println!("  min serial:   {min_serial:?}");
        println!("  min parallel: {min_parallel:?}");
        println!("  speedup:      {:.2}x", min_serial.as_secs_f64() / min_parallel.as_secs_f64());
    }

    Ok(())
}
