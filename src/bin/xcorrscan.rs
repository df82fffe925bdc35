//! Matched-filter raster scanner
//!
//! Feeds an IQ recording (or a synthetic chirp train) through the job queue,
//! convolution worker and raster, then prints a summary of the raster.
//!
//! **Usage**:
//! ```bash
//! cargo run --bin xcorrscan -- [input.wav]
//! ```
//!
//! The WAV must be stereo: left channel I, right channel Q. Without an input
//! file a noisy signal with embedded chirps is generated.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use snafu::{ResultExt, Snafu};
use tracing::info;

use xcorrscan::tracing_init::init_tracing;
use xcorrscan::{
    Complex64, ConvolutionWorker, FilterConfig, FilterError, Job, JobQueue, KernelError,
    RasterBuffer, ReferenceKernel,
};

const BUFFER_SIZE: usize = 1024;
const BUFFER_STEP: usize = 256;
const TEMPLATE_LEN: usize = 256;
const JOB_LEN: usize = 16 * 1024;
const SYNTH_JOBS: usize = 24;
const START_FREQUENCY_HZ: f64 = 144.0e6;
const FREQUENCY_STEP_HZ: f64 = 100.0e3;

#[derive(Debug, Snafu)]
enum ScanError {
    #[snafu(display("failed to read WAV file '{path}'"))]
    Wav { path: String, source: hound::Error },

    #[snafu(display("expected a stereo IQ recording, got {channels} channel(s)"))]
    Layout { channels: u16 },

    #[snafu(display("invalid noise distribution"))]
    Noise { source: rand_distr::NormalError },

    #[snafu(display("could not build reference kernel"))]
    Kernel { source: KernelError },

    #[snafu(display("worker failed"))]
    Worker { source: FilterError },
}

/// Read an interleaved I/Q WAV into complex samples in [-1, 1]
fn read_iq_wav(path: &str) -> Result<Vec<Complex64>, ScanError> {
    let mut reader = hound::WavReader::open(path).context(WavSnafu { path })?;
    let spec = reader.spec();

    if spec.channels != 2 {
        return Err(ScanError::Layout {
            channels: spec.channels,
        });
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<Result<_, _>>()
                .context(WavSnafu { path })?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()
            .context(WavSnafu { path })?,
    };

    Ok(interleaved
        .chunks_exact(2)
        .map(|iq| Complex64::new(iq[0], iq[1]))
        .collect())
}

/// Linear chirp sweeping a quarter of the band over `len` samples
fn chirp(len: usize) -> Vec<Complex64> {
    let rate = 0.25 / len as f64;
    (0..len)
        .map(|i| {
            let t = i as f64;
            Complex64::from_polar(1.0, std::f64::consts::PI * rate * t * t)
        })
        .collect()
}

/// Gaussian noise with a chirp dropped into every third job at a varying offset
fn synthesize(jobs: usize, template: &[Complex64]) -> Result<Vec<Complex64>, ScanError> {
    let mut rng = StdRng::seed_from_u64(0x5ca9);
    let noise = Normal::new(0.0, 0.3).context(NoiseSnafu)?;

    let mut samples: Vec<Complex64> = (0..jobs * JOB_LEN)
        .map(|_| Complex64::new(rng.sample(noise), rng.sample(noise)))
        .collect();

    for job in (0..jobs).step_by(3) {
        let offset = job * JOB_LEN + rng.random_range(0..JOB_LEN - template.len());
        for (s, t) in samples[offset..].iter_mut().zip(template) {
            *s += *t;
        }
    }

    Ok(samples)
}

fn run(input: Option<&str>) -> Result<(), ScanError> {
    let template = chirp(TEMPLATE_LEN);
    let samples = match input {
        Some(path) => {
            info!(path, "reading IQ recording");
            read_iq_wav(path)?
        }
        None => {
            info!(jobs = SYNTH_JOBS, "synthesizing chirp train");
            synthesize(SYNTH_JOBS, &template)?
        }
    };

    let kernel = ReferenceKernel::matched(&template, BUFFER_SIZE).context(KernelSnafu)?;
    let config = FilterConfig::new(BUFFER_SIZE, BUFFER_STEP)
        .with_poll_interval(Duration::from_millis(10));

    let queue = Arc::new(JobQueue::new());
    let raster = Arc::new(RasterBuffer::new());

    let mut worker = ConvolutionWorker::new(config);
    worker.init(kernel).context(WorkerSnafu)?;
    worker.set_data_source(Arc::clone(&queue));
    let handle = worker.spawn(Arc::clone(&raster)).context(WorkerSnafu)?;

    for (i, block) in samples.chunks(JOB_LEN).enumerate() {
        let frequency = START_FREQUENCY_HZ + i as f64 * FREQUENCY_STEP_HZ;
        queue.enqueue(Job::new(block.to_vec(), frequency));
    }

    let report = handle.shutdown().context(WorkerSnafu)?;

    println!();
    println!("Processed {} job(s), skipped {}", report.jobs_processed, report.jobs_skipped);
    if report.guarded_samples > 0 {
        println!("  {} value(s) hit the energy floor", report.guarded_samples);
    }

    let snapshot = raster.lock();
    println!(
        "Raster: {} row(s) x {} column(s), zTop = {:.3}",
        snapshot.rows(),
        snapshot.columns(),
        snapshot.z_top()
    );
    println!();

    for y in 0..snapshot.rows() {
        let Some(row) = snapshot.row(y) else { continue };
        let peak = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(x, v)| (x, *v));
        let frequency = snapshot.frequency(y).unwrap_or_default();
        if let Some((x, value)) = peak {
            println!(
                "  {:9.3} MHz  peak {:7.3} at window {:3} (zTop {:+.3})",
                frequency / 1e6,
                value,
                x,
                value - snapshot.z_top()
            );
        }
    }

    Ok(())
}

fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [input.wav]", args[0]);
        eprintln!();
        eprintln!("Matched-filters a stereo IQ recording (I = left, Q = right).");
        std::process::exit(1);
    }

    if let Err(e) = run(args.get(1).map(String::as_str)) {
        eprintln!("Error: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
