//! End-to-end tests: producer → queue → worker → raster → reader


use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use test_utils::{argmax, chirp, gaussian_noise};
use xcorrscan::{
    Complex64, ConvolutionWorker, FilterConfig, Job, JobQueue, RasterBuffer, ReferenceKernel,
    WorkerHandle, ENERGY_FLOOR, Z_TOP_EMPTY,
};

fn start(
    config: FilterConfig,
    kernel: ReferenceKernel,
) -> (Arc<JobQueue>, Arc<RasterBuffer>, WorkerHandle) {
    let queue = Arc::new(JobQueue::new());
    let raster = Arc::new(RasterBuffer::new());

    let mut worker = ConvolutionWorker::new(config.with_poll_interval(Duration::from_millis(5)));
    worker.init(kernel).expect("kernel matches buffer size");
    worker.set_data_source(Arc::clone(&queue));
    let handle = worker.spawn(Arc::clone(&raster)).expect("worker spawns");

    (queue, raster, handle)
}

#[test]
fn test_zero_job_with_identity_kernel() {
    let (queue, raster, handle) = start(FilterConfig::new(8, 4), ReferenceKernel::identity(8));
    assert_eq!(raster.rows(), 0);
    assert_eq!(raster.columns(), 0);

    queue.enqueue(Job::new(vec![Complex64::new(0.0, 0.0); 20], 1.0e6));
    let report = handle.shutdown().unwrap();

    assert_eq!(report.jobs_processed, 1);
    assert_eq!(report.guarded_samples, 4);

    let snapshot = raster.lock();
    assert_eq!(snapshot.rows(), 1);
    assert_eq!(snapshot.columns(), 4);
    for x in 0..4 {
        let v = snapshot.value(x, 0).unwrap();
        assert!(v.is_finite());
        assert_eq!(v, ENERGY_FLOOR.log10());
    }
    assert_eq!(snapshot.z_top(), ENERGY_FLOOR.log10());
}

#[test]
fn test_clamped_step_geometry() {
    // step >= size falls back to 1: 20 samples, window 8 -> 13 windows
    let (queue, raster, handle) = start(FilterConfig::new(8, 12), ReferenceKernel::identity(8));
    queue.enqueue(Job::new(gaussian_noise(20, 1.0, 3), 0.0));
    handle.shutdown().unwrap();

    assert_eq!(raster.columns(), 13);
}

#[test]
fn test_rows_arrive_in_enqueue_order() {
    let (queue, raster, handle) = start(FilterConfig::new(16, 8), ReferenceKernel::identity(16));

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..40u64 {
                let samples = gaussian_noise(64, 1.0, i);
                queue.enqueue(Job::new(samples, 100.0e6 + i as f64 * 25.0e3));
                if i % 7 == 0 {
                    thread::sleep(Duration::from_millis(2));
                }
            }
        })
    };
    producer.join().unwrap();

    let report = handle.shutdown().unwrap();
    assert_eq!(report.jobs_processed, 40);

    let snapshot = raster.lock();
    assert_eq!(snapshot.rows(), 40);
    assert_eq!(snapshot.columns(), 7);
    for y in 0..40 {
        let expected = 100.0e6 + y as f64 * 25.0e3;
        assert_eq!(snapshot.frequency(y), Some(expected));
    }
}

#[test]
fn test_reader_sees_consistent_shape_while_worker_appends() {
    let (queue, raster, handle) = start(FilterConfig::new(32, 16), ReferenceKernel::identity(32));

    for i in 0..100u64 {
        queue.enqueue(Job::new(gaussian_noise(256, 0.5, i), i as f64));
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut last_rows = 0;
    while Instant::now() < deadline {
        let snapshot = raster.lock();
        let rows = snapshot.rows();
        let columns = snapshot.columns();
        assert!(rows >= last_rows);
        last_rows = rows;

        if rows > 0 {
            assert_eq!(columns, 15);
            let mut top = Z_TOP_EMPTY;
            for y in 0..rows {
                for x in 0..columns {
                    let v = snapshot.value(x, y).expect("cell within snapshot bounds");
                    assert!(v.is_finite());
                    top = top.max(v);
                }
            }
            assert_eq!(top, snapshot.z_top());
        }
        if rows == 100 {
            break;
        }
        drop(snapshot);
        thread::sleep(Duration::from_millis(1));
    }

    handle.shutdown().unwrap();
    assert_eq!(raster.rows(), 100);
}

#[test]
fn test_matched_filter_finds_chirp_in_noise() {
    let n = 256;
    let step = 64;
    let template = chirp(n / 2);
    let kernel = ReferenceKernel::matched(&template, n).unwrap();
    let (queue, raster, handle) = start(FilterConfig::new(n, step), kernel);

    // Zero lag lines the template up with the start of a window
    let mut samples = gaussian_noise(n * 8, 0.05, 11);
    let offset = 6 * step;
    for (s, t) in samples[offset..].iter_mut().zip(&template) {
        *s += *t;
    }

    queue.enqueue(Job::new(samples, 7.074e6));
    handle.shutdown().unwrap();

    let snapshot = raster.lock();
    let row = snapshot.row(0).unwrap();
    assert_eq!(row.len(), (n * 8 - n) / step + 1);
    assert_eq!(argmax(row), 6, "row: {:?}", row);
    assert_eq!(snapshot.z_top(), row[6]);
}

#[test]
fn test_clear_between_scans() {
    let (queue, raster, handle) = start(FilterConfig::new(8, 4), ReferenceKernel::identity(8));

    queue.enqueue(Job::new(gaussian_noise(20, 1.0, 1), 1.0));
    let deadline = Instant::now() + Duration::from_secs(5);
    while raster.rows() < 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(raster.rows(), 1);

    raster.clear();
    assert_eq!(raster.rows(), 0);
    assert_eq!(raster.z_top(), Z_TOP_EMPTY);

    queue.enqueue(Job::new(gaussian_noise(12, 1.0, 2), 2.0));
    handle.shutdown().unwrap();

    assert_eq!(raster.rows(), 1);
    assert_eq!(raster.columns(), 2);
    assert_eq!(raster.frequency(0), Some(2.0));
}
