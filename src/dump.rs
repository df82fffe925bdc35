//! Diagnostic dumps
//!
//! Plain-text traces of what the worker saw and produced, one file per centre
//! frequency. The worker only calls these when built with the `dump-raw` or
//! `dump-fft` features; files are opened in append mode so repeated jobs at
//! the same frequency accumulate.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::filter::FilterResult;
use crate::job::Job;

/// `dumpraw<index>-<MHz>mhz.log`
pub fn raw_dump_path(dir: &Path, index: u32, frequency: f64) -> PathBuf {
    dir.join(format!("dumpraw{}-{:.3}mhz.log", index, frequency / 1e6))
}

/// `dumpfft-<MHz>mhz.log`
pub fn row_dump_path(dir: &Path, frequency: f64) -> PathBuf {
    dir.join(format!("dumpfft-{:.3}mhz.log", frequency / 1e6))
}

/// Append every sample of `job` as a `re im` line.
pub fn write_raw(dir: &Path, job: &Job, index: u32) -> io::Result<PathBuf> {
    let path = raw_dump_path(dir, index, job.frequency());
    let mut out = append(&path)?;
    for s in job.samples() {
        writeln!(out, "{} {}", s.re, s.im)?;
    }
    out.flush()?;
    Ok(path)
}

/// Append every value of `row`, one per line.
pub fn write_row(dir: &Path, row: &FilterResult) -> io::Result<PathBuf> {
    let path = row_dump_path(dir, row.frequency());
    let mut out = append(&path)?;
    for v in row.values() {
        writeln!(out, "{}", v)?;
    }
    out.flush()?;
    Ok(path)
}

fn append(path: &Path) -> io::Result<BufWriter<std::fs::File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::num_complex::Complex64;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("xcorrscan-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("/tmp");
        assert_eq!(
            raw_dump_path(dir, 0, 145.5e6),
            PathBuf::from("/tmp/dumpraw0-145.500mhz.log")
        );
        assert_eq!(
            row_dump_path(dir, 7.0741e6),
            PathBuf::from("/tmp/dumpfft-7.074mhz.log")
        );
    }

    #[test]
    fn test_write_raw_appends() {
        let dir = scratch_dir("raw");
        let job = Job::new(vec![Complex64::new(1.5, -2.0), Complex64::new(0.0, 3.0)], 10e6);

        write_raw(&dir, &job, 0).unwrap();
        let path = write_raw(&dir, &job, 0).unwrap();

        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["1.5 -2", "0 3", "1.5 -2", "0 3"]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_write_row() {
        let dir = scratch_dir("row");
        let row = FilterResult::new(vec![-1.25, 0.5], 3.5e6);

        let path = write_row(&dir, &row).unwrap();
        assert!(path.ends_with("dumpfft-3.500mhz.log"));
        assert_eq!(fs::read_to_string(path).unwrap(), "-1.25\n0.5\n");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = std::env::temp_dir().join("xcorrscan-does-not-exist/nested");
        let row = FilterResult::new(vec![1.0], 1.0);
        assert!(write_row(&dir, &row).is_err());
    }
}
