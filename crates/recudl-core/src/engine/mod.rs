//! Segment fetch/mux engine: streams one manifest into one output file.
//!
//! Segments are fetched strictly in manifest order and appended to a file
//! owned exclusively by this run; there are no concurrent writes. A failed
//! run reports the index it stopped at so the caller can resume later by
//! passing that index back as the start offset.

mod output;

pub use output::OUTPUT_EXT;

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::control::AbortFlag;
use crate::error::DlError;
use crate::manifest::Manifest;
use crate::progress::{format_bytes_per_second, MuxProgress, SpeedTracker};
use crate::retry::{fetch_with_retry, FetchPolicy};
use crate::target::PercentRange;

/// Terminal failure of one mux run, carrying how far through the manifest
/// the run got.
#[derive(Debug, Error)]
#[error("{source}\nfailed at {percent:.2}%")]
pub struct MuxError {
    pub percent: f64,
    #[source]
    pub source: DlError,
}

impl MuxError {
    fn new(percent: f64, source: DlError) -> Self {
        Self { percent, source }
    }
}

/// Downloads the manifest's segments in `[start, end)` of the percentage
/// window into `<output_name>.ts` under `download_dir`, appending when
/// `start_index` continues a prior run.
///
/// Returns the index to resume from on failure; 0 means nothing to resume
/// (full success). `manifest.output_name` is updated in place when a
/// filename collision forces a rename.
pub fn run(
    manifest: &mut Manifest,
    headers: &HashMap<String, String>,
    start_index: usize,
    range: PercentRange,
    download_dir: &Path,
    abort: &AbortFlag,
    progress: Option<&mpsc::Sender<MuxProgress>>,
) -> (usize, Result<(), MuxError>) {
    if abort.is_set() {
        return (start_index, Err(MuxError::new(0.0, DlError::Cancelled)));
    }
    if range.start > 100.0 || range.end <= range.start {
        return (
            start_index,
            Err(MuxError::new(0.0, DlError::validation("duration format error"))),
        );
    }
    let range = PercentRange {
        start: range.start.max(0.0),
        end: range.end.min(100.0),
    };

    // Continuation appends to the prior run's file; a missing file falls
    // back to a fresh create (with collision rename).
    let mut file = None;
    if start_index != 0 {
        match output::open_continuation(download_dir, &manifest.output_name) {
            Ok(f) => file = Some(f),
            Err(e) => {
                tracing::warn!("original file not found, creating new one: {e}");
            }
        }
    }
    let mut file = match file {
        Some(f) => f,
        None => match output::create_fresh(download_dir, &manifest.output_name) {
            Ok((name, f)) => {
                manifest.output_name = name;
                f
            }
            Err(e) => {
                return (
                    start_index,
                    Err(MuxError::new(0.0, DlError::Io(e))),
                );
            }
        },
    };

    let total = manifest.len();
    let start = if start_index == 0 {
        (total as f64 * range.start / 100.0) as usize
    } else {
        start_index
    };
    let end = (total as f64 * range.end / 100.0) as usize;
    if end <= start {
        return (
            start,
            Err(MuxError::new(
                percent_of(start, total),
                DlError::validation("no segments to download"),
            )),
        );
    }

    let policy = FetchPolicy::segment();
    let mut tracker = SpeedTracker::new();
    tracing::info!(
        segments = end - start,
        "downloading {}.{}",
        manifest.output_name,
        OUTPUT_EXT
    );

    for (completed, i) in (start..end).enumerate() {
        if abort.is_set() {
            return (i, Err(MuxError::new(percent_of(i, total), DlError::Cancelled)));
        }
        let begun = Instant::now();
        let chunk = match fetch_with_retry(&manifest.segments[i], headers, &policy) {
            Ok(chunk) => chunk,
            Err(e) => return (i, Err(MuxError::new(percent_of(i, total), e))),
        };
        if let Err(e) = file.write_all(&chunk) {
            return (i, Err(MuxError::new(percent_of(i, total), DlError::Io(e))));
        }
        tracker.record(begun.elapsed(), chunk.len() as u64);
        let rate = tracker.bytes_per_sec();
        if let Some(tx) = progress {
            let _ = tx.try_send(MuxProgress {
                output_name: manifest.output_name.clone(),
                completed: completed + 1,
                total: end - start,
                bytes_per_sec: rate,
            });
        }
        tracing::debug!(
            segment = i,
            rate = %format_bytes_per_second(rate),
            "segment written"
        );
    }
    (0, Ok(()))
}

fn percent_of(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    index as f64 / total as f64 * 100.0
}
