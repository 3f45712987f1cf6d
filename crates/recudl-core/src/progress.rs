//! Throughput sampling and human-readable rate formatting.
//!
//! One `SpeedTracker` lives per engine run and is discarded at completion;
//! its moving averages over the most recent segments approximate the
//! instantaneous transfer rate for live reporting.

use std::time::Duration;

/// Default number of per-segment samples kept for the moving average.
pub const SAMPLE_WINDOW: usize = 25;

/// Fixed-capacity ring buffer; the average is taken over whatever samples
/// are currently held.
#[derive(Debug, Clone)]
pub struct AvgWindow {
    data: Vec<f64>,
    pos: usize,
    cap: usize,
}

impl AvgWindow {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            data: Vec::with_capacity(cap),
            pos: 0,
            cap,
        }
    }

    /// Adds a sample, overwriting the oldest once the window is full.
    pub fn push(&mut self, v: f64) {
        if self.data.len() < self.cap {
            self.data.push(v);
        } else {
            self.data[self.pos] = v;
        }
        self.pos = (self.pos + 1) % self.cap;
    }

    /// Average of the current contents; 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}

/// Moving per-segment duration and byte-count windows for one download.
#[derive(Debug, Clone)]
pub struct SpeedTracker {
    durations: AvgWindow,
    sizes: AvgWindow,
}

impl Default for SpeedTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedTracker {
    pub fn new() -> Self {
        Self {
            durations: AvgWindow::new(SAMPLE_WINDOW),
            sizes: AvgWindow::new(SAMPLE_WINDOW),
        }
    }

    pub fn record(&mut self, elapsed: Duration, bytes: u64) {
        self.durations.push(elapsed.as_secs_f64());
        self.sizes.push(bytes as f64);
    }

    /// Average bytes per average second; 0.0 before the first sample.
    pub fn bytes_per_sec(&self) -> f64 {
        let d = self.durations.average();
        if d <= 0.0 {
            return 0.0;
        }
        self.sizes.average() / d
    }
}

/// Progress snapshot sent by the engine after each completed segment.
#[derive(Debug, Clone)]
pub struct MuxProgress {
    pub output_name: String,
    /// Segments completed within the current window.
    pub completed: usize,
    /// Total segments in the current window.
    pub total: usize,
    pub bytes_per_sec: f64,
}

/// Formats a transfer rate with B/s, KB/s, and MB/s steps at 1000 and
/// 1,000,000 bytes per second.
pub fn format_bytes_per_second(num: f64) -> String {
    if num >= 1_000_000.0 {
        format!("{:.1} MB/s", num / 1_000_000.0)
    } else if num >= 1000.0 {
        format!("{:.1} KB/s", num / 1000.0)
    } else {
        format!("{num:.1} B/s")
    }
}
