//! Terminal rendering of engine progress snapshots.

use std::io::Write;

use tokio::sync::mpsc;

use recudl_core::progress::{format_bytes_per_second, MuxProgress};

/// Receives snapshots until every sender is dropped, rewriting one status
/// line per update. Concurrent downloads interleave on the same line; the
/// log file carries the full per-segment history.
pub async fn render_loop(mut rx: mpsc::Receiver<MuxProgress>) {
    let mut rendered = false;
    while let Some(p) = rx.recv().await {
        let percent = if p.total == 0 {
            100.0
        } else {
            p.completed as f64 / p.total as f64 * 100.0
        };
        print!(
            "\r{}.ts {:>3.0}% ({}/{}) [{}]   ",
            p.output_name,
            percent,
            p.completed,
            p.total,
            format_bytes_per_second(p.bytes_per_sec)
        );
        let _ = std::io::stdout().flush();
        rendered = true;
    }
    if rendered {
        println!();
    }
}
