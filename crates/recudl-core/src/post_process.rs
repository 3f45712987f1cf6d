//! Best-effort post-download pipeline: remux, thumbnail, organize, report.
//!
//! Runs after a successful mux. External tools (ffmpeg/ffprobe) are invoked
//! as black boxes; a missing tool or a failed step is logged and skipped,
//! never surfaced to the download path.

use std::path::Path;
use std::process::Command;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::OUTPUT_EXT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    pub remux_to_mp4: bool,
    pub generate_thumbnail: bool,
    pub organize_output: bool,
    pub open_in_explorer: bool,
    pub write_report: bool,
    pub output_dir: String,
    pub reports_dir: String,
    pub thumbnails_dir: String,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            remux_to_mp4: true,
            generate_thumbnail: true,
            organize_output: true,
            open_in_explorer: false,
            write_report: true,
            output_dir: "downloads".to_string(),
            reports_dir: "reports".to_string(),
            thumbnails_dir: "thumbnails".to_string(),
        }
    }
}

/// What the pipeline did for one download.
#[derive(Debug, Serialize)]
pub struct PostProcessSummary {
    pub file: String,
    pub source_url: String,
    pub steps: Vec<String>,
    pub elapsed_seconds: f64,
    pub timestamp: u64,
}

/// Executes the configured steps for `<base_name>.ts` under `base_dir`.
pub fn run(
    cfg: &PostProcessConfig,
    base_dir: &Path,
    base_name: &str,
    source_url: &str,
) -> Result<PostProcessSummary> {
    let ts_path = base_dir.join(format!("{base_name}.{OUTPUT_EXT}"));
    let out_dir = base_dir.join(&cfg.output_dir);
    let reports_dir = base_dir.join(&cfg.reports_dir);
    let thumbnails_dir = base_dir.join(&cfg.thumbnails_dir);

    let started = Instant::now();
    let mut steps = Vec::new();
    let mut final_path = ts_path.clone();

    if cfg.remux_to_mp4 && ts_path.exists() {
        std::fs::create_dir_all(&out_dir).context("failed to create output dir")?;
        let mp4_path = out_dir.join(format!("{base_name}.mp4"));
        tracing::info!("post: remuxing to mp4");
        if remux_ts_to_mp4(&ts_path, &mp4_path) {
            // Copy-only remux succeeded; the .ts is redundant now.
            if let Err(e) = std::fs::remove_file(&ts_path) {
                tracing::warn!("failed to remove {}: {e}", ts_path.display());
            }
            final_path = mp4_path;
            steps.push("remux_to_mp4".to_string());
        }
    }

    if cfg.organize_output && final_path.exists() {
        std::fs::create_dir_all(&out_dir).context("failed to create output dir")?;
        let target = out_dir.join(final_path.file_name().unwrap_or_default());
        if final_path != target {
            tracing::info!("post: organizing output");
            match std::fs::rename(&final_path, &target) {
                Ok(()) => {
                    final_path = target;
                    steps.push("organize_output".to_string());
                }
                Err(e) => tracing::warn!("failed to move output: {e}"),
            }
        }
    }

    if cfg.generate_thumbnail && final_path.exists() {
        std::fs::create_dir_all(&thumbnails_dir).context("failed to create thumbnails dir")?;
        let thumb_path = thumbnails_dir.join(format!("{base_name}.jpg"));
        tracing::info!("post: generating thumbnail");
        if thumbnail(&final_path, &thumb_path) {
            steps.push("thumbnail".to_string());
        }
    }

    let summary = PostProcessSummary {
        file: final_path.display().to_string(),
        source_url: source_url.to_string(),
        steps: steps.clone(),
        elapsed_seconds: started.elapsed().as_secs_f64(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    };

    if cfg.write_report {
        std::fs::create_dir_all(&reports_dir).context("failed to create reports dir")?;
        let report_path = reports_dir.join(format!("{base_name}.json"));
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&report_path, json) {
                    tracing::warn!("failed to write report: {e}");
                }
            }
            Err(e) => tracing::warn!("failed to serialize report: {e}"),
        }
    }

    if cfg.open_in_explorer && final_path.exists() {
        open_in_file_manager(&final_path);
    }

    tracing::info!(
        "post-process complete: {}",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    Ok(summary)
}

/// Copy streams without re-encoding; fast and lossless.
fn remux_ts_to_mp4(ts_path: &Path, mp4_path: &Path) -> bool {
    let result = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(ts_path)
        .args(["-c", "copy"])
        .arg(mp4_path)
        .output();
    match result {
        Ok(out) if out.status.success() => true,
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            tracing::warn!("ffmpeg remux failed: {}", err.lines().last().unwrap_or(""));
            false
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("ffmpeg not found; skipping remux");
            false
        }
        Err(e) => {
            tracing::warn!("ffmpeg remux failed: {e}");
            false
        }
    }
}

/// Grabs one frame at 25% of the probed duration (minimum 1s in).
fn thumbnail(media_path: &Path, thumb_path: &Path) -> bool {
    let duration = probe_duration(media_path).unwrap_or(0.0);
    let at = (duration * 0.25).max(1.0) as u64;
    let stamp = format!("{:02}:{:02}:{:02}", at / 3600, (at % 3600) / 60, at % 60);
    let result = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-ss", &stamp, "-i"])
        .arg(media_path)
        .args(["-frames:v", "1"])
        .arg(thumb_path)
        .output();
    match result {
        Ok(out) if out.status.success() => true,
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            tracing::warn!("ffmpeg thumbnail failed: {}", err.lines().last().unwrap_or(""));
            false
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("ffmpeg not found; skipping thumbnail");
            false
        }
        Err(e) => {
            tracing::warn!("ffmpeg thumbnail failed: {e}");
            false
        }
    }
}

fn probe_duration(media_path: &Path) -> Option<f64> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(media_path)
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8_lossy(&out.stdout).trim().parse().ok()
}

fn open_in_file_manager(path: &Path) {
    #[cfg(target_os = "windows")]
    let result = Command::new("explorer").arg("/select,").arg(path).spawn();
    #[cfg(target_os = "macos")]
    let result = Command::new("open").arg("-R").arg(path).spawn();
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let result = Command::new("xdg-open")
        .arg(path.parent().unwrap_or(Path::new(".")))
        .spawn();
    if let Err(e) = result {
        tracing::warn!("failed to open in file manager: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_pipeline_steps() {
        let cfg = PostProcessConfig::default();
        assert!(cfg.remux_to_mp4);
        assert!(cfg.generate_thumbnail);
        assert!(!cfg.open_in_explorer);
        assert_eq!(cfg.output_dir, "downloads");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: PostProcessConfig =
            serde_json::from_str(r#"{"remux_to_mp4": false, "output_dir": "out"}"#).unwrap();
        assert!(!cfg.remux_to_mp4);
        assert_eq!(cfg.output_dir, "out");
        assert!(cfg.write_report);
        assert_eq!(cfg.reports_dir, "reports");
    }

    #[test]
    fn disabled_pipeline_reports_no_steps() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PostProcessConfig {
            remux_to_mp4: false,
            generate_thumbnail: false,
            organize_output: false,
            open_in_explorer: false,
            write_report: false,
            ..PostProcessConfig::default()
        };
        let summary = run(&cfg, dir.path(), "CB_x_1-2-3_4-5", "https://h/p").unwrap();
        assert!(summary.steps.is_empty());
        assert_eq!(summary.source_url, "https://h/p");
    }

    #[test]
    fn report_is_written_even_without_media() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PostProcessConfig {
            remux_to_mp4: false,
            generate_thumbnail: false,
            organize_output: false,
            write_report: true,
            ..PostProcessConfig::default()
        };
        run(&cfg, dir.path(), "CB_x_1-2-3_4-5", "https://h/p").unwrap();
        let report = dir.path().join("reports").join("CB_x_1-2-3_4-5.json");
        assert!(report.exists());
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
        assert_eq!(parsed["source_url"], "https://h/p");
    }

    #[test]
    fn organize_moves_ts_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CB_x_1-2-3_4-5.ts"), b"media").unwrap();
        let cfg = PostProcessConfig {
            remux_to_mp4: false,
            generate_thumbnail: false,
            organize_output: true,
            write_report: false,
            ..PostProcessConfig::default()
        };
        let summary = run(&cfg, dir.path(), "CB_x_1-2-3_4-5", "https://h/p").unwrap();
        assert!(summary.steps.contains(&"organize_output".to_string()));
        assert!(dir.path().join("downloads").join("CB_x_1-2-3_4-5.ts").exists());
        assert!(!dir.path().join("CB_x_1-2-3_4-5.ts").exists());
    }
}
