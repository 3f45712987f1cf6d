//! Concurrency policies over resolved manifests.
//!
//! Three interchangeable modes: serial (one manifest at a time), bounded
//! parallel (a small global cap with staggered starts, to spread load
//! against host-side rate limiting), and origin-grouped (one worker per
//! distinct segment origin, serial within each worker). Resolution happens
//! up front and in order; nil manifests are skipped. A manifest's failure is
//! logged and recorded but never stops sibling work.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::control::AbortFlag;
use crate::engine;
use crate::headers::{self, Profile};
use crate::manifest::Manifest;
use crate::post_process;
use crate::progress::MuxProgress;
use crate::resolver;
use crate::state;
use crate::target::{self, Target};

/// Cap on concurrently running manifests in bounded-parallel mode.
const MAX_PARALLEL: usize = 4;

/// Delay between task submissions so streams don't all open their first
/// connection at the same instant.
const SUBMIT_STAGGER: Duration = Duration::from_secs(1);

/// Shared context for one scheduling run. Cheap to clone into workers.
#[derive(Clone)]
pub struct Scheduler {
    config: Arc<Config>,
    download_dir: PathBuf,
    state_path: PathBuf,
    abort: AbortFlag,
    progress: Option<mpsc::Sender<MuxProgress>>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        download_dir: PathBuf,
        state_path: PathBuf,
        abort: AbortFlag,
        progress: Option<mpsc::Sender<MuxProgress>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            download_dir,
            state_path,
            abort,
            progress,
        }
    }

    /// Resolves every configured URL entry, in order. Malformed entries,
    /// completed entries, and failed resolutions yield nil manifests so the
    /// result stays index-aligned with the config.
    pub async fn resolve_all(&self) -> Vec<Manifest> {
        let mut manifests = Vec::with_capacity(self.config.urls.len());
        for (i, entry) in self.config.urls.iter().enumerate() {
            let target = match target::decode(entry) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("urls are in the wrong format: {e}");
                    manifests.push(Manifest::nil(i));
                    continue;
                }
            };
            if target.complete {
                manifests.push(Manifest::nil(i));
                continue;
            }
            let template = self.config.header.clone();
            let url = target.url.clone();
            match tokio::task::spawn_blocking(move || resolver::resolve(&url, &template, i)).await {
                Ok((manifest, outcome)) => {
                    outcome.log(&target.url);
                    manifests.push(manifest);
                }
                Err(e) => {
                    tracing::error!("resolve task join: {e}");
                    manifests.push(Manifest::nil(i));
                }
            }
        }
        manifests
    }

    /// Serial mode: each manifest fully processed before the next starts.
    pub async fn run_serial(&self) {
        let manifests = self.resolve_all().await;
        let total = manifests.len();
        for (i, manifest) in manifests.into_iter().enumerate() {
            if manifest.is_nil() {
                continue;
            }
            tracing::info!("{}/{}:", i + 1, total);
            let worker = self.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || worker.download_one(manifest)).await
            {
                tracing::error!("download task join: {e}");
            }
        }
    }

    /// Bounded-parallel mode: up to `min(4, count)` manifests in flight,
    /// submissions staggered.
    pub async fn run_parallel(&self) {
        let manifests = self.resolve_all().await;
        let count = manifests.iter().filter(|m| !m.is_nil()).count();
        let limit = Arc::new(Semaphore::new(MAX_PARALLEL.min(count.max(1))));
        let mut tasks = JoinSet::new();
        for manifest in manifests {
            if manifest.is_nil() {
                continue;
            }
            let worker = self.clone();
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await.expect("semaphore closed");
                if let Err(e) =
                    tokio::task::spawn_blocking(move || worker.download_one(manifest)).await
                {
                    tracing::error!("download task join: {e}");
                }
            });
            tokio::time::sleep(SUBMIT_STAGGER).await;
        }
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::error!("download task join: {e}");
            }
        }
    }

    /// Origin-grouped mode: one worker per distinct segment origin, each
    /// processing its manifests serially. Bounds per-origin load while
    /// keeping cross-origin parallelism.
    pub async fn run_grouped(&self) {
        let groups = group_by_origin(self.resolve_all().await);
        let mut tasks = JoinSet::new();
        for (origin, group) in groups {
            let worker = self.clone();
            tasks.spawn(async move {
                tracing::debug!(%origin, manifests = group.len(), "origin worker started");
                for manifest in group {
                    let one = worker.clone();
                    if let Err(e) =
                        tokio::task::spawn_blocking(move || one.download_one(manifest)).await
                    {
                        tracing::error!("download task join: {e}");
                    }
                }
            });
        }
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::error!("origin worker join: {e}");
            }
        }
    }

    /// Playlist-only mode: write each resolved manifest's raw bytes next to
    /// where the output file would go; the engine is never invoked.
    pub async fn run_playlist_only(&self) {
        for manifest in self.resolve_all().await {
            if manifest.is_nil() {
                continue;
            }
            let path = self
                .download_dir
                .join(format!("{}.m3u8", manifest.output_name));
            match std::fs::write(&path, &manifest.raw) {
                Ok(()) => tracing::info!("completed: {}", path.display()),
                Err(e) => tracing::error!("failed to write playlist data: {e}"),
            }
        }
    }

    /// Downloads the contents of a local `.m3u8` file (full range, fresh
    /// start), bypassing resolution.
    pub async fn run_manifest_file(&self, path: &Path) -> anyhow::Result<()> {
        let data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("failed to read playlist {}: {e}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = name.strip_suffix(".m3u8").unwrap_or(&name).to_string();
        let manifest = Manifest::with_output_name(data, name, 0);
        let target = Target {
            url: path.display().to_string(),
            range: Default::default(),
            resume_offset: 0,
            complete: false,
        };
        let worker = self.clone();
        tokio::task::spawn_blocking(move || worker.download_with_target(manifest, &target))
            .await
            .map_err(|e| anyhow::anyhow!("download task join: {e}"))?;
        Ok(())
    }

    /// Runs the engine for one manifest, re-deriving its Resolution Target
    /// from the config entry it came from. Blocking.
    fn download_one(&self, manifest: Manifest) {
        let Some(entry) = self.config.urls.get(manifest.source_index) else {
            tracing::error!(
                "no config entry for source index {}",
                manifest.source_index
            );
            return;
        };
        let target = match target::decode(entry) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("{e}");
                return;
            }
        };
        self.download_with_target(manifest, &target);
    }

    /// Engine run plus the post-completion collaborators. Blocking.
    fn download_with_target(&self, mut manifest: Manifest, target: &Target) {
        let segment_headers = headers::build(&self.config.header, Profile::Segment, "");
        let (last_index, result) = engine::run(
            &mut manifest,
            &segment_headers,
            target.resume_offset,
            target.range,
            &self.download_dir,
            &self.abort,
            self.progress.as_ref(),
        );
        match result {
            Ok(()) => {
                tracing::info!("completed: {}:{}", manifest.output_name, target.url);
                if let Err(e) = post_process::run(
                    &self.config.post_process,
                    &self.download_dir,
                    &manifest.output_name,
                    &target.url,
                ) {
                    tracing::error!("post-process failed: {e}");
                }
                state::record_best_effort(
                    &self.state_path,
                    &target.url,
                    &manifest.output_name,
                    state::Status::Complete,
                    None,
                    manifest.source_index,
                );
            }
            Err(e) => {
                tracing::error!("{e}");
                tracing::error!("download failed at line: {last_index}");
                state::record_best_effort(
                    &self.state_path,
                    &target.url,
                    &manifest.output_name,
                    state::Status::Failed,
                    Some(last_index),
                    manifest.source_index,
                );
            }
        }
    }
}

/// Partitions manifests by the origin of their first segment. Nil manifests
/// are skipped; manifests whose origin cannot be determined are dropped with
/// a logged error.
pub fn group_by_origin(manifests: Vec<Manifest>) -> HashMap<String, Vec<Manifest>> {
    let mut servers: HashMap<String, Vec<Manifest>> = HashMap::new();
    for manifest in manifests {
        if manifest.is_nil() {
            continue;
        }
        match manifest.origin() {
            Ok(origin) => servers.entry(origin).or_default().push(manifest),
            Err(e) => tracing::error!("{e}"),
        }
    }
    servers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_segments(urls: &[&str], source_index: usize) -> Manifest {
        let mut lines = vec!["#EXTM3U".to_string(), "lead".to_string()];
        lines.extend(urls.iter().map(|s| s.to_string()));
        lines.push("tail".to_string());
        // lead/tail are boundary markers; only `urls` survive as segments
        Manifest::with_output_name(lines.join("\n").into_bytes(), format!("m{source_index}"), source_index)
    }

    #[test]
    fn grouping_partitions_by_host_and_keeps_order() {
        let a1 = manifest_with_segments(&["https://cdn.example.com/a/1.ts"], 0);
        let b = manifest_with_segments(&["https://other.example.com/b/1.ts"], 1);
        let a2 = manifest_with_segments(&["https://cdn.example.com/a/2.ts"], 2);
        let groups = group_by_origin(vec![a1, b, a2]);
        assert_eq!(groups.len(), 2);
        let cdn = &groups["cdn.example.com"];
        assert_eq!(cdn.len(), 2);
        assert_eq!(cdn[0].source_index, 0);
        assert_eq!(cdn[1].source_index, 2);
        assert_eq!(groups["other.example.com"].len(), 1);
    }

    #[test]
    fn grouping_drops_undeterminable_origins_and_nils() {
        let nil = Manifest::nil(0);
        let empty = Manifest::with_output_name(b"#EXTM3U\nonly\n".to_vec(), "e".into(), 1);
        let good = manifest_with_segments(&["https://cdn.example.com/a/1.ts"], 2);
        let groups = group_by_origin(vec![nil, empty, good]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["cdn.example.com"].len(), 1);
    }
}
