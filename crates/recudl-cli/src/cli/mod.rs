//! CLI for the recudl segmented stream downloader.

mod render;
mod update;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use recudl_core::config::Config;
use recudl_core::control::AbortFlag;
use recudl_core::resolver;
use recudl_core::scheduler::Scheduler;
use recudl_core::state;

/// Top-level CLI for the recudl downloader.
#[derive(Debug, Parser)]
#[command(name = "recudl")]
#[command(about = "recudl: session-gated segmented stream downloader", long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration.
    #[arg(long, default_value = "config.json", value_name = "PATH", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download all configured streams in parallel (default command).
    Run,

    /// Download all configured streams one after another.
    Series,

    /// Download sequentially per server but in parallel across servers.
    Hybrid,

    /// Only write the .m3u8 playlists; with PATH, download that playlist's
    /// contents instead.
    Playlist {
        /// A previously saved .m3u8 file to download.
        path: Option<PathBuf>,
    },

    /// Scrape a profile page for video links and append them to the config.
    Parse {
        /// Profile page URL to scan.
        url: String,
    },
}

pub async fn run_from_args() -> Result<()> {
    let cli = Cli::parse();

    // Best-effort; never blocks startup on failure.
    let _ = tokio::task::spawn_blocking(update::check_for_update).await;

    if !cli.config.exists() {
        Config::default_at(&cli.config).save()?;
        println!(
            "{} created in working directory\nPlease fill in the {} with the\n\tURLs to Download\n\tCookies\n\tUser-Agent",
            cli.config.display(),
            cli.config.display()
        );
        return Ok(());
    }

    let mut config = Config::load(&cli.config)?;
    let is_parse = matches!(cli.command, Some(CliCommand::Parse { .. }));
    if config.is_unconfigured() && !is_parse {
        println!("please modify {}", cli.config.display());
        return Ok(());
    }

    if let Some(CliCommand::Parse { url }) = &cli.command {
        let template = config.header.clone();
        let url = url.clone();
        let links =
            tokio::task::spawn_blocking(move || resolver::scrape_video_links(&url, &template))
                .await??;
        let found = links.len();
        config.append_urls(links);
        config.save()?;
        println!("parsed html successfully: {found} links added");
        return Ok(());
    }

    let abort = AbortFlag::new();
    {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("abort requested; workers stop at the next checkpoint");
                abort.trigger();
            }
        });
    }

    let (progress_tx, progress_rx) = mpsc::channel(64);
    let renderer = tokio::spawn(render::render_loop(progress_rx));

    let download_dir = std::env::current_dir()?;
    let scheduler = Scheduler::new(
        config,
        download_dir,
        PathBuf::from(state::STATE_FILE),
        abort,
        Some(progress_tx),
    );

    match cli.command {
        None | Some(CliCommand::Run) => scheduler.run_parallel().await,
        Some(CliCommand::Series) => scheduler.run_serial().await,
        Some(CliCommand::Hybrid) => scheduler.run_grouped().await,
        Some(CliCommand::Playlist { path: Some(path) }) => {
            scheduler.run_manifest_file(&path).await?
        }
        Some(CliCommand::Playlist { path: None }) => scheduler.run_playlist_only().await,
        Some(CliCommand::Parse { .. }) => unreachable!("handled above"),
    }

    // Dropping the scheduler closes the progress channel and ends the
    // renderer.
    drop(scheduler);
    let _ = renderer.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_command_is_parallel_run() {
        let cli = Cli::parse_from(["recudl"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config.json"));
    }

    #[test]
    fn playlist_takes_optional_path() {
        let cli = Cli::parse_from(["recudl", "playlist"]);
        assert!(matches!(cli.command, Some(CliCommand::Playlist { path: None })));
        let cli = Cli::parse_from(["recudl", "playlist", "saved.m3u8"]);
        match cli.command {
            Some(CliCommand::Playlist { path: Some(p) }) => {
                assert_eq!(p, PathBuf::from("saved.m3u8"));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["recudl", "series", "--config", "alt.json"]);
        assert_eq!(cli.config, PathBuf::from("alt.json"));
        assert!(matches!(cli.command, Some(CliCommand::Series)));
    }
}
