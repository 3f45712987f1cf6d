//! Site protocol resolution: page → token → API → quality-selected manifest.
//!
//! The host embeds a page-scoped token and a video identifier in the HTML,
//! gates the manifest URL behind an API call, and may serve a master
//! manifest with variant streams. Resolution turns one page URL into a
//! fully-qualified segment manifest or a classified failure; nothing here
//! retries the API's sentinel bodies, which are answers, not errors.

mod scrape;

pub use scrape::scrape_video_links;

use std::collections::HashMap;

use crate::error::DlError;
use crate::extract;
use crate::headers::{self, Profile};
use crate::manifest::Manifest;
use crate::retry::{fetch_with_retry, FetchPolicy};

const TOKEN_START: &str = "data-token=\"";
const VIDEO_ID_START: &str = "data-video-id=\"";
const MANIFEST_SRC_START: &str = "<source src=\"";
const VARIANT_MARKER: &str = "EXT-X-STREAM-INF";
const MAX_QUALITY_NAME: &str = "NAME=max";

/// Classified result of one resolution attempt. The manifest accompanying a
/// non-`Ok` outcome is nil.
#[derive(Debug)]
pub enum Outcome {
    Ok,
    /// The page itself could not be fetched (edge-protection challenge).
    Blocked(DlError),
    /// Session token invalid or expired.
    NeedsAuth,
    /// Daily view quota exhausted.
    RateLimited,
    /// Unexpected page/API/manifest shape.
    Protocol(DlError),
}

impl Outcome {
    /// Emits the user-facing message for a failed resolution.
    pub fn log(&self, url: &str) {
        match self {
            Outcome::Ok => {}
            Outcome::Blocked(e) => {
                tracing::error!("{e}\ncloudflare blocked: failed on url: {url}")
            }
            Outcome::NeedsAuth => tracing::error!("please log in: failed on url: {url}"),
            Outcome::RateLimited => tracing::warn!("daily view used: failed on url: {url}"),
            Outcome::Protocol(e) => tracing::error!("error: {e}\nfailed on url: {url}"),
        }
    }
}

/// Resolves a page URL into a segment manifest. Blocks on network I/O; run
/// under `spawn_blocking` from async code.
pub fn resolve(
    page_url: &str,
    template: &HashMap<String, String>,
    source_index: usize,
) -> (Manifest, Outcome) {
    match resolve_impl(page_url, template, source_index) {
        Ok(manifest) => (manifest, Outcome::Ok),
        Err(outcome) => (Manifest::nil(source_index), outcome),
    }
}

fn resolve_impl(
    page_url: &str,
    template: &HashMap<String, String>,
    source_index: usize,
) -> Result<Manifest, Outcome> {
    let policy = FetchPolicy::page_api();

    tracing::info!("downloading html: {page_url}");
    let page = fetch_with_retry(page_url, &headers::build(template, Profile::Page, ""), &policy)
        .map_err(Outcome::Blocked)?;
    let html = String::from_utf8_lossy(&page).into_owned();

    let token = extract::search_between(&html, TOKEN_START, "\"").map_err(Outcome::Protocol)?;
    // The video id is scoped to the token's first occurrence in the page.
    let scope = match html.find(token) {
        Some(pos) => &html[pos..],
        None => html.as_str(),
    };
    let video_id =
        extract::search_between(scope, VIDEO_ID_START, "\"").map_err(Outcome::Protocol)?;

    let site_root: String = page_url.split('/').take(3).collect::<Vec<_>>().join("/");
    let api_url = format!("{site_root}/api/video/{video_id}?token={token}");

    tracing::info!("getting link to playlist");
    let api_body = fetch_with_retry(
        &api_url,
        &headers::build(template, Profile::Api, &api_url),
        &policy,
    )
    .map_err(Outcome::Protocol)?;
    let api = String::from_utf8_lossy(&api_body).into_owned();
    // Sentinel bodies are definitive answers from the host; never retried.
    match api.as_str() {
        "shall_subscribe" => return Err(Outcome::RateLimited),
        "shall_signin" => return Err(Outcome::NeedsAuth),
        "wrong_token" => return Err(Outcome::Protocol(DlError::protocol("wrong token"))),
        _ => {}
    }

    let mut manifest_url = extract::search_between(&api, MANIFEST_SRC_START, "\"")
        .map_err(Outcome::Protocol)?
        .replace("amp;", "");

    tracing::info!("downloading playlist");
    let segment_headers = headers::build(template, Profile::Segment, "");
    let manifest_body = fetch_with_retry(&manifest_url, &segment_headers, &policy)
        .map_err(Outcome::Protocol)?;
    let mut manifest_text = String::from_utf8_lossy(&manifest_body).into_owned();

    // Entries are qualified against the first manifest's directory.
    let prefix = match manifest_url.rfind('/') {
        Some(i) => manifest_url[..=i].to_string(),
        None => String::new(),
    };

    if manifest_text.contains(VARIANT_MARKER) {
        let lines: Vec<&str> = manifest_text.split('\n').collect();
        for i in 0..lines.len().saturating_sub(1) {
            if lines[i].contains(MAX_QUALITY_NAME) {
                let candidate = lines[i + 1];
                manifest_url = if candidate.contains(prefix.as_str()) {
                    candidate.to_string()
                } else {
                    format!("{prefix}{candidate}")
                };
            }
        }
        tracing::info!("downloading max-quality playlist");
        let body = fetch_with_retry(&manifest_url, &segment_headers, &policy)
            .map_err(Outcome::Protocol)?;
        manifest_text = String::from_utf8_lossy(&body).into_owned();
    }

    let qualified: Vec<String> = manifest_text
        .split('\n')
        .map(|line| {
            if line.len() < 2 || line.starts_with('#') || line.contains(prefix.as_str()) {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect();

    Manifest::from_bytes(qualified.join("\n").into_bytes(), &manifest_url, source_index)
        .map_err(Outcome::Protocol)
}
