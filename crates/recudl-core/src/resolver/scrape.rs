//! Profile-page link scraping for the `parse` command.
//!
//! Collects every video page link from a user's index page with the same
//! bounded substring search used elsewhere; no DOM involved.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::DlError;
use crate::extract;
use crate::fetch;
use crate::headers::{self, Profile};

const PAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches `index_url` and returns the fully-qualified video page URLs found
/// on it, in page order. Blocks on network I/O.
pub fn scrape_video_links(
    index_url: &str,
    template: &HashMap<String, String>,
) -> Result<Vec<String>, DlError> {
    tracing::info!("downloading html: {index_url}");
    let resp = fetch::http_get(
        index_url,
        PAGE_TIMEOUT,
        &headers::build(template, Profile::Page, ""),
    )?;
    if resp.status != 200 {
        let body: String = String::from_utf8_lossy(&resp.body).chars().take(200).collect();
        return Err(DlError::Status { status: resp.status, body });
    }

    let parts: Vec<&str> = index_url.split('/').collect();
    if parts.len() < 5 {
        return Err(DlError::validation("wrong url format"));
    }
    let name = parts[4];
    let prefix = parts[..3].join("/");
    let open = format!("href=\"/{name}/video/");

    tracing::info!("searching for links");
    let html = String::from_utf8_lossy(&resp.body).into_owned();
    let mut links = Vec::new();
    for line in html.split('\n') {
        if let Ok(code) = extract::search_between(line, &open, "/play\"") {
            links.push(format!("{prefix}/{name}/video/{code}/play"));
        }
    }
    Ok(links)
}
