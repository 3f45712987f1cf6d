//! Startup check for a newer release. Strictly best-effort: any failure is
//! silent and startup is never delayed past the short timeout.

use std::collections::HashMap;
use std::time::Duration;

use recudl_core::fetch;

const RELEASES_URL: &str =
    "https://api.github.com/repos/baconator696/Recu-Download/releases/latest";
const TIMEOUT: Duration = Duration::from_secs(2);

pub fn check_for_update() {
    let current = env!("CARGO_PKG_VERSION");
    if let Some((tag, url)) = latest_release() {
        if is_newer(&tag, current) {
            tracing::info!("new update available: v{tag}");
            if !url.is_empty() {
                tracing::info!("release notes: {url}");
            }
        }
    }
}

fn latest_release() -> Option<(String, String)> {
    let mut headers = HashMap::new();
    // GitHub's API rejects requests without a user agent.
    headers.insert("User-Agent".to_string(), format!("recudl/{}", env!("CARGO_PKG_VERSION")));
    let resp = fetch::http_get(RELEASES_URL, TIMEOUT, &headers).ok()?;
    if resp.status != 200 {
        return None;
    }
    let release: serde_json::Value = serde_json::from_slice(&resp.body).ok()?;
    if release["prerelease"].as_bool().unwrap_or(false) {
        return None;
    }
    let tag = release["tag_name"].as_str()?.trim_start_matches('v').to_string();
    let url = release["html_url"].as_str().unwrap_or("").to_string();
    Some((tag, url))
}

/// Compares dotted version tags component-wise; unparseable components are
/// skipped.
fn is_newer(candidate: &str, current: &str) -> bool {
    let cur: Vec<&str> = current.trim_start_matches('v').split('.').collect();
    for (i, part) in candidate.split('.').enumerate() {
        let (Ok(new), Some(Ok(old))) = (part.parse::<u64>(), cur.get(i).map(|c| c.parse::<u64>()))
        else {
            continue;
        };
        if new > old {
            return true;
        }
        if new < old {
            return false;
        }
    }
    false
}
