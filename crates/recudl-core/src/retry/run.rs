//! Retry loop: fetch until success or the policy's budget is spent.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::DlError;
use crate::extract;
use crate::fetch;

use super::policy::{FetchPolicy, PolicyKind};

/// Pause before re-requesting a throttled (429) segment; not counted
/// against the retry budget.
const THROTTLE_PAUSE: Duration = Duration::from_millis(100);

/// Characters of the response body kept in a terminal status error.
const BODY_SNIPPET_LEN: usize = 200;

/// Fetches `url` until a 200 response or the budget is exhausted, per
/// `policy`. Returns the response body on success and the last error
/// otherwise. Blocks the current thread between attempts.
pub fn fetch_with_retry(
    url: &str,
    headers: &HashMap<String, String>,
    policy: &FetchPolicy,
) -> Result<Vec<u8>, DlError> {
    let mut timeout = policy.initial_timeout;
    let mut retries = 0u32;
    loop {
        let err = match fetch::http_get(url, timeout, headers) {
            Ok(resp) if resp.status == 200 => return Ok(resp.body),
            Ok(resp) => {
                if policy.kind == PolicyKind::Segment {
                    if resp.status == 429 {
                        // Host-side throttle: back off briefly and go again
                        // without consuming the budget.
                        std::thread::sleep(THROTTLE_PAUSE);
                        continue;
                    }
                    if resp.status == 410 {
                        tracing::error!(url, "download expired");
                        return Err(DlError::Expired);
                    }
                }
                if policy.kind == PolicyKind::PageApi {
                    timeout += policy.timeout_increment;
                }
                let body: String = String::from_utf8_lossy(&resp.body)
                    .chars()
                    .take(BODY_SNIPPET_LEN)
                    .collect();
                DlError::Status { status: resp.status, body }
            }
            Err(e) => {
                timeout += policy.timeout_increment;
                DlError::Transport(e)
            }
        };
        retries += 1;
        if retries > policy.max_retries {
            return Err(err);
        }
        tracing::warn!(
            error = extract::shorten(&err.to_string(), 40),
            attempt = retries,
            "fetch failed, retrying"
        );
        std::thread::sleep(policy.pause);
    }
}
