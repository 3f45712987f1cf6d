//! Single HTTP GET via libcurl: status code and full body, regardless of
//! status. Retry decisions live in the `retry` module; this is the one
//! transport primitive underneath both the resolver and the engine.
//!
//! Calls block the current thread; run under `spawn_blocking` from async
//! code.

use std::collections::HashMap;
use std::time::Duration;

/// How long to wait for the TCP/TLS handshake, independent of the per-call
/// total timeout that the retry policies grow on failure.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

/// Performs one GET with the given headers and total timeout. Non-2xx
/// statuses are returned in the response, not as errors; only transport
/// failures error.
pub fn http_get(
    url: &str,
    timeout: Duration,
    headers: &HashMap<String, String>,
) -> Result<HttpResponse, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(MAX_REDIRECTS)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(timeout)?;
    // Let libcurl negotiate and transparently decode compressed bodies.
    easy.accept_encoding("")?;

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !headers.is_empty() {
        easy.http_headers(list)?;
    }

    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    Ok(HttpResponse { status, body })
}
