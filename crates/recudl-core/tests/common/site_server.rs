//! Minimal HTTP/1.1 server speaking the session-gated site protocol for
//! integration tests: page, API, master/media manifests, and segments.
//!
//! Serves exactly one stream per instance. Segment behavior (throttling,
//! expiry) is configurable so retry paths can be exercised; every request
//! path is counted for assertions.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

/// Segment failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireRule {
    /// The segment returns 410 on its first request only.
    Once(usize),
    /// The segment always returns 410.
    Always(usize),
}

#[derive(Debug, Clone)]
pub struct SiteOptions {
    pub user: String,
    /// Comma-separated timestamp path component, as the host emits it.
    pub date: String,
    pub video_id: String,
    pub token: String,
    pub segments: usize,
    /// Serve a master manifest with variant streams first.
    pub master: bool,
    /// Replace the API body with a sentinel (e.g. "shall_signin").
    pub api_sentinel: Option<String>,
    /// `(segment index, count)`: respond 429 to the first `count` requests.
    pub throttle: Option<(usize, u32)>,
    pub expire: Option<ExpireRule>,
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            user: "alice".to_string(),
            date: "2024,05,06,07,08".to_string(),
            video_id: "v123".to_string(),
            token: "tok456".to_string(),
            segments: 4,
            master: false,
            api_sentinel: None,
            throttle: None,
            expire: None,
        }
    }
}

pub struct SiteServer {
    pub base: String,
    opts: SiteOptions,
    hits: Arc<Mutex<HashMap<String, u32>>>,
}

impl SiteServer {
    /// URL of the video page a user would paste into the config.
    pub fn page_url(&self) -> String {
        format!("{}{}/video/{}/play", self.base, self.opts.user, self.opts.video_id)
    }

    /// URL of the profile index page (for the link scraper).
    pub fn index_url(&self) -> String {
        format!("{}performer/{}", self.base, self.opts.user)
    }

    pub fn stream_dir(&self) -> String {
        format!("/hls/{}/{}", self.opts.user, self.opts.date)
    }

    /// Requests seen for a path (query excluded).
    pub fn hits(&self, path: &str) -> u32 {
        *self.hits.lock().unwrap().get(path).unwrap_or(&0)
    }

    pub fn segment_hits(&self, index: usize) -> u32 {
        self.hits(&format!("{}/seg{index}.ts", self.stream_dir()))
    }

    /// Expected output of muxing segments `[start, end)`.
    pub fn expected_bytes(&self, start: usize, end: usize) -> Vec<u8> {
        (start..end).flat_map(segment_body).collect()
    }
}

/// Deterministic per-segment payload.
pub fn segment_body(index: usize) -> Vec<u8> {
    format!("[segment-{index:03}-payload]").repeat(8).into_bytes()
}

/// Starts the server on an ephemeral port; it runs until the process exits.
pub fn start(opts: SiteOptions) -> SiteServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{port}/");
    let hits = Arc::new(Mutex::new(HashMap::new()));

    let server = SiteServer {
        base: base.clone(),
        opts: opts.clone(),
        hits: Arc::clone(&hits),
    };

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let opts = opts.clone();
            let base = base.clone();
            let hits = Arc::clone(&hits);
            thread::spawn(move || handle(stream, &opts, &base, &hits));
        }
    });

    server
}

fn handle(
    mut stream: std::net::TcpStream,
    opts: &SiteOptions,
    base: &str,
    hits: &Mutex<HashMap<String, u32>>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => return,
        }
    }
    let request = String::from_utf8_lossy(&buf);
    let mut first_line = request.lines().next().unwrap_or("").split_whitespace();
    let method = first_line.next().unwrap_or("");
    let target = first_line.next().unwrap_or("");
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };

    let count = {
        let mut guard = hits.lock().unwrap();
        let entry = guard.entry(path.to_string()).or_insert(0);
        *entry += 1;
        *entry
    };

    if !method.eq_ignore_ascii_case("GET") {
        write_response(&mut stream, 405, "Method Not Allowed", b"");
        return;
    }

    let dir = format!("/hls/{}/{}", opts.user, opts.date);

    if path == format!("/{}/video/{}/play", opts.user, opts.video_id) {
        let body = format!(
            "<html><body><div data-token=\"{}\"><video data-video-id=\"{}\"></video></div></body></html>",
            opts.token, opts.video_id
        );
        write_response(&mut stream, 200, "OK", body.as_bytes());
        return;
    }

    if path == format!("/performer/{}", opts.user) {
        let body = format!(
            "<html><body>\n<a href=\"/{}/video/{}/play\">watch</a>\n</body></html>",
            opts.user, opts.video_id
        );
        write_response(&mut stream, 200, "OK", body.as_bytes());
        return;
    }

    if path == format!("/api/video/{}", opts.video_id) {
        if let Some(sentinel) = &opts.api_sentinel {
            write_response(&mut stream, 200, "OK", sentinel.as_bytes());
            return;
        }
        if query != format!("token={}", opts.token) {
            write_response(&mut stream, 200, "OK", b"wrong_token");
            return;
        }
        let entry = if opts.master { "master" } else { "media" };
        let body = format!(
            "<html><body><video><source src=\"{}hls/{}/{}/{}.m3u8?u=1&amp;s=2\"></video></body></html>",
            base, opts.user, opts.date, entry
        );
        write_response(&mut stream, 200, "OK", body.as_bytes());
        return;
    }

    if path == format!("{dir}/master.m3u8") {
        let body = "#EXTM3U\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=200000,NAME=low\n\
                    variant_lo.m3u8\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=800000,NAME=max\n\
                    variant_hi.m3u8\n";
        write_response(&mut stream, 200, "OK", body.as_bytes());
        return;
    }

    if path == format!("{dir}/media.m3u8") || path == format!("{dir}/variant_hi.m3u8") {
        let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\nlead.ts\n");
        for i in 0..opts.segments {
            body.push_str(&format!("seg{i}.ts\n"));
        }
        body.push_str("tail.ts\n#EXT-X-ENDLIST\n");
        write_response(&mut stream, 200, "OK", body.as_bytes());
        return;
    }

    if let Some(rest) = path.strip_prefix(&format!("{dir}/seg")) {
        if let Some(index) = rest.strip_suffix(".ts").and_then(|s| s.parse::<usize>().ok()) {
            if let Some((t_index, t_count)) = opts.throttle {
                if index == t_index && count <= t_count {
                    write_response(&mut stream, 429, "Too Many Requests", b"slow down");
                    return;
                }
            }
            match opts.expire {
                Some(ExpireRule::Always(e)) if e == index => {
                    write_response(&mut stream, 410, "Gone", b"expired");
                    return;
                }
                Some(ExpireRule::Once(e)) if e == index && count == 1 => {
                    write_response(&mut stream, 410, "Gone", b"expired");
                    return;
                }
                _ => {}
            }
            write_response(&mut stream, 200, "OK", &segment_body(index));
            return;
        }
    }

    write_response(&mut stream, 404, "Not Found", b"not found");
}

fn write_response(stream: &mut std::net::TcpStream, status: u32, reason: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}
