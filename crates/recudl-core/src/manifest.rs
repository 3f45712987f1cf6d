//! Segment manifest model and output-name derivation.
//!
//! A manifest is the ordered list of segment URLs for one stream. The raw
//! bytes are kept alongside the parsed list so the playlist-only mode can
//! write them back out verbatim. An empty `raw` is the explicit "nothing to
//! do" sentinel (already complete, or resolution failed upstream); every
//! downstream stage short-circuits on it.

use crate::error::DlError;

#[derive(Debug, Clone)]
pub struct Manifest {
    /// Index into the caller's URL list (not owned by the manifest).
    pub source_index: usize,
    /// Raw manifest bytes as fetched (after URL qualification).
    pub raw: Vec<u8>,
    /// Absolute segment URLs in playback order. Never reordered.
    pub segments: Vec<String>,
    /// Base name for the output file, without extension.
    pub output_name: String,
}

impl Manifest {
    /// The "nothing to do" sentinel.
    pub fn nil(source_index: usize) -> Self {
        Self {
            source_index,
            raw: Vec::new(),
            segments: Vec::new(),
            output_name: String::new(),
        }
    }

    /// Parses manifest bytes and derives the output name from the manifest
    /// URL's path components.
    pub fn from_bytes(raw: Vec<u8>, manifest_url: &str, source_index: usize) -> Result<Self, DlError> {
        let output_name = derive_output_name(manifest_url)?;
        Ok(Self::with_output_name(raw, output_name, source_index))
    }

    /// Parses manifest bytes with a caller-supplied output name (used when
    /// loading a manifest from a local file).
    ///
    /// Lines shorter than two characters or starting with `#` are directives,
    /// not segments. For a non-empty list the first and last entries are
    /// host-injected boundary markers and are dropped.
    pub fn with_output_name(raw: Vec<u8>, output_name: String, source_index: usize) -> Self {
        let text = String::from_utf8_lossy(&raw);
        let mut segments: Vec<String> = text
            .lines()
            .filter(|line| line.len() >= 2 && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        if !segments.is_empty() {
            segments.remove(0);
            segments.pop();
        }
        Self {
            source_index,
            raw,
            segments,
            output_name,
        }
    }

    pub fn is_nil(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Host (and port, when present) of the first segment URL; used to group
    /// per-origin concurrency.
    pub fn origin(&self) -> Result<String, DlError> {
        let first = self
            .segments
            .first()
            .ok_or_else(|| DlError::protocol("manifest contains no data"))?;
        let parsed = url::Url::parse(first)
            .map_err(|_| DlError::protocol("manifest doesn't contain urls"))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DlError::protocol("manifest doesn't contain urls"))?;
        Ok(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

/// Derives `CB_<user>_<yy-mm-dd>_<hh-mm>` from a manifest URL whose path
/// carries the username and a 5-component comma/hyphen-delimited timestamp.
/// 4-digit years are normalized to their last two digits.
pub fn derive_output_name(manifest_url: &str) -> Result<String, DlError> {
    let parts: Vec<&str> = manifest_url.split('/').collect();
    if parts.len() < 6 {
        return Err(DlError::protocol("wrong url format"));
    }
    let username = parts[4];
    let date = parts[5].replace(',', "-");
    let fields: Vec<&str> = date.split('-').collect();
    if fields.len() < 5 {
        return Err(DlError::protocol("wrong date format"));
    }
    let year = if fields[0].len() == 4 { &fields[0][2..] } else { fields[0] };
    Ok(format!(
        "CB_{}_{}-{}-{}_{}-{}",
        username, year, fields[1], fields[2], fields[3], fields[4]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://cdn.example.com/hls/alice/2024,05,06,07,08/media.m3u8";

    #[test]
    fn strips_directives_and_boundary_markers() {
        let raw = b"#EXTM3U\n#EXT-X-VERSION:3\nlead.ts\nseg0.ts\nseg1.ts\nseg2.ts\ntail.ts\n".to_vec();
        let m = Manifest::from_bytes(raw, URL, 0).unwrap();
        assert_eq!(m.segments, vec!["seg0.ts", "seg1.ts", "seg2.ts"]);
        // stripped count: non-directive lines minus the two boundary entries
        assert_eq!(m.len(), 5 - 2);
    }

    #[test]
    fn one_entry_manifest_yields_empty_not_error() {
        let m = Manifest::from_bytes(b"#EXTM3U\nonly.ts\n".to_vec(), URL, 0).unwrap();
        assert!(m.is_empty());
        assert!(!m.is_nil());
        let m2 = Manifest::from_bytes(b"#EXTM3U\n".to_vec(), URL, 0).unwrap();
        assert!(m2.is_empty());
    }

    #[test]
    fn short_lines_are_not_segments() {
        let m = Manifest::from_bytes(b"a\n\nfirst.ts\nmid.ts\nlast.ts\n".to_vec(), URL, 0).unwrap();
        assert_eq!(m.segments, vec!["mid.ts"]);
    }

    #[test]
    fn nil_sentinel() {
        let m = Manifest::nil(3);
        assert!(m.is_nil());
        assert_eq!(m.source_index, 3);
        assert!(m.origin().is_err());
    }

    #[test]
    fn output_name_from_manifest_url() {
        assert_eq!(
            derive_output_name(URL).unwrap(),
            "CB_alice_24-05-06_07-08"
        );
        // 2-digit year passes through unchanged
        assert_eq!(
            derive_output_name("https://cdn.example.com/hls/bob/24-1-2-3-4/media.m3u8").unwrap(),
            "CB_bob_24-1-2_3-4"
        );
    }

    #[test]
    fn output_name_rejects_short_paths() {
        assert!(matches!(
            derive_output_name("https://cdn.example.com/short"),
            Err(DlError::Protocol(_))
        ));
        assert!(matches!(
            derive_output_name("https://cdn.example.com/hls/alice/2024,05/x.m3u8"),
            Err(DlError::Protocol(_))
        ));
    }

    #[test]
    fn origin_includes_port() {
        let raw = b"#x\na.ts\nhttp://127.0.0.1:8099/hls/u/d/seg1.ts\nz.ts\n".to_vec();
        let m = Manifest::with_output_name(raw, "n".into(), 0);
        assert_eq!(m.origin().unwrap(), "127.0.0.1:8099");
    }

    #[test]
    fn origin_requires_absolute_urls() {
        let m = Manifest::with_output_name(b"#x\na.ts\nrelative.ts\nz.ts\n".to_vec(), "n".into(), 0);
        assert!(m.origin().is_err());
    }
}
