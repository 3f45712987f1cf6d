//! Resolution Target decoding from the config's compact URL entries.
//!
//! A URL entry is one of: a bare URL string; `[url]`; `[url, resume]` where
//! resume is a segment index or the literal `"COMPLETE"`; `[url, start, end,
//! total]` with `h:m:s` timestamps; or the 5-element form combining both.
//! Every other shape is rejected outright rather than guessed at.

use serde_json::Value;

use crate::error::DlError;

/// Percentage window of the stream to download, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentRange {
    pub start: f64,
    pub end: f64,
}

impl Default for PercentRange {
    fn default() -> Self {
        Self { start: 0.0, end: 100.0 }
    }
}

/// One user-supplied download request, decoded from a config URL entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub url: String,
    pub range: PercentRange,
    /// Segment index to resume from; 0 means a fresh run.
    pub resume_offset: usize,
    /// Marked done in a prior run; the resolver is bypassed entirely.
    pub complete: bool,
}

/// Decodes one config URL entry into a [`Target`].
pub fn decode(entry: &Value) -> Result<Target, DlError> {
    match entry {
        Value::String(url) => Ok(Target {
            url: url.clone(),
            range: PercentRange::default(),
            resume_offset: 0,
            complete: false,
        }),
        Value::Array(items) => decode_array(items),
        _ => Err(DlError::validation("url entry is an incorrect type")),
    }
}

fn decode_array(items: &[Value]) -> Result<Target, DlError> {
    let url = match items.first() {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(DlError::validation("url entry must start with a url string")),
    };
    let mut target = Target {
        url,
        range: PercentRange::default(),
        resume_offset: 0,
        complete: false,
    };
    match items.len() {
        1 => {}
        2 => apply_marker(&mut target, &items[1])?,
        4 => target.range = percent_range(&items[1..4])?,
        5 => {
            target.range = percent_range(&items[1..4])?;
            apply_marker(&mut target, &items[4])?;
        }
        n => {
            return Err(DlError::validation(format!(
                "incorrect length of url array: {n}"
            )))
        }
    }
    Ok(target)
}

/// Final element of the 2/5-element forms: a resume index or `"COMPLETE"`.
fn apply_marker(target: &mut Target, marker: &Value) -> Result<(), DlError> {
    match marker {
        Value::String(s) if s == "COMPLETE" => target.complete = true,
        Value::Number(n) => {
            let idx = n
                .as_f64()
                .ok_or_else(|| DlError::validation("resume index is not a number"))?;
            target.resume_offset = if idx.is_sign_negative() { 0 } else { idx as usize };
        }
        _ => return Err(DlError::validation("resume marker must be a number or \"COMPLETE\"")),
    }
    Ok(())
}

/// Converts `[start, end, total]` `h:m:s` timestamps into a percent range.
/// A zero total duration means the whole stream.
fn percent_range(times: &[Value]) -> Result<PercentRange, DlError> {
    let mut secs = [0u64; 3];
    for (i, value) in times.iter().enumerate() {
        let Value::String(stamp) = value else {
            return Err(DlError::validation(format!(
                "timestamps are in the wrong format: {times:?}"
            )));
        };
        let mut unit = 1u64;
        for part in stamp.split(':').rev() {
            let v: u64 = part.trim().parse().map_err(|_| {
                DlError::validation(format!("timestamps are in the wrong format: {times:?}"))
            })?;
            secs[i] += v * unit;
            unit *= 60;
        }
    }
    if secs[2] == 0 {
        return Ok(PercentRange::default());
    }
    let start = secs[0] as f64 / secs[2] as f64 * 100.0;
    let end = secs[1] as f64 / secs[2] as f64 * 100.0;
    if end <= start {
        return Err(DlError::validation("duration window is empty or reversed"));
    }
    let clamped = PercentRange {
        start: start.clamp(0.0, 100.0),
        end: end.clamp(0.0, 100.0),
    };
    if clamped.end <= clamped.start {
        return Err(DlError::validation("duration window is empty after clamping"));
    }
    Ok(clamped)
}
