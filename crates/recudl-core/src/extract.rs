//! Bounded substring extraction for the host's narrow markup conventions.
//!
//! The upstream pages and API responses follow an undocumented substring
//! convention, not a document format worth parsing; a delimiter search with
//! an explicit not-found error is the whole contract.

use crate::error::DlError;

/// Returns the text between the first occurrence of `start` and the next
/// occurrence of `end` after it.
pub fn search_between<'a>(haystack: &'a str, start: &str, end: &str) -> Result<&'a str, DlError> {
    if haystack.len() <= start.len() + end.len() {
        return Err(DlError::protocol("search term longer than the given string"));
    }
    let i1 = haystack
        .find(start)
        .ok_or_else(|| DlError::protocol(format!("could not find {{{start}}}")))?;
    let from = i1 + start.len();
    let i2 = haystack[from..]
        .find(end)
        .map(|i| from + i)
        .ok_or_else(|| DlError::protocol(format!("could not find {{{end}}} after {{{start}}}")))?;
    Ok(&haystack[from..i2])
}

/// Truncates `s` to at most `max` characters, for retry-log summaries.
pub fn shorten(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
