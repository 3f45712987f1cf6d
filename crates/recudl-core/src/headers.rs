//! Per-request header sets for the three fetch postures.
//!
//! The host distinguishes a top-level page navigation, a same-origin API
//! call, and a cross-origin segment fetch; each gets its own header set
//! built from the user-supplied template (session cookie + user agent).
//! The session credential and the client-hint details are dropped on
//! cross-origin segment fetches.

use std::collections::HashMap;

/// Origin the session credential belongs to.
pub const SITE_ORIGIN: &str = "https://recu.me";

/// Which request class the headers are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Top-level page fetch (HTML navigation).
    Page,
    /// Same-origin API fetch; `referer` is the API endpoint.
    Api,
    /// Cross-origin manifest/segment fetch: credential omitted.
    Segment,
}

/// Builds the header set for one request from the config template.
/// `referer` is only used by the [`Profile::Api`] posture.
pub fn build(template: &HashMap<String, String>, profile: Profile, referer: &str) -> HashMap<String, String> {
    let mut h = template.clone();
    h.insert("Accept".into(), "*/*".into());
    h.insert("Accept-Language".into(), "en-US,en;q=0.9".into());
    h.insert("Origin".into(), SITE_ORIGIN.into());
    h.insert("Priority".into(), "u=1, i".into());
    h.insert("Sec-Ch-Ua".into(), r#""Chromium";v="128", "Not;A=Brand";v="24""#.into());
    h.insert(
        "Sec-Ch-Ua-Full-Version-List".into(),
        r#""Chromium";v="128.0.6613.120", "Not;A=Brand";v="24.0.0.0""#.into(),
    );
    h.insert("Sec-Ch-Ua-Mobile".into(), "?0".into());
    h.insert("Sec-Ch-Ua-Platform".into(), r#""Windows""#.into());
    h.insert("Sec-Fetch-Dest".into(), "empty".into());
    h.insert("Sec-Fetch-Mode".into(), "cors".into());
    h.insert("Sec-Ch-Ua-Arch".into(), r#""x86""#.into());
    h.insert("Sec-Ch-Ua-Bitness".into(), r#""64""#.into());
    h.insert("Sec-Ch-Ua-Full-Version".into(), r#""128.0.2739.67""#.into());
    h.insert("Sec-Ch-Ua-Model".into(), r#""""#.into());
    h.insert("Sec-Ch-Ua-Platform-Version".into(), r#""15.0.0""#.into());

    match profile {
        Profile::Page => {
            h.insert(
                "Accept".into(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
                 image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"
                    .into(),
            );
            h.insert("Referer".into(), format!("{SITE_ORIGIN}/"));
            h.insert("Sec-Fetch-Dest".into(), "document".into());
            h.insert("Sec-Fetch-Mode".into(), "navigate".into());
            h.insert("Sec-Fetch-Site".into(), "none".into());
            h.insert("Sec-Fetch-User".into(), "?1".into());
            h.insert("Upgrade-Insecure-Requests".into(), "1".into());
        }
        Profile::Api => {
            h.insert("Referer".into(), referer.into());
            h.insert("Sec-Fetch-Site".into(), "same-origin".into());
            h.insert("X-Requested-With".into(), "XMLHttpRequest".into());
        }
        Profile::Segment => {
            h.insert("Sec-Fetch-Site".into(), "cross-site".into());
            h.remove("Cookie");
            h.remove("Sec-Ch-Ua-Full-Version-List");
            h.remove("Sec-Ch-Ua-Arch");
            h.remove("Sec-Ch-Ua-Bitness");
            h.remove("Sec-Ch-Ua-Full-Version");
            h.remove("Sec-Ch-Ua-Model");
            h.remove("Sec-Ch-Ua-Platform-Version");
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> HashMap<String, String> {
        let mut t = HashMap::new();
        t.insert("Cookie".to_string(), "session=s3cret".to_string());
        t.insert("User-Agent".to_string(), "Mozilla/5.0".to_string());
        t
    }

    #[test]
    fn page_keeps_credential_and_navigates() {
        let h = build(&template(), Profile::Page, "");
        assert_eq!(h.get("Cookie").unwrap(), "session=s3cret");
        assert_eq!(h.get("Sec-Fetch-Mode").unwrap(), "navigate");
        assert_eq!(h.get("Sec-Fetch-Site").unwrap(), "none");
        assert!(h.get("Accept").unwrap().starts_with("text/html"));
    }

    #[test]
    fn api_sets_referer_and_same_origin() {
        let h = build(&template(), Profile::Api, "https://host/api/video/1?token=t");
        assert_eq!(h.get("Referer").unwrap(), "https://host/api/video/1?token=t");
        assert_eq!(h.get("Sec-Fetch-Site").unwrap(), "same-origin");
        assert_eq!(h.get("X-Requested-With").unwrap(), "XMLHttpRequest");
        assert!(h.contains_key("Cookie"));
    }

    #[test]
    fn segment_drops_credential_and_client_hints() {
        let h = build(&template(), Profile::Segment, "");
        assert!(!h.contains_key("Cookie"));
        assert!(!h.contains_key("Sec-Ch-Ua-Arch"));
        assert_eq!(h.get("Sec-Fetch-Site").unwrap(), "cross-site");
        assert_eq!(h.get("User-Agent").unwrap(), "Mozilla/5.0");
    }
}
