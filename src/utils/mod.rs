//! Utility functions and helpers.

pub mod http;
pub mod report;

use url::Url;

/// Extract the lowercase host from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Whether `host` is `domain` or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// File extension of the last path segment of a URL, query and fragment removed.
pub fn url_extension(url_str: &str) -> Option<String> {
    let parsed = Url::parse(url_str).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("x.com", "x.com"));
        assert!(host_matches("mobile.x.com", "x.com"));
        assert!(!host_matches("box.com", "x.com"));
        assert!(!host_matches("x.com.evil", "x.com"));
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(
            url_extension("https://s3.example/secure/photo.JPG?X-Amz-Signature=abc#top"),
            Some("jpg".to_string())
        );
        assert_eq!(url_extension("https://img.example/a/b.png"), Some("png".into()));
        assert_eq!(url_extension("https://img.example/noext"), None);
    }
}
