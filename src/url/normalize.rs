use crate::{UrlError, UrlResult};
use url::Url;

use super::GEMINI_DEFAULT_PORT;

/// Normalizes a URL into its canonical form.
///
/// # Normalization Steps
///
/// 1. Lowercase the scheme and host (the parser already does this),
///    dropping unnecessary trailing host dots
/// 2. Remove the default gemini port
/// 3. Decode unnecessary percent-escapes, uppercase the remaining ones
/// 4. Remove dot segments (`.` and `..`)
/// 5. Collapse duplicate slashes
/// 6. Represent an empty path as `/`
///
/// Normalization is idempotent: applying it to its own output yields the
/// same URL.
pub fn normalize_url(input: &Url) -> UrlResult<Url> {
    let mut url = input.clone();

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlError::MissingHost)?
        .to_lowercase();
    let host = host.trim_end_matches('.').to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() == "gemini" && url.port() == Some(GEMINI_DEFAULT_PORT) {
        // set_port only fails without a host, which we checked above
        let _ = url.set_port(None);
    }

    let path = normalize_path(&decode_unnecessary_escapes(url.path()));
    url.set_path(&path);

    Ok(url)
}

/// Parses and normalizes a URL string
pub fn normalize_url_str(input: &str) -> UrlResult<Url> {
    let url = Url::parse(input).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_url(&url)
}

/// Removes dot segments, collapses duplicate slashes and ensures a
/// leading slash. A trailing slash is significant and preserved.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..") {
        result.push('/');
    }
    result
}

/// Decodes percent-escapes of unreserved characters and uppercases the
/// hex digits of the escapes that must stay.
fn decode_unnecessary_escapes(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = (hi << 4) | lo;
                if decoded.is_ascii_alphanumeric()
                    || matches!(decoded, b'-' | b'.' | b'_' | b'~')
                {
                    out.push(decoded as char);
                } else {
                    out.push('%');
                    out.push(bytes[i + 1].to_ascii_uppercase() as char);
                    out.push(bytes[i + 2].to_ascii_uppercase() as char);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        normalize_url_str(s).unwrap().to_string()
    }

    #[test]
    fn test_spec_example() {
        assert_eq!(
            norm("gemini://Example.com:1965/a/./b//c"),
            "gemini://example.com/a/b/c"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "gemini://Example.com:1965/a/./b//c",
            "gemini://example.org",
            "gemini://example.org/%41bc/%2Fx",
            "gemini://example.org/a/b/../c/",
        ];
        for input in inputs {
            let once = norm(input);
            assert_eq!(norm(&once), once, "not idempotent for {}", input);
        }
    }

    #[test]
    fn test_lowercase_host() {
        assert_eq!(norm("gemini://EXAMPLE.ORG/Page"), "gemini://example.org/Page");
    }

    #[test]
    fn test_default_port_removed() {
        assert_eq!(norm("gemini://example.org:1965/"), "gemini://example.org/");
    }

    #[test]
    fn test_non_default_port_kept() {
        assert_eq!(
            norm("gemini://example.org:1966/"),
            "gemini://example.org:1966/"
        );
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(norm("gemini://example.org"), "gemini://example.org/");
    }

    #[test]
    fn test_dot_segments_removed() {
        assert_eq!(
            norm("gemini://example.org/a/../b/./c"),
            "gemini://example.org/b/c"
        );
    }

    #[test]
    fn test_duplicate_slashes_collapsed() {
        assert_eq!(
            norm("gemini://example.org//a///b"),
            "gemini://example.org/a/b"
        );
    }

    #[test]
    fn test_trailing_slash_preserved() {
        assert_eq!(norm("gemini://example.org/dir/"), "gemini://example.org/dir/");
    }

    #[test]
    fn test_unnecessary_escape_decoded() {
        assert_eq!(norm("gemini://example.org/%41bc"), "gemini://example.org/Abc");
    }

    #[test]
    fn test_necessary_escape_uppercased() {
        assert_eq!(
            norm("gemini://example.org/a%2fb"),
            "gemini://example.org/a%2Fb"
        );
    }

    #[test]
    fn test_parent_escape_at_root() {
        assert_eq!(norm("gemini://example.org/../x"), "gemini://example.org/x");
    }

    #[test]
    fn test_missing_host_rejected() {
        let result = normalize_url_str("gemini:///path");
        assert!(result.is_err());
    }
}
