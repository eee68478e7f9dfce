//! Shared page parser
//!
//! Turns fetched bytes into extracted text, links, headings, a title, a
//! language tag and a kind tag. Gemtext and markdown go through the
//! line-oriented gemtext parser; plain text is probed for email and RFC
//! shapes first.

mod gemtext;
mod plain;
pub mod text;

use thiserror::Error;
use url::Url;

pub use gemtext::parse_gemtext;
pub use plain::parse_plain;

use text::{clean_text, collapse_lines, decode_lossy, detect_lang};

/// A parsed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub text: String,
    pub links: Vec<Link>,
    pub headings: Vec<Heading>,
    pub title: String,
    pub lang: String,
    pub kind: String,
}

/// An extracted link: absolute normalized gemini URL plus anchor text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: String,
}

/// A heading with its level (1-6) and text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub text: String,
}

/// Errors produced while parsing a fetched document
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Cannot process media type: {0}")]
    UnsupportedMediaType(String),
}

/// Parses a fetched document.
///
/// Dispatches on the declared media type, then cleans the extracted text
/// and title and detects the language.
pub fn parse_page(body: &[u8], base: &Url, content_type: &str) -> Result<Page, ParseError> {
    let text = decode_lossy(body);

    let mut page = if content_type.starts_with("text/plain") {
        parse_plain(&text)
    } else if content_type.starts_with("text/gemini") || content_type.starts_with("text/markdown")
    {
        parse_gemtext(&text, base)
    } else {
        return Err(ParseError::UnsupportedMediaType(content_type.to_string()));
    };

    page.text = clean_text(&page.text);

    let had_ellipsis = page.title.ends_with("...");
    page.title = clean_text(&page.title);
    page.title = page.title.trim_matches([' ', '\t']).to_string();
    if had_ellipsis && !page.title.ends_with("...") {
        page.title.push_str("...");
    }

    page.text = collapse_lines(&page.text);

    page.lang = detect_lang(&page.text).unwrap_or_default();

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("gemini://example.org/").unwrap()
    }

    #[test]
    fn test_gemtext_dispatch() {
        let body = b"# A Title\n\nsome body text here\n";
        let page = parse_page(body, &base(), "text/gemini").unwrap();
        assert_eq!(page.title, "A Title");
        assert!(page.text.contains("some body text here"));
    }

    #[test]
    fn test_markdown_goes_through_gemtext() {
        let body = b"# Markdown Title\n";
        let page = parse_page(body, &base(), "text/markdown").unwrap();
        assert_eq!(page.title, "Markdown Title");
    }

    #[test]
    fn test_plain_dispatch() {
        let body = b"a plain title line\n\nbody\n";
        let page = parse_page(body, &base(), "text/plain").unwrap();
        assert_eq!(page.title, "a plain title line");
    }

    #[test]
    fn test_unsupported_media_type() {
        let result = parse_page(b"GIF89a", &base(), "image/gif");
        assert!(matches!(result, Err(ParseError::UnsupportedMediaType(_))));
    }

    #[test]
    fn test_media_type_with_parameters() {
        let body = b"# Title\n";
        let page = parse_page(body, &base(), "text/gemini; charset=utf-8").unwrap();
        assert_eq!(page.title, "Title");
    }

    #[test]
    fn test_text_is_cleaned() {
        let body = b"# T\n\nword  \t word\n\n\n\nmore -------- dashes\n";
        let page = parse_page(body, &base(), "text/gemini").unwrap();
        assert!(!page.text.contains("  "));
        assert!(!page.text.contains("--------"));
        assert!(!page.text.contains("\n\n"));
    }

    #[test]
    fn test_language_detected() {
        let body = "The quick brown fox jumps over the lazy dog while the sun sets slowly over the quiet hills."
            .as_bytes();
        let page = parse_page(body, &base(), "text/plain").unwrap();
        assert_eq!(page.lang, "eng");
    }

    #[test]
    fn test_null_bytes_removed() {
        let body = b"# Ti\x00tle\n";
        let page = parse_page(body, &base(), "text/gemini").unwrap();
        assert_eq!(page.title, "Title");
    }
}
