//! Line-oriented gemtext parser
//!
//! Handles headings, links, quotes and preformatted blocks. Link targets
//! are resolved against the base URL, normalized, and kept only when they
//! stay on the gemini scheme.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::url::normalize_url;

use super::text::{is_mostly_alphanumeric, looks_like_prose, shorten_title};
use super::{Heading, Link, Page};

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#+) *(?P<heading>.+) *$").expect("heading regex"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^=> *(?P<linkurl>.*?)(?: +(?P<linktext>.+))? *$").expect("link regex"))
}

fn pre_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^``` *(?P<prealt>.*?) *$").expect("pre regex"))
}

pub fn parse_gemtext(text: &str, base: &Url) -> Page {
    let mut page = Page::default();
    let mut out = String::new();

    let mut first_line = String::new();
    let mut in_pre = false;
    let mut pre_text = String::new();

    for line in text.split('\n') {
        let line = line.trim_end_matches(['\r', ' ']);

        if let Some(m) = pre_re().captures(line) {
            if !in_pre {
                let alt = m.name("prealt").map(|a| a.as_str()).unwrap_or("");
                if !alt.is_empty() {
                    out.push_str(alt);
                    out.push('\n');
                }
                pre_text.clear();
            } else if looks_like_prose(&pre_text) {
                out.push_str(&pre_text);
            }
            in_pre = !in_pre;
            continue;
        }

        if in_pre {
            if is_mostly_alphanumeric(line) {
                pre_text.push_str(line);
                pre_text.push('\n');
            }
            continue;
        }

        if line.starts_with('>') {
            continue;
        }

        if let Some(m) = heading_re().captures(line) {
            let heading = Heading {
                level: m.get(1).map(|h| h.as_str().len()).unwrap_or(1),
                text: m.name("heading").map(|t| t.as_str()).unwrap_or("").to_string(),
            };
            out.push_str(&heading.text);
            out.push('\n');
            page.headings.push(heading);
            continue;
        }

        if let Some(m) = link_re().captures(line) {
            let mut raw = m.name("linkurl").map(|u| u.as_str()).unwrap_or("").to_string();
            let anchor = m.name("linktext").map(|t| t.as_str()).unwrap_or("").to_string();

            // clients treat a leading //foo the same as /foo; so do we
            if raw.starts_with("//") {
                raw.remove(0);
            }

            let resolved = match base.join(&raw) {
                Ok(u) => u,
                Err(_) => continue,
            };
            let normalized = match normalize_url(&resolved) {
                Ok(u) => u,
                Err(_) => continue,
            };
            if normalized.scheme() != "gemini" {
                continue;
            }

            if !anchor.is_empty() {
                out.push_str(&anchor);
                out.push('\n');
            }

            page.links.push(Link {
                url: normalized.to_string(),
                text: anchor,
            });
            continue;
        }

        if !line.is_empty() {
            if first_line.is_empty() && is_mostly_alphanumeric(line) {
                first_line = line.to_string();
            }
            out.push_str(line);
            out.push('\n');
        }
    }

    page.text = out;

    // title precedence: level-1 mostly-alphanumeric heading, then any
    // heading, then the first prose line, then the first readable anchor
    page.title = page
        .headings
        .iter()
        .find(|h| h.level == 1 && is_mostly_alphanumeric(&h.text))
        .or_else(|| page.headings.first())
        .map(|h| h.text.clone())
        .unwrap_or_default();

    if page.title.is_empty() {
        page.title = first_line;
    }

    if page.title.is_empty() {
        if let Some(link) = page.links.iter().find(|l| is_mostly_alphanumeric(&l.text)) {
            page.title = link.text.clone();
        }
    }

    page.title = shorten_title(page.title.trim());

    page
}
