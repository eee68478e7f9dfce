//! Plain-text parsing: email messages, RFC documents, ordinary text

use regex::Regex;
use std::sync::OnceLock;

use super::text::is_mostly_alphanumeric;
use super::Page;

/// Only this many leading bytes are inspected for the RFC header block
const RFC_SCAN_LIMIT: usize = 1024;

fn rfc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Request for Comments: (?P<rfc>\d+)(?P<rest>.+?)(?:Status of this Memo|Abstract)")
            .expect("rfc regex")
    })
}

pub fn parse_plain(text: &str) -> Page {
    let mut page = Page {
        text: text.to_string(),
        ..Page::default()
    };

    // mailing list archives: use the subject line as the title
    if let Some(message) = parse_email(text) {
        page.kind = "email".to_string();
        if !message.subject.is_empty() {
            page.title = message.subject.clone();
            let ct = message.content_type.to_lowercase();
            if !ct.is_empty() && !ct.starts_with("text/") && !ct.starts_with("multipart/") {
                page.text = message.subject;
            } else {
                page.text = format!("{}\n\n{}", message.subject, message.body);
            }
            return page;
        }
    }

    // RFC documents carry a standard header block
    if text.len() > RFC_SCAN_LIMIT {
        let mut cut = RFC_SCAN_LIMIT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        if let Some(title) = parse_rfc(&text[..cut]) {
            page.kind = "rfc".to_string();
            page.title = title;
            return page;
        }
    }

    page.title = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && is_mostly_alphanumeric(line))
        .unwrap_or("")
        .to_string();

    page
}

struct EmailMessage {
    subject: String,
    content_type: String,
    body: String,
}

/// Attempts to read the text as an RFC-822-style message: a block of
/// header lines followed by a blank line and the body. Returns None when
/// the leading lines do not form a valid header block.
fn parse_email(text: &str) -> Option<EmailMessage> {
    let mut subject = String::new();
    let mut content_type = String::new();
    let mut header_lines = 0usize;
    let mut body_offset = text.len();

    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);

        if trimmed.is_empty() {
            body_offset = offset + line.len();
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // folded continuation of the previous header
            if header_lines == 0 {
                return None;
            }
        } else {
            let (name, value) = trimmed.split_once(':')?;
            if name.is_empty() || name.contains(' ') || !name.is_ascii() {
                return None;
            }
            if name.eq_ignore_ascii_case("subject") {
                subject = value.trim().to_string();
            } else if name.eq_ignore_ascii_case("content-type") {
                content_type = value.trim().to_string();
            }
        }

        header_lines += 1;
        offset += line.len();
    }

    if header_lines == 0 {
        return None;
    }

    Some(EmailMessage {
        subject,
        content_type,
        body: text[body_offset.min(text.len())..].to_string(),
    })
}

/// Extracts `RFC <num> - <title>` from an RFC header block. The title is
/// the paragraph following the first blank line after the
/// "Request for Comments" field, terminated by the next blank line.
fn parse_rfc(text: &str) -> Option<String> {
    let m = rfc_re().captures(text)?;
    let number = m.name("rfc")?.as_str();
    let rest = m.name("rest")?.as_str();

    let mut title = String::new();
    let mut started = false;
    for line in rest.split('\n') {
        let line = line.trim_end_matches('\r');
        if !started {
            if line.is_empty() {
                started = true;
            }
            continue;
        }

        if line.is_empty() && title.is_empty() {
            continue;
        }
        if line.is_empty() {
            break;
        }

        if title.is_empty() {
            title = line.trim().to_string();
        } else {
            title.push(' ');
            title.push_str(line.trim());
        }
    }

    Some(format!("RFC {} - {}", number, title))
}
