//! Text cleanup helpers shared by the page parsers

use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of an extracted title
pub const MAX_TITLE_LENGTH: usize = 72;

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            "[\u{1B}\u{9B}][\\[\\]()#;?]*(?:(?:(?:[a-zA-Z\\d]*(?:;[a-zA-Z\\d]*)*)?\u{07})|(?:(?:\\d{1,4}(?:;\\d{0,4})*)?[\\dA-PRZcf-ntqry=><~]))",
        )
        .expect("ansi regex")
    })
}

fn punct_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[`"~!@#$%^&*_=+/|<>'()\[\]{},.;:\\ -]{5,}"#).expect("punct regex")
    })
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("space regex"))
}

fn newline_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{2,}").expect("newline regex"))
}

/// Strips terminal escapes and collapses runs of punctuation and
/// whitespace. Applied to both extracted text and titles.
pub fn clean_text(input: &str) -> String {
    let cleaned = ansi_re().replace_all(input, "");
    let cleaned = punct_run_re().replace_all(&cleaned, " ");
    let cleaned = space_run_re().replace_all(&cleaned, " ");
    cleaned.into_owned()
}

/// Drops whitespace-only lines and collapses consecutive newlines
pub fn collapse_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.split('\n') {
        if !line.is_empty() && line.trim().is_empty() {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    newline_run_re().replace_all(&out, "\n").into_owned()
}

/// Decodes raw bytes into text: invalid sequences and null bytes are
/// dropped.
pub fn decode_lossy(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .filter(|&c| c != '\u{FFFD}' && c != '\0')
        .collect()
}

/// True when more than 60% of the string's code points are letters or
/// digits. The empty string is not mostly alphanumeric.
pub fn is_mostly_alphanumeric(s: &str) -> bool {
    let mut total = 0usize;
    let mut alnum = 0usize;
    for c in s.chars() {
        total += 1;
        if c.is_alphanumeric() {
            alnum += 1;
        }
    }
    if total == 0 {
        return false;
    }
    alnum as f64 / total as f64 > 0.6
}

/// Predicate for keeping preformatted blocks: mostly alphanumeric text
/// whose mean word length stays at or below 7. Filters out ascii art
/// while keeping ordinary prose wrapped in a fence.
pub fn looks_like_prose(s: &str) -> bool {
    if !is_mostly_alphanumeric(s) {
        return false;
    }

    let words: Vec<&str> = s.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    let total: usize = words.iter().map(|w| w.len()).sum();
    let mean = total as f64 / words.len() as f64;
    mean <= 7.0
}

/// Truncates a title to [`MAX_TITLE_LENGTH`], cutting back to the
/// preceding space when the cut lands mid-word near the end, and
/// appending an ellipsis.
pub fn shorten_title(title: &str) -> String {
    if title.len() <= MAX_TITLE_LENGTH {
        return title.to_string();
    }

    let mut cut = MAX_TITLE_LENGTH;
    while !title.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut shortened = &title[..cut];

    if shortened.ends_with(' ') {
        shortened = shortened.trim_end();
    } else if let Some(idx) = shortened.rfind(' ') {
        // the last word is likely incomplete
        if idx > 0 && idx + 10 > shortened.len() {
            shortened = &shortened[..idx];
        }
    }

    format!("{}...", shortened)
}

/// Detects the language of the given text, as a three-letter code
pub fn detect_lang(text: &str) -> Option<String> {
    whatlang::detect(text).map(|info| info.lang().code().to_string())
}
