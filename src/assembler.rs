//! Article assembly: raw generated text -> structured article fields
//!
//! Everything here is pure. The chain is:
//! 1. drop invalid UTF-8 and stray control characters
//! 2. split the title from the body
//! 3. derive the summary and slug from the unsanitized text
//! 4. sanitize title, body and summary for storage

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::OnceLock;

/// Title used when the generated text has no non-blank line
pub const FALLBACK_TITLE: &str = "Health and Wellness Article";

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_SLUG_CHARS: usize = 100;
pub const SUMMARY_CHARS: usize = 300;
pub const META_DESCRIPTION_CHARS: usize = 160;

/// Appended to summaries cut at `SUMMARY_CHARS`
pub const ELLIPSIS: &str = "...";

/// Status given to every freshly assembled article
pub const DRAFT_STATUS: &str = "draft";

/// How aggressively text is filtered before storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeMode {
    /// Strip control and zero-width characters only
    #[default]
    Unicode,
    /// Keep printable Latin-1 only, for storage that cannot hold other scripts
    Latin1,
}

impl FromStr for SanitizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unicode" | "utf8" | "utf-8" => Ok(SanitizeMode::Unicode),
            "latin1" | "latin-1" => Ok(SanitizeMode::Latin1),
            other => Err(format!("Unknown sanitize mode: {}", other)),
        }
    }
}

/// Structured article ready for the persistence sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledArticle {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub summary: String,
    pub meta_title: String,
    pub meta_description: String,
    pub status: String,
}

/// Run the full assembly chain over raw provider output
pub fn assemble(raw: &[u8], mode: SanitizeMode, now: DateTime<Utc>) -> AssembledArticle {
    let text = filter_content(&validate_encoding(raw));
    let (title, body) = parse_article(&text);

    let summary = generate_summary(&body);
    let slug = generate_slug(&title, now);

    let mut title = sanitize_for_storage(&title, mode, false).trim().to_string();
    if title.is_empty() {
        title = FALLBACK_TITLE.to_string();
    }
    let body = sanitize_for_storage(&body, mode, true);
    let summary = sanitize_for_storage(&summary, mode, false);
    let meta_description = truncate_chars(&summary, META_DESCRIPTION_CHARS).to_string();

    AssembledArticle {
        meta_title: title.clone(),
        title,
        slug,
        body,
        summary,
        meta_description,
        status: DRAFT_STATUS.to_string(),
    }
}

/// Decode bytes as UTF-8, discarding invalid sequences instead of replacing them
pub fn validate_encoding(raw: &[u8]) -> String {
    let mut text = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Normalize line endings and drop control/zero-width characters, keeping `\n` and `\t`
pub fn filter_content(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !(c.is_control() || is_zero_width(*c)))
        .collect()
}

/// Split generated Markdown into `(title, body)`
///
/// The first non-blank line is the title, with a leading `# ` stripped, and
/// the body starts after it. Headings further down stay in the body. Blank
/// lines at the edges of the body are dropped; blank lines inside it are kept.
pub fn parse_article(content: &str) -> (String, String) {
    let lines: Vec<&str> = content.lines().collect();

    let (raw_title, body_start) = match lines.iter().position(|line| !line.trim().is_empty()) {
        Some(index) => {
            let line = lines[index].trim_start();
            (line.strip_prefix("# ").unwrap_or(line), index + 1)
        }
        None => ("", lines.len()),
    };

    let title = clean_title(raw_title);
    let body = join_body(&lines[body_start..]);

    (title, body)
}

fn clean_title(raw: &str) -> String {
    let printable: String = raw
        .chars()
        .filter(|c| !c.is_control() && !is_zero_width(*c))
        .collect();
    let trimmed = printable.trim();
    if trimmed.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    truncate_chars(trimmed, MAX_TITLE_CHARS).trim_end().to_string()
}

fn join_body(lines: &[&str]) -> String {
    let is_blank = |line: &&str| line.trim().is_empty();
    let Some(first) = lines.iter().position(|line| !is_blank(line)) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !is_blank(line))
        .unwrap_or(first);

    lines[first..=last]
        .iter()
        .map(|line| if is_blank(line) { "" } else { line.trim_end() })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten the body to one line, capped at `SUMMARY_CHARS` plus an ellipsis
pub fn generate_summary(body: &str) -> String {
    let flat = body.replace('\n', " ");
    if flat.chars().count() > SUMMARY_CHARS {
        let mut summary = truncate_chars(&flat, SUMMARY_CHARS).to_string();
        summary.push_str(ELLIPSIS);
        summary
    } else {
        flat
    }
}

fn hyphen_runs() -> &'static Regex {
    static HYPHEN_RUNS: OnceLock<Regex> = OnceLock::new();
    HYPHEN_RUNS.get_or_init(|| Regex::new(r"-{2,}").expect("valid hyphen regex"))
}

/// Derive a URL slug (`[a-z0-9-]`) from a title
///
/// Titles with no usable ASCII fall back to `article-<unix-seconds>`.
pub fn generate_slug(title: &str, now: DateTime<Utc>) -> String {
    let ascii: String = title
        .to_lowercase()
        .chars()
        .filter(char::is_ascii)
        .collect();

    let allowed: String = ascii
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();

    let mut slug = hyphen_runs()
        .replace_all(&allowed, "-")
        .trim_matches('-')
        .to_string();

    if slug.is_empty() {
        slug = format!("article-{}", now.timestamp());
    }

    if slug.len() > MAX_SLUG_CHARS {
        slug.truncate(MAX_SLUG_CHARS);
        slug = slug.trim_end_matches('-').to_string();
    }

    slug
}

/// Make a taken slug unique by appending 8 hex chars of SHA-256(`seed`)
///
/// The base is shortened so the result stays within `MAX_SLUG_CHARS`.
pub fn disambiguate_slug(slug: &str, seed: &str) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    let suffix = &digest[..8];

    let max_base = MAX_SLUG_CHARS - suffix.len() - 1;
    let base = truncate_chars(slug, max_base).trim_end_matches('-');
    if base.is_empty() {
        suffix.to_string()
    } else {
        format!("{}-{}", base, suffix)
    }
}

/// Filter text for storage
///
/// `keep_newlines` keeps `\n` and `\t` (for bodies).
pub fn sanitize_for_storage(text: &str, mode: SanitizeMode, keep_newlines: bool) -> String {
    text.chars()
        .filter(|c| {
            if keep_newlines && (*c == '\n' || *c == '\t') {
                return true;
            }
            match mode {
                SanitizeMode::Unicode => !c.is_control() && !is_zero_width(*c),
                SanitizeMode::Latin1 => matches!(*c, ' '..='~' | '\u{A0}'..='\u{FF}'),
            }
        })
        .collect()
}

fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    )
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}
