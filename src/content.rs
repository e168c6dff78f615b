//! Text helpers shared by the post lifecycle and the HTTP layer.

use chrono::{DateTime, Utc};

pub const WORDS_PER_MINUTE: usize = 200;
pub const EXCERPT_MAX_CHARS: usize = 200;

const FALLBACK_IMAGE: &str = "https://images.unsplash.com/photo-1499750310107-5fef28a66643";

/// Derive a URL slug from a title.
///
/// The title is lowercased, every character outside `[a-z0-9]` that is not a
/// separator (whitespace, `_`, `-`) is dropped, and each run of separators
/// becomes a single `-`. Leading and trailing separators never survive.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_sep = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        } else if c == '-' || c == '_' || c.is_whitespace() {
            pending_sep = true;
        }
    }
    slug
}

/// Estimated minutes to read `content`, never less than one.
pub fn read_time(content: &str) -> i32 {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Remove anything that looks like an HTML tag. An unterminated `<` is kept.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Text a post is searched by: title, body without markup, and tags.
pub fn search_document(title: &str, content: &str, tags: &[String]) -> String {
    format!("{title} {} {}", strip_tags(content), tags.join(" "))
}

/// Cut `text` to at most `max_chars` characters, backing off to the last
/// whole word and appending `...` when anything was removed.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(' ') {
        Some(idx) if idx > 0 => format!("{}...", &truncated[..idx]),
        _ => format!("{truncated}..."),
    }
}

/// Plain-text summary of rich-text content.
pub fn generate_excerpt(content: &str, max_chars: usize) -> String {
    truncate_text(strip_tags(content).trim(), max_chars)
}

/// Trim every tag, drop empties and keep the first occurrence of duplicates.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub fn fallback_image(width: u32, height: u32) -> String {
    format!("{FALLBACK_IMAGE}?w={width}&h={height}&fit=crop&crop=center")
}

/// The stored image URL, or a deterministic stock image when the URL is
/// blank or points at a placeholder service.
pub fn safe_image_url(url: Option<&str>, width: u32, height: u32) -> String {
    match url.map(str::trim) {
        Some(u) if !u.is_empty() && !u.contains("placeholder.com") => u.to_string(),
        _ => fallback_image(width, height),
    }
}

/// Human readable distance between `date` and `now`, e.g. "3 days ago".
pub fn time_ago(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(date).num_seconds();
    let phrase = distance_phrase(delta.unsigned_abs());
    if delta < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn distance_phrase(secs: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const MONTH: u64 = 30 * DAY;
    const YEAR: u64 = 365 * DAY;

    let round = |unit: u64| (secs + unit / 2) / unit;
    match secs {
        s if s < 45 => "less than a minute".to_string(),
        s if s < 90 => "1 minute".to_string(),
        s if s < 45 * MINUTE => format!("{} minutes", round(MINUTE)),
        s if s < 90 * MINUTE => "about 1 hour".to_string(),
        s if s < DAY => format!("about {} hours", round(HOUR)),
        s if s < 42 * HOUR => "1 day".to_string(),
        s if s < MONTH => format!("{} days", round(DAY)),
        s if s < 45 * DAY => "about 1 month".to_string(),
        s if s < YEAR => format!("{} months", round(MONTH).max(2)),
        s if s < 2 * YEAR => "about 1 year".to_string(),
        _ => format!("about {} years", secs / YEAR),
    }
}

/// Loose `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else { return false };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
