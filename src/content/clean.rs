//! Post-processing of raw model output.

use std::collections::HashSet;

pub const MIN_TAG_LEN: usize = 3;
pub const MAX_TAG_LEN: usize = 25;
pub const MAX_KEYWORD_LEN: usize = 50;
pub const MAX_KEYWORD_WORDS: usize = 5;

/// Strip list decoration from one line: leading `#`, `1.`, `-`, `*`, and
/// markdown bold.
pub fn clean_line(line: &str) -> String {
    let mut line = strip_numbering(line.trim());
    for bullet in ["- ", "-", "* "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            line = rest;
            break;
        }
    }
    line = line.strip_prefix("**").unwrap_or(line);
    line = line.strip_suffix("**").unwrap_or(line);
    line = line.strip_prefix('#').unwrap_or(line);
    line.trim().to_string()
}

/// `12. text` / `12.text` -> `text`
fn strip_numbering(line: &str) -> &str {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match line[digits..].strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

/// Non-empty cleaned lines.
pub fn lines(response: &str) -> Vec<String> {
    response
        .lines()
        .map(clean_line)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Leading `[A-Za-z0-9_]` run of each line, kept when 3–25 chars long.
pub fn extract_hashtags(response: &str) -> Vec<String> {
    lines(response)
        .into_iter()
        .filter_map(|line| {
            let end = line
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(line.len());
            let tag = &line[..end];
            (MIN_TAG_LEN..=MAX_TAG_LEN)
                .contains(&tag.len())
                .then(|| tag.to_string())
        })
        .collect()
}

pub fn is_valid_hashtag(tag: &str) -> bool {
    (MIN_TAG_LEN..=MAX_TAG_LEN).contains(&tag.len())
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !tag.chars().all(|c| c.is_ascii_digit())
        && !tag.starts_with('_')
}

/// Valid hashtags, first occurrence wins (case-insensitive).
pub fn validate_hashtags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    dedup_case_insensitive(tags.into_iter().filter(|t| is_valid_hashtag(t)))
}

pub fn is_valid_keyword(tag: &str) -> bool {
    !tag.is_empty()
        && tag.chars().count() <= MAX_KEYWORD_LEN
        && tag.split_whitespace().count() <= MAX_KEYWORD_WORDS
}

/// YouTube keyword tags: one per line, plus comma-separated pieces when the
/// model ignored the line format.
pub fn extract_keywords(response: &str) -> Vec<String> {
    let mut keywords: Vec<String> = response
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .map(clean_line)
        .collect();

    if response.contains(',') {
        keywords.extend(
            response
                .split(|c| c == ',' || c == '\n')
                .filter(|piece| !piece.trim_start().starts_with('#'))
                .map(clean_line),
        );
    }

    dedup_case_insensitive(keywords.into_iter().filter(|k| is_valid_keyword(k) && !k.contains(',')))
}

pub fn dedup_case_insensitive(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}
