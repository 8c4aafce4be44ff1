//! Markup stripping for generated text.
//!
//! Removes heading markers, emphasis markers and list bullets that the
//! generator adds, while keeping hashtags, mentions, emoji and single
//! underscores. Passes are repeated until nothing changes, so stripping is
//! idempotent.

/// Inline emphasis markers, removed wherever they appear
const EMPHASIS: [&str; 4] = ["**", "__", "~~", "`"];

/// Maximum digits in a numbered-list prefix ("12. ")
const MAX_ORDINAL_DIGITS: usize = 2;

/// Strip structural markup from generated text
pub fn strip_markup(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_pass(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        let mut line = line.to_string();
        for marker in EMPHASIS {
            line = line.replace(marker, "");
        }
        line = line.replace('*', "");

        let line = strip_prefixes(&line).trim().to_string();

        // Collapse runs of blank lines
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }

    while out.last().map_or(false, |l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}

/// Remove leading heading markers and list bullets, repeatedly
fn strip_prefixes(line: &str) -> &str {
    let mut rest = line.trim_start();
    loop {
        let next = strip_heading(rest)
            .or_else(|| strip_bullet(rest))
            .or_else(|| strip_ordinal(rest));
        match next {
            Some(stripped) => rest = stripped.trim_start(),
            None => return rest,
        }
    }
}

/// "## Title" -> "Title"; "#hashtag" is left alone
fn strip_heading(line: &str) -> Option<&str> {
    let hashes = line.len() - line.trim_start_matches('#').len();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// "- item", "+ item", "• item" -> "item"
fn strip_bullet(line: &str) -> Option<&str> {
    for bullet in ["- ", "+ ", "• ", "· ", "– "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest);
        }
    }
    None
}

/// "1. item", "2) item" -> "item"
fn strip_ordinal(line: &str) -> Option<&str> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || digits > MAX_ORDINAL_DIGITS {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}
