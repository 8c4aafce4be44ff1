//! Parsing of image relevance scores.
//!
//! The scorer is asked for `{"score": N, "reason": "..."}`. When the answer is
//! not readable JSON, the first percentage in the text is used; when there is
//! none, the caller's fallback score applies. The fallback is always below
//! the acceptance threshold.

use serde::Deserialize;
use serde_json::Value;

/// Longest rationale kept from free-text answers
const MAX_RATIONALE_CHARS: usize = 500;

/// A parsed score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    /// 0-100
    pub value: u8,

    pub rationale: String,

    /// How the value was obtained
    pub source: ScoreSource,
}

/// Where a score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    /// Structured JSON answer
    Structured,

    /// Percentage found in free text
    Percentage,

    /// Nothing readable, fallback used
    Fallback,
}

#[derive(Debug, Deserialize)]
struct RawScore {
    score: Value,
    #[serde(default, alias = "rationale", alias = "reasoning", alias = "explanation")]
    reason: Option<String>,
}

/// Parse a scorer answer
pub fn parse_score(raw: &str, fallback: u8) -> Score {
    if let Some(score) = parse_structured(raw) {
        return score;
    }

    let rationale = truncate(raw.trim(), MAX_RATIONALE_CHARS);

    match first_percentage(raw) {
        Some(value) => Score {
            value,
            rationale,
            source: ScoreSource::Percentage,
        },
        None => Score {
            value: fallback,
            rationale: if rationale.is_empty() {
                "scorer returned no readable score".to_string()
            } else {
                rationale
            },
            source: ScoreSource::Fallback,
        },
    }
}

fn parse_structured(raw: &str) -> Option<Score> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }

    let parsed: RawScore = serde_json::from_str(&raw[start..=end]).ok()?;
    let value = match parsed.score {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !value.is_finite() {
        return None;
    }

    Some(Score {
        value: value.round().clamp(0.0, 100.0) as u8,
        rationale: parsed.reason.unwrap_or_default().trim().to_string(),
        source: ScoreSource::Structured,
    })
}

/// First integer immediately followed by '%' (spaces allowed), capped at 100
fn first_percentage(text: &str) -> Option<u8> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let digits: String = chars[start..i].iter().collect();

        let mut j = i;
        while j < chars.len() && chars[j] == ' ' {
            j += 1;
        }

        // Skip decimals like "82.5%": take the integer part
        if j < chars.len() && chars[j] == '.' {
            let mut k = j + 1;
            while k < chars.len() && chars[k].is_ascii_digit() {
                k += 1;
            }
            if k > j + 1 && k < chars.len() && chars[k] == '%' {
                j = k;
            }
        }

        if j < chars.len() && chars[j] == '%' {
            let value = digits.parse::<u64>().unwrap_or(u64::MAX).min(100);
            return Some(value as u8);
        }
    }

    None
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
