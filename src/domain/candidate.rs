//! Image attempts recorded by the quality gate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a generated image.
///
/// Either an inline `data:<mime>;base64,<payload>` URL or a remote
/// `http(s)://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Build an inline reference from base64 data
    pub fn inline(mime_type: &str, base64_data: &str) -> Self {
        Self(format!("data:{};base64,{}", mime_type, base64_data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Split an inline reference into (mime type, base64 payload)
    pub fn inline_parts(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        Some((if mime.is_empty() { "image/png" } else { mime }, data))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Inline payloads are large, only show the header
        if let Some((mime, data)) = self.inline_parts() {
            write!(f, "data:{} ({} base64 chars)", mime, data.len())
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Gate decision for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// One generated-and-scored image attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// 1-indexed attempt number within the gate
    pub attempt: u32,

    /// The generated image
    pub image: ImageRef,

    /// Description that produced the image
    pub description: String,

    /// Relevance score (0-100)
    pub score: u8,

    pub verdict: Verdict,

    /// Scorer's explanation for the score
    pub rationale: String,

    pub created_at: DateTime<Utc>,
}

impl ImageCandidate {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}
