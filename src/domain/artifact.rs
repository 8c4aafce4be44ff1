//! Content produced by the generation chain.
//!
//! Each chain stage reads the artifact produced so far and returns a new one
//! with its own field filled in. A consumed artifact is never changed in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated output of the content generation chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Post topic
    pub topic: String,

    /// Post body text
    pub body: String,

    /// Interactive prompts posted as follow-ups (at most 3)
    pub prompts: Vec<String>,

    /// Description handed to the image model
    pub image_description: String,

    /// When the latest field was produced
    pub updated_at: Option<DateTime<Utc>>,
}

impl GeneratedArtifact {
    /// Start an empty artifact
    pub fn new() -> Self {
        Self::default()
    }

    /// New artifact with the topic set
    pub fn with_topic(&self, topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            updated_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// New artifact with the body text set
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            updated_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// New artifact with the interactive prompts set
    pub fn with_prompts(&self, prompts: Vec<String>) -> Self {
        Self {
            prompts,
            updated_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// New artifact with the image description set
    pub fn with_image_description(&self, description: impl Into<String>) -> Self {
        Self {
            image_description: description.into(),
            updated_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// True once every stage has filled its field
    pub fn is_complete(&self) -> bool {
        !self.topic.is_empty()
            && !self.body.is_empty()
            && !self.prompts.is_empty()
            && !self.image_description.is_empty()
    }
}
