//! Scripted fakes for the pipeline's external services.
//!
//! Every fake records the calls it receives (with a tokio clock timestamp so
//! paused-time tests can check pacing) and answers from a script.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::time::Instant;

use autopub::adapters::{
    GenerateRequest, GenerateResponse, GenerativeService, ImageDownloader, MediaPayload,
    PlatformClient, PlatformError, PostRequest, ServiceError,
};
use autopub::core::{CancellationToken, Orchestrator, PipelineConfig, Services};
use autopub::domain::{PageTarget, RunParams};

pub const TEXT_MODEL: &str = "text-model";
pub const IMAGE_MODEL: &str = "image-model";
pub const SCORING_MODEL: &str = "scoring-model";

/// Kind of generation call, inferred from the request shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Text,
    Image,
    Score,
}

#[derive(Debug, Clone)]
pub struct GenCall {
    pub kind: CallKind,
    pub model: String,
    pub prompt: String,
    pub at: Instant,
}

/// Scripted answer
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Empty,
    Fail(String),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn score(value: u8, reason: &str) -> Self {
        Self::Text(format!(r#"{{"score": {}, "reason": "{}"}}"#, value, reason))
    }
}

fn classify(request: &GenerateRequest) -> CallKind {
    let wants_image = request
        .generation_config
        .as_ref()
        .map_or(false, |c| c.response_modalities.iter().any(|m| m == "IMAGE"));

    if wants_image {
        CallKind::Image
    } else if request.inline_image().is_some() {
        CallKind::Score
    } else {
        CallKind::Text
    }
}

/// Bytes of the n-th generated image (1-indexed)
pub fn image_bytes(n: usize) -> Vec<u8> {
    format!("image-{}", n).into_bytes()
}

/// Generative service answering from per-kind queues.
///
/// Text calls past the end of the script get a generic new description.
/// Image calls default to a fresh PNG; score calls default to 0.
#[derive(Default)]
pub struct FakeGenerative {
    texts: Mutex<VecDeque<Reply>>,
    images: Mutex<VecDeque<Reply>>,
    scores: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<GenCall>>,
    cancel_at: Mutex<Option<(usize, CancellationToken)>>,
    stall_at: Mutex<Option<(usize, Duration)>>,
}

impl FakeGenerative {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texts<I: IntoIterator<Item = Reply>>(self, replies: I) -> Self {
        self.texts.lock().unwrap().extend(replies);
        self
    }

    pub fn with_images<I: IntoIterator<Item = Reply>>(self, replies: I) -> Self {
        self.images.lock().unwrap().extend(replies);
        self
    }

    pub fn with_scores<I: IntoIterator<Item = Reply>>(self, replies: I) -> Self {
        self.scores.lock().unwrap().extend(replies);
        self
    }

    /// Cancel `token` while the `n`-th call (1-indexed) is in flight
    pub fn cancelling_at(self, n: usize, token: CancellationToken) -> Self {
        *self.cancel_at.lock().unwrap() = Some((n, token));
        self
    }

    /// Hold the `n`-th call (1-indexed) for `delay` before answering
    pub fn stalling_at(self, n: usize, delay: Duration) -> Self {
        *self.stall_at.lock().unwrap() = Some((n, delay));
        self
    }

    pub fn calls(&self) -> Vec<GenCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<CallKind> {
        self.calls().into_iter().map(|c| c.kind).collect()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind == kind).count()
    }
}

#[async_trait]
impl GenerativeService for FakeGenerative {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ServiceError> {
        let kind = classify(request);
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(GenCall {
                kind,
                model: model.to_string(),
                prompt: request.prompt_text(),
                at: Instant::now(),
            });
            calls.len()
        };

        if let Some((n, ref token)) = *self.cancel_at.lock().unwrap() {
            if n == call_number {
                token.cancel();
            }
        }

        let stall = *self.stall_at.lock().unwrap();
        if let Some((_, delay)) = stall.filter(|(n, _)| *n == call_number) {
            tokio::time::sleep(delay).await;
        }

        let image_number = self.count(CallKind::Image);
        let reply = match kind {
            CallKind::Text => self
                .texts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Reply::text(format!("A brand new scene, take {}", call_number))),
            CallKind::Image => self.images.lock().unwrap().pop_front().unwrap_or(Reply::Empty),
            CallKind::Score => self
                .scores
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Reply::score(0, "no score scripted")),
        };

        match (kind, reply) {
            (_, Reply::Fail(message)) => Err(ServiceError::api(503, message)),
            (CallKind::Image, Reply::Empty) => Ok(GenerateResponse::from_image(
                "image/png",
                STANDARD.encode(image_bytes(image_number)),
            )),
            // A text-only answer to an image request
            (_, Reply::Text(text)) => Ok(GenerateResponse::from_text(text)),
            (_, Reply::Empty) => Ok(GenerateResponse::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FollowUpCall {
    pub post_id: String,
    pub text: String,
    pub at: Instant,
}

/// Publishing platform with optional scripted failures
#[derive(Default)]
pub struct FakePlatform {
    fail_upload: Option<String>,
    fail_post: Option<String>,
    /// 0-indexed follow-up calls that fail
    fail_follow_ups: HashSet<usize>,
    stall_upload: Option<Duration>,
    cancel_on_upload: Option<CancellationToken>,
    uploads: Mutex<Vec<MediaPayload>>,
    posts: Mutex<Vec<PostRequest>>,
    follow_ups: Mutex<Vec<FollowUpCall>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_upload(mut self, message: &str) -> Self {
        self.fail_upload = Some(message.to_string());
        self
    }

    pub fn failing_post(mut self, message: &str) -> Self {
        self.fail_post = Some(message.to_string());
        self
    }

    pub fn failing_follow_ups<I: IntoIterator<Item = usize>>(mut self, indexes: I) -> Self {
        self.fail_follow_ups.extend(indexes);
        self
    }

    /// Hold every upload for `delay` before answering
    pub fn stalling_upload(mut self, delay: Duration) -> Self {
        self.stall_upload = Some(delay);
        self
    }

    /// Cancel `token` once an upload succeeds
    pub fn cancelling_on_upload(mut self, token: CancellationToken) -> Self {
        self.cancel_on_upload = Some(token);
        self
    }

    pub fn uploads(&self) -> Vec<MediaPayload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<PostRequest> {
        self.posts.lock().unwrap().clone()
    }

    pub fn follow_ups(&self) -> Vec<FollowUpCall> {
        self.follow_ups.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn upload_media(
        &self,
        _page: &PageTarget,
        media: &MediaPayload,
    ) -> Result<String, PlatformError> {
        if let Some(ref message) = self.fail_upload {
            return Err(PlatformError::new(message.clone()).with_code(324));
        }

        if let Some(delay) = self.stall_upload {
            tokio::time::sleep(delay).await;
        }

        let count = {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(media.clone());
            uploads.len()
        };
        if let Some(ref token) = self.cancel_on_upload {
            token.cancel();
        }
        Ok(format!("media-{}", count))
    }

    async fn create_post(
        &self,
        page: &PageTarget,
        post: &PostRequest,
    ) -> Result<String, PlatformError> {
        if let Some(ref message) = self.fail_post {
            return Err(PlatformError::new(message.clone()).with_code(200));
        }

        let mut posts = self.posts.lock().unwrap();
        posts.push(post.clone());
        Ok(format!("{}_post-{}", page.page_id, posts.len()))
    }

    async fn create_follow_up(
        &self,
        _page: &PageTarget,
        post_id: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        let mut follow_ups = self.follow_ups.lock().unwrap();
        let index = follow_ups.len();
        follow_ups.push(FollowUpCall {
            post_id: post_id.to_string(),
            text: text.to_string(),
            at: Instant::now(),
        });

        if self.fail_follow_ups.contains(&index) {
            return Err(PlatformError::new("(#368) The action attempted has been deemed abusive"));
        }
        Ok(())
    }
}

/// Downloader that always returns the same JPEG bytes
pub struct FakeDownloader;

#[async_trait]
impl ImageDownloader for FakeDownloader {
    async fn download(&self, _url: &str) -> Result<MediaPayload, ServiceError> {
        Ok(MediaPayload::new("image/jpeg", vec![0xff, 0xd8, 0xff]))
    }
}

pub fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.models.text = TEXT_MODEL.to_string();
    config.models.image = IMAGE_MODEL.to_string();
    config.models.scoring = SCORING_MODEL.to_string();
    config
}

pub fn orchestrator(generative: Arc<FakeGenerative>, platform: Arc<FakePlatform>) -> Orchestrator {
    Orchestrator::new(
        Services {
            generative,
            platform,
            downloader: Arc::new(FakeDownloader),
        },
        config(),
    )
}

pub fn params(language: &str) -> RunParams {
    RunParams::new(
        "coffee shops",
        "marketing",
        language,
        PageTarget::new("1001", "page-token"),
    )
}

/// Replies for the four content chain stages
pub fn english_chain() -> Vec<Reply> {
    vec![
        Reply::text("**Cold brew season is here**"),
        Reply::text("Cold brew is back! Smooth, bold and ready for summer. Visit us today. #coldbrew #coffee #summer"),
        Reply::text("1. What is your go-to summer coffee?\n2. Cold brew or iced latte, which team are you on?\n3. Have you ever made cold brew at home?"),
        Reply::text("A tall glass of cold brew on a wooden counter in warm morning light."),
    ]
}
