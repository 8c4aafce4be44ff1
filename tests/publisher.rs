//! Publishing Coordinator Integration Tests
//!
//! Request shapes for immediate and scheduled posts, and follow-up pacing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use tokio_test::{assert_err, assert_ok};

use autopub::core::{validate_schedule, CancellationToken, PipelineError, PublishPolicy, Publisher};
use autopub::domain::{
    ImageCandidate, ImageRef, PageTarget, PublishMode, Stage, StepLedger, StepStatus, Verdict,
};
use common::{FakeDownloader, FakePlatform};

fn publisher(platform: Arc<FakePlatform>, delay_ms: u64) -> Publisher {
    Publisher::new(
        platform,
        Arc::new(FakeDownloader),
        PublishPolicy {
            follow_up_delay_ms: delay_ms,
        },
        Duration::from_secs(30),
    )
}

fn candidate(image: ImageRef) -> ImageCandidate {
    ImageCandidate {
        attempt: 1,
        image,
        description: "A bowl of ramen".to_string(),
        score: 88,
        verdict: Verdict::Accepted,
        rationale: "On topic".to_string(),
        created_at: Utc::now(),
    }
}

fn page() -> PageTarget {
    PageTarget::new("42", "token")
}

fn prompts() -> Vec<String> {
    vec![
        "Which topping do you add first?".to_string(),
        "Spicy or mild broth, what's your pick?".to_string(),
        "Where did you eat your best ramen?".to_string(),
    ]
}

#[tokio::test]
async fn test_immediate_post_shape() {
    let platform = Arc::new(FakePlatform::new());
    let publisher = publisher(platform.clone(), 1500);
    let image = ImageRef::inline("image/png", &STANDARD.encode(b"png-bytes"));
    let mut ledger = StepLedger::for_pipeline();
    ledger.begin("publish");

    let post = assert_ok!(
        publisher
            .publish(
                &page(),
                &candidate(image),
                "Slurp season #ramen",
                None,
                &mut ledger,
                &CancellationToken::new(),
            )
            .await
    );

    assert_eq!(post.mode, PublishMode::Immediate);
    assert_eq!(post.media_id, "media-1");
    assert_eq!(post.post_id, "42_post-1");

    let uploads = platform.uploads();
    assert_eq!(uploads[0].bytes, b"png-bytes".to_vec());

    let request = &platform.posts()[0];
    assert!(request.mode.published_flag());
    assert_eq!(request.mode.scheduled_time(), None);
    assert_eq!(request.message, "Slurp season #ramen");

    let step = ledger.get("publish").unwrap();
    assert_eq!(step.status, StepStatus::Running);
    assert_eq!(step.progress, Some(60));
}

#[tokio::test]
async fn test_scheduled_post_shape_and_remote_image() {
    let platform = Arc::new(FakePlatform::new());
    let publisher = publisher(platform.clone(), 1500);
    let when = Utc::now() + chrono::Duration::days(2);
    let window = assert_ok!(validate_schedule(Utc::now(), when));

    let post = publisher
        .publish(
            &page(),
            &candidate(ImageRef::new("https://cdn.example.com/ramen.jpg")),
            "Tomorrow: ramen night",
            Some(&window),
            &mut StepLedger::for_pipeline(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(post.mode.scheduled_time(), Some(when.timestamp()));

    let request = &platform.posts()[0];
    assert!(!request.mode.published_flag());
    assert_eq!(request.mode.scheduled_time(), Some(when.timestamp()));

    // Remote references are downloaded before upload
    assert_eq!(platform.uploads()[0].mime_type, "image/jpeg");
}

#[tokio::test]
async fn test_stale_schedule_is_rejected_before_upload() {
    let platform = Arc::new(FakePlatform::new());
    let publisher = publisher(platform.clone(), 1500);

    // Valid when checked an hour ago, too soon now
    let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
    let window = validate_schedule(an_hour_ago, Utc::now() + chrono::Duration::minutes(5)).unwrap();

    let result = publisher
        .publish(
            &page(),
            &candidate(ImageRef::new("https://cdn.example.com/ramen.jpg")),
            "Soon",
            Some(&window),
            &mut StepLedger::for_pipeline(),
            &CancellationToken::new(),
        )
        .await;

    let err = assert_err!(result);
    assert!(matches!(err, PipelineError::ScheduleInvalid(_)));
    assert!(platform.uploads().is_empty());
}

#[tokio::test]
async fn test_broken_inline_image_is_upload_failure() {
    let platform = Arc::new(FakePlatform::new());
    let publisher = publisher(platform.clone(), 1500);

    let result = publisher
        .publish(
            &page(),
            &candidate(ImageRef::inline("image/png", "%%not-base64%%")),
            "Oops",
            None,
            &mut StepLedger::for_pipeline(),
            &CancellationToken::new(),
        )
        .await;

    match assert_err!(result) {
        PipelineError::UploadFailed { message } => assert!(message.contains("could not prepare image")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(platform.uploads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_follow_ups_are_sequential_and_paced() {
    let platform = Arc::new(FakePlatform::new());
    let publisher = publisher(platform.clone(), 2000);
    let mut ledger = StepLedger::for_pipeline();
    ledger.begin("follow_ups");

    let summary = publisher
        .post_follow_ups(&page(), "42_7", &prompts(), &mut ledger, &CancellationToken::new())
        .await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert!(summary.failures.is_empty());
    assert!(!summary.aborted);

    let calls = platform.follow_ups();
    let texts: Vec<&str> = calls.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, prompts().iter().map(String::as_str).collect::<Vec<_>>());
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_millis(2000));
    }

    let step = ledger.get("follow_ups").unwrap();
    assert_eq!(step.progress, Some(100));
    assert_eq!(step.detail.as_deref(), Some("3/3 posted"));
}

#[tokio::test(start_paused = true)]
async fn test_delay_has_a_one_second_floor() {
    let platform = Arc::new(FakePlatform::new());
    let publisher = publisher(platform.clone(), 0);

    publisher
        .post_follow_ups(
            &page(),
            "42_7",
            &prompts(),
            &mut StepLedger::for_pipeline(),
            &CancellationToken::new(),
        )
        .await;

    let calls = platform.follow_ups();
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_follow_up_does_not_stop_the_rest() {
    let platform = Arc::new(FakePlatform::new().failing_follow_ups([0]));
    let publisher = publisher(platform.clone(), 1500);

    let summary = publisher
        .post_follow_ups(
            &page(),
            "42_7",
            &prompts(),
            &mut StepLedger::for_pipeline(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(platform.follow_ups().len(), 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failures[0].index, 0);

    let errors = summary.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].stage(), Stage::FollowUps);
    assert!(!errors[0].is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_follow_ups() {
    let platform = Arc::new(FakePlatform::new());
    let publisher = publisher(platform.clone(), 1500);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        // Lands inside the pause after the first follow-up
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let summary = publisher
        .post_follow_ups(&page(), "42_7", &prompts(), &mut StepLedger::for_pipeline(), &cancel)
        .await;

    assert!(summary.aborted);
    assert_eq!(platform.follow_ups().len(), 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures.len(), 2);
    assert!(summary.failures.iter().all(|f| f.error == "run aborted"));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_upload_is_upload_failure() {
    let platform = Arc::new(FakePlatform::new().stalling_upload(Duration::from_secs(3600)));
    let publisher = publisher(platform.clone(), 1500);

    let result = publisher
        .publish(
            &page(),
            &candidate(ImageRef::new("https://cdn.example.com/ramen.jpg")),
            "Slow",
            None,
            &mut StepLedger::for_pipeline(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(
        assert_err!(result),
        PipelineError::UploadFailed {
            message: "timed out after 30s".to_string()
        }
    );
    assert!(platform.posts().is_empty());
}

#[tokio::test]
async fn test_cancel_after_upload_keeps_media_handle() {
    let cancel = CancellationToken::new();
    let platform = Arc::new(FakePlatform::new().cancelling_on_upload(cancel.clone()));
    let publisher = publisher(platform.clone(), 1500);
    let mut ledger = StepLedger::for_pipeline();
    ledger.begin("publish");

    let result = publisher
        .publish(
            &page(),
            &candidate(ImageRef::new("https://cdn.example.com/ramen.jpg")),
            "Never posted",
            None,
            &mut ledger,
            &cancel,
        )
        .await;

    assert_eq!(
        assert_err!(result),
        PipelineError::Aborted {
            stage: Stage::Publish
        }
    );
    assert_eq!(platform.uploads().len(), 1);
    assert!(platform.posts().is_empty());

    let step = ledger.get("publish").unwrap();
    assert_eq!(step.detail.as_deref(), Some("media media-1 uploaded"));
}
