//! Image Quality Gate Integration Tests
//!
//! Drives the generate/score/retry loop directly with scripted services.

mod common;

use std::sync::Arc;
use std::time::Duration;

use autopub::core::{
    CancellationToken, GateModels, GatePolicy, GateState, LanguagePolicy, PipelineError,
    QualityGate,
};
use autopub::domain::{GeneratedArtifact, Stage, StepLedger, StepStatus, Verdict};
use common::{CallKind, FakeDownloader, FakeGenerative, Reply};

fn gate(generative: Arc<FakeGenerative>, policy: GatePolicy) -> QualityGate {
    QualityGate::new(
        generative,
        Arc::new(FakeDownloader),
        GateModels {
            image: common::IMAGE_MODEL.to_string(),
            scoring: common::SCORING_MODEL.to_string(),
            text: common::TEXT_MODEL.to_string(),
        },
        policy,
        Duration::from_secs(30),
    )
}

fn artifact() -> GeneratedArtifact {
    GeneratedArtifact::new()
        .with_topic("Croissant mornings")
        .with_body("Fresh croissants every morning from 7am. #bakery")
        .with_prompts(vec!["What pairs best with a croissant?".to_string()])
        .with_image_description("A golden croissant on a linen napkin beside a cappuccino.")
}

fn ledger() -> StepLedger {
    let mut ledger = StepLedger::for_pipeline();
    ledger.begin("image_gate");
    ledger
}

#[tokio::test]
async fn test_image_calls_bounded_by_retries() {
    for max_retries in [0u32, 1, 3] {
        let generative = Arc::new(FakeGenerative::new());
        let policy = GatePolicy {
            max_retries,
            ..Default::default()
        };
        let gate = gate(generative.clone(), policy);

        let outcome = gate
            .run(
                &artifact(),
                LanguagePolicy::default_policy(),
                &mut ledger(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            outcome.error,
            Some(PipelineError::QualityGateExhausted {
                attempts: max_retries + 1
            })
        );
        assert_eq!(generative.count(CallKind::Image), (max_retries + 1) as usize);
        // One rewrite between consecutive attempts
        assert_eq!(generative.count(CallKind::Text), max_retries as usize);
        assert_eq!(outcome.candidates.len(), (max_retries + 1) as usize);
    }
}

#[tokio::test]
async fn test_unreadable_score_is_rejected() {
    let generative = Arc::new(FakeGenerative::new().with_scores([
        Reply::text("What a lovely picture!"),
        Reply::Empty,
        Reply::score(95, "Perfect"),
    ]));
    let gate = gate(generative.clone(), GatePolicy::default());

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::default_policy(),
            &mut ledger(),
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success());
    let scores: Vec<u8> = outcome.candidates.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![0, 0, 95]);
    assert_eq!(outcome.accepted().unwrap().attempt, 3);
}

#[tokio::test]
async fn test_fallback_never_accepts() {
    let generative = Arc::new(FakeGenerative::new().with_scores([Reply::text("no idea")]));
    let policy = GatePolicy {
        max_retries: 0,
        fallback_score: 100,
        ..Default::default()
    };
    let gate = gate(generative, policy);

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::default_policy(),
            &mut ledger(),
            &CancellationToken::new(),
        )
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.candidates[0].score, 74);
    assert_eq!(outcome.candidates[0].verdict, Verdict::Rejected);
}

#[tokio::test]
async fn test_percentage_scores_are_used() {
    let generative = Arc::new(
        FakeGenerative::new().with_scores([Reply::text("I would say 79% relevant, nice light.")]),
    );
    let gate = gate(generative, GatePolicy::default());

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::default_policy(),
            &mut ledger(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.accepted().unwrap().score, 79);
}

#[tokio::test]
async fn test_retry_description_differs_and_targets_language() {
    let previous = artifact().image_description;
    let generative = Arc::new(
        FakeGenerative::new()
            // The rewrite echoes the rejected description
            .with_texts([Reply::text(previous.clone())])
            .with_scores([
                Reply::score(40, "The croissant looks burnt"),
                Reply::score(85, "Appetizing"),
            ]),
    );
    let gate = gate(generative.clone(), GatePolicy::default());

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::lookup("fr"),
            &mut ledger(),
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.candidates[0].description, previous);
    assert_ne!(outcome.candidates[1].description, previous);
    assert!(outcome.candidates[1]
        .description
        .contains("The croissant looks burnt"));

    let rewrite = &generative.calls()[2];
    assert_eq!(rewrite.kind, CallKind::Text);
    assert_eq!(rewrite.model, common::TEXT_MODEL);
    assert!(rewrite.prompt.contains("French"));
}

#[tokio::test]
async fn test_progress_is_reported_per_attempt() {
    let generative = Arc::new(FakeGenerative::new().with_scores([
        Reply::score(10, "Off topic"),
        Reply::score(80, "Good"),
    ]));
    let gate = gate(generative, GatePolicy::default());
    let mut ledger = ledger();

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::default_policy(),
            &mut ledger,
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success());
    let step = ledger.get("image_gate").unwrap();
    assert_eq!(step.status, StepStatus::Running);
    assert_eq!(step.progress, Some(50));
    assert!(step.detail.as_deref().unwrap().starts_with("attempt 2/4"));
}

#[tokio::test]
async fn test_advance_walks_the_state_machine() {
    let generative = Arc::new(FakeGenerative::new().with_scores([Reply::score(30, "Too dark")]));
    let policy = GatePolicy {
        max_retries: 0,
        ..Default::default()
    };
    let gate = gate(generative, policy);
    let cancel = CancellationToken::new();
    let artifact = artifact();
    let language = LanguagePolicy::default_policy();
    let mut candidates = Vec::new();

    let state = GateState::start(artifact.image_description.clone());
    let state = gate
        .advance(state, &artifact, language, &mut candidates, &cancel)
        .await
        .unwrap();
    assert!(matches!(state, GateState::Scoring { attempt: 1, .. }));
    assert!(candidates.is_empty());

    let state = gate
        .advance(state, &artifact, language, &mut candidates, &cancel)
        .await
        .unwrap();
    assert!(matches!(state, GateState::Rejected { attempt: 1, .. }));
    assert_eq!(candidates.len(), 1);

    let state = gate
        .advance(state, &artifact, language, &mut candidates, &cancel)
        .await
        .unwrap();
    assert_eq!(state, GateState::Exhausted { attempts: 1 });
    assert!(state.is_terminal());
}

#[tokio::test]
async fn test_cancel_during_scoring_discards_score() {
    let cancel = CancellationToken::new();
    // Call 1 is the image, call 2 the score
    let generative = Arc::new(
        FakeGenerative::new()
            .with_scores([Reply::score(99, "Great")])
            .cancelling_at(2, cancel.clone()),
    );
    let gate = gate(generative.clone(), GatePolicy::default());

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::default_policy(),
            &mut ledger(),
            &cancel,
        )
        .await;

    assert!(matches!(outcome.error, Some(PipelineError::Aborted { .. })));
    assert!(outcome.candidates.is_empty());
    assert_eq!(generative.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_image_call_fails_the_gate() {
    let generative = Arc::new(FakeGenerative::new().stalling_at(1, Duration::from_secs(3600)));
    let gate = gate(generative.clone(), GatePolicy::default());

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::default_policy(),
            &mut ledger(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(
        outcome.error,
        Some(PipelineError::GenerationRequestFailed {
            stage: Stage::ImageGate,
            message: "timed out after 30s".to_string(),
        })
    );
    assert!(outcome.candidates.is_empty());
    assert_eq!(generative.calls().len(), 1);
}

#[tokio::test]
async fn test_unbounded_retry_setting_still_accepts() {
    let generative = Arc::new(FakeGenerative::new().with_scores([Reply::score(90, "Sharp")]));
    let policy: GatePolicy = serde_yaml::from_str("max_retries: 4294967295").unwrap();
    let gate = gate(generative, policy);
    let mut ledger = ledger();

    let outcome = gate
        .run(
            &artifact(),
            LanguagePolicy::default_policy(),
            &mut ledger,
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.accepted().unwrap().attempt, 1);
    let step = ledger.get("image_gate").unwrap();
    assert!(step.detail.as_deref().unwrap().starts_with("attempt 1/4294967295"));
}
