//! Batch apply ordering and pacing
//!
//! Runs on a paused clock so the configured step delay is observable without
//! real sleeps.

use shared_types::{ActionKind, BatchProgress, DocRange, Suggestion, SuggestionId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use writer_assist::suggestion::FallbackGenerator;
use writer_assist::telemetry::MemoryTelemetry;
use writer_assist::{AssistConfig, MemoryDocument, SuggestionController, SuggestionError};

const TEXT: &str = "alpha beta gamma delta";

fn controller(telemetry: Arc<MemoryTelemetry>) -> SuggestionController {
    // Defaults pace steps 200ms apart.
    SuggestionController::new("doc-1", &AssistConfig::default(), Arc::new(FallbackGenerator))
        .with_telemetry(telemetry)
}

fn add_word(
    controller: &SuggestionController,
    doc: &MemoryDocument,
    id: &str,
    word: &str,
) -> SuggestionId {
    let suggestion = Suggestion::new("Emphasize", "", ActionKind::Rewrite, word)
        .with_id(id)
        .with_target_range(doc.find(word).unwrap())
        .with_version(word.to_uppercase());
    let id = suggestion.id.clone();
    controller.add(suggestion);
    id
}

#[tokio::test(start_paused = true)]
async fn test_steps_complete_in_order_with_progress() {
    let telemetry = Arc::new(MemoryTelemetry::new());
    let controller = controller(telemetry.clone());
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    let mut doc = MemoryDocument::new(TEXT);
    let sink = log.clone();
    doc.on_change(move |change| {
        sink.lock()
            .unwrap()
            .push(format!("edit {}..{}", change.replaced.from, change.replaced.to));
    });
    let ids = vec![
        add_word(&controller, &doc, "a", "alpha"),
        add_word(&controller, &doc, "b", "beta"),
        add_word(&controller, &doc, "c", "gamma"),
    ];

    let started = Instant::now();
    let mut reported = Vec::new();
    let progress_log = log.clone();
    let report = controller
        .apply_all(&ids, &mut doc, |progress: BatchProgress| {
            progress_log
                .lock()
                .unwrap()
                .push(format!("progress {}/{}", progress.current, progress.total));
            reported.push((progress, Instant::now()));
        })
        .await;

    assert_eq!(doc.text(), "ALPHA BETA GAMMA delta");
    assert_eq!(report.applied_count(), 3);
    assert!(report.is_complete());
    assert!(controller.is_empty());
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "edit 0..5",
            "progress 1/3",
            "edit 6..10",
            "progress 2/3",
            "edit 11..16",
            "progress 3/3",
        ]
    );

    // Pauses sit between steps, never after the last.
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(reported[1].1 - reported[0].1 >= Duration::from_millis(200));
    assert!(reported[2].1 - reported[1].1 >= Duration::from_millis(200));
    assert_eq!(
        reported.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
        vec![
            BatchProgress {
                current: 1,
                total: 3
            },
            BatchProgress {
                current: 2,
                total: 3
            },
            BatchProgress {
                current: 3,
                total: 3
            },
        ]
    );

    assert_eq!(
        controller.notice().map(|n| n.message),
        Some("Applied 3 of 3 suggestions".to_string())
    );
    assert_eq!(
        telemetry.names(),
        vec!["suggestion.apply", "suggestion.apply", "suggestion.apply", "batch.apply"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_step_is_skipped_and_kept() {
    let telemetry = Arc::new(MemoryTelemetry::new());
    let controller = controller(telemetry.clone());
    let mut doc = MemoryDocument::new(TEXT);
    let ids = vec![
        add_word(&controller, &doc, "a", "alpha"),
        add_word(&controller, &doc, "b", "beta"),
        add_word(&controller, &doc, "c", "gamma"),
    ];
    doc.lock_range(doc.find("beta").unwrap());

    let mut reported = Vec::new();
    let report = controller
        .apply_all(&ids, &mut doc, |progress| reported.push(progress.current))
        .await;

    assert_eq!(doc.text(), "ALPHA beta GAMMA delta");
    assert_eq!(reported, vec![1, 2, 3]);
    assert_eq!(report.applied_count(), 2);
    assert_eq!(
        report.skipped,
        vec![(
            SuggestionId::from("b"),
            SuggestionError::ApplyRejected(SuggestionId::from("b"))
        )]
    );
    assert_eq!(controller.ids(), vec![SuggestionId::from("b")]);
    assert_eq!(
        controller.notice().map(|n| n.message),
        Some("Applied 2 of 3 suggestions".to_string())
    );

    let batch = telemetry
        .events()
        .into_iter()
        .find(|event| event.name == "batch.apply")
        .unwrap();
    assert_eq!(batch.payload["applied"], 2);
    assert_eq!(batch.payload["skipped"], serde_json::json!(["b"]));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_and_unready_ids_are_skipped() {
    let controller = controller(Arc::new(MemoryTelemetry::new()));
    let mut doc = MemoryDocument::new(TEXT);
    let ready = add_word(&controller, &doc, "a", "alpha");
    controller.add(
        Suggestion::new("Tighten", "", ActionKind::Tighten, "delta")
            .with_id("idle")
            .with_target_range(doc.find("delta").unwrap()),
    );
    let ids = vec![SuggestionId::from("missing"), SuggestionId::from("idle"), ready];

    let report = controller.apply_all(&ids, &mut doc, |_| {}).await;

    assert_eq!(doc.text(), "ALPHA beta gamma delta");
    assert_eq!(report.applied_count(), 1);
    assert!(matches!(report.skipped[0].1, SuggestionError::NotFound(_)));
    assert!(matches!(report.skipped[1].1, SuggestionError::NotReady { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_overlapped_target_is_skipped_not_spliced() {
    let controller = controller(Arc::new(MemoryTelemetry::new()));
    let mut doc = MemoryDocument::new("one two three");
    for (id, range, version) in [
        ("a", DocRange::new(0, 7), "ONE TWO"),
        ("b", DocRange::new(4, 13), "TWO THREE"),
    ] {
        controller.add(
            Suggestion::new("Emphasize", "", ActionKind::Rewrite, "")
                .with_id(id)
                .with_target_range(range)
                .with_version(version),
        );
    }
    let ids = controller.ids();

    let report = controller.apply_all(&ids, &mut doc, |_| {}).await;

    assert_eq!(doc.text(), "ONE TWO three");
    assert_eq!(report.applied_count(), 1);
    assert_eq!(
        report.skipped,
        vec![(
            SuggestionId::from("b"),
            SuggestionError::NoTargetRange(SuggestionId::from("b"))
        )]
    );
    let kept = controller.get(&"b".into()).unwrap();
    assert_eq!(kept.target_range, None);
    assert_eq!(
        controller.notice().map(|n| n.message),
        Some("Applied 1 of 2 suggestions".to_string())
    );
}
