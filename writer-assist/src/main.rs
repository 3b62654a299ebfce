//! Headless driver: one scripted session against an in-memory document.

use std::sync::Arc;

use shared_types::{ActionKind, DocRange, Impact, PanelName, Placement, Suggestion};
use writer_assist::popover::{
    Anchor, ElementId, EventOutcome, FixedLayout, ListenerRegistry, PopoverManager,
    PopoverOptions, Rect, Size, UiEvent,
};
use writer_assist::remote::{HttpGenerator, RemoteFeedback};
use writer_assist::snapshots::SnapshotHistory;
use writer_assist::suggestion::{FallbackGenerator, SuggestionGenerator};
use writer_assist::telemetry::{TelemetrySink, TracingTelemetry};
use writer_assist::{
    AssistConfig, GenerateMode, MemoryDocument, PanelCoordinator, SuggestionController,
};

const DOC_ID: &str = "demo-doc";
const DRAFT: &str = "The results has significantly changed. We really just need to ship it. \
                     Remote teams collaborate well";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "writer_assist=info".into()),
        )
        .init();

    let config = AssistConfig::load();
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetry);
    let generator: Arc<dyn SuggestionGenerator> = match HttpGenerator::from_config(&config) {
        Some(remote) => Arc::new(remote),
        None => {
            tracing::info!("No rewrite service configured; using local fallback generator");
            Arc::new(FallbackGenerator)
        }
    };

    let mut controller = SuggestionController::new(DOC_ID, &config, generator)
        .with_telemetry(telemetry.clone());
    let feedback = RemoteFeedback::from_config(&config);
    if let Some(feedback) = feedback.clone() {
        controller = controller.with_dismiss_listener(Arc::new(feedback));
    }

    let mut doc = MemoryDocument::new(DRAFT);
    let mut snapshots = SnapshotHistory::new(config.snapshot_limit);
    snapshots.capture(&doc, "opened");

    let agreement = suggestion_for(
        &doc,
        "s-agreement",
        "Fix agreement",
        ActionKind::Rewrite,
        "has significantly",
    )?
    .with_impact(Impact::High)
    .with_version("has had a significant impact");
    let tighten = suggestion_for(
        &doc,
        "s-tighten",
        "Tighten",
        ActionKind::Tighten,
        "We really just need to ship it.",
    )?;
    let cite = suggestion_for(
        &doc,
        "s-cite",
        "Add source",
        ActionKind::Cite,
        "Remote teams collaborate well",
    )?;
    let ids = [agreement.id.clone(), tighten.id.clone(), cite.id.clone()];
    controller.add(agreement);
    controller.add(tighten);
    controller.add(cite);

    // Panels: the suggestion list replaces the sidebar.
    let mut panels = PanelCoordinator::new().with_telemetry(telemetry.clone(), DOC_ID);
    panels.open_panel(PanelName::Sidebar);
    panels.open_panel(PanelName::SuggestionList);
    tracing::info!(active = ?panels.active().map(PanelName::as_str), "Panel state");

    // Popover over the first suggestion's text range.
    let mut layout = FixedLayout::new(Size::new(1280.0, 720.0));
    let target = controller
        .get(&ids[0])
        .and_then(|s| s.target_range)
        .unwrap_or_else(|| DocRange::caret(0));
    layout.set_range_rect(target, Rect::new(1180.0, 30.0, 90.0, 18.0));
    layout.set_element(ElementId(100), Rect::new(0.0, 0.0, 320.0, 160.0));
    let mut popover: PopoverManager<_, ListenerRegistry> =
        PopoverManager::from_config(ListenerRegistry::new(), &config)
            .with_telemetry(telemetry.clone(), DOC_ID);
    popover.open(
        Anchor::TextRange(target),
        ids[0].clone(),
        PopoverOptions::from_config(&config).with_placement(Placement::Top),
        &layout,
    );
    if let Some(position) = popover.attach_content(ElementId(100), &layout) {
        tracing::info!(
            top = position.top,
            left = position.left,
            placement = ?position.placement,
            "Popover placed"
        );
    }

    // Partial apply: click the added token of the first diff.
    if let Some(parts) = controller.with_board(|board| board.diff(&ids[0])) {
        for part in &parts {
            tracing::info!(kind = ?part.kind, text = %part.text, "Diff part");
        }
        if let Some(index) = parts.iter().position(|p| p.kind == shared_types::DiffKind::Added) {
            match controller.apply_token(&ids[0], index, &mut doc) {
                Ok(applied) => tracing::info!(
                    from = applied.inserted.from,
                    to = applied.inserted.to,
                    "Token applied"
                ),
                Err(e) => tracing::warn!(error = %e, "Token apply failed"),
            }
        }
    }
    if let EventOutcome::Closed(reason) = popover.handle_event(&UiEvent::escape(), &layout) {
        tracing::info!(reason = reason.as_str(), "Popover dismissed");
    }

    // Generate the rest, then apply them as one batch.
    for id in &ids[1..] {
        let outcome = controller.generate(id, GenerateMode::Request, None).await?;
        tracing::info!(suggestion_id = %id, ?outcome, "Generation finished");
    }
    let report = controller
        .apply_all(&ids[1..], &mut doc, |progress| {
            tracing::info!(current = progress.current, total = progress.total, "Batch progress");
        })
        .await;
    tracing::info!(applied = report.applied_count(), total = report.total, "Batch report");

    if let Some(snapshot) = snapshots.capture(&doc, "after suggestions") {
        if let Some(feedback) = feedback.as_ref() {
            if let Some(handle) = feedback.post_snapshot(DOC_ID, snapshot) {
                let _ = handle.await;
            }
        }
    }

    panels.close_all_panels();
    println!("{}", doc.text());
    Ok(())
}

fn suggestion_for(
    doc: &MemoryDocument,
    id: &str,
    title: &str,
    kind: ActionKind,
    original: &str,
) -> anyhow::Result<Suggestion> {
    let range = doc
        .find(original)
        .ok_or_else(|| anyhow::anyhow!("demo text is missing {original:?}"))?;
    Ok(Suggestion::new(title, format!("{} suggestion", kind.as_str()), kind, original)
        .with_id(id)
        .with_target_range(range))
}
