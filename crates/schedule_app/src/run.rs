use std::sync::Arc;

use anyhow::Context;
use schedule_engine::{
    run_terminals, LocalObjectStore, ReqwestFetcher, RunSummary, ScratchArea, SlotLocks,
    TerminalOutcome, TerminalPipeline,
};
use schedule_logging::{tracker_info, tracker_warn};

use crate::{load_terminals, Config, RonRecordStore};

/// One full pass over every configured terminal.
pub async fn run(config: &Config) -> anyhow::Result<RunSummary> {
    let terminals = load_terminals(&config.terminals)?;

    let scratch = ScratchArea::new(&config.pdf_dir);
    scratch
        .purge()
        .context("Failed to purge scratch area before run")?;
    scratch
        .ensure_layout()
        .context("Failed to create directory layout")?;

    let records = Arc::new(RonRecordStore::open(&config.store)?);
    let objects = Arc::new(LocalObjectStore::new(&config.pdf_dir));
    let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
    let pipeline = Arc::new(TerminalPipeline::new(
        fetcher,
        scratch,
        records,
        objects,
        Arc::new(SlotLocks::new()),
    ));

    tracker_info!("Processing {} terminals", terminals.len());
    let summary = run_terminals(pipeline, terminals, &config.run).await;
    log_summary(&summary);
    Ok(summary)
}

/// Empty the scratch area and recreate the layout.
pub fn purge(config: &Config) -> anyhow::Result<()> {
    let scratch = ScratchArea::new(&config.pdf_dir);
    scratch.purge().context("Failed to purge scratch area")?;
    scratch
        .ensure_layout()
        .context("Failed to create directory layout")?;
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match outcome {
            TerminalOutcome::Completed(report) if report.is_updated() => {
                let types: Vec<String> = report
                    .promotions
                    .iter()
                    .map(|p| p.schedule_type.to_string())
                    .collect();
                tracker_info!("{} updated: {}", report.terminal_name, types.join(", "));
            }
            TerminalOutcome::Completed(_) => {}
            TerminalOutcome::Failed { terminal, error } => {
                tracker_warn!("{terminal} failed: {error}");
            }
            TerminalOutcome::TimedOut { terminal } => {
                tracker_warn!("{terminal} timed out");
            }
        }
    }
    tracker_info!(
        "Run finished: {} terminals updated, {} documents promoted, {} failures",
        summary.terminals_updated(),
        summary.documents_promoted(),
        summary.failures()
    );
}
