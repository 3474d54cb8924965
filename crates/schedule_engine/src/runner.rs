use std::sync::Arc;
use std::time::Duration;

use schedule_core::Terminal;
use schedule_logging::{tracker_error, tracker_info, tracker_warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::{TerminalPipeline, TerminalReport};

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_concurrent_terminals: usize,
    pub terminal_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_concurrent_terminals: 4,
            terminal_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Completed(TerminalReport),
    Failed { terminal: String, error: String },
    TimedOut { terminal: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One outcome per input terminal, in input order.
    pub outcomes: Vec<TerminalOutcome>,
}

impl RunSummary {
    pub fn reports(&self) -> impl Iterator<Item = &TerminalReport> + '_ {
        self.outcomes.iter().filter_map(|o| match o {
            TerminalOutcome::Completed(report) => Some(report),
            _ => None,
        })
    }

    pub fn terminals_updated(&self) -> usize {
        self.reports().filter(|r| r.is_updated()).count()
    }

    pub fn documents_promoted(&self) -> usize {
        self.reports().map(|r| r.promotions.len()).sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o, TerminalOutcome::Completed(_)))
            .count()
    }
}

/// Run every terminal through `pipeline`, at most
/// `max_concurrent_terminals` at a time.
///
/// A terminal that fails, panics or exceeds `terminal_timeout` is reported
/// and skipped; the others carry on.
pub async fn run_terminals(
    pipeline: Arc<TerminalPipeline>,
    terminals: Vec<Terminal>,
    settings: &RunSettings,
) -> RunSummary {
    let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_terminals.max(1)));
    let mut set = JoinSet::new();

    for (index, terminal) in terminals.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let pipeline = Arc::clone(&pipeline);
        let timeout = settings.terminal_timeout;
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, failed(&terminal, "worker pool closed".to_string()));
            };
            (index, run_one(pipeline, terminal, timeout).await)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => tracker_error!("Terminal worker lost: {err}"),
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    RunSummary {
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
    }
}

async fn run_one(
    pipeline: Arc<TerminalPipeline>,
    terminal: Terminal,
    timeout: Duration,
) -> TerminalOutcome {
    tracker_info!("Processing terminal {}", terminal.name);
    let name = terminal.name.clone();
    let mut task = {
        let terminal = terminal.clone();
        tokio::spawn(async move { pipeline.run(&terminal).await })
    };

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(Ok(report))) => TerminalOutcome::Completed(report),
        Ok(Ok(Err(err))) => {
            tracker_error!("{name}: {err}");
            failed(&terminal, err.to_string())
        }
        Ok(Err(join_err)) => {
            tracker_error!("{name}: pipeline task died: {join_err}");
            failed(&terminal, join_err.to_string())
        }
        Err(_) => {
            // A handoff already under way runs on its own task and completes.
            task.abort();
            tracker_warn!("{name}: timed out after {timeout:?}");
            TerminalOutcome::TimedOut { terminal: name }
        }
    }
}

fn failed(terminal: &Terminal, error: String) -> TerminalOutcome {
    TerminalOutcome::Failed {
        terminal: terminal.name.clone(),
        error,
    }
}
