use std::sync::Arc;

use chrono::Utc;
use schedule_core::{
    reconcile, Candidate, ContentHash, DocumentInspector, ScheduleType, Selection, Terminal,
    TypeTag,
};
use schedule_logging::{tracker_debug, tracker_error, tracker_info, tracker_warn};
use thiserror::Error;

use crate::{
    advertised_filename, first_seen_stamp, hash_file, read_document_dates, ArchiveHandoff,
    DedupGate, FetchError, Fetcher, HtmlPageScraper, ObjectStore, PageScraper, PdfInspector,
    Promotion, RecordKind, RecordStore, ScratchArea, ScratchError, SlotLocks,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("terminal page unavailable: {0}")]
    Discovery(#[source] FetchError),
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error("background task failed: {0}")]
    Task(String),
}

/// What one terminal run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalReport {
    pub terminal_id: String,
    pub terminal_name: String,
    pub discovered: usize,
    pub downloaded: usize,
    pub fetch_failures: usize,
    pub discarded: usize,
    /// Of `discarded`, those dropped unread because an earlier run discarded
    /// the same bytes.
    pub known_discards: usize,
    pub unchanged: Vec<ScheduleType>,
    pub promotions: Vec<Promotion>,
    pub handoff_failures: usize,
}

impl TerminalReport {
    fn new(terminal: &Terminal) -> Self {
        Self {
            terminal_id: terminal.id.clone(),
            terminal_name: terminal.name.clone(),
            ..Self::default()
        }
    }

    pub fn is_updated(&self) -> bool {
        !self.promotions.is_empty()
    }
}

/// Sequential fetch → classify → select → dedup → handoff for one terminal.
pub struct TerminalPipeline {
    scraper: Arc<dyn PageScraper>,
    fetcher: Arc<dyn Fetcher>,
    inspector: Arc<dyn DocumentInspector + Send + Sync>,
    scratch: ScratchArea,
    dedup: DedupGate,
    handoff: ArchiveHandoff,
}

impl TerminalPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        scratch: ScratchArea,
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        locks: Arc<SlotLocks>,
    ) -> Self {
        Self {
            scraper: Arc::new(HtmlPageScraper::new(fetcher.clone())),
            fetcher,
            inspector: Arc::new(PdfInspector),
            scratch,
            dedup: DedupGate::new(records.clone()),
            handoff: ArchiveHandoff::new(objects, records, locks),
        }
    }

    pub fn with_scraper(mut self, scraper: Arc<dyn PageScraper>) -> Self {
        self.scraper = scraper;
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn DocumentInspector + Send + Sync>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn scratch(&self) -> &ScratchArea {
        &self.scratch
    }

    pub async fn run(&self, terminal: &Terminal) -> Result<TerminalReport, PipelineError> {
        let mut report = TerminalReport::new(terminal);

        let links = self
            .scraper
            .discover(terminal)
            .await
            .map_err(PipelineError::Discovery)?;
        report.discovered = links.len();
        if links.is_empty() {
            tracker_info!("{}: no PDF links found; leaving unchanged", terminal.name);
            return Ok(report);
        }

        let candidates = self.download(terminal, &links, &mut report).await?;
        let candidates = self.describe(candidates, &mut report).await?;
        let candidates = self.recall(terminal, candidates, &mut report).await;
        let selection = self.classify(candidates).await?;

        for loser in selection.losers() {
            tracker_debug!("{}: discarding {}", terminal.name, loser.filename);
            report.discarded += 1;
            self.discard(loser);
            self.remember_discard(terminal, loser).await;
        }

        for (ty, winner) in selection.winning_candidates() {
            self.settle(terminal, ty, winner, &mut report).await?;
        }

        tracker_info!(
            "{}: {} discovered, {} downloaded, {} promoted",
            terminal.name,
            report.discovered,
            report.downloaded,
            report.promotions.len()
        );
        Ok(report)
    }

    async fn download(
        &self,
        terminal: &Terminal,
        links: &[String],
        report: &mut TerminalReport,
    ) -> Result<Vec<Candidate>, PipelineError> {
        let mut candidates = Vec::with_capacity(links.len());

        for (position, url) in links.iter().enumerate() {
            let filename = advertised_filename(url);
            if filename.is_empty() {
                tracker_debug!("{}: skipping {url}, no PDF filename", terminal.name);
                continue;
            }

            let output = match self.fetcher.fetch(url).await {
                Ok(output) => output,
                Err(err) => {
                    tracker_warn!("{}: skipping {filename}: {err}", terminal.name);
                    report.fetch_failures += 1;
                    continue;
                }
            };

            let local_path = self.scratch.write_candidate(&filename, &output.bytes)?;
            report.downloaded += 1;
            candidates.push(Candidate {
                id: position as u64,
                terminal_id: terminal.id.clone(),
                source_url: url.clone(),
                filename,
                local_path,
                first_seen: first_seen_stamp(Utc::now()),
                ..Candidate::default()
            });
        }

        Ok(candidates)
    }

    /// Fill in hash and dates. Candidates whose bytes cannot be hashed are dropped.
    async fn describe(
        &self,
        candidates: Vec<Candidate>,
        report: &mut TerminalReport,
    ) -> Result<Vec<Candidate>, PipelineError> {
        let described = tokio::task::spawn_blocking(move || {
            candidates
                .into_iter()
                .map(|mut candidate| match hash_file(&candidate.local_path) {
                    Ok(hash) => {
                        let dates = read_document_dates(&candidate.local_path);
                        candidate.content_hash = hash;
                        candidate.modify_timestamp = dates.modify;
                        candidate.creation_timestamp = dates.creation;
                        Ok(candidate)
                    }
                    Err(err) => Err((candidate, err)),
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?;

        let mut kept = Vec::with_capacity(described.len());
        for outcome in described {
            match outcome {
                Ok(candidate) => kept.push(candidate),
                Err((candidate, err)) => {
                    tracker_warn!("Cannot hash {}: {err}", candidate.local_path.display());
                    report.discarded += 1;
                    self.discard(&candidate);
                }
            }
        }
        Ok(kept)
    }

    /// Drop bytes an earlier run discarded and give bytes it classified their
    /// recorded type, so neither is inspected again.
    async fn recall(
        &self,
        terminal: &Terminal,
        candidates: Vec<Candidate>,
        report: &mut TerminalReport,
    ) -> Vec<Candidate> {
        let mut kept = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            match self.dedup.recall(&candidate.content_hash).await {
                Some(RecordKind::Discard) => {
                    tracker_debug!(
                        "{}: {} was discarded before; skipping",
                        terminal.name,
                        candidate.filename
                    );
                    report.discarded += 1;
                    report.known_discards += 1;
                    self.discard(&candidate);
                }
                Some(RecordKind::Schedule(ty)) => {
                    candidate.tag = TypeTag::Classified(ty);
                    kept.push(candidate);
                }
                None => kept.push(candidate),
            }
        }
        kept
    }

    async fn classify(&self, candidates: Vec<Candidate>) -> Result<Selection, PipelineError> {
        let inspector = self.inspector.clone();
        tokio::task::spawn_blocking(move || reconcile(candidates, &*inspector))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))
    }

    async fn settle(
        &self,
        terminal: &Terminal,
        ty: ScheduleType,
        winner: &Candidate,
        report: &mut TerminalReport,
    ) -> Result<(), PipelineError> {
        let Some(hash) = self.dedup.new_hash(&winner.content_hash).await else {
            tracker_info!("{}: {ty} unchanged ({})", terminal.name, winner.filename);
            report.unchanged.push(ty);
            self.discard(winner);
            return Ok(());
        };

        let staged = Candidate {
            local_path: self.scratch.stage(&winner.local_path, ty)?,
            ..winner.clone()
        };

        match self
            .handoff
            .promote_detached(terminal.clone(), ty, staged.clone(), hash)
            .await
        {
            Ok(Some(promotion)) => report.promotions.push(promotion),
            Ok(None) => {
                report.unchanged.push(ty);
                self.discard(&staged);
            }
            Err(err) => {
                tracker_error!("{}: {ty} handoff failed: {err}", terminal.name);
                report.handoff_failures += 1;
            }
        }
        Ok(())
    }

    async fn remember_discard(&self, terminal: &Terminal, loser: &Candidate) {
        let Ok(hash) = ContentHash::parse(&loser.content_hash) else {
            return;
        };
        if let Err(err) = self.handoff.remember_discard(loser, hash).await {
            tracker_warn!(
                "{}: could not record {} as discarded: {err}",
                terminal.name,
                loser.filename
            );
        }
    }

    fn discard(&self, candidate: &Candidate) {
        if let Err(err) = self.scratch.discard(&candidate.local_path) {
            tracker_warn!("{err}");
        }
    }
}
