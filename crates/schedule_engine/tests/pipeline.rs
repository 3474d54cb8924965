mod common;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use schedule_core::{
    Candidate, ContentHash, DocumentInspector, ParseError, ScheduleType, Terminal,
};
use schedule_engine::{
    extract_pdf_links, run_terminals, DocumentRecord, FailureKind, FetchError, FetchSettings,
    LocalObjectStore, MemoryRecordStore, PageScraper, PdfInspector, RecordKind, RecordStore,
    ReqwestFetcher, RunSettings, ScratchArea, SlotLocks, StoreError, TerminalOutcome,
    TerminalPipeline,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html><body>
  <a href="/docs/BWI_72HR.pdf">72 Hour Schedule</a>
  <a href="/docs/BWI_30DAY.pdf">30 Day Schedule</a>
  <a href="/docs/Rollcall_0412.pdf">Roll Call</a>
  <a href="/docs/AMC_GRAM.pdf">AMC Gram</a>
  <a href="/docs/BWI_72HR.pdf">72 Hour Schedule (again)</a>
  <a href="/docs/update.pdf">Update</a>
  <a href="/contact.html">Contact</a>
</body></html>"#;

fn init_logging() {
    schedule_logging::initialize_for_tests();
}

fn terminal(server: &MockServer) -> Terminal {
    Terminal {
        id: "bwi".to_string(),
        name: "BWI Passenger Terminal".to_string(),
        source_page_url: format!("{}/terminals/bwi", server.uri()),
        group: "AMC CONUS Terminals".to_string(),
        rank: 1,
    }
}

async fn mount_pdf(server: &MockServer, name: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/docs/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes, "application/pdf"))
        .mount(server)
        .await;
}

async fn mount_site(server: &MockServer, seventy_two_hour_text: &str) {
    Mock::given(method("GET"))
        .and(path("/terminals/bwi"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html; charset=utf-8"))
        .mount(server)
        .await;
    mount_pdf(
        server,
        "BWI_72HR.pdf",
        common::single_page(seventy_two_hour_text, "D:20240102090000Z"),
    )
    .await;
    mount_pdf(
        server,
        "BWI_30DAY.pdf",
        common::single_page("Monthly schedule", "D:20240101000000Z"),
    )
    .await;
    mount_pdf(
        server,
        "Rollcall_0412.pdf",
        common::single_page("PAX seats released", "D:20240103120000Z"),
    )
    .await;
    mount_pdf(
        server,
        "AMC_GRAM.pdf",
        common::single_page("News", "D:20240103120000Z"),
    )
    .await;
    mount_pdf(
        server,
        "update.pdf",
        common::single_page("Destination seats", "D:20240104120000Z"),
    )
    .await;
}

fn pipeline(root: &Path, records: Arc<dyn RecordStore>) -> TerminalPipeline {
    let fetcher = Arc::new(ReqwestFetcher::new(FetchSettings {
        initial_backoff: Duration::from_millis(10),
        ..FetchSettings::default()
    }));
    let scratch = ScratchArea::new(root);
    scratch.ensure_layout().expect("layout");
    TerminalPipeline::new(
        fetcher,
        scratch,
        records,
        Arc::new(LocalObjectStore::new(root)),
        Arc::new(SlotLocks::new()),
    )
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn runs_promote_once_and_archive_on_change() {
    init_logging();
    let server = MockServer::start().await;
    mount_site(&server, "Destination seats roll call").await;
    let dir = TempDir::new().unwrap();
    let records = Arc::new(MemoryRecordStore::new());
    let pipeline = pipeline(dir.path(), records.clone());
    let terminal = terminal(&server);

    let first = pipeline.run(&terminal).await.expect("first run");
    assert_eq!(first.discovered, 5);
    assert_eq!(first.downloaded, 5);
    let promoted: Vec<ScheduleType> = first.promotions.iter().map(|p| p.schedule_type).collect();
    assert_eq!(promoted, ScheduleType::ALL.to_vec());
    assert_eq!(first.discarded, 2);
    assert!(files_in(&dir.path().join("tmp")).is_empty());
    for ty in ScheduleType::ALL {
        assert_eq!(files_in(&dir.path().join("current").join(ty.as_str())).len(), 1);
    }
    let rollcall = records
        .snapshot()
        .canonical("bwi", ScheduleType::Rollcall)
        .expect("rollcall record");
    assert_eq!(rollcall.filename, "Rollcall_0412.pdf");
    assert_eq!(rollcall.modify_timestamp, "20240103120000");

    let second = pipeline.run(&terminal).await.expect("second run");
    assert!(second.promotions.is_empty());
    assert_eq!(second.unchanged, ScheduleType::ALL.to_vec());
    assert_eq!(second.known_discards, 2);

    server.reset().await;
    mount_site(&server, "Destination seats roll call, revised").await;
    let third = pipeline.run(&terminal).await.expect("third run");
    assert_eq!(third.promotions.len(), 1);
    let promotion = &third.promotions[0];
    assert_eq!(promotion.schedule_type, ScheduleType::SeventyTwoHour);
    let archived = promotion.archived_key.as_deref().expect("archived previous");
    assert!(archived.starts_with("archive/BWI_Passenger_Terminal/72_HR/BWI_72HR_"));
    assert!(dir.path().join(archived).is_file());
    assert_eq!(files_in(&dir.path().join("current/72_HR")).len(), 1);
    let snapshot = records.snapshot();
    let archived_record = snapshot
        .records
        .iter()
        .find(|r| r.cloud_path == archived)
        .expect("record follows the archived object");
    assert_eq!(
        archived_record.kind,
        RecordKind::Schedule(ScheduleType::SeventyTwoHour)
    );
}

/// Inspector that counts how often documents are opened.
#[derive(Default)]
struct CountingInspector {
    opened: AtomicUsize,
}

impl DocumentInspector for CountingInspector {
    fn page_count(&self, candidate: &Candidate) -> Result<u32, ParseError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        PdfInspector.page_count(candidate)
    }

    fn text(&self, candidate: &Candidate) -> Result<String, ParseError> {
        PdfInspector.text(candidate)
    }
}

#[tokio::test]
async fn discarded_bytes_are_not_inspected_again() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/terminals/bwi"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<a href="/docs/BWI_72HR.pdf">a</a><a href="/docs/notice.pdf">b</a>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    mount_pdf(
        &server,
        "BWI_72HR.pdf",
        common::single_page("seats", "D:20240102090000Z"),
    )
    .await;
    mount_pdf(
        &server,
        "notice.pdf",
        common::single_page("Weather advisory", "D:20240102090000Z"),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let records = Arc::new(MemoryRecordStore::new());
    let inspector = Arc::new(CountingInspector::default());
    let pipeline = pipeline(dir.path(), records.clone()).with_inspector(inspector.clone());
    let terminal = terminal(&server);

    let first = pipeline.run(&terminal).await.expect("first run");
    assert_eq!(first.promotions.len(), 1);
    assert_eq!(first.discarded, 1);
    assert_eq!(inspector.opened.load(Ordering::SeqCst), 1);
    let kinds: Vec<RecordKind> = records.snapshot().records.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Discard,
            RecordKind::Schedule(ScheduleType::SeventyTwoHour)
        ]
    );

    let second = pipeline.run(&terminal).await.expect("second run");
    assert_eq!(inspector.opened.load(Ordering::SeqCst), 1);
    assert_eq!(second.known_discards, 1);
    assert_eq!(second.unchanged, vec![ScheduleType::SeventyTwoHour]);
    assert!(files_in(&dir.path().join("tmp")).is_empty());
}

/// Memory store with a slow hash lookup, so concurrent terminals both get
/// past the dedup check before either records anything.
struct SlowLookups {
    inner: MemoryRecordStore,
}

#[async_trait::async_trait]
impl RecordStore for SlowLookups {
    async fn contains_hash(&self, hash: &ContentHash) -> Result<bool, StoreError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.inner.contains_hash(hash).await
    }

    async fn record(&self, hash: &ContentHash) -> Result<Option<DocumentRecord>, StoreError> {
        self.inner.record(hash).await
    }

    async fn canonical(
        &self,
        terminal_id: &str,
        ty: ScheduleType,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        self.inner.canonical(terminal_id, ty).await
    }

    async fn upsert(
        &self,
        terminal_id: &str,
        ty: ScheduleType,
        record: DocumentRecord,
    ) -> Result<(), StoreError> {
        self.inner.upsert(terminal_id, ty, record).await
    }

    async fn put_record(&self, record: DocumentRecord) -> Result<(), StoreError> {
        self.inner.put_record(record).await
    }
}

#[tokio::test]
async fn shared_document_is_promoted_by_one_terminal_only() {
    init_logging();
    let server = MockServer::start().await;
    for id in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path(format!("/terminals/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<a href="/docs/Shared_72HR.pdf">72 Hour</a>"#,
                "text/html",
            ))
            .mount(&server)
            .await;
    }
    mount_pdf(
        &server,
        "Shared_72HR.pdf",
        common::single_page("seats", "D:20240102090000Z"),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let records = Arc::new(SlowLookups {
        inner: MemoryRecordStore::new(),
    });
    let pipeline = Arc::new(pipeline(dir.path(), records.clone()));
    let terminals = ["a", "b"]
        .into_iter()
        .map(|id| Terminal {
            source_page_url: format!("{}/terminals/{id}", server.uri()),
            ..named(id)
        })
        .collect();
    let settings = RunSettings {
        max_concurrent_terminals: 2,
        terminal_timeout: Duration::from_secs(30),
    };

    let summary = run_terminals(pipeline, terminals, &settings).await;

    assert_eq!(summary.failures(), 0);
    assert_eq!(summary.documents_promoted(), 1);
    let unchanged: usize = summary.reports().map(|r| r.unchanged.len()).sum();
    assert_eq!(unchanged, 1);
    assert_eq!(records.inner.snapshot().records.len(), 1);
    assert_eq!(files_in(&dir.path().join("current/72_HR")).len(), 1);
}

#[tokio::test]
async fn unreachable_documents_are_skipped() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/terminals/bwi"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<a href="/docs/BWI_72HR.pdf">a</a><a href="/docs/gone_30DAY.pdf">b</a>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    mount_pdf(
        &server,
        "BWI_72HR.pdf",
        common::single_page("seats", "D:20240102090000Z"),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(dir.path(), Arc::new(MemoryRecordStore::new()));

    let report = pipeline.run(&terminal(&server)).await.expect("run");

    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.promotions.len(), 1);
}

#[test]
fn pdf_links_are_resolved_and_deduplicated_in_order() {
    let html = r#"
        <a href="b.PDF">b</a>
        <a href="https://cdn.example.com/a.pdf?ver=3">a</a>
        <a href="mailto:ops@example.com">mail</a>
        <a href="/x/b.PDF">b again</a>
        <a href="notes.docx">notes</a>
        <a href="">empty</a>
    "#;
    assert_eq!(
        extract_pdf_links(html, "https://example.com/x/page.aspx"),
        vec![
            "https://example.com/x/b.PDF".to_string(),
            "https://cdn.example.com/a.pdf?ver=3".to_string(),
        ]
    );
}

/// Scraper that answers from a script instead of the network.
struct ScriptedScraper;

#[async_trait::async_trait]
impl PageScraper for ScriptedScraper {
    async fn discover(&self, terminal: &Terminal) -> Result<Vec<String>, FetchError> {
        match terminal.id.as_str() {
            "slow" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
            "down" => Err(FetchError {
                kind: FailureKind::HttpStatus(503),
                message: "Service Unavailable".to_string(),
            }),
            _ => Ok(Vec::new()),
        }
    }
}

fn named(id: &str) -> Terminal {
    Terminal {
        id: id.to_string(),
        name: id.to_uppercase(),
        source_page_url: format!("https://example.com/{id}"),
        group: String::new(),
        rank: 0,
    }
}

#[tokio::test]
async fn one_slow_terminal_does_not_hold_up_the_rest() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let pipeline = Arc::new(
        pipeline(dir.path(), Arc::new(MemoryRecordStore::new()))
            .with_scraper(Arc::new(ScriptedScraper)),
    );
    let settings = RunSettings {
        max_concurrent_terminals: 2,
        terminal_timeout: Duration::from_millis(200),
    };

    let summary = run_terminals(
        pipeline,
        vec![named("slow"), named("fast"), named("down")],
        &settings,
    )
    .await;

    assert_eq!(summary.outcomes.len(), 3);
    assert_eq!(
        summary.outcomes[0],
        TerminalOutcome::TimedOut {
            terminal: "SLOW".to_string()
        }
    );
    assert!(matches!(
        &summary.outcomes[1],
        TerminalOutcome::Completed(report) if report.terminal_id == "fast"
    ));
    assert!(matches!(
        &summary.outcomes[2],
        TerminalOutcome::Failed { terminal, .. } if terminal == "DOWN"
    ));
    assert_eq!(summary.failures(), 2);
    assert_eq!(summary.documents_promoted(), 0);
}
