//! Schedule engine: network, disk and collaborator I/O around the pure core.
mod archive;
mod dedup;
mod fetch;
mod inspect;
mod metadata;
mod persist;
mod pipeline;
mod runner;
mod scratch;
mod scrape;
mod store;
mod types;

pub use archive::{archive_key, current_key, ArchiveHandoff, HandoffError, Promotion, SlotLocks};
pub use dedup::DedupGate;
pub use fetch::{ensure_url_encoded, retry_delay, FetchSettings, Fetcher, ReqwestFetcher};
pub use inspect::PdfInspector;
pub use metadata::{
    first_seen_stamp, hash_file, hash_reader, read_document_dates, DocumentDates, MetadataError,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{PipelineError, TerminalPipeline, TerminalReport};
pub use runner::{run_terminals, RunSettings, RunSummary, TerminalOutcome};
pub use scratch::{ScratchArea, ScratchError};
pub use scrape::{advertised_filename, decode_html, extract_pdf_links, HtmlPageScraper, PageScraper};
pub use store::{
    DocumentRecord, LocalObjectStore, MemoryRecordStore, ObjectStore, ObjectStoreError,
    RecordKind, RecordStore, StoreError, StoreSnapshot,
};
pub use types::{DecodedHtml, FailureKind, FetchError, FetchMetadata, FetchOutput};
