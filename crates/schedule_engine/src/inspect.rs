use std::fs;
use std::panic::{self, AssertUnwindSafe};

use lopdf::Document;
use schedule_core::{Candidate, DocumentInspector, ParseError};

/// Reads candidates' scratch files: `lopdf` for structure, `pdf-extract` for text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfInspector;

impl PdfInspector {
    fn read(candidate: &Candidate) -> Result<Vec<u8>, ParseError> {
        fs::read(&candidate.local_path).map_err(|e| {
            ParseError::Io(format!("{}: {e}", candidate.local_path.display()))
        })
    }
}

impl DocumentInspector for PdfInspector {
    fn page_count(&self, candidate: &Candidate) -> Result<u32, ParseError> {
        let bytes = Self::read(candidate)?;
        let doc = Document::load_mem(&bytes).map_err(|e| ParseError::Structure(e.to_string()))?;
        Ok(u32::try_from(doc.get_pages().len()).unwrap_or(u32::MAX))
    }

    fn text(&self, candidate: &Candidate) -> Result<String, ParseError> {
        let bytes = Self::read(candidate)?;
        // pdf-extract panics on some malformed font programs.
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(&bytes)
        }))
        .map_err(|_| ParseError::Text("extractor panicked".to_string()))?;
        extracted.map_err(|e| ParseError::Text(e.to_string()))
    }
}
