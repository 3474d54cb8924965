use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object};
use schedule_core::stamp_from_pdf_date;
use schedule_logging::tracker_warn;
use sha2::{Digest, Sha256};
use thiserror::Error;

const HASH_CHUNK: usize = 4096;

/// Missing or unreadable document metadata. Never fatal.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed document: {0}")]
    Parse(String),
    #[error("document has no /Info dictionary")]
    NoInfo,
}

/// Creation and modification stamps, each 14 digits or empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentDates {
    pub creation: String,
    pub modify: String,
}

/// Lowercase hex SHA-256 of everything `reader` yields.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_file(path: &Path) -> io::Result<String> {
    hash_reader(File::open(path)?)
}

/// UTC wall-clock stamp in the fixed 14-digit form.
pub fn first_seen_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Best-effort `/CreationDate` and `/ModDate`. Problems degrade to empty fields.
pub fn read_document_dates(path: &Path) -> DocumentDates {
    match load_dates(path) {
        Ok(dates) => dates,
        Err(err) => {
            tracker_warn!("No usable dates in {}: {}", path.display(), err);
            DocumentDates::default()
        }
    }
}

fn load_dates(path: &Path) -> Result<DocumentDates, MetadataError> {
    let bytes = fs::read(path).map_err(|source| MetadataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let doc = Document::load_mem(&bytes).map_err(|e| MetadataError::Parse(e.to_string()))?;
    let info = info_dictionary(&doc).ok_or(MetadataError::NoInfo)?;

    Ok(DocumentDates {
        creation: date_field(&doc, info, b"CreationDate"),
        modify: date_field(&doc, info, b"ModDate"),
    })
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info)?.as_dict().ok()
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn date_field(doc: &Document, info: &Dictionary, key: &[u8]) -> String {
    let Some(object) = info.get(key).ok().and_then(|o| resolve(doc, o)) else {
        return String::new();
    };
    match object {
        Object::String(bytes, _) => stamp_from_pdf_date(&decode_text_string(bytes)),
        _ => String::new(),
    }
}

// PDF text strings are UTF-16BE when they open with a byte-order mark.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(rest) => {
            let (text, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(rest);
            text.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}
