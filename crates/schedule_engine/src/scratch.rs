use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use schedule_core::ScheduleType;
use schedule_logging::{tracker_debug, tracker_info};
use thiserror::Error;
use uuid::Uuid;

use crate::{ensure_output_dir, AtomicFileWriter, PersistError};

const MAX_STEM_CHARS: usize = 80;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ScratchError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.display().to_string(),
            source,
        }
    }
}

/// The working directory tree: `tmp/`, `current/` and `archive/` under one root.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn staging_dir(&self, ty: ScheduleType) -> PathBuf {
        self.tmp_dir().join(ty.as_str())
    }

    /// Create every directory of the layout that does not exist yet.
    pub fn ensure_layout(&self) -> Result<(), ScratchError> {
        for ty in ScheduleType::ALL {
            ensure_output_dir(&self.staging_dir(ty))?;
            ensure_output_dir(&self.root.join("current").join(ty.as_str()))?;
        }
        ensure_output_dir(&self.root.join("archive"))?;
        Ok(())
    }

    /// Store downloaded bytes under a unique `{stem}_{uuid}.pdf` name in `tmp/`.
    pub fn write_candidate(&self, advertised: &str, bytes: &[u8]) -> Result<PathBuf, ScratchError> {
        let name = unique_pdf_name(advertised);
        let path = AtomicFileWriter::new(self.tmp_dir()).write(&name, bytes)?;
        tracker_debug!("Saved {} as {}", advertised, path.display());
        Ok(path)
    }

    /// Move a classified winner into `tmp/{type}/`.
    pub fn stage(&self, path: &Path, ty: ScheduleType) -> Result<PathBuf, ScratchError> {
        let dir = self.staging_dir(ty);
        ensure_output_dir(&dir)?;
        let file_name = path
            .file_name()
            .ok_or_else(|| ScratchError::io("stage", path, io::ErrorKind::InvalidInput.into()))?;
        let target = dir.join(file_name);
        fs::rename(path, &target).map_err(|e| ScratchError::io("stage", path, e))?;
        Ok(target)
    }

    /// Delete a scratch file. A file that is already gone is not an error.
    pub fn discard(&self, path: &Path) -> Result<(), ScratchError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ScratchError::io("remove", path, err)),
        }
    }

    /// Remove everything under `tmp/` and recreate the empty staging folders.
    pub fn purge(&self) -> Result<(), ScratchError> {
        let tmp = self.tmp_dir();
        if tmp.exists() {
            fs::remove_dir_all(&tmp).map_err(|e| ScratchError::io("purge", &tmp, e))?;
            tracker_info!("Purged scratch area {}", tmp.display());
        }
        for ty in ScheduleType::ALL {
            ensure_output_dir(&self.staging_dir(ty))?;
        }
        Ok(())
    }
}

fn unique_pdf_name(advertised: &str) -> String {
    let stem = Path::new(advertised)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    format!("{}_{}.pdf", sanitize_stem(stem), Uuid::new_v4())
}

fn sanitize_stem(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.trim_matches(['_', '.']).chars().take(MAX_STEM_CHARS) {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    if compacted.is_empty() {
        "document".to_string()
    } else {
        compacted
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        ' ' | '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' | '#' | '\0'..='\u{1F}'
    )
}
