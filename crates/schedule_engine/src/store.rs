use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use schedule_core::{CanonicalRefs, ContentHash, ScheduleType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ensure_output_dir, AtomicFileWriter};

/// What a recorded document turned out to be.
///
/// Serialized as `72_HR`, `30_DAY`, `ROLLCALL` or `DISCARD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum RecordKind {
    Schedule(ScheduleType),
    Discard,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Schedule(ty) => ty.as_str(),
            RecordKind::Discard => "DISCARD",
        }
    }
}

impl From<ScheduleType> for RecordKind {
    fn from(ty: ScheduleType) -> Self {
        RecordKind::Schedule(ty)
    }
}

impl From<RecordKind> for &'static str {
    fn from(kind: RecordKind) -> Self {
        kind.as_str()
    }
}

impl TryFrom<String> for RecordKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "DISCARD" {
            return Ok(RecordKind::Discard);
        }
        value.parse().map(RecordKind::Schedule)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted form of a seen document. Discarded documents are kept too,
/// with an empty `cloud_path`, so their bytes are never inspected again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub filename: String,
    pub source_link: String,
    pub content_hash: ContentHash,
    pub first_seen_timestamp: String,
    pub cloud_path: String,
    pub modify_timestamp: String,
    pub creation_timestamp: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(rename = "terminalID")]
    pub terminal_id: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(String),
    #[error("store serialization error: {0}")]
    Serialize(String),
    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// Content-addressed document records plus each terminal's canonical refs.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn contains_hash(&self, hash: &ContentHash) -> Result<bool, StoreError>;

    /// Any record of `hash`, canonical, archived or discarded.
    async fn record(&self, hash: &ContentHash) -> Result<Option<DocumentRecord>, StoreError>;

    async fn canonical(
        &self,
        terminal_id: &str,
        ty: ScheduleType,
    ) -> Result<Option<DocumentRecord>, StoreError>;

    /// Record `record` and make it the canonical document for (terminal, type).
    async fn upsert(
        &self,
        terminal_id: &str,
        ty: ScheduleType,
        record: DocumentRecord,
    ) -> Result<(), StoreError>;

    /// Insert or replace the record for (terminal, hash). Canonical refs are
    /// left alone.
    async fn put_record(&self, record: DocumentRecord) -> Result<(), StoreError>;
}

/// Serializable contents of a record store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub records: Vec<DocumentRecord>,
    #[serde(default)]
    pub canonical: BTreeMap<String, CanonicalRefs>,
}

impl StoreSnapshot {
    pub fn contains_hash(&self, hash: &ContentHash) -> bool {
        self.records.iter().any(|r| &r.content_hash == hash)
    }

    pub fn record(&self, hash: &ContentHash) -> Option<DocumentRecord> {
        self.records
            .iter()
            .find(|r| &r.content_hash == hash)
            .cloned()
    }

    pub fn canonical(&self, terminal_id: &str, ty: ScheduleType) -> Option<DocumentRecord> {
        let hash = self.canonical.get(terminal_id)?.get(&ty)?;
        self.records
            .iter()
            .rev()
            .find(|r| &r.content_hash == hash && r.terminal_id == terminal_id)
            .cloned()
    }

    pub fn upsert(&mut self, terminal_id: &str, ty: ScheduleType, record: DocumentRecord) {
        self.canonical
            .entry(terminal_id.to_string())
            .or_default()
            .insert(ty, record.content_hash.clone());
        self.put_record(record);
    }

    pub fn put_record(&mut self, record: DocumentRecord) {
        match self.records.iter_mut().find(|r| {
            r.content_hash == record.content_hash && r.terminal_id == record.terminal_id
        }) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }
}

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<StoreSnapshot>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreSnapshot> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn contains_hash(&self, hash: &ContentHash) -> Result<bool, StoreError> {
        Ok(self.lock().contains_hash(hash))
    }

    async fn record(&self, hash: &ContentHash) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.lock().record(hash))
    }

    async fn canonical(
        &self,
        terminal_id: &str,
        ty: ScheduleType,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.lock().canonical(terminal_id, ty))
    }

    async fn upsert(
        &self,
        terminal_id: &str,
        ty: ScheduleType,
        record: DocumentRecord,
    ) -> Result<(), StoreError> {
        self.lock().upsert(terminal_id, ty, record);
        Ok(())
    }

    async fn put_record(&self, record: DocumentRecord) -> Result<(), StoreError> {
        self.lock().put_record(record);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("invalid object key {0:?}")]
    InvalidKey(String),
    #[error("object {0} does not exist")]
    NotFound(String),
    #[error("object store io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// Key/value blob storage for canonical and archived documents.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn move_object(&self, src_key: &str, dst_key: &str) -> Result<(), ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Create the prefix `key` so that objects can be placed beneath it.
    async fn create(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), ObjectStoreError>;
}

/// Object store backed by a local directory; keys are relative paths.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn io_error(key: &str) -> impl FnOnce(io::Error) -> ObjectStoreError + '_ {
        move |source| ObjectStoreError::Io {
            key: key.to_string(),
            source,
        }
    }

    fn ensure_parent(&self, path: &Path, key: &str) -> Result<(), ObjectStoreError> {
        if let Some(parent) = path.parent() {
            ensure_output_dir(parent).map_err(|e| ObjectStoreError::Io {
                key: key.to_string(),
                source: io::Error::other(e.to_string()),
            })?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn move_object(&self, src_key: &str, dst_key: &str) -> Result<(), ObjectStoreError> {
        let src = self.path_for(src_key)?;
        let dst = self.path_for(dst_key)?;
        if !src.is_file() {
            return Err(ObjectStoreError::NotFound(src_key.to_string()));
        }
        self.ensure_parent(&dst, dst_key)?;
        fs::rename(&src, &dst).map_err(Self::io_error(src_key))
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.path_for(key)?.exists())
    }

    async fn create(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&path).map_err(Self::io_error(key))
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), ObjectStoreError> {
        let dst = self.path_for(key)?;
        let bytes = fs::read(local_path).map_err(Self::io_error(key))?;
        let (Some(dir), Some(name)) = (dst.parent(), dst.file_name().and_then(|n| n.to_str()))
        else {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        };
        AtomicFileWriter::new(dir.to_path_buf())
            .write(name, &bytes)
            .map_err(|e| ObjectStoreError::Io {
                key: key.to_string(),
                source: io::Error::other(e.to_string()),
            })?;
        Ok(())
    }
}
