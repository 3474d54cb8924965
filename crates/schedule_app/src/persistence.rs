use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use schedule_core::{ContentHash, ScheduleType};
use schedule_engine::{AtomicFileWriter, DocumentRecord, RecordStore, StoreError, StoreSnapshot};
use schedule_logging::{tracker_debug, tracker_info};

/// Record store kept in a single RON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct RonRecordStore {
    path: PathBuf,
    state: Mutex<StoreSnapshot>,
}

impl RonRecordStore {
    /// Load `path`, or start empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(text) => {
                let state: StoreSnapshot = ron::from_str(&text).map_err(|e| {
                    StoreError::Serialize(format!("{}: {e}", path.display()))
                })?;
                tracker_info!(
                    "Loaded {} records from {}",
                    state.records.len(),
                    path.display()
                );
                state
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracker_info!("No record store at {}; starting empty", path.display());
                StoreSnapshot::default()
            }
            Err(err) => return Err(StoreError::Io(format!("{}: {err}", path.display()))),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoreSnapshot> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `change` to a copy of the state and swap it in once the file is
    /// durable.
    fn update(&self, change: impl FnOnce(&mut StoreSnapshot)) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        change(&mut next);
        self.save(&next)?;
        *state = next;
        Ok(())
    }

    fn save(&self, state: &StoreSnapshot) -> Result<(), StoreError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(state, pretty)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Io(format!("bad store path {}", self.path.display())))?;
        AtomicFileWriter::new(dir)
            .write(filename, content.as_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tracker_debug!("Saved record store to {}", self.path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for RonRecordStore {
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
        self.update(|next| next.upsert(terminal_id, ty, record))
    }

    async fn put_record(&self, record: DocumentRecord) -> Result<(), StoreError> {
        self.update(|next| next.put_record(record))
    }
}
