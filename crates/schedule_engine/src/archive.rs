use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use schedule_core::{Candidate, ContentHash, ScheduleType, Terminal};
use schedule_logging::{tracker_debug, tracker_error, tracker_info, tracker_warn};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::{DocumentRecord, ObjectStore, ObjectStoreError, RecordKind, RecordStore, StoreError};

pub fn current_key(ty: ScheduleType, filename: &str) -> String {
    format!("current/{ty}/{filename}")
}

pub fn archive_key(terminal_slug: &str, ty: ScheduleType, filename: &str) -> String {
    format!("archive/{terminal_slug}/{ty}/{filename}")
}

fn archive_prefix(terminal_slug: &str, ty: ScheduleType) -> String {
    format!("archive/{terminal_slug}/{ty}")
}

fn key_filename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("cannot read canonical record: {0}")]
    Lookup(#[source] StoreError),
    #[error("archiving previous canonical failed: {0}")]
    Archive(#[source] ObjectStoreError),
    #[error("upload of new canonical failed: {0}")]
    Upload(#[source] ObjectStoreError),
    #[error("recording new canonical failed: {0}")]
    Record(#[source] StoreError),
    #[error("handoff task did not finish: {0}")]
    Interrupted(String),
}

type KeyedMutexes<K> = Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>;

async fn lock_key<K: Eq + Hash>(mutexes: &KeyedMutexes<K>, key: K) -> OwnedMutexGuard<()> {
    let mutex = {
        let mut map = mutexes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(key).or_default().clone()
    };
    mutex.lock_owned().await
}

/// Async mutexes shared by every handoff: one per (terminal, type) slot and
/// one per content hash.
///
/// A hash lock is only ever taken while holding a slot lock or no lock at
/// all, never the other way round.
#[derive(Debug, Default)]
pub struct SlotLocks {
    slots: KeyedMutexes<(String, ScheduleType)>,
    hashes: KeyedMutexes<ContentHash>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, terminal_id: &str, ty: ScheduleType) -> OwnedMutexGuard<()> {
        lock_key(&self.slots, (terminal_id.to_string(), ty)).await
    }

    pub async fn lock_hash(&self, hash: &ContentHash) -> OwnedMutexGuard<()> {
        lock_key(&self.hashes, hash.clone()).await
    }
}

/// A completed promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub schedule_type: ScheduleType,
    pub current_key: String,
    pub archived_key: Option<String>,
    pub record: DocumentRecord,
}

/// A previous canonical moved into the archive. `record` is as it was
/// before the move.
struct Archived {
    record: DocumentRecord,
    moved_to: String,
}

/// Replaces a terminal's canonical document for one type.
#[derive(Clone)]
pub struct ArchiveHandoff {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    locks: Arc<SlotLocks>,
}

impl ArchiveHandoff {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        locks: Arc<SlotLocks>,
    ) -> Self {
        Self {
            objects,
            records,
            locks,
        }
    }

    /// Archive the previous canonical, upload `candidate`, then record it.
    ///
    /// Either every step takes effect or the previous canonical object and
    /// record are left where they were. Returns `None` when `hash` is
    /// already on record, e.g. because another terminal promoted the same
    /// bytes first.
    pub async fn promote(
        &self,
        terminal: &Terminal,
        ty: ScheduleType,
        candidate: &Candidate,
        hash: ContentHash,
    ) -> Result<Option<Promotion>, HandoffError> {
        let _slot = self.locks.lock(&terminal.id, ty).await;
        let _bytes = self.locks.lock_hash(&hash).await;

        if self
            .records
            .contains_hash(&hash)
            .await
            .map_err(HandoffError::Lookup)?
        {
            tracker_info!(
                "{}: {} is already on record; not promoting",
                terminal.name,
                candidate.filename
            );
            return Ok(None);
        }

        let previous = self
            .records
            .canonical(&terminal.id, ty)
            .await
            .map_err(HandoffError::Lookup)?;

        let archived = match previous {
            Some(record) => self.archive_previous(terminal, ty, record).await?,
            None => None,
        };

        let stored_name = candidate
            .local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(candidate.filename.as_str());
        let key = current_key(ty, stored_name);

        if let Err(err) = self.objects.upload(&candidate.local_path, &key).await {
            self.restore(archived.as_ref()).await;
            return Err(HandoffError::Upload(err));
        }

        let record = DocumentRecord {
            filename: candidate.filename.clone(),
            source_link: candidate.source_url.clone(),
            content_hash: hash,
            first_seen_timestamp: candidate.first_seen.clone(),
            cloud_path: key.clone(),
            modify_timestamp: candidate.modify_timestamp.clone(),
            creation_timestamp: candidate.creation_timestamp.clone(),
            kind: ty.into(),
            terminal_id: terminal.id.clone(),
        };

        if let Err(err) = self.records.upsert(&terminal.id, ty, record.clone()).await {
            self.restore(archived.as_ref()).await;
            return Err(HandoffError::Record(err));
        }

        tracker_info!(
            "{}: promoted {} to {}",
            terminal.name,
            candidate.filename,
            key
        );

        Ok(Some(Promotion {
            schedule_type: ty,
            current_key: key,
            archived_key: archived.map(|a| a.moved_to),
            record,
        }))
    }

    /// [`promote`](Self::promote) on a task of its own. Cancelling the caller
    /// cannot stop the handoff between the archive move and the upsert.
    pub async fn promote_detached(
        &self,
        terminal: Terminal,
        ty: ScheduleType,
        candidate: Candidate,
        hash: ContentHash,
    ) -> Result<Option<Promotion>, HandoffError> {
        let handoff = self.clone();
        tokio::spawn(async move { handoff.promote(&terminal, ty, &candidate, hash).await })
            .await
            .map_err(|e| HandoffError::Interrupted(e.to_string()))?
    }

    /// Record a discarded document so later runs drop its bytes unread.
    /// Returns false if `hash` was already on record.
    pub async fn remember_discard(
        &self,
        candidate: &Candidate,
        hash: ContentHash,
    ) -> Result<bool, StoreError> {
        let _bytes = self.locks.lock_hash(&hash).await;
        if self.records.contains_hash(&hash).await? {
            return Ok(false);
        }
        self.records
            .put_record(DocumentRecord {
                filename: candidate.filename.clone(),
                source_link: candidate.source_url.clone(),
                content_hash: hash,
                first_seen_timestamp: candidate.first_seen.clone(),
                cloud_path: String::new(),
                modify_timestamp: candidate.modify_timestamp.clone(),
                creation_timestamp: candidate.creation_timestamp.clone(),
                kind: RecordKind::Discard,
                terminal_id: candidate.terminal_id.clone(),
            })
            .await?;
        tracker_debug!("Remembered {} as DISCARD", candidate.filename);
        Ok(true)
    }

    /// Move the previous canonical object into the terminal's archive and
    /// point its record at the new key.
    async fn archive_previous(
        &self,
        terminal: &Terminal,
        ty: ScheduleType,
        record: DocumentRecord,
    ) -> Result<Option<Archived>, HandoffError> {
        let src_key = record.cloud_path.as_str();
        if !self
            .objects
            .exists(src_key)
            .await
            .map_err(HandoffError::Archive)?
        {
            tracker_warn!(
                "{}: previous {ty} object {src_key} is missing; nothing to archive",
                terminal.name
            );
            return Ok(None);
        }

        let slug = terminal.slug();
        let prefix = archive_prefix(&slug, ty);
        if !self
            .objects
            .exists(&prefix)
            .await
            .map_err(HandoffError::Archive)?
        {
            self.objects
                .create(&prefix)
                .await
                .map_err(HandoffError::Archive)?;
        }

        let dst_key = archive_key(&slug, ty, key_filename(src_key));
        self.objects
            .move_object(src_key, &dst_key)
            .await
            .map_err(HandoffError::Archive)?;

        let moved = DocumentRecord {
            cloud_path: dst_key.clone(),
            ..record.clone()
        };
        if let Err(err) = self.records.put_record(moved).await {
            self.move_back(&dst_key, src_key).await;
            return Err(HandoffError::Record(err));
        }

        tracker_info!("{}: archived {src_key} to {dst_key}", terminal.name);
        Ok(Some(Archived {
            record,
            moved_to: dst_key,
        }))
    }

    async fn restore(&self, archived: Option<&Archived>) {
        let Some(archived) = archived else {
            return;
        };
        self.move_back(&archived.moved_to, &archived.record.cloud_path)
            .await;
        if let Err(err) = self.records.put_record(archived.record.clone()).await {
            tracker_error!(
                "Could not point record back at {}: {err}",
                archived.record.cloud_path
            );
        }
    }

    async fn move_back(&self, moved_to: &str, original: &str) {
        if let Err(err) = self.objects.move_object(moved_to, original).await {
            tracker_error!("Could not move {moved_to} back to {original}: {err}");
        }
    }
}
