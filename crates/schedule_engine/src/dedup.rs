use std::sync::Arc;

use schedule_core::ContentHash;
use schedule_logging::{tracker_debug, tracker_error, tracker_warn};

use crate::{RecordKind, RecordStore};

/// Answers "have these bytes been seen before?". Doubt means yes.
#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn RecordStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// True only for a well-formed hash the store has never recorded.
    pub async fn is_new(&self, raw_hash: &str) -> bool {
        self.new_hash(raw_hash).await.is_some()
    }

    /// The validated hash, if `raw_hash` is well formed and not on record.
    pub async fn new_hash(&self, raw_hash: &str) -> Option<ContentHash> {
        let hash = match ContentHash::parse(raw_hash) {
            Ok(hash) => hash,
            Err(err) => {
                tracker_warn!("Rejecting hash {raw_hash:?}: {err}");
                return None;
            }
        };

        match self.store.contains_hash(&hash).await {
            Ok(true) => {
                tracker_debug!("Hash {hash} already recorded");
                None
            }
            Ok(false) => Some(hash),
            Err(err) => {
                tracker_error!("Hash lookup for {hash} failed, treating as seen: {err}");
                None
            }
        }
    }

    /// How these bytes were recorded on an earlier run, if at all.
    ///
    /// Lookup failures answer `None`; [`new_hash`](Self::new_hash) still
    /// refuses such a document later.
    pub async fn recall(&self, raw_hash: &str) -> Option<RecordKind> {
        let hash = ContentHash::parse(raw_hash).ok()?;
        match self.store.record(&hash).await {
            Ok(record) => record.map(|r| r.kind),
            Err(err) => {
                tracker_warn!("Cannot recall {hash}: {err}");
                None
            }
        }
    }
}
