use std::path::PathBuf;

use crate::TypeTag;

/// Position of a candidate in the terminal's discovery order.
pub type CandidateId = u64;

/// A downloaded document awaiting classification.
///
/// `filename` is the advertised name from the source URL; `local_path` is
/// the uniquely named scratch copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Candidate {
    pub id: CandidateId,
    pub terminal_id: String,
    pub source_url: String,
    pub filename: String,
    pub local_path: PathBuf,
    pub content_hash: String,
    pub first_seen: String,
    pub modify_timestamp: String,
    pub creation_timestamp: String,
    pub page_count: Option<u32>,
    pub tag: TypeTag,
}

impl Candidate {
    pub fn new(id: CandidateId, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            ..Self::default()
        }
    }

    pub fn with_timestamps(
        mut self,
        modify: impl Into<String>,
        creation: impl Into<String>,
    ) -> Self {
        self.modify_timestamp = modify.into();
        self.creation_timestamp = creation.into();
        self
    }

    pub fn with_tag(mut self, tag: TypeTag) -> Self {
        self.tag = tag;
        self
    }
}
