use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ContentHash, ScheduleType};

/// Hash of the canonical document per schedule type.
pub type CanonicalRefs = BTreeMap<ScheduleType, ContentHash>;

/// A terminal record as supplied by the listing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: String,
    pub name: String,
    #[serde(rename = "sourcePageURL", alias = "source_page_url")]
    pub source_page_url: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub rank: u32,
}

impl Terminal {
    /// Directory-safe form of the name used for archive paths.
    pub fn slug(&self) -> String {
        self.name.trim().replace(' ', "_")
    }
}
