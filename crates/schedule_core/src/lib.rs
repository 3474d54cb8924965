//! Schedule core: pure classification, selection and identity rules.
//!
//! Nothing in this crate performs I/O. Document inspection reaches the
//! outside world only through [`DocumentInspector`], so every pass is a
//! function of its inputs.
mod candidate;
mod content;
mod error;
mod filename;
mod hash;
mod reconcile;
mod selection;
mod slots;
mod terminal;
mod timestamp;
mod types;

pub use candidate::{Candidate, CandidateId};
pub use content::{classify_by_content, match_content_rule, DocumentInspector, MAX_PAGES};
pub use error::{HashValidationError, ParseError};
pub use filename::{classify_by_filename, exclusion_reason, filename_types, FilenamePass};
pub use hash::ContentHash;
pub use reconcile::reconcile;
pub use selection::{select_winners, Selection};
pub use slots::{SlotState, SlotStatus};
pub use terminal::{CanonicalRefs, Terminal};
pub use timestamp::{is_valid_stamp, stamp_from_pdf_date, STAMP_LEN};
pub use types::{ScheduleType, TypeTag};
