use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Candidate, ScheduleType, SlotState, TypeTag};

// Bounded by non-letters so "Peterson" or "Program" do not trip the short words.
const EXCLUSION_PATTERNS: &[(&str, &str)] = &[
    ("newsletter", r"(?i)news[-_ ]?letter|(^|[^a-zA-Z])gram([^a-zA-Z]|$)"),
    ("pet travel", r"(?i)(^|[^a-zA-Z])pets?([^a-zA-Z]|$)"),
    ("brochure", r"(?i)brochure"),
    ("advisory", r"(?i)advisor(y|ies)"),
    ("guidance", r"(?i)guidance|(^|[^a-zA-Z])guides?([^a-zA-Z]|$)"),
    ("faq", r"(?i)(^|[^a-zA-Z])faqs?([^a-zA-Z]|$)|questions"),
    ("map", r"(?i)(^|[^a-zA-Z])maps?([^a-zA-Z]|$)"),
    ("flyer", r"(?i)fl[iy]ers?"),
    ("aef", r"(?i)(^|[^a-zA-Z])aef([^a-zA-Z]|$)"),
];

static EXCLUSIONS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    EXCLUSION_PATTERNS
        .iter()
        .map(|(label, pattern)| (*label, Regex::new(pattern).unwrap()))
        .collect()
});

static SEVENTY_TWO_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)72(?:[-_ ]|%20)?(?:hr|hour)").unwrap());

static THIRTY_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)30(?:[-_ ]|%20)?day").unwrap());

static ROLLCALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)roll(?:[-_ ]|%20)?call|roll").unwrap());

/// Outcome of the filename pass for one terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilenamePass {
    /// Candidates that left the pass with a final tag (a type or DISCARD).
    pub classified: Vec<Candidate>,
    /// Candidates still UNSET, in input order, for the content pass.
    pub unresolved: Vec<Candidate>,
}

/// Label of the first exclusion rule matching `filename`, if any.
pub fn exclusion_reason(filename: &str) -> Option<&'static str> {
    EXCLUSIONS
        .iter()
        .find(|(_, regex)| regex.is_match(filename))
        .map(|(label, _)| *label)
}

/// Schedule types whose filename pattern matches, in rule order.
pub fn filename_types(filename: &str) -> Vec<ScheduleType> {
    let rules: [(ScheduleType, &Regex); 3] = [
        (ScheduleType::SeventyTwoHour, &SEVENTY_TWO_HOUR),
        (ScheduleType::ThirtyDay, &THIRTY_DAY),
        (ScheduleType::Rollcall, &ROLLCALL),
    ];
    rules
        .into_iter()
        .filter(|(_, regex)| regex.is_match(filename))
        .map(|(ty, _)| ty)
        .collect()
}

/// First pass: type candidates from their advertised filename.
///
/// Candidates are visited in the order supplied; the first one whose
/// pattern matches an open slot takes that slot.
pub fn classify_by_filename(
    candidates: Vec<Candidate>,
    slots: SlotState,
) -> (FilenamePass, SlotState) {
    let mut slots = slots;
    let mut pass = FilenamePass::default();

    for mut candidate in candidates {
        if !candidate.tag.is_unset() {
            pass.classified.push(candidate);
            continue;
        }

        if exclusion_reason(&candidate.filename).is_some() {
            candidate.tag = TypeTag::Discard;
            pass.classified.push(candidate);
            continue;
        }

        let open_match = filename_types(&candidate.filename)
            .into_iter()
            .find(|ty| slots.is_open(*ty));

        match open_match {
            Some(ty) => {
                slots = slots.fill(ty, candidate.id);
                candidate.tag = TypeTag::Classified(ty);
                pass.classified.push(candidate);
            }
            None => pass.unresolved.push(candidate),
        }
    }

    (pass, slots)
}
