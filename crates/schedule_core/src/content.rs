use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Candidate, ParseError, ScheduleType, SlotState, TypeTag};

/// Documents longer than this are never schedules.
pub const MAX_PAGES: u32 = 15;

const ROLLCALL_KEYS: &[&str] = &["pax", "seats released"];
const THIRTY_DAY_KEYS: &[&str] = &["30-day", "monthly"];
const SEVENTY_TWO_HOUR_KEYS: &[&str] = &["roll call", "destination", "seats"];

// Evaluation order is the precedence between overlapping keywords.
const RULE_ORDER: [ScheduleType; 3] = [
    ScheduleType::Rollcall,
    ScheduleType::ThirtyDay,
    ScheduleType::SeventyTwoHour,
];

static SEATS_RELEASED: Lazy<Regex> = Lazy::new(|| Regex::new(r"seats\s*released").unwrap());

/// Read access to a candidate's document, for the content pass.
pub trait DocumentInspector {
    /// Parse only the document structure and count its pages.
    fn page_count(&self, candidate: &Candidate) -> Result<u32, ParseError>;

    /// Extract the full text of the document.
    fn text(&self, candidate: &Candidate) -> Result<String, ParseError>;
}

/// First keyword rule that matches `text` and whose slot is still open.
///
/// `text` is expected lowercased and trimmed.
pub fn match_content_rule(text: &str, slots: &SlotState) -> Option<ScheduleType> {
    RULE_ORDER
        .into_iter()
        .filter(|ty| slots.is_open(*ty))
        .find(|ty| rule_matches(*ty, text))
}

fn rule_matches(ty: ScheduleType, text: &str) -> bool {
    match ty {
        ScheduleType::Rollcall => {
            contains_any(text, ROLLCALL_KEYS) || SEATS_RELEASED.is_match(text)
        }
        ScheduleType::ThirtyDay => contains_any(text, THIRTY_DAY_KEYS),
        ScheduleType::SeventyTwoHour => contains_any(text, SEVENTY_TWO_HOUR_KEYS),
    }
}

fn contains_any(text: &str, keys: &[&str]) -> bool {
    keys.iter().any(|key| text.contains(key))
}

/// Second pass: type the filename-unresolved candidates from their text.
///
/// Every candidate leaves this pass with a final tag. Oversized or
/// unparseable documents are discarded before any text is extracted.
pub fn classify_by_content<I>(
    candidates: Vec<Candidate>,
    slots: SlotState,
    inspector: &I,
) -> (Vec<Candidate>, SlotState)
where
    I: DocumentInspector + ?Sized,
{
    let mut slots = slots;
    let mut out = Vec::with_capacity(candidates.len());

    for mut candidate in candidates {
        if !candidate.tag.is_unset() {
            out.push(candidate);
            continue;
        }
        candidate.tag = match content_tag(&mut candidate, &slots, inspector) {
            Some(ty) => {
                slots = slots.fill(ty, candidate.id);
                TypeTag::Classified(ty)
            }
            None => TypeTag::Discard,
        };
        out.push(candidate);
    }

    (out, slots)
}

fn content_tag<I>(candidate: &mut Candidate, slots: &SlotState, inspector: &I) -> Option<ScheduleType>
where
    I: DocumentInspector + ?Sized,
{
    // Nothing left to win; skip opening the file.
    if slots.is_saturated() {
        return None;
    }

    let pages = inspector.page_count(candidate).ok()?;
    candidate.page_count = Some(pages);
    if pages > MAX_PAGES {
        return None;
    }

    let text = inspector.text(candidate).ok()?;
    let text = text.to_lowercase();
    match_content_rule(text.trim(), slots)
}
