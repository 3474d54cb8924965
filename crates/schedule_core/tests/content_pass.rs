use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Once;

use pretty_assertions::assert_eq;
use schedule_core::{
    classify_by_content, match_content_rule, reconcile, Candidate, DocumentInspector, ParseError,
    ScheduleType, SlotState, TypeTag, MAX_PAGES,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(schedule_logging::initialize_for_tests);
}

#[derive(Clone)]
struct FakeDocument {
    pages: Result<u32, ParseError>,
    text: Result<String, ParseError>,
}

impl FakeDocument {
    fn new(pages: u32, text: &str) -> Self {
        Self {
            pages: Ok(pages),
            text: Ok(text.to_string()),
        }
    }
}

#[derive(Default)]
struct FakeInspector {
    documents: HashMap<u64, FakeDocument>,
    page_calls: RefCell<Vec<u64>>,
    text_calls: RefCell<Vec<u64>>,
}

impl FakeInspector {
    fn with(mut self, id: u64, doc: FakeDocument) -> Self {
        self.documents.insert(id, doc);
        self
    }

    fn document(&self, id: u64) -> FakeDocument {
        self.documents
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("candidate {id} should not be inspected"))
    }
}

impl DocumentInspector for FakeInspector {
    fn page_count(&self, candidate: &Candidate) -> Result<u32, ParseError> {
        self.page_calls.borrow_mut().push(candidate.id);
        self.document(candidate.id).pages
    }

    fn text(&self, candidate: &Candidate) -> Result<String, ParseError> {
        self.text_calls.borrow_mut().push(candidate.id);
        self.document(candidate.id).text
    }
}

#[test]
fn seats_released_across_whitespace_is_rollcall() {
    init_logging();
    let inspector = FakeInspector::default().with(0, FakeDocument::new(1, "Flight 12\nSeats\nReleased: 14"));

    let (out, slots) =
        classify_by_content(vec![Candidate::new(0, "0412.pdf")], SlotState::new(), &inspector);

    assert_eq!(out[0].tag, TypeTag::Classified(ScheduleType::Rollcall));
    assert_eq!(out[0].page_count, Some(1));
    assert_eq!(slots.winner(ScheduleType::Rollcall), Some(0));
}

#[test]
fn rollcall_keywords_take_precedence() {
    init_logging();
    let text = "roll call destination seats pax monthly";
    assert_eq!(
        match_content_rule(text, &SlotState::new()),
        Some(ScheduleType::Rollcall)
    );
    let filled = SlotState::new().fill(ScheduleType::Rollcall, 0);
    assert_eq!(match_content_rule(text, &filled), Some(ScheduleType::ThirtyDay));
    let filled = filled.fill(ScheduleType::ThirtyDay, 1);
    assert_eq!(
        match_content_rule(text, &filled),
        Some(ScheduleType::SeventyTwoHour)
    );
    assert_eq!(match_content_rule("nothing useful here", &SlotState::new()), None);
}

#[test]
fn oversized_documents_are_discarded_before_text_extraction() {
    init_logging();
    let inspector =
        FakeInspector::default().with(0, FakeDocument::new(MAX_PAGES + 1, "seats released"));

    let (out, slots) =
        classify_by_content(vec![Candidate::new(0, "big.pdf")], SlotState::new(), &inspector);

    assert_eq!(out[0].tag, TypeTag::Discard);
    assert_eq!(out[0].page_count, Some(MAX_PAGES + 1));
    assert!(inspector.text_calls.borrow().is_empty());
    assert_eq!(slots, SlotState::new());
}

#[test]
fn unreadable_documents_are_discarded() {
    init_logging();
    let inspector = FakeInspector::default()
        .with(
            0,
            FakeDocument {
                pages: Err(ParseError::Structure("no xref".to_string())),
                text: Ok(String::new()),
            },
        )
        .with(
            1,
            FakeDocument {
                pages: Ok(2),
                text: Err(ParseError::Text("font".to_string())),
            },
        );

    let (out, _) = classify_by_content(
        vec![Candidate::new(0, "a.pdf"), Candidate::new(1, "b.pdf")],
        SlotState::new(),
        &inspector,
    );

    assert_eq!(out[0].tag, TypeTag::Discard);
    assert_eq!(out[1].tag, TypeTag::Discard);
}

#[test]
fn saturated_slots_skip_inspection() {
    init_logging();
    let slots = ScheduleType::ALL
        .into_iter()
        .enumerate()
        .fold(SlotState::new(), |s, (i, ty)| s.fill(ty, i as u64));
    let inspector = FakeInspector::default();

    let (out, _) = classify_by_content(vec![Candidate::new(7, "x.pdf")], slots, &inspector);

    assert_eq!(out[0].tag, TypeTag::Discard);
    assert!(inspector.page_calls.borrow().is_empty());
}

#[test]
fn filename_matches_never_reach_the_page_guard() {
    init_logging();
    // Only the unnamed document is known to the inspector; touching any
    // other candidate panics.
    let inspector = FakeInspector::default().with(2, FakeDocument::new(3, "PAX seats released"));
    let candidates = vec![
        Candidate::new(0, "BWI_72HR.pdf").with_timestamps("20240101120000", ""),
        Candidate::new(1, "BWI_30DAY.pdf").with_timestamps("20240101120000", ""),
        Candidate::new(2, "0412.pdf").with_timestamps("20240101120000", ""),
    ];

    let selection = reconcile(candidates, &inspector);

    assert_eq!(*inspector.page_calls.borrow(), vec![2]);
    assert_eq!(selection.winners.len(), 3);
    assert_eq!(selection.winners[&ScheduleType::Rollcall], 2);
    assert!(selection.candidates[0].page_count.is_none());
}
