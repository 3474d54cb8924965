use crate::{
    classify_by_content, classify_by_filename, select_winners, Candidate, DocumentInspector,
    Selection, SlotState,
};

/// Run both classification passes and selection for one terminal.
///
/// `candidates` must be in discovery order; slot filling is first-come.
pub fn reconcile<I>(candidates: Vec<Candidate>, inspector: &I) -> Selection
where
    I: DocumentInspector + ?Sized,
{
    let (by_name, slots) = classify_by_filename(candidates, SlotState::new());
    let (by_content, _slots) = classify_by_content(by_name.unresolved, slots, inspector);

    let mut all = by_name.classified;
    all.extend(by_content);
    all.sort_by_key(|c| c.id);
    select_winners(all)
}
