use std::collections::BTreeMap;

use crate::{is_valid_stamp, Candidate, CandidateId, ScheduleType, TypeTag};

/// Result of per-terminal reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub winners: BTreeMap<ScheduleType, CandidateId>,
    /// Every input candidate, re-tagged. Only winners keep a schedule type.
    pub candidates: Vec<Candidate>,
}

impl Selection {
    pub fn winner(&self, ty: ScheduleType) -> Option<&Candidate> {
        let id = self.winners.get(&ty)?;
        self.candidates.iter().find(|c| c.id == *id)
    }

    /// Winners in type order.
    pub fn winning_candidates(&self) -> impl Iterator<Item = (ScheduleType, &Candidate)> + '_ {
        ScheduleType::ALL
            .into_iter()
            .filter_map(move |ty| self.winner(ty).map(|c| (ty, c)))
    }

    pub fn losers(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.candidates
            .iter()
            .filter(|c| c.tag == TypeTag::Discard)
    }
}

/// Pick at most one winner per type and discard everything else.
///
/// Ranking is newest `modify_timestamp` first, falling back to
/// `creation_timestamp` when no candidate of the type has a valid modify
/// stamp. A type where neither is available gets no winner.
pub fn select_winners(candidates: Vec<Candidate>) -> Selection {
    let mut candidates = candidates;
    let winners: BTreeMap<ScheduleType, CandidateId> = ScheduleType::ALL
        .into_iter()
        .filter_map(|ty| pick_winner(&candidates, ty).map(|id| (ty, id)))
        .collect();

    for candidate in &mut candidates {
        let is_winner = candidate
            .tag
            .schedule_type()
            .is_some_and(|ty| winners.get(&ty) == Some(&candidate.id));
        if !is_winner {
            candidate.tag = TypeTag::Discard;
        }
    }

    Selection {
        winners,
        candidates,
    }
}

fn pick_winner(candidates: &[Candidate], ty: ScheduleType) -> Option<CandidateId> {
    let of_type: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.tag == TypeTag::Classified(ty))
        .collect();

    newest_by(&of_type, |c| &c.modify_timestamp)
        .or_else(|| newest_by(&of_type, |c| &c.creation_timestamp))
}

// Fixed-width digit strings order lexicographically as they do numerically.
// Ties keep the earlier candidate.
fn newest_by<F>(candidates: &[&Candidate], stamp: F) -> Option<CandidateId>
where
    F: Fn(&Candidate) -> &String,
{
    let mut best: Option<&Candidate> = None;
    for candidate in candidates.iter().copied() {
        if !is_valid_stamp(stamp(candidate)) {
            continue;
        }
        match best {
            Some(current) if stamp(current) >= stamp(candidate) => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|c| c.id)
}
