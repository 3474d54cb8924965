use crate::{CandidateId, ScheduleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotStatus {
    #[default]
    Open,
    Filled(CandidateId),
}

/// Per-terminal record of which schedule types already have a winner.
///
/// A snapshot value: passes take one and hand back the updated one, so a
/// slot filled by the filename pass is visible to the content pass without
/// shared mutable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotState {
    slots: [SlotStatus; 3],
}

impl SlotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, ty: ScheduleType) -> SlotStatus {
        self.slots[ty.index()]
    }

    pub fn is_open(&self, ty: ScheduleType) -> bool {
        self.status(ty) == SlotStatus::Open
    }

    /// True once every type has a winner.
    pub fn is_saturated(&self) -> bool {
        ScheduleType::ALL.iter().all(|ty| !self.is_open(*ty))
    }

    pub fn winner(&self, ty: ScheduleType) -> Option<CandidateId> {
        match self.status(ty) {
            SlotStatus::Filled(id) => Some(id),
            SlotStatus::Open => None,
        }
    }

    /// Fill `ty` with `id`. A slot that is already filled keeps its first winner.
    #[must_use]
    pub fn fill(mut self, ty: ScheduleType, id: CandidateId) -> Self {
        if self.is_open(ty) {
            self.slots[ty.index()] = SlotStatus::Filled(id);
        }
        self
    }
}
