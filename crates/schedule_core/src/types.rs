use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three kinds of schedule a terminal publishes.
///
/// The serialized names double as directory names in the on-disk layout.
/// They serialize as plain strings so they can key maps in any format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum ScheduleType {
    SeventyTwoHour,
    ThirtyDay,
    Rollcall,
}

impl ScheduleType {
    pub const ALL: [ScheduleType; 3] = [
        ScheduleType::SeventyTwoHour,
        ScheduleType::ThirtyDay,
        ScheduleType::Rollcall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleType::SeventyTwoHour => "72_HR",
            ScheduleType::ThirtyDay => "30_DAY",
            ScheduleType::Rollcall => "ROLLCALL",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ScheduleType::SeventyTwoHour => 0,
            ScheduleType::ThirtyDay => 1,
            ScheduleType::Rollcall => 2,
        }
    }
}

impl From<ScheduleType> for &'static str {
    fn from(ty: ScheduleType) -> Self {
        ty.as_str()
    }
}

impl FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScheduleType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| format!("unknown schedule type {s:?}"))
    }
}

impl TryFrom<String> for ScheduleType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification state of a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeTag {
    #[default]
    Unset,
    Classified(ScheduleType),
    Discard,
}

impl TypeTag {
    pub fn schedule_type(self) -> Option<ScheduleType> {
        match self {
            TypeTag::Classified(ty) => Some(ty),
            TypeTag::Unset | TypeTag::Discard => None,
        }
    }

    pub fn is_unset(self) -> bool {
        self == TypeTag::Unset
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Unset => f.write_str("UNSET"),
            TypeTag::Classified(ty) => f.write_str(ty.as_str()),
            TypeTag::Discard => f.write_str("DISCARD"),
        }
    }
}
