//! Dialogue state — which question a user is answering and what they have
//! answered so far.

use serde::{Deserialize, Serialize};

use crate::students::{StudentRecord, UserId};

/// Youngest accepted age, inclusive.
pub const MIN_AGE: u8 = 5;
/// Oldest accepted age, inclusive.
pub const MAX_AGE: u8 = 100;

/// The steps of an active dialogue, without the collected answers.
///
/// Having no session at all is the idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueStep {
    AwaitingName,
    AwaitingAge,
    AwaitingGrade,
    AwaitingConfirmation,
}

impl std::fmt::Display for DialogueStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingAge => "awaiting_age",
            Self::AwaitingGrade => "awaiting_grade",
            Self::AwaitingConfirmation => "awaiting_confirmation",
        };
        write!(f, "{s}")
    }
}

/// One user's in-progress dialogue.
///
/// Each variant carries exactly the answers collected before it, so a
/// confirmation can never be reached with a missing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DialogueState {
    AwaitingName,
    AwaitingAge {
        name: String,
    },
    AwaitingGrade {
        name: String,
        age: u8,
    },
    AwaitingConfirmation {
        name: String,
        age: u8,
        grade: String,
    },
}

impl DialogueState {
    pub fn step(&self) -> DialogueStep {
        match self {
            Self::AwaitingName => DialogueStep::AwaitingName,
            Self::AwaitingAge { .. } => DialogueStep::AwaitingAge,
            Self::AwaitingGrade { .. } => DialogueStep::AwaitingGrade,
            Self::AwaitingConfirmation { .. } => DialogueStep::AwaitingConfirmation,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::AwaitingName => None,
            Self::AwaitingAge { name }
            | Self::AwaitingGrade { name, .. }
            | Self::AwaitingConfirmation { name, .. } => Some(name),
        }
    }

    pub fn age(&self) -> Option<u8> {
        match self {
            Self::AwaitingGrade { age, .. } | Self::AwaitingConfirmation { age, .. } => Some(*age),
            _ => None,
        }
    }

    pub fn grade(&self) -> Option<&str> {
        match self {
            Self::AwaitingConfirmation { grade, .. } => Some(grade),
            _ => None,
        }
    }

    /// The record this dialogue would save, once every answer is in.
    pub fn to_record(&self, user_id: UserId) -> Option<StudentRecord> {
        match self {
            Self::AwaitingConfirmation { name, age, grade } => {
                Some(StudentRecord::new(user_id, name.as_str(), *age, grade.as_str()))
            }
            _ => None,
        }
    }
}

/// Why an age answer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeError {
    NotANumber,
    OutOfRange,
}

/// Validate an age answer: ASCII digits only, value in `MIN_AGE..=MAX_AGE`.
///
/// Digit strings too long for any plausible age are out of range, not
/// malformed.
pub fn parse_age(text: &str) -> Result<u8, AgeError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AgeError::NotANumber);
    }
    match text.parse::<u64>() {
        Ok(age) if (u64::from(MIN_AGE)..=u64::from(MAX_AGE)).contains(&age) => Ok(age as u8),
        _ => Err(AgeError::OutOfRange),
    }
}
