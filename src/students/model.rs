//! Identity and student record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identity of a dialogue participant, as supplied by the transport.
///
/// The same key identifies the in-memory dialogue session and the durable
/// student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One student's answers. At most one record exists per `UserId`; a later
/// confirmation replaces it entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub user_id: UserId,
    pub name: String,
    pub age: u8,
    /// Grade label as entered, normally `"1"`..`"11"`.
    pub grade: String,
    pub updated_at: DateTime<Utc>,
}

impl StudentRecord {
    pub fn new(user_id: UserId, name: impl Into<String>, age: u8, grade: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            age,
            grade: grade.into(),
            updated_at: Utc::now(),
        }
    }
}
