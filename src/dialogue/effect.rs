//! Effects produced by dialogue transitions, and the outbound responses the
//! engine hands to the transport.

use crate::students::StudentRecord;

/// Highest grade offered on the grade keyboard.
pub const MAX_GRADE: u8 = 11;

/// Interactive controls attached to a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controls {
    /// Leave whatever the user currently sees in place.
    Keep,
    /// No controls; any previously shown keyboard is removed.
    None,
    CancelOnly,
    /// Grades `1..=MAX_GRADE` plus cancel.
    GradeChoice,
    ConfirmCancel,
}

impl Controls {
    /// Grade labels offered by `GradeChoice`.
    pub fn grade_labels() -> impl Iterator<Item = String> {
        (1..=MAX_GRADE).map(|g| g.to_string())
    }
}

/// A rendering request: text plus optional controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub controls: Controls,
}

impl Reply {
    /// Plain text that does not touch the current controls.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Controls::Keep,
        }
    }

    pub fn with_controls(text: impl Into<String>, controls: Controls) -> Self {
        Self {
            text: text.into(),
            controls,
        }
    }
}

/// Effects to be executed by the engine after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a message to the user.
    Reply(Reply),

    /// Strip the controls from the message whose control was pressed.
    ClearControls,

    /// Upsert the completed record.
    SaveStudent(StudentRecord),

    /// Look up and render the user's stored record.
    ShowStudent,

    /// Delete the user's stored record.
    DeleteStudent,
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply(Reply::text(text))
    }

    pub fn reply_with(text: impl Into<String>, controls: Controls) -> Self {
        Effect::Reply(Reply::with_controls(text, controls))
    }

    /// Whether executing this effect touches durable storage.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Effect::SaveStudent(_) | Effect::ShowStudent | Effect::DeleteStudent
        )
    }
}

/// What the transport must render after an event is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Reply(Reply),
    ClearControls,
}

impl Outbound {
    /// Text of a reply, if this is one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Outbound::Reply(reply) => Some(&reply.text),
            Outbound::ClearControls => None,
        }
    }
}
