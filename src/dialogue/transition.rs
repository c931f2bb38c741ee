//! Pure dialogue transition function.
//!
//! Every (state, event) pair is handled here and nowhere else. The function
//! performs no I/O: storage work is described by `Effect`s that the engine
//! executes afterwards.

use crate::students::UserId;

use super::effect::{Controls, Effect};
use super::event::Event;
use super::prompts;
use super::state::{AgeError, DialogueState, parse_age};

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult {
    /// Session after the event; `None` is idle (no session).
    pub next: Option<DialogueState>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(next: Option<DialogueState>) -> Self {
        Self {
            next,
            effects: vec![],
        }
    }

    /// Finish the dialogue: the session is discarded.
    pub fn idle() -> Self {
        Self::new(None)
    }

    /// Stay where we are.
    pub fn unchanged(state: Option<&DialogueState>) -> Self {
        Self::new(state.cloned())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Apply `event` to `state` for `user_id`.
pub fn transition(
    state: Option<&DialogueState>,
    user_id: UserId,
    event: Event,
) -> TransitionResult {
    use DialogueState::*;

    match (state, event) {
        // ============================================================
        // Commands that work from any state
        // ============================================================
        (_, Event::StartDialogue) => {
            TransitionResult::new(Some(AwaitingName))
                .with_effect(Effect::reply_with(prompts::START, Controls::None))
        }

        (_, Event::RestartDialogue) => {
            TransitionResult::new(Some(AwaitingName))
                .with_effect(Effect::reply_with(prompts::RESTART, Controls::None))
        }

        (Some(_), Event::CancelCommand) => cancelled(),

        // Nothing to cancel.
        (None, Event::CancelCommand) => TransitionResult::idle(),

        (state, Event::ViewRecord) => {
            TransitionResult::unchanged(state).with_effect(Effect::ShowStudent)
        }

        (state, Event::DeleteRecord) => TransitionResult::unchanged(state)
            .with_effect(Effect::DeleteStudent)
            .with_effect(Effect::reply(prompts::DELETED)),

        (state, Event::Help) => {
            TransitionResult::unchanged(state).with_effect(Effect::reply(prompts::HELP))
        }

        (state, Event::Fallback(_)) => {
            TransitionResult::unchanged(state).with_effect(Effect::reply(prompts::FALLBACK))
        }

        // ============================================================
        // Typed answers
        // ============================================================
        (Some(_), Event::TextInput(text)) if prompts::is_cancel(&text) => cancelled(),

        (Some(AwaitingName), Event::TextInput(text)) => {
            if text.trim().is_empty() {
                return TransitionResult::unchanged(state)
                    .with_effect(Effect::reply(prompts::NAME_REQUIRED));
            }
            TransitionResult::new(Some(AwaitingAge { name: text }))
                .with_effect(Effect::reply_with(prompts::ASK_AGE, Controls::CancelOnly))
        }

        (Some(AwaitingAge { name }), Event::TextInput(text)) => match parse_age(&text) {
            Ok(age) => TransitionResult::new(Some(AwaitingGrade {
                name: name.clone(),
                age,
            }))
            .with_effect(Effect::reply_with(prompts::ASK_GRADE, Controls::GradeChoice)),
            Err(AgeError::NotANumber) => TransitionResult::unchanged(state).with_effect(
                Effect::reply_with(prompts::AGE_NOT_A_NUMBER, Controls::CancelOnly),
            ),
            Err(AgeError::OutOfRange) => TransitionResult::unchanged(state).with_effect(
                Effect::reply_with(prompts::age_out_of_range(), Controls::CancelOnly),
            ),
        },

        (Some(AwaitingGrade { name, age }), Event::TextInput(grade)) => {
            let summary = prompts::summary(name, *age, &grade);
            TransitionResult::new(Some(AwaitingConfirmation {
                name: name.clone(),
                age: *age,
                grade,
            }))
            .with_effect(Effect::reply_with(summary, Controls::ConfirmCancel))
        }

        (Some(AwaitingConfirmation { .. }), Event::TextInput(_)) => {
            TransitionResult::unchanged(state).with_effect(Effect::reply(prompts::USE_BUTTONS))
        }

        (None, Event::TextInput(_)) => {
            TransitionResult::idle().with_effect(Effect::reply(prompts::FALLBACK))
        }

        // ============================================================
        // Confirm / cancel controls
        // ============================================================
        (Some(confirming @ AwaitingConfirmation { .. }), Event::Confirm) => {
            let mut result = TransitionResult::idle();
            if let Some(record) = confirming.to_record(user_id) {
                result = result.with_effect(Effect::SaveStudent(record));
            }
            result
                .with_effect(Effect::reply_with(prompts::SAVED, Controls::None))
                .with_effect(Effect::ClearControls)
        }

        (Some(AwaitingConfirmation { .. }), Event::Cancel) => {
            cancelled().with_effect(Effect::ClearControls)
        }

        // A control left over from an earlier dialogue.
        (state, Event::Confirm | Event::Cancel) => TransitionResult::unchanged(state)
            .with_effect(Effect::reply(prompts::NOTHING_TO_CONFIRM))
            .with_effect(Effect::ClearControls),
    }
}

fn cancelled() -> TransitionResult {
    TransitionResult::idle().with_effect(Effect::reply_with(prompts::CANCELLED, Controls::None))
}
