//! Intake dialogue — per-user conversation state machine.
//!
//! A user is walked through three questions (name, age, grade), shown a
//! summary, and asked to confirm or cancel. Confirmation upserts one
//! `StudentRecord` per identity. Sessions are in memory only.
//!
//! `transition` is a pure function over (state, event); `DialogueEngine`
//! wraps it in a per-identity critical section and executes the storage
//! effects it asks for.

pub mod effect;
pub mod engine;
pub mod event;
pub mod prompts;
pub mod sessions;
pub mod state;
pub mod transition;

pub use effect::{Controls, Effect, Outbound, Reply};
pub use engine::DialogueEngine;
pub use event::{Event, EventParser, Payload};
pub use sessions::{SessionGuard, SessionStore};
pub use state::{DialogueState, DialogueStep};
pub use transition::{TransitionResult, transition};
