//! Student records — the durable result of a completed intake dialogue.

pub mod model;

pub use model::{StudentRecord, UserId};
