//! Student intake bot — walks users through a short registration dialogue
//! and keeps one record per user.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod store;
pub mod students;
