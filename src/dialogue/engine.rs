//! DialogueEngine — runs events through the transition table and carries out
//! the resulting effects.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::DatabaseError;
use crate::store::Database;
use crate::students::UserId;

use super::effect::{Effect, Outbound, Reply};
use super::event::{Event, EventParser, Payload};
use super::prompts;
use super::sessions::SessionStore;
use super::transition::{TransitionResult, transition};

/// Coordinates sessions, transitions, and storage for every user.
pub struct DialogueEngine {
    sessions: Arc<SessionStore>,
    db: Arc<dyn Database>,
}

impl DialogueEngine {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            db,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Parse a transport payload and handle the resulting event.
    pub async fn handle_payload(&self, user_id: UserId, payload: &Payload) -> Vec<Outbound> {
        self.handle(user_id, EventParser::parse(payload)).await
    }

    /// Handle one event for `user_id`.
    ///
    /// The whole read-transition-execute-write sequence runs inside the
    /// identity's critical section. If a storage effect fails, the remaining
    /// effects are skipped, the user gets a failure notice, and the session
    /// is left as it was before the event.
    pub async fn handle(&self, user_id: UserId, event: Event) -> Vec<Outbound> {
        let mut guard = self.sessions.lock(user_id).await;

        let from = guard.get().map(|s| s.step());
        let event_label = format!("{event:?}");
        let TransitionResult { next, effects } = transition(guard.get(), user_id, event);

        debug!(
            user_id = %user_id,
            from = ?from,
            to = ?next.as_ref().map(|s| s.step()),
            event = %event_label,
            "Dialogue transition"
        );

        let mut outbound = Vec::with_capacity(effects.len());
        for effect in effects {
            let failure_notice = failure_notice(&effect);
            match self.execute(user_id, effect).await {
                Ok(Some(out)) => outbound.push(out),
                Ok(None) => {}
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "Storage failure during dialogue");
                    outbound.push(Outbound::Reply(Reply::text(failure_notice)));
                    self.sessions.release(guard).await;
                    return outbound;
                }
            }
        }

        guard.replace(next);
        self.sessions.release(guard).await;
        outbound
    }

    /// Carry out one effect. Pure rendering effects pass straight through.
    async fn execute(
        &self,
        user_id: UserId,
        effect: Effect,
    ) -> Result<Option<Outbound>, DatabaseError> {
        match effect {
            Effect::Reply(reply) => Ok(Some(Outbound::Reply(reply))),
            Effect::ClearControls => Ok(Some(Outbound::ClearControls)),
            Effect::SaveStudent(record) => {
                self.db.upsert_student(&record).await?;
                info!(user_id = %user_id, grade = %record.grade, "Student record saved");
                Ok(None)
            }
            Effect::ShowStudent => {
                let text = match self.db.find_student(user_id).await? {
                    Some(record) => prompts::record(&record),
                    None => prompts::NO_RECORD.to_string(),
                };
                Ok(Some(Outbound::Reply(Reply::text(text))))
            }
            Effect::DeleteStudent => {
                let existed = self.db.delete_student(user_id).await?;
                info!(user_id = %user_id, existed, "Student record deleted");
                Ok(None)
            }
        }
    }
}

/// What to tell the user if `effect` fails.
fn failure_notice(effect: &Effect) -> &'static str {
    match effect {
        Effect::SaveStudent(_) => prompts::SAVE_FAILED,
        _ => prompts::STORAGE_FAILED,
    }
}
