//! `Database` trait — the storage operations the dialogue needs.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::students::{StudentRecord, UserId};

/// Backend-agnostic student storage.
///
/// Identity is unique: `upsert_student` replaces every field of an existing
/// record for the same `UserId` rather than merging or duplicating it.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert the record, or fully replace the one stored for its `user_id`.
    async fn upsert_student(&self, record: &StudentRecord) -> Result<(), DatabaseError>;

    /// Look up the record stored for `user_id`.
    async fn find_student(&self, user_id: UserId) -> Result<Option<StudentRecord>, DatabaseError>;

    /// Delete the record for `user_id`. Returns whether a row existed.
    async fn delete_student(&self, user_id: UserId) -> Result<bool, DatabaseError>;
}
