//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::Database;
use crate::students::{StudentRecord, UserId};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    // Rows adopted from the pre-migration table carry an empty timestamp.
    DateTime::<Utc>::MIN_UTC
}

/// Map a libsql Row to a StudentRecord.
///
/// Column order matches STUDENT_COLUMNS:
/// 0:user_id, 1:name, 2:age, 3:grade, 4:updated_at
fn row_to_student(row: &libsql::Row) -> Result<StudentRecord, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("row_to_student: {e}"));

    let user_id: i64 = row.get(0).map_err(read)?;
    let name: String = row.get(1).map_err(read)?;
    let age: i64 = row.get(2).map_err(read)?;
    let grade: String = row.get(3).map_err(read)?;
    let updated_str: String = row.get::<String>(4).unwrap_or_default();

    let age = u8::try_from(age)
        .map_err(|_| DatabaseError::Query(format!("Stored age out of range: {age}")))?;

    Ok(StudentRecord {
        user_id: UserId(user_id),
        name,
        age,
        grade,
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const STUDENT_COLUMNS: &str = "user_id, name, age, grade, updated_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert_student(&self, record: &StudentRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO students (user_id, name, age, grade, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id) DO UPDATE SET
                name = excluded.name,
                age = excluded.age,
                grade = excluded.grade,
                updated_at = excluded.updated_at",
            params![
                record.user_id.0,
                record.name.as_str(),
                i64::from(record.age),
                record.grade.as_str(),
                record.updated_at.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_student: {e}")))?;

        debug!(user_id = %record.user_id, "Student record upserted");
        Ok(())
    }

    async fn find_student(&self, user_id: UserId) -> Result<Option<StudentRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = ?1"),
                params![user_id.0],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_student: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_student(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_student: {e}"))),
        }
    }

    async fn delete_student(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute("DELETE FROM students WHERE user_id = ?1", params![user_id.0])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_student: {e}")))?;
        debug!(user_id = %user_id, deleted = count > 0, "Student record delete");
        Ok(count > 0)
    }
}
