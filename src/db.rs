//! Database module for the companion service
//!
//! Provides persistence for users, conversation snapshots, and completed
//! session records.

mod schema;

pub use schema::*;

use crate::profile::{SessionId, UserProfile};
use crate::state_machine::ConversationState;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Create a user. The display name defaults to `User {n+1}`.
    pub fn create_user(
        &self,
        display_name: Option<&str>,
        profile: &UserProfile,
    ) -> DbResult<UserRecord> {
        let count = self.count_users()?;
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| format!("User {}", count + 1), String::from);
        let id = format!("user-{}", Uuid::new_v4());
        let now = Utc::now();
        let profile_json = serde_json::to_string(profile)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, display_name, profile, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, display_name, profile_json, now.to_rfc3339()],
        )?;
        tracing::info!(user_id = %id, "Created user");

        Ok(UserRecord {
            id,
            display_name,
            profile: profile.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// List users in creation order
    pub fn list_users(&self) -> DbResult<Vec<UserSummary>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, display_name FROM users ORDER BY created_at, rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn count_users(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    /// Get user by ID
    pub fn get_user(&self, id: &str) -> DbResult<UserRecord> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, display_name, profile, created_at, updated_at FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::UserNotFound(id.to_string()),
                other => DbError::Sqlite(other),
            })?;

        let (id, display_name, profile_json, created_at, updated_at) = row;
        Ok(UserRecord {
            id,
            display_name,
            profile: serde_json::from_str(&profile_json)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    /// Replace a user's profile
    pub fn update_user(&self, id: &str, profile: &UserProfile) -> DbResult<()> {
        let conn = self.conn()?;
        let profile_json = serde_json::to_string(profile)?;
        let updated = conn.execute(
            "UPDATE users SET profile = ?1, updated_at = ?2 WHERE id = ?3",
            params![profile_json, Utc::now().to_rfc3339(), id],
        )?;

        if updated == 0 {
            return Err(DbError::UserNotFound(id.to_string()));
        }
        Ok(())
    }

    // ==================== Conversation State Operations ====================

    /// Load the saved snapshot. A snapshot that no longer parses is logged and
    /// treated as absent.
    pub fn get_conversation_state(&self, user_id: &str) -> DbResult<Option<ConversationState>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM conversation_states WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Discarding malformed conversation state");
                None
            }
        }))
    }

    /// Upsert the snapshot
    pub fn save_conversation_state(&self, user_id: &str, state: &ConversationState) -> DbResult<()> {
        let conn = self.conn()?;
        let state_json = serde_json::to_string(state)?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(DbError::UserNotFound(user_id.to_string()));
        }

        conn.execute(
            "INSERT INTO conversation_states (user_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![user_id, state_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ==================== Session Record Operations ====================

    pub fn record_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        session_data: &Value,
    ) -> DbResult<SessionRecord> {
        let conn = self.conn()?;
        let now = Utc::now();
        let data_json = serde_json::to_string(session_data)?;

        conn.execute(
            "INSERT INTO session_records (user_id, session_id, session_data, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, session_id, data_json, now.to_rfc3339()],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DbError::UserNotFound(user_id.to_string())
            }
            other => DbError::Sqlite(other),
        })?;

        Ok(SessionRecord {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            session_id,
            session_data: session_data.clone(),
            completed_at: now,
        })
    }

    /// Completed sessions, most recent first
    pub fn list_sessions(&self, user_id: &str) -> DbResult<Vec<SessionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, session_id, session_data, completed_at
             FROM session_records WHERE user_id = ?1
             ORDER BY completed_at DESC, id DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            let id: i64 = row.get(0)?;
            let data: String = row.get(3)?;
            let session_data = serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!(user_id, record_id = id, error = %e, "Malformed session data");
                Value::Null
            });
            Ok(SessionRecord {
                id,
                user_id: row.get(1)?,
                session_id: row.get(2)?,
                session_data,
                completed_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
