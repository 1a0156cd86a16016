// src/memory/store.rs — SQLite operations for sessions, requests and feedback
//
// Requests are append-only: one row per finished run, keyed by request id.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::core::types::{FinalResult, RunInput};

/// One stored run: what was asked and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: String,
    pub session_id: String,
    pub original_input: serde_json::Value,
    pub response: serde_json::Value,
    pub allow_external_grading: bool,
    pub created_at: String,
}

impl RequestRecord {
    pub fn from_run(
        input: &RunInput,
        result: &FinalResult,
        allow_external_grading: bool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            id: result.request_id.clone(),
            session_id: result.session_id.clone(),
            original_input: serde_json::to_value(input)?,
            response: serde_json::to_value(result)?,
            allow_external_grading,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    /// Decode the stored response back into a `FinalResult`.
    pub fn result(&self) -> anyhow::Result<FinalResult> {
        Ok(serde_json::from_value(self.response.clone())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRow {
    pub id: String,
    pub request_id: String,
    pub is_thumbs_up: bool,
    pub feedback_text: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct Store {
    conn: Connection,
}

const REQUEST_COLUMNS: &str =
    "id, session_id, original_input, response, allow_external_grading, created_at";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<(RequestRecordRaw, String)> {
    Ok((
        RequestRecordRaw {
            id: row.get(0)?,
            session_id: row.get(1)?,
            original_input: row.get(2)?,
            response: row.get(3)?,
            allow_external_grading: row.get(4)?,
        },
        row.get(5)?,
    ))
}

/// Row as read, before the JSON columns are decoded.
struct RequestRecordRaw {
    id: String,
    session_id: String,
    original_input: String,
    response: String,
    allow_external_grading: bool,
}

impl RequestRecordRaw {
    fn decode(self, created_at: String) -> anyhow::Result<RequestRecord> {
        Ok(RequestRecord {
            id: self.id,
            session_id: self.session_id,
            original_input: serde_json::from_str(&self.original_input)?,
            response: serde_json::from_str(&self.response)?,
            allow_external_grading: self.allow_external_grading,
            created_at,
        })
    }
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    // -- Sessions --

    /// Create the session or bump its `updated_at`.
    pub fn upsert_session(&self, id: &str) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
            params![id, now],
        )?;
        Ok(())
    }

    pub fn session_exists(&self, id: &str) -> anyhow::Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM sessions WHERE id = ?1", params![id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    // -- Requests --

    /// Append a request. A duplicate id is an error.
    pub fn insert_request(&self, record: &RequestRecord) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO requests (id, session_id, original_input, response,
             allow_external_grading, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.session_id,
                record.original_input.to_string(),
                record.response.to_string(),
                record.allow_external_grading,
                record.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_request(&self, id: &str) -> anyhow::Result<Option<RequestRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"),
                params![id],
                request_from_row,
            )
            .optional()?;
        row.map(|(raw, created_at)| raw.decode(created_at)).transpose()
    }

    fn query_requests(
        &self,
        where_clause: &str,
        args: impl rusqlite::Params,
    ) -> anyhow::Result<Vec<RequestRecord>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests {where_clause}
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, request_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            let (raw, created_at) = row?;
            result.push(raw.decode(created_at)?);
        }
        Ok(result)
    }

    /// Newest first.
    pub fn list_requests_for_session(
        &self,
        session_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<RequestRecord>> {
        self.query_requests("WHERE session_id = ?", params![session_id, limit])
    }

    pub fn list_recent_requests(&self, limit: u32) -> anyhow::Result<Vec<RequestRecord>> {
        self.query_requests("", params![limit])
    }

    /// Requests whose owner opted in to external grading.
    pub fn list_gradable_requests(&self, limit: u32) -> anyhow::Result<Vec<RequestRecord>> {
        self.query_requests("WHERE allow_external_grading = 1", params![limit])
    }

    // -- Feedback --

    pub fn insert_feedback(
        &self,
        id: &str,
        request_id: &str,
        is_thumbs_up: bool,
        feedback_text: Option<&str>,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO feedback (id, request_id, is_thumbs_up, feedback_text, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, request_id, is_thumbs_up, feedback_text, now],
        )?;
        Ok(())
    }

    /// Returns false when no feedback with that id exists.
    pub fn update_feedback(
        &self,
        id: &str,
        is_thumbs_up: bool,
        feedback_text: Option<&str>,
    ) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE feedback SET is_thumbs_up = ?1, feedback_text = ?2, updated_at = ?3
             WHERE id = ?4",
            params![is_thumbs_up, feedback_text, now, id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_feedback(&self, id: &str) -> anyhow::Result<Option<FeedbackRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, request_id, is_thumbs_up, feedback_text, created_at, updated_at
                 FROM feedback WHERE id = ?1",
                params![id],
                |row| {
                    Ok(FeedbackRow {
                        id: row.get(0)?,
                        request_id: row.get(1)?,
                        is_thumbs_up: row.get(2)?,
                        feedback_text: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
