//! Verdict persistence
//!
//! One row per analyzed message, keyed by `messageId`. `reasons` is stored
//! JSON-encoded (spec §4.B); every other column maps directly.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::errors::AppResult;
use crate::models::{ActionTaken, CheckResult, Verdict};

use super::SharedConnection;

#[derive(Clone)]
pub struct VerdictStore {
    conn: SharedConnection,
}

impl VerdictStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Insert or overwrite the verdict for `verdict.message_id`.
    pub async fn save(&self, verdict: &Verdict) -> AppResult<()> {
        let reasons_json = serde_json::to_string(&verdict.reasons)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO verdicts (messageId, score, reasons_json, timestamp, actionTaken, \"from\", subject, receivedDate, imapUID)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(messageId) DO UPDATE SET
                score = excluded.score,
                reasons_json = excluded.reasons_json,
                timestamp = excluded.timestamp,
                actionTaken = excluded.actionTaken,
                \"from\" = excluded.\"from\",
                subject = excluded.subject,
                receivedDate = excluded.receivedDate,
                imapUID = excluded.imapUID",
            params![
                verdict.message_id,
                verdict.score,
                reasons_json,
                verdict.timestamp.to_rfc3339(),
                verdict.action_taken,
                verdict.from,
                verdict.subject,
                verdict.received_date.to_rfc3339(),
                verdict.imap_uid,
            ],
        )?;
        Ok(())
    }

    pub async fn lookup(&self, message_id: &str) -> AppResult<Option<Verdict>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT messageId, score, reasons_json, timestamp, actionTaken, \"from\", subject, receivedDate, imapUID
             FROM verdicts WHERE messageId = ?1",
            params![message_id],
            row_to_verdict,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Open verdicts (no action taken yet) at or above `min_score` (default
    /// 3), newest first, capped at `limit` (default 20).
    pub async fn recent_verdicts(
        &self,
        limit: Option<u32>,
        min_score: Option<u32>,
    ) -> AppResult<Vec<Verdict>> {
        let limit = limit.unwrap_or(20);
        let min_score = min_score.unwrap_or(3);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT messageId, score, reasons_json, timestamp, actionTaken, \"from\", subject, receivedDate, imapUID
             FROM verdicts WHERE score >= ?1 AND actionTaken IS NULL ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![min_score, limit], row_to_verdict)?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    pub async fn update_action(&self, message_id: &str, action: ActionTaken) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE verdicts SET actionTaken = ?1 WHERE messageId = ?2",
            params![action, message_id],
        )?;
        Ok(())
    }

    /// Mark every *open* verdict whose `from` address is on `domain` as
    /// `markedSafe`. Verdicts already flagged, moved to junk, or previously
    /// marked safe are left untouched. Returns the number of rows updated.
    pub async fn mark_domain_safe(&self, domain: &str) -> AppResult<usize> {
        let pattern = format!("%@{domain}%");
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE verdicts SET actionTaken = ?1 WHERE \"from\" LIKE ?2 AND actionTaken IS NULL",
            params![ActionTaken::MarkedSafe, pattern],
        )?;
        Ok(updated)
    }

    pub async fn delete(&self, message_id: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM verdicts WHERE messageId = ?1", params![message_id])?;
        Ok(())
    }

    /// Delete verdicts older than `days` (default 30). Returns the number
    /// of rows removed.
    pub async fn purge_old(&self, days: Option<i64>) -> AppResult<usize> {
        let days = days.unwrap_or(30);
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM verdicts WHERE timestamp < ?1", params![cutoff])?;
        Ok(deleted)
    }
}

fn row_to_verdict(row: &rusqlite::Row<'_>) -> rusqlite::Result<Verdict> {
    let reasons_json: String = row.get(2)?;
    let reasons: Vec<CheckResult> = serde_json::from_str(&reasons_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;
    let timestamp: String = row.get(3)?;
    let received_date: String = row.get(7)?;

    Ok(Verdict {
        message_id: row.get(0)?,
        score: row.get(1)?,
        reasons,
        timestamp: parse_rfc3339(&timestamp),
        action_taken: row.get(4)?,
        from: row.get(5)?,
        subject: row.get(6)?,
        received_date: parse_rfc3339(&received_date),
        imap_uid: row.get(8)?,
    })
}

fn parse_rfc3339(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
