//! Database row types. These map directly to SQLite rows.
//! Distinct from mytutor-types models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use mytutor_types::models::{ChatMessage, ConnectedAccount};

pub struct ConnectedAccountRow {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub connected_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub created_at: String,
}

/// Timestamps are stored as fixed-width RFC 3339 so that text ordering
/// matches chronological ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?;
    Ok(ts.with_timezone(&Utc))
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let created_at = parse_timestamp(&row.created_at)
            .with_context(|| format!("message '{}'", row.id))?;
        Ok(Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            connected_id: row.connected_id,
            message: row.body,
            created_at,
        })
    }
}

impl TryFrom<ConnectedAccountRow> for ConnectedAccount {
    type Error = anyhow::Error;

    fn try_from(row: ConnectedAccountRow) -> Result<Self> {
        let created_at = parse_timestamp(&row.created_at)
            .with_context(|| format!("connected account '{}'", row.id))?;
        Ok(Self {
            id: row.id,
            user_a: row.user_a,
            user_b: row.user_b,
            created_at,
        })
    }
}
