//! SQLite-backed stores for rate-limit counters and usage logs

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;

use super::Database;
use crate::service::rate_limit::{CounterKey, CounterStore};
use crate::service::usage::{UsageEntry, UsageStore};

impl CounterStore for Database {
    fn count(&self, key: &CounterKey) -> Result<u32> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT count FROM rate_limits WHERE client_address = ?1 AND kind = ?2 AND day = ?3",
        )?;

        // No row yet means nothing consumed; any other failure is the caller's to handle
        let count: Option<i64> = stmt
            .query_row(
                rusqlite::params![key.address, key.kind.as_str(), key.day.to_string()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read rate limit counter")?;

        Ok(count.unwrap_or(0).max(0) as u32)
    }

    fn increment(&self, key: &CounterKey) -> Result<u32> {
        let conn = self.conn();

        // Single upsert statement so concurrent increments cannot lose updates
        let count: i64 = conn.query_row(
            "INSERT INTO rate_limits (client_address, kind, day, count, updated_at)
             VALUES (?1, ?2, ?3, 1, datetime('now'))
             ON CONFLICT (client_address, kind, day)
             DO UPDATE SET count = count + 1, updated_at = datetime('now')
             RETURNING count",
            rusqlite::params![key.address, key.kind.as_str(), key.day.to_string()],
            |row| row.get(0),
        )?;

        Ok(count.max(0) as u32)
    }
}

impl UsageStore for Database {
    fn append(&self, entry: &UsageEntry) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO download_logs (id, platform, format, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                entry.id,
                entry.platform,
                entry.format,
                // Fixed-width timestamps keep ORDER BY created_at chronological
                entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<UsageEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, platform, format, created_at FROM download_logs
             ORDER BY created_at DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([limit as i64], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_entry).collect()
    }

    fn all(&self) -> Result<Vec<UsageEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, platform, format, created_at FROM download_logs ORDER BY created_at ASC",
        )?;

        let rows = stmt
            .query_map([], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_entry).collect()
    }
}

type RawEntry = (String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_entry((id, platform, format, created_at): RawEntry) -> Result<UsageEntry> {
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .with_context(|| format!("Bad timestamp on download log {}: {}", id, created_at))?
        .with_timezone(&Utc);

    Ok(UsageEntry {
        id,
        platform,
        format,
        created_at,
    })
}
