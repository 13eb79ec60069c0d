use anyhow::Result;
use chrono::{DateTime, Utc};

use growthos_core::analytics::{RecentEvent, RecentEvents};

use crate::backend::db_timestamp;
use crate::DuckDbBackend;

/// Newest events since `since`, at most `limit`. Used to confirm a freshly
/// installed tracker is delivering.
pub async fn get_recent_events_inner(
    db: &DuckDbBackend,
    organization_id: &str,
    since: DateTime<Utc>,
    limit: usize,
) -> Result<RecentEvents> {
    let since_str = db_timestamp(&since.naive_utc());
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id, event_type, source, landing_page, device, CAST(created_at AS VARCHAR) \
         FROM events \
         WHERE organization_id = ?1 AND created_at >= CAST(?2 AS TIMESTAMP) \
         ORDER BY created_at DESC \
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(duckdb::params![organization_id, since_str, limit], |row| {
        Ok(RecentEvent {
            id: row.get(0)?,
            event_type: row.get(1)?,
            source: row.get(2)?,
            landing_page: row.get(3)?,
            device: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }

    Ok(RecentEvents {
        count: events.len(),
        latest_event: events.into_iter().next(),
    })
}
