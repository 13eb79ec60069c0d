use std::collections::HashMap;

use anyhow::Result;

use growthos_core::analytics::DailyRow;
use growthos_core::date_range::DateRange;

use super::{param_refs, scope_params, SCOPE_FILTER};
use crate::DuckDbBackend;

/// One row per calendar day in `range`, ascending; days without events are
/// zero-filled.
pub async fn get_daily_inner(
    db: &DuckDbBackend,
    organization_id: &str,
    range: &DateRange,
) -> Result<Vec<DailyRow>> {
    let params = scope_params(organization_id, range);
    let conn = db.conn.lock().await;

    let sql = format!(
        "SELECT strftime(created_at, '%Y-%m-%d') AS day, \
                COUNT(*) FILTER (WHERE event_type = 'signup'), \
                COUNT(*) FILTER (WHERE event_type = 'payment'), \
                CAST(COALESCE(SUM(gross_value_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT), \
                CAST(COALESCE(SUM(net_value_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT) \
         FROM events WHERE {SCOPE_FILTER} \
         GROUP BY day"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs(&params).as_slice(), |row| {
        Ok(DailyRow {
            date: row.get(0)?,
            signups: row.get(1)?,
            payments: row.get(2)?,
            revenue: row.get(3)?,
            net_revenue: row.get(4)?,
        })
    })?;

    let mut by_day = HashMap::new();
    for row in rows {
        let row = row?;
        by_day.insert(row.date.clone(), row);
    }

    Ok(range
        .days()
        .map(|day| {
            let date = day.format("%Y-%m-%d").to_string();
            by_day.remove(&date).unwrap_or(DailyRow {
                date,
                signups: 0,
                payments: 0,
                revenue: 0,
                net_revenue: 0,
            })
        })
        .collect())
}
