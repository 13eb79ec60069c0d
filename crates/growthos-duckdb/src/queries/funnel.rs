use std::collections::HashMap;

use anyhow::Result;

use growthos_core::date_range::DateRange;
use growthos_core::funnel::{build_funnel_report, FunnelReport, PaymentTotals, StepCounts};

use super::{param_refs, scope_params, SCOPE_FILTER};
use crate::DuckDbBackend;

/// Funnel report for the organization's configured steps. `None` when the
/// organization does not exist.
pub async fn get_funnel_inner(
    db: &DuckDbBackend,
    organization_id: &str,
    range: &DateRange,
) -> Result<Option<FunnelReport>> {
    let Some(org) = db.get_organization(organization_id).await? else {
        return Ok(None);
    };

    let params = scope_params(organization_id, range);
    let conn = db.conn.lock().await;

    // One pass over the range: raw and distinct-session counts per type.
    let sql = format!(
        "SELECT event_type, COUNT(*), COUNT(DISTINCT session_id) \
         FROM events WHERE {SCOPE_FILTER} \
         GROUP BY event_type"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs(&params).as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            StepCounts {
                total: row.get(1)?,
                unique_sessions: row.get(2)?,
            },
        ))
    })?;
    let mut counts = HashMap::new();
    for row in rows {
        let (event_type, c) = row?;
        counts.insert(event_type, c);
    }

    let totals_sql = format!(
        "SELECT CAST(COALESCE(SUM(gross_value_in_cents), 0) AS BIGINT), \
                CAST(COALESCE(SUM(net_value_in_cents), 0) AS BIGINT), \
                COUNT(*) \
         FROM events WHERE {SCOPE_FILTER} AND event_type = 'payment'"
    );
    let payments = conn
        .prepare(&totals_sql)?
        .query_row(param_refs(&params).as_slice(), |row| {
            Ok(PaymentTotals {
                gross_revenue: row.get(0)?,
                net_revenue: row.get(1)?,
                payments: row.get(2)?,
            })
        })?;

    Ok(Some(build_funnel_report(&org.funnel_steps, &counts, payments, range)))
}
