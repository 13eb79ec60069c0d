use anyhow::Result;
use duckdb::Connection;

use growthos_core::analytics::{
    average_cents, format_rate, CategoryBreakdown, FinancialSummary, PaymentMethodBreakdown,
};
use growthos_core::date_range::DateRange;

use super::{param_refs, scope_params, SqlParams, SCOPE_FILTER};
use crate::DuckDbBackend;

/// `(group, payments, revenue)` over payment events, revenue descending.
fn payment_breakdown(
    conn: &Connection,
    params: &SqlParams,
    group_expr: &str,
) -> Result<Vec<(String, i64, i64)>> {
    let sql = format!(
        "SELECT {group_expr} AS grp, COUNT(*), \
                CAST(COALESCE(SUM(gross_value_in_cents), 0) AS BIGINT) AS revenue \
         FROM events WHERE {SCOPE_FILTER} AND event_type = 'payment' \
         GROUP BY grp \
         ORDER BY revenue DESC, grp ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs(params).as_slice(), |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub async fn get_financial_inner(
    db: &DuckDbBackend,
    organization_id: &str,
    range: &DateRange,
) -> Result<FinancialSummary> {
    let params = scope_params(organization_id, range);
    let conn = db.conn.lock().await;

    let sql = format!(
        "SELECT \
           CAST(COALESCE(SUM(gross_value_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT), \
           CAST(COALESCE(SUM(net_value_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT), \
           CAST(COALESCE(SUM(gateway_fee_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT), \
           CAST(COALESCE(SUM(discount_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT), \
           CAST(COALESCE(SUM(gross_value_in_cents) FILTER (WHERE event_type = 'checkout_abandoned'), 0) AS BIGINT), \
           COUNT(*) FILTER (WHERE event_type = 'payment') \
         FROM events WHERE {SCOPE_FILTER}"
    );
    let (gross, net, fees, discounts, lost, payments): (i64, i64, i64, i64, i64, i64) = conn
        .prepare(&sql)?
        .query_row(param_refs(&params).as_slice(), |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;

    let by_payment_method = payment_breakdown(&conn, &params, "COALESCE(payment_method, 'unknown')")?
        .into_iter()
        .map(|(method, count, revenue)| PaymentMethodBreakdown {
            method,
            payments: count,
            revenue,
            percentage: format_rate(revenue, gross),
        })
        .collect();

    let by_category = payment_breakdown(&conn, &params, "COALESCE(category, 'uncategorized')")?
        .into_iter()
        .map(|(category, count, revenue)| CategoryBreakdown {
            category,
            payments: count,
            revenue,
            percentage: format_rate(revenue, gross),
        })
        .collect();

    Ok(FinancialSummary {
        gross_revenue_in_cents: gross,
        net_revenue_in_cents: net,
        total_gateway_fees_in_cents: fees,
        total_discounts_in_cents: discounts,
        lost_revenue_in_cents: lost,
        average_ticket_in_cents: average_cents(gross, payments),
        total_payments: payments,
        by_payment_method,
        by_category,
    })
}
