use anyhow::{anyhow, Result};

use growthos_core::analytics::{
    average_cents, CategoryRow, Paginated, Pagination, RollupQuery, RollupRow, RollupSort,
};
use growthos_core::date_range::DateRange;

use super::{param_refs, scope_params, SCOPE_FILTER};
use crate::DuckDbBackend;

/// Grouping dimension of a rollup report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupDimension {
    Channel,
    LandingPage,
    Category,
}

impl RollupDimension {
    /// Group expression; NULLs collapse into a named bucket.
    fn column_expr(self) -> &'static str {
        match self {
            Self::Channel => "COALESCE(source, 'direct')",
            Self::LandingPage => "COALESCE(landing_page, 'unknown')",
            Self::Category => "COALESCE(category, 'uncategorized')",
        }
    }

    fn event_filter(self) -> &'static str {
        match self {
            Self::Channel | Self::LandingPage => "event_type IN ('signup', 'payment')",
            Self::Category => "event_type = 'payment'",
        }
    }
}

/// Whitelisted `ORDER BY` expression over the `grouped` CTE columns.
fn order_expr(sort: RollupSort) -> &'static str {
    match sort {
        RollupSort::Name => "name",
        RollupSort::Signups => "signups",
        RollupSort::Payments => "payments",
        RollupSort::Revenue => "revenue",
        RollupSort::NetRevenue => "net_revenue",
        RollupSort::ConversionRate => "COALESCE(CAST(payments AS DOUBLE) / NULLIF(signups, 0), 0)",
        RollupSort::AverageTicket => "COALESCE(CAST(revenue AS DOUBLE) / NULLIF(payments, 0), 0)",
    }
}

/// Raw per-group totals before presentation.
struct GroupTotals {
    name: String,
    signups: i64,
    payments: i64,
    revenue: i64,
    net_revenue: i64,
}

async fn rollup_inner(
    db: &DuckDbBackend,
    organization_id: &str,
    range: &DateRange,
    dimension: RollupDimension,
    query: &RollupQuery,
) -> Result<(Vec<GroupTotals>, i64)> {
    if dimension == RollupDimension::Category && !query.order_by.applies_to_categories() {
        return Err(anyhow!("sort {:?} is not available for categories", query.order_by));
    }

    let column_expr = dimension.column_expr();
    let event_filter = dimension.event_filter();

    let mut params = scope_params(organization_id, range);
    let mut search_filter = String::new();
    let mut idx = 4;
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        search_filter = format!(" AND contains(lower({column_expr}), lower(?{idx}))");
        params.push(Box::new(search.to_string()));
        idx += 1;
    }

    let conn = db.conn.lock().await;

    let count_sql = format!(
        "SELECT COUNT(DISTINCT {column_expr}) FROM events \
         WHERE {SCOPE_FILTER} AND {event_filter}{search_filter}"
    );
    let total: i64 = conn
        .prepare(&count_sql)?
        .query_row(param_refs(&params).as_slice(), |row| row.get(0))?;

    params.push(Box::new(query.limit));
    params.push(Box::new(query.offset()));

    let data_sql = format!(
        "WITH grouped AS ( \
           SELECT {column_expr} AS name, \
                  COUNT(*) FILTER (WHERE event_type = 'signup') AS signups, \
                  COUNT(*) FILTER (WHERE event_type = 'payment') AS payments, \
                  CAST(COALESCE(SUM(gross_value_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT) AS revenue, \
                  CAST(COALESCE(SUM(net_value_in_cents) FILTER (WHERE event_type = 'payment'), 0) AS BIGINT) AS net_revenue \
           FROM events \
           WHERE {SCOPE_FILTER} AND {event_filter}{search_filter} \
           GROUP BY 1 \
         ) \
         SELECT name, signups, payments, revenue, net_revenue \
         FROM grouped \
         ORDER BY {order} {dir}, name ASC \
         LIMIT ?{idx} OFFSET ?{}",
        idx + 1,
        order = order_expr(query.order_by),
        dir = query.order_dir.as_sql(),
    );

    let mut stmt = conn.prepare(&data_sql)?;
    let rows = stmt.query_map(param_refs(&params).as_slice(), |row| {
        Ok(GroupTotals {
            name: row.get(0)?,
            signups: row.get(1)?,
            payments: row.get(2)?,
            revenue: row.get(3)?,
            net_revenue: row.get(4)?,
        })
    })?;

    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }
    Ok((groups, total))
}

/// Channel (`source`) or landing-page rollup.
pub async fn get_rollup_inner(
    db: &DuckDbBackend,
    organization_id: &str,
    range: &DateRange,
    dimension: RollupDimension,
    query: &RollupQuery,
) -> Result<Paginated<RollupRow>> {
    let (groups, total) = rollup_inner(db, organization_id, range, dimension, query).await?;
    Ok(Paginated {
        data: groups
            .into_iter()
            .map(|g| RollupRow::from_totals(g.name, g.signups, g.payments, g.revenue, g.net_revenue))
            .collect(),
        pagination: Pagination::new(query.page, query.limit, total),
    })
}

pub async fn get_categories_inner(
    db: &DuckDbBackend,
    organization_id: &str,
    range: &DateRange,
    query: &RollupQuery,
) -> Result<Paginated<CategoryRow>> {
    let (groups, total) =
        rollup_inner(db, organization_id, range, RollupDimension::Category, query).await?;
    Ok(Paginated {
        data: groups
            .into_iter()
            .map(|g| CategoryRow {
                average_ticket: average_cents(g.revenue, g.payments),
                category: g.name,
                payments: g.payments,
                revenue: g.revenue,
                net_revenue: g.net_revenue,
            })
            .collect(),
        pagination: Pagination::new(query.page, query.limit, total),
    })
}
