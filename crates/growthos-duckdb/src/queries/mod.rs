pub mod daily;
pub mod financial;
pub mod funnel;
pub mod recent;
pub mod rollups;

use growthos_core::date_range::DateRange;

use crate::backend::db_timestamp;

pub(crate) type SqlParams = Vec<Box<dyn duckdb::types::ToSql + Send>>;

/// Shared `WHERE` prefix for every organization + date range read.
/// Binds `?1` organization, `?2` start and `?3` end (both inclusive).
pub(crate) const SCOPE_FILTER: &str = "organization_id = ?1 \
     AND created_at >= CAST(?2 AS TIMESTAMP) AND created_at <= CAST(?3 AS TIMESTAMP)";

pub(crate) fn scope_params(organization_id: &str, range: &DateRange) -> SqlParams {
    vec![
        Box::new(organization_id.to_string()),
        Box::new(db_timestamp(&range.start)),
        Box::new(db_timestamp(&range.end)),
    ]
}

pub(crate) fn param_refs(params: &SqlParams) -> Vec<&dyn duckdb::types::ToSql> {
    params.iter().map(|p| p.as_ref() as &dyn duckdb::types::ToSql).collect()
}
