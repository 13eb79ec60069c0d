use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::json;

use growthos_core::{
    analytics::{RollupQuery, RollupSort, SortDirection, DEFAULT_PAGE_LIMIT, MAX_PAGE, MAX_PAGE_LIMIT},
    date_range::{resolve_date_range, DateFilter, DateRange},
    funnel::{validate_funnel_steps, FunnelStepConfig},
    pnl::{build_profit_and_loss, CostKind, CostType, MAX_COST_AMOUNT_IN_CENTS},
};
use growthos_metadata::{CostUpdate, NewCost};

use crate::{error::AppError, state::AppState};

/// Window used by the install-verification read.
const RECENT_WINDOW_MINUTES: i64 = 5;
const RECENT_LIMIT: usize = 10;

/// Query string accepted by every dashboard read. Rollup routes also use the
/// pagination, sort and search fields; the others ignore them.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub search: Option<String>,
}

impl ReportQuery {
    fn range(&self) -> Result<DateRange, AppError> {
        let filter = DateFilter {
            period: self.period.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
        };
        Ok(resolve_date_range(&filter, Utc::now().date_naive())?)
    }

    fn rollup(&self) -> Result<RollupQuery, AppError> {
        let order_by = RollupSort::parse(self.order_by.as_deref())
            .map_err(|e| AppError::invalid_field("order_by", e.to_string()))?;
        let order_dir = SortDirection::parse(self.order_dir.as_deref())
            .map_err(|e| AppError::invalid_field("order_dir", e.to_string()))?;
        Ok(RollupQuery {
            page: self.page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            order_by,
            order_dir,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

fn report_query(query: Result<Query<ReportQuery>, QueryRejection>) -> Result<ReportQuery, AppError> {
    query
        .map(|Query(q)| q)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// `GET /api/organizations/{org_id}/funnel`: `{"data": null}` for an unknown
/// organization.
#[tracing::instrument(skip(state, query))]
pub async fn get_funnel(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let range = report_query(query)?.range()?;
    let report = state.analytics.get_funnel(&org_id, &range).await?;
    Ok(Json(json!({ "data": report })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFunnelRequest {
    pub funnel_steps: Vec<FunnelStepConfig>,
}

/// `PUT /api/organizations/{org_id}/funnel`: replace the funnel definition.
#[tracing::instrument(skip(state, body))]
pub async fn put_funnel(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    body: Result<Json<UpdateFunnelRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let steps = validate_funnel_steps(req.funnel_steps)?;

    let org = state
        .tenants
        .update_funnel_steps(&org_id, &steps)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unknown organization: {org_id}")))?;
    tracing::info!(organization_id = %org.id, steps = org.funnel_steps.len(), "Funnel updated");
    Ok(Json(json!({ "data": org })))
}

#[tracing::instrument(skip(state, query))]
pub async fn get_channels(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let query = report_query(query)?;
    let page = state
        .analytics
        .get_channels(&org_id, &query.range()?, &query.rollup()?)
        .await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state, query))]
pub async fn get_landing_pages(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let query = report_query(query)?;
    let page = state
        .analytics
        .get_landing_pages(&org_id, &query.range()?, &query.rollup()?)
        .await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state, query))]
pub async fn get_categories(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let query = report_query(query)?;
    let rollup = query.rollup()?;
    if !rollup.order_by.applies_to_categories() {
        return Err(AppError::invalid_field(
            "order_by",
            "order_by must be one of: name, payments, revenue, net_revenue, average_ticket",
        ));
    }
    let page = state
        .analytics
        .get_categories(&org_id, &query.range()?, &rollup)
        .await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state, query))]
pub async fn get_daily(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let range = report_query(query)?.range()?;
    let rows = state.analytics.get_daily(&org_id, &range).await?;
    Ok(Json(json!({ "data": rows })))
}

#[tracing::instrument(skip(state, query))]
pub async fn get_financial(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let range = report_query(query)?.range()?;
    let summary = state.analytics.get_financial(&org_id, &range).await?;
    Ok(Json(json!({ "data": summary })))
}

/// `GET /api/organizations/{org_id}/profit-and-loss`: gross revenue of the
/// range combined with the organization's cost records.
#[tracing::instrument(skip(state, query))]
pub async fn get_profit_and_loss(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let range = report_query(query)?.range()?;
    let summary = state.analytics.get_financial(&org_id, &range).await?;
    let fixed = state.tenants.list_costs(&org_id, CostKind::Fixed).await?;
    let variable = state.tenants.list_costs(&org_id, CostKind::Variable).await?;

    let pl = build_profit_and_loss(summary.gross_revenue_in_cents, &fixed, &variable);
    Ok(Json(json!({
        "data": pl,
        "start_date": range.start_date().to_string(),
        "end_date": range.end_date().to_string(),
    })))
}

fn cost_kind(raw: &str) -> Result<CostKind, AppError> {
    CostKind::parse(raw).ok_or_else(|| AppError::NotFound(format!("Unknown cost kind: {raw}")))
}

#[tracing::instrument(skip(state))]
pub async fn list_costs(
    State(state): State<Arc<AppState>>,
    Path((org_id, kind)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = cost_kind(&kind)?;
    let costs = state.tenants.list_costs(&org_id, kind).await?;
    Ok(Json(json!({ "data": costs })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCostRequest {
    pub name: String,
    pub amount_in_cents: i64,
    #[serde(rename = "type")]
    pub cost_type: Option<String>,
    pub description: Option<String>,
}

fn cost_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::invalid_field("name", "name is required"));
    }
    Ok(name.to_string())
}

fn cost_amount(amount_in_cents: i64) -> Result<i64, AppError> {
    if amount_in_cents <= 0 {
        return Err(AppError::invalid_field(
            "amount_in_cents",
            "amount_in_cents must be a positive integer",
        ));
    }
    if amount_in_cents > MAX_COST_AMOUNT_IN_CENTS {
        return Err(AppError::invalid_field(
            "amount_in_cents",
            format!("amount_in_cents must be at most {MAX_COST_AMOUNT_IN_CENTS}"),
        ));
    }
    Ok(amount_in_cents)
}

fn parse_cost_type(raw: &str) -> Result<CostType, AppError> {
    CostType::parse(raw)
        .ok_or_else(|| AppError::invalid_field("type", "type must be one of: VALUE, PERCENTAGE"))
}

/// Blank descriptions are stored as absent.
fn cost_description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

/// `POST /api/organizations/{org_id}/costs/{fixed|variable}`.
#[tracing::instrument(skip(state, body))]
pub async fn create_cost(
    State(state): State<Arc<AppState>>,
    Path((org_id, kind)): Path<(String, String)>,
    body: Result<Json<CreateCostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let kind = cost_kind(&kind)?;
    let Json(req) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let name = cost_name(&req.name)?;
    let amount_in_cents = cost_amount(req.amount_in_cents)?;
    let cost_type = req.cost_type.as_deref().map(parse_cost_type).transpose()?;

    if state.tenants.get_organization(&org_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Unknown organization: {org_id}")));
    }

    let record = state
        .tenants
        .create_cost(
            &org_id,
            kind,
            NewCost {
                name,
                amount_in_cents,
                cost_type,
                description: cost_description(req.description),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": record }))))
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct UpdateCostRequest {
    pub name: Option<String>,
    pub amount_in_cents: Option<i64>,
    #[serde(rename = "type")]
    pub cost_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

/// `PUT /api/organizations/{org_id}/costs/{kind}/{cost_id}`: partial update.
/// A `null` description clears it.
#[tracing::instrument(skip(state, body))]
pub async fn update_cost(
    State(state): State<Arc<AppState>>,
    Path((org_id, kind, cost_id)): Path<(String, String, String)>,
    body: Result<Json<UpdateCostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let kind = cost_kind(&kind)?;
    let Json(req) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let update = CostUpdate {
        name: req.name.as_deref().map(cost_name).transpose()?,
        amount_in_cents: req.amount_in_cents.map(cost_amount).transpose()?,
        cost_type: req.cost_type.as_deref().map(parse_cost_type).transpose()?,
        description: req.description.map(cost_description),
    };

    let record = state
        .tenants
        .update_cost(&org_id, kind, &cost_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unknown cost: {cost_id}")))?;
    tracing::info!(organization_id = %org_id, cost_id = %record.id, "Cost updated");
    Ok(Json(json!({ "data": record })))
}

/// `DELETE /api/organizations/{org_id}/costs/{kind}/{cost_id}`.
#[tracing::instrument(skip(state))]
pub async fn delete_cost(
    State(state): State<Arc<AppState>>,
    Path((org_id, kind, cost_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = cost_kind(&kind)?;
    if !state.tenants.delete_cost(&org_id, kind, &cost_id).await? {
        return Err(AppError::NotFound(format!("Unknown cost: {cost_id}")));
    }
    tracing::info!(organization_id = %org_id, cost_id = %cost_id, "Cost deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/organizations/{org_id}/events/recent`: confirms a tracker
/// install by listing what arrived in the last few minutes.
#[tracing::instrument(skip(state))]
pub async fn get_recent_events(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let since = Utc::now() - Duration::minutes(RECENT_WINDOW_MINUTES);
    let recent = state
        .analytics
        .get_recent_events(&org_id, since, RECENT_LIMIT)
        .await?;
    Ok(Json(json!({ "data": recent })))
}
