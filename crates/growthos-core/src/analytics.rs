//! Analytics backend abstraction and report shapes.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;
use crate::event::Event;
use crate::funnel::FunnelReport;

pub const DEFAULT_PAGE_LIMIT: i64 = 30;
pub const MAX_PAGE_LIMIT: i64 = 100;
/// Pages past this are clamped; the offset would exceed any real row count.
pub const MAX_PAGE: i64 = 1_000_000;

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn safe_ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Percentage with one decimal (`"40.0%"`), `"0%"` on a zero denominator.
pub fn format_rate(numerator: i64, denominator: i64) -> String {
    if denominator == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", safe_ratio(numerator, denominator) * 100.0)
}

/// Mean value in cents, rounded; zero when `count` is zero.
pub fn average_cents(total: i64, count: i64) -> i64 {
    safe_ratio(total, count).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("desc") => Ok(Self::Desc),
            Some("asc") => Ok(Self::Asc),
            Some(_) => Err(anyhow!("order_dir must be one of: ASC, DESC")),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Sortable metrics exposed by the rollup reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RollupSort {
    Name,
    Signups,
    Payments,
    #[default]
    Revenue,
    NetRevenue,
    ConversionRate,
    AverageTicket,
}

impl RollupSort {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("revenue") => Ok(Self::Revenue),
            Some("name") => Ok(Self::Name),
            Some("signups") => Ok(Self::Signups),
            Some("payments") => Ok(Self::Payments),
            Some("net_revenue") => Ok(Self::NetRevenue),
            Some("conversion_rate") => Ok(Self::ConversionRate),
            Some("average_ticket") => Ok(Self::AverageTicket),
            Some(_) => Err(anyhow!(
                "order_by must be one of: name, signups, payments, revenue, net_revenue, \
                 conversion_rate, average_ticket"
            )),
        }
    }

    /// Category rollups only cover payments, so signup-based sorts are out.
    pub fn applies_to_categories(self) -> bool {
        !matches!(self, Self::Signups | Self::ConversionRate)
    }
}

/// Offset pagination and ordering for the rollup reports.
#[derive(Debug, Clone)]
pub struct RollupQuery {
    pub page: i64,
    pub limit: i64,
    pub order_by: RollupSort,
    pub order_dir: SortDirection,
    pub search: Option<String>,
}

impl Default for RollupQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            order_by: RollupSort::default(),
            order_dir: SortDirection::default(),
            search: None,
        }
    }
}

impl RollupQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(0))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 {
            total.max(0) / limit + i64::from(total.max(0) % limit != 0)
        } else {
            0
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// One row of the channel or landing-page rollup.
#[derive(Debug, Clone, Serialize)]
pub struct RollupRow {
    /// Channel (`source`) or landing page, depending on the report.
    pub name: String,
    pub signups: i64,
    pub payments: i64,
    pub revenue: i64,
    pub net_revenue: i64,
    pub conversion_rate: String,
    pub average_ticket: i64,
}

impl RollupRow {
    pub fn from_totals(name: String, signups: i64, payments: i64, revenue: i64, net_revenue: i64) -> Self {
        Self {
            name,
            signups,
            payments,
            revenue,
            net_revenue,
            conversion_rate: format_rate(payments, signups),
            average_ticket: average_cents(revenue, payments),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRow {
    pub category: String,
    pub payments: i64,
    pub revenue: i64,
    pub net_revenue: i64,
    pub average_ticket: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRow {
    pub date: String,
    pub signups: i64,
    pub payments: i64,
    pub revenue: i64,
    pub net_revenue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodBreakdown {
    pub method: String,
    pub payments: i64,
    pub revenue: i64,
    pub percentage: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub payments: i64,
    pub revenue: i64,
    pub percentage: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    pub gross_revenue_in_cents: i64,
    pub net_revenue_in_cents: i64,
    pub total_gateway_fees_in_cents: i64,
    pub total_discounts_in_cents: i64,
    /// Gross value of `checkout_abandoned` events in range.
    pub lost_revenue_in_cents: i64,
    pub average_ticket_in_cents: i64,
    pub total_payments: i64,
    pub by_payment_method: Vec<PaymentMethodBreakdown>,
    pub by_category: Vec<CategoryBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentEvent {
    pub id: String,
    pub event_type: String,
    pub source: Option<String>,
    pub landing_page: Option<String>,
    pub device: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentEvents {
    pub count: usize,
    pub latest_event: Option<RecentEvent>,
}

/// Read/write interface over the event store.
///
/// Every read is scoped to one organization and one resolved [`DateRange`].
#[async_trait::async_trait]
pub trait AnalyticsBackend: Send + Sync + 'static {
    async fn insert_event(&self, event: &Event) -> Result<()>;

    /// `None` when the organization does not exist.
    async fn get_funnel(&self, organization_id: &str, range: &DateRange) -> Result<Option<FunnelReport>>;

    async fn get_channels(
        &self,
        organization_id: &str,
        range: &DateRange,
        query: &RollupQuery,
    ) -> Result<Paginated<RollupRow>>;

    async fn get_landing_pages(
        &self,
        organization_id: &str,
        range: &DateRange,
        query: &RollupQuery,
    ) -> Result<Paginated<RollupRow>>;

    async fn get_categories(
        &self,
        organization_id: &str,
        range: &DateRange,
        query: &RollupQuery,
    ) -> Result<Paginated<CategoryRow>>;

    async fn get_daily(&self, organization_id: &str, range: &DateRange) -> Result<Vec<DailyRow>>;

    async fn get_financial(&self, organization_id: &str, range: &DateRange) -> Result<FinancialSummary>;

    async fn get_recent_events(
        &self,
        organization_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<RecentEvents>;
}
