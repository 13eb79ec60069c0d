use async_trait::async_trait;
use chrono::{DateTime, Utc};

use growthos_core::analytics::{
    AnalyticsBackend, CategoryRow, DailyRow, FinancialSummary, Paginated, RecentEvents,
    RollupQuery, RollupRow,
};
use growthos_core::date_range::DateRange;
use growthos_core::event::Event;
use growthos_core::funnel::FunnelReport;

use crate::queries::rollups::RollupDimension;
use crate::DuckDbBackend;

#[async_trait]
impl AnalyticsBackend for DuckDbBackend {
    async fn insert_event(&self, event: &Event) -> anyhow::Result<()> {
        DuckDbBackend::insert_event(self, event).await
    }

    async fn get_funnel(
        &self,
        organization_id: &str,
        range: &DateRange,
    ) -> anyhow::Result<Option<FunnelReport>> {
        crate::queries::funnel::get_funnel_inner(self, organization_id, range).await
    }

    async fn get_channels(
        &self,
        organization_id: &str,
        range: &DateRange,
        query: &RollupQuery,
    ) -> anyhow::Result<Paginated<RollupRow>> {
        crate::queries::rollups::get_rollup_inner(
            self,
            organization_id,
            range,
            RollupDimension::Channel,
            query,
        )
        .await
    }

    async fn get_landing_pages(
        &self,
        organization_id: &str,
        range: &DateRange,
        query: &RollupQuery,
    ) -> anyhow::Result<Paginated<RollupRow>> {
        crate::queries::rollups::get_rollup_inner(
            self,
            organization_id,
            range,
            RollupDimension::LandingPage,
            query,
        )
        .await
    }

    async fn get_categories(
        &self,
        organization_id: &str,
        range: &DateRange,
        query: &RollupQuery,
    ) -> anyhow::Result<Paginated<CategoryRow>> {
        crate::queries::rollups::get_categories_inner(self, organization_id, range, query).await
    }

    async fn get_daily(&self, organization_id: &str, range: &DateRange) -> anyhow::Result<Vec<DailyRow>> {
        crate::queries::daily::get_daily_inner(self, organization_id, range).await
    }

    async fn get_financial(
        &self,
        organization_id: &str,
        range: &DateRange,
    ) -> anyhow::Result<FinancialSummary> {
        crate::queries::financial::get_financial_inner(self, organization_id, range).await
    }

    async fn get_recent_events(
        &self,
        organization_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<RecentEvents> {
        crate::queries::recent::get_recent_events_inner(self, organization_id, since, limit).await
    }
}
