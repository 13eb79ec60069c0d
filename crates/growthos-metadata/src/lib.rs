use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use growthos_core::funnel::FunnelStepConfig;
use growthos_core::pnl::{CostKind, CostRecord, CostType};

#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub funnel_steps: Vec<FunnelStepConfig>,
    pub created_at: String,
    pub updated_at: String,
}

/// Ingestion credential. Only the SHA-256 hash of the raw key is stored.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub key_prefix: String,
    pub is_active: bool,
    pub last_used_at: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: String,
}

impl ApiKeyRecord {
    /// Active and not past its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp >= now)
    }
}

#[derive(Debug, Clone)]
pub struct NewCost {
    pub name: String,
    pub amount_in_cents: i64,
    pub cost_type: Option<CostType>,
    pub description: Option<String>,
}

/// Partial update of a cost record; `None` leaves the field unchanged.
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct CostUpdate {
    pub name: Option<String>,
    pub amount_in_cents: Option<i64>,
    pub cost_type: Option<CostType>,
    pub description: Option<Option<String>>,
}

/// Storage interface for tenant-owned configuration: organizations and their
/// funnel definitions, API keys, and cost records.
#[async_trait]
pub trait TenantStore: Send + Sync + 'static {
    async fn get_organization(&self, id: &str) -> anyhow::Result<Option<Organization>>;
    /// Returns the updated organization, or `None` when it does not exist.
    async fn update_funnel_steps(
        &self,
        organization_id: &str,
        steps: &[FunnelStepConfig],
    ) -> anyhow::Result<Option<Organization>>;

    async fn lookup_api_key(&self, key_hash: &str) -> anyhow::Result<Option<ApiKeyRecord>>;
    async fn touch_api_key(&self, key_id: &str) -> anyhow::Result<()>;

    async fn list_costs(&self, organization_id: &str, kind: CostKind) -> anyhow::Result<Vec<CostRecord>>;
    async fn create_cost(
        &self,
        organization_id: &str,
        kind: CostKind,
        cost: NewCost,
    ) -> anyhow::Result<CostRecord>;
    /// `None` when no record with `id` belongs to the organization.
    async fn update_cost(
        &self,
        organization_id: &str,
        kind: CostKind,
        id: &str,
        update: CostUpdate,
    ) -> anyhow::Result<Option<CostRecord>>;
    async fn delete_cost(&self, organization_id: &str, kind: CostKind, id: &str) -> anyhow::Result<bool>;
}
