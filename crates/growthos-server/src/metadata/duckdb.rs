use std::sync::Arc;

use async_trait::async_trait;

use growthos_core::funnel::FunnelStepConfig;
use growthos_core::pnl::{CostKind, CostRecord};
use growthos_duckdb::DuckDbBackend;
use growthos_metadata::{ApiKeyRecord, CostUpdate, NewCost, Organization, TenantStore};

/// [`TenantStore`] over the same DuckDB file as the event store.
pub struct DuckDbTenantStore {
    db: Arc<DuckDbBackend>,
}

impl DuckDbTenantStore {
    pub fn new(db: Arc<DuckDbBackend>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TenantStore for DuckDbTenantStore {
    async fn get_organization(&self, id: &str) -> anyhow::Result<Option<Organization>> {
        self.db.get_organization(id).await
    }

    async fn update_funnel_steps(
        &self,
        organization_id: &str,
        steps: &[FunnelStepConfig],
    ) -> anyhow::Result<Option<Organization>> {
        self.db.update_funnel_steps(organization_id, steps).await
    }

    async fn lookup_api_key(&self, key_hash: &str) -> anyhow::Result<Option<ApiKeyRecord>> {
        self.db.lookup_api_key(key_hash).await
    }

    async fn touch_api_key(&self, key_id: &str) -> anyhow::Result<()> {
        self.db.touch_api_key(key_id).await
    }

    async fn list_costs(&self, organization_id: &str, kind: CostKind) -> anyhow::Result<Vec<CostRecord>> {
        self.db.list_costs(organization_id, kind).await
    }

    async fn create_cost(
        &self,
        organization_id: &str,
        kind: CostKind,
        cost: NewCost,
    ) -> anyhow::Result<CostRecord> {
        self.db.create_cost(organization_id, kind, cost).await
    }

    async fn update_cost(
        &self,
        organization_id: &str,
        kind: CostKind,
        id: &str,
        update: CostUpdate,
    ) -> anyhow::Result<Option<CostRecord>> {
        self.db.update_cost(organization_id, kind, id, update).await
    }

    async fn delete_cost(&self, organization_id: &str, kind: CostKind, id: &str) -> anyhow::Result<bool> {
        self.db.delete_cost(organization_id, kind, id).await
    }
}
