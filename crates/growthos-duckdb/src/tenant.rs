use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{Connection, ToSql};

use growthos_core::funnel::{default_funnel_steps, FunnelStepConfig};
use growthos_core::pnl::{CostKind, CostRecord, CostType};
use growthos_metadata::{ApiKeyRecord, CostUpdate, NewCost, Organization};

use crate::backend::{db_timestamp, generate_id};
use crate::DuckDbBackend;

/// Parse DuckDB's `CAST(ts AS VARCHAR)` output.
fn parse_db_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| anyhow!("invalid stored timestamp {raw:?}: {e}"))?;
    Ok(naive.and_utc())
}

fn cost_table(kind: CostKind) -> &'static str {
    match kind {
        CostKind::Fixed => "fixed_costs",
        CostKind::Variable => "variable_costs",
    }
}

impl DuckDbBackend {
    /// Insert an organization with the default funnel if `id` is unknown.
    /// Existing rows are left untouched.
    pub async fn seed_organization(&self, id: &str, name: &str) -> Result<()> {
        let steps = serde_json::to_string(&default_funnel_steps())?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO organizations (id, name, funnel_steps, created_at, updated_at) \
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP) \
             ON CONFLICT (id) DO NOTHING",
            duckdb::params![id, name, steps],
        )?;
        Ok(())
    }

    pub async fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, funnel_steps, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR) \
             FROM organizations WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(duckdb::params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let Some((id, name, steps, created_at, updated_at)) = rows.next().transpose()? else {
            return Ok(None);
        };
        let funnel_steps: Vec<FunnelStepConfig> = serde_json::from_str(&steps)?;
        Ok(Some(Organization {
            id,
            name,
            funnel_steps,
            created_at,
            updated_at,
        }))
    }

    /// Replace the stored funnel definition. `None` when the organization
    /// does not exist. Steps are expected to be validated by the caller.
    pub async fn update_funnel_steps(
        &self,
        organization_id: &str,
        steps: &[FunnelStepConfig],
    ) -> Result<Option<Organization>> {
        let json = serde_json::to_string(steps)?;
        let updated = {
            let conn = self.conn.lock().await;
            conn.execute(
                "UPDATE organizations SET funnel_steps = ?1, updated_at = CURRENT_TIMESTAMP \
                 WHERE id = ?2",
                duckdb::params![json, organization_id],
            )?
        };
        if updated == 0 {
            return Ok(None);
        }
        self.get_organization(organization_id).await
    }

    // ----------------------------------------------------------------
    // API keys
    // ----------------------------------------------------------------

    /// Store a new key. Only the hash and display prefix are persisted.
    pub async fn create_api_key(
        &self,
        id: &str,
        organization_id: &str,
        name: &str,
        hash: &str,
        prefix: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let expires = expires_at.map(|ts| db_timestamp(&ts.naive_utc()));
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO api_keys (id, organization_id, name, key_hash, key_prefix, is_active, expires_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, true, CAST(?6 AS TIMESTAMP), CURRENT_TIMESTAMP)",
            duckdb::params![id, organization_id, name, hash, prefix, expires],
        )?;
        Ok(())
    }

    pub async fn set_api_key_active(&self, key_id: &str, active: bool) -> Result<bool> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE api_keys SET is_active = ?1 WHERE id = ?2",
            duckdb::params![active, key_id],
        )?;
        Ok(rows > 0)
    }

    /// Find a key by the SHA-256 hash of its raw value, whatever its state.
    /// Callers decide usability via [`ApiKeyRecord::is_usable`].
    pub async fn lookup_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, organization_id, name, key_prefix, is_active, \
             CAST(last_used_at AS VARCHAR), CAST(expires_at AS VARCHAR), CAST(created_at AS VARCHAR) \
             FROM api_keys WHERE key_hash = ?1",
        )?;
        let mut rows = stmt.query_map(duckdb::params![key_hash], |row| {
            Ok((
                ApiKeyRecord {
                    id: row.get(0)?,
                    organization_id: row.get(1)?,
                    name: row.get(2)?,
                    key_prefix: row.get(3)?,
                    is_active: row.get(4)?,
                    last_used_at: row.get(5)?,
                    expires_at: None,
                    created_at: row.get(7)?,
                },
                row.get::<_, Option<String>>(6)?,
            ))
        })?;
        let Some((mut record, expires_at)) = rows.next().transpose()? else {
            return Ok(None);
        };
        record.expires_at = expires_at.as_deref().map(parse_db_timestamp).transpose()?;
        Ok(Some(record))
    }

    pub async fn touch_api_key(&self, key_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE api_keys SET last_used_at = CURRENT_TIMESTAMP WHERE id = ?1",
            duckdb::params![key_id],
        )?;
        Ok(())
    }

    // ----------------------------------------------------------------
    // Cost records
    // ----------------------------------------------------------------

    pub async fn list_costs(&self, organization_id: &str, kind: CostKind) -> Result<Vec<CostRecord>> {
        let conn = self.conn.lock().await;
        query_costs(
            &conn,
            kind,
            "organization_id = ?1 ORDER BY created_at, id",
            duckdb::params![organization_id],
        )
    }

    pub async fn create_cost(
        &self,
        organization_id: &str,
        kind: CostKind,
        cost: NewCost,
    ) -> Result<CostRecord> {
        let record = CostRecord {
            id: generate_id("cost"),
            organization_id: organization_id.to_string(),
            name: cost.name,
            amount_in_cents: cost.amount_in_cents,
            cost_type: cost.cost_type.unwrap_or_else(|| kind.default_type()),
            description: cost.description,
        };

        let conn = self.conn.lock().await;
        let sql = format!(
            "INSERT INTO {} (id, organization_id, name, amount_in_cents, type, description, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            cost_table(kind)
        );
        conn.execute(
            &sql,
            duckdb::params![
                record.id,
                record.organization_id,
                record.name,
                record.amount_in_cents,
                record.cost_type.as_str(),
                record.description,
            ],
        )?;
        Ok(record)
    }

    /// Apply the fields present in `update`. `None` when no record with `id`
    /// belongs to the organization.
    pub async fn update_cost(
        &self,
        organization_id: &str,
        kind: CostKind,
        id: &str,
        update: CostUpdate,
    ) -> Result<Option<CostRecord>> {
        let conn = self.conn.lock().await;
        let Some(mut record) = query_costs(
            &conn,
            kind,
            "id = ?1 AND organization_id = ?2",
            duckdb::params![id, organization_id],
        )?
        .pop() else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            record.name = name;
        }
        if let Some(amount) = update.amount_in_cents {
            record.amount_in_cents = amount;
        }
        if let Some(cost_type) = update.cost_type {
            record.cost_type = cost_type;
        }
        if let Some(description) = update.description {
            record.description = description;
        }

        let sql = format!(
            "UPDATE {} SET name = ?1, amount_in_cents = ?2, type = ?3, description = ?4, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?5 AND organization_id = ?6",
            cost_table(kind)
        );
        conn.execute(
            &sql,
            duckdb::params![
                record.name,
                record.amount_in_cents,
                record.cost_type.as_str(),
                record.description,
                id,
                organization_id,
            ],
        )?;
        Ok(Some(record))
    }

    /// `false` when no record with `id` belongs to the organization.
    pub async fn delete_cost(&self, organization_id: &str, kind: CostKind, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "DELETE FROM {} WHERE id = ?1 AND organization_id = ?2",
            cost_table(kind)
        );
        let rows = conn.execute(&sql, duckdb::params![id, organization_id])?;
        Ok(rows > 0)
    }
}

fn query_costs(
    conn: &Connection,
    kind: CostKind,
    filter: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<CostRecord>> {
    let sql = format!(
        "SELECT id, organization_id, name, amount_in_cents, type, description FROM {} WHERE {filter}",
        cost_table(kind)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut costs = Vec::new();
    for row in rows {
        let (id, organization_id, name, amount_in_cents, cost_type, description) = row?;
        let cost_type = CostType::parse(&cost_type)
            .ok_or_else(|| anyhow!("unknown cost type {cost_type:?} on {id}"))?;
        costs.push(CostRecord {
            id,
            organization_id,
            name,
            amount_in_cents,
            cost_type,
            description,
        });
    }
    Ok(costs)
}
