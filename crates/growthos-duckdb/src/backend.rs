use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use growthos_core::event::Event;

use crate::schema::init_sql;

/// Text form used for every TIMESTAMP bound as a parameter; compared in SQL
/// through `CAST(?n AS TIMESTAMP)`.
pub(crate) fn db_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate an id of the form `{prefix}_` + 10 random lowercase alphanumerics.
pub fn generate_id(prefix: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: String = (0..10)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}_{chars}")
}

/// DuckDB-backed event and tenant store.
///
/// DuckDB is single-writer, so the connection sits behind `Arc<Mutex<_>>`:
/// handlers share one backend and every statement is serialised through the
/// lock. Memory and thread limits are applied by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(path, memory_limit, "DuckDB opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database. Data is discarded on drop; tests only.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Append one sanitized event row.
    pub async fn insert_event(&self, event: &Event) -> Result<()> {
        let metadata = event.metadata_json()?;
        let created_at = db_timestamp(&event.created_at.naive_utc());
        let f = &event.fields;

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO events (
                id, organization_id, event_type,
                gross_value_in_cents, net_value_in_cents, discount_in_cents,
                gateway_fee_in_cents, installments, payment_method,
                product_id, product_name, category,
                source, medium, campaign, content, landing_page, referrer,
                device, customer_type, customer_id, session_id,
                metadata, created_at
            ) VALUES (
                ?1,  ?2,  ?3,
                ?4,  ?5,  ?6,
                ?7,  ?8,  ?9,
                ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18,
                ?19, ?20, ?21, ?22,
                ?23, CAST(?24 AS TIMESTAMP)
            )"#,
            duckdb::params![
                event.id,
                event.organization_id,
                event.event_type,
                f.gross_value_in_cents,
                f.net_value_in_cents,
                f.discount_in_cents,
                f.gateway_fee_in_cents,
                f.installments,
                f.payment_method,
                f.product_id,
                f.product_name,
                f.category,
                f.source,
                f.medium,
                f.campaign,
                f.content,
                f.landing_page,
                f.referrer,
                f.device,
                f.customer_type,
                f.customer_id,
                f.session_id,
                metadata,
                created_at,
            ],
        )?;
        Ok(())
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that need to verify stored data.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_prefixed_lowercase_alphanumerics() {
        let id = generate_id("key");
        assert!(id.starts_with("key_"));
        assert_eq!(id.len(), 14);
        assert!(id[4..].bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(generate_id("cost"), generate_id("cost"));
    }
}
