/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `GROWTHOS_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit: the DuckDB default (80% of system RAM) is not acceptable for a
/// server process.
///
/// Monetary columns are BIGINT cents. Event rows are append-only; nothing in
/// this crate updates or deletes them.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- ORGANIZATIONS (tenants)
-- ===========================================
CREATE TABLE IF NOT EXISTS organizations (
    id              VARCHAR PRIMARY KEY,
    name            VARCHAR NOT NULL,
    funnel_steps    VARCHAR NOT NULL,              -- JSON array of {{eventType, label, countUnique}}
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===========================================
-- API KEYS (ingestion credentials)
-- ===========================================
CREATE TABLE IF NOT EXISTS api_keys (
    id              VARCHAR PRIMARY KEY,           -- 'key_' + 10 alphanumerics
    organization_id VARCHAR NOT NULL,
    name            VARCHAR NOT NULL,
    key_hash        VARCHAR(64) NOT NULL UNIQUE,   -- sha256(raw_key); never stored raw
    key_prefix      VARCHAR NOT NULL,              -- display prefix of the raw key
    is_active       BOOLEAN NOT NULL DEFAULT true,
    last_used_at    TIMESTAMP,
    expires_at      TIMESTAMP,                     -- NULL = never expires
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_api_keys_hash ON api_keys(key_hash);
CREATE INDEX IF NOT EXISTS idx_api_keys_org ON api_keys(organization_id);

-- ===========================================
-- EVENTS (append-only)
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id                   VARCHAR NOT NULL,         -- UUID v4
    organization_id      VARCHAR NOT NULL,
    event_type           VARCHAR NOT NULL,

    -- Money (integer cents)
    gross_value_in_cents BIGINT,
    net_value_in_cents   BIGINT,
    discount_in_cents    BIGINT,
    gateway_fee_in_cents BIGINT,
    installments         BIGINT,
    payment_method       VARCHAR,

    -- Commerce
    product_id           VARCHAR,
    product_name         VARCHAR,
    category             VARCHAR,

    -- Attribution
    source               VARCHAR,
    medium               VARCHAR,
    campaign             VARCHAR,
    content              VARCHAR,
    landing_page         VARCHAR,
    referrer             VARCHAR,

    -- Visitor
    device               VARCHAR,
    customer_type        VARCHAR,
    customer_id          VARCHAR,
    session_id           VARCHAR,

    metadata             VARCHAR,                  -- JSON object (≤ 20 scalar entries)
    created_at           TIMESTAMP NOT NULL
);

-- Funnel/financial pattern: organization + event type + date range
CREATE INDEX IF NOT EXISTS idx_events_org_type_created
    ON events(organization_id, event_type, created_at);

-- Rollups and daily series: organization + date range
CREATE INDEX IF NOT EXISTS idx_events_org_created
    ON events(organization_id, created_at);

-- ===========================================
-- COSTS (P&L inputs)
-- ===========================================
CREATE TABLE IF NOT EXISTS fixed_costs (
    id              VARCHAR PRIMARY KEY,
    organization_id VARCHAR NOT NULL,
    name            VARCHAR NOT NULL,
    amount_in_cents BIGINT NOT NULL,
    type            VARCHAR NOT NULL DEFAULT 'VALUE',       -- 'VALUE' | 'PERCENTAGE'
    description     VARCHAR,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_fixed_costs_org ON fixed_costs(organization_id);

CREATE TABLE IF NOT EXISTS variable_costs (
    id              VARCHAR PRIMARY KEY,
    organization_id VARCHAR NOT NULL,
    name            VARCHAR NOT NULL,
    amount_in_cents BIGINT NOT NULL,
    type            VARCHAR NOT NULL DEFAULT 'PERCENTAGE',  -- 'VALUE' | 'PERCENTAGE'
    description     VARCHAR,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_variable_costs_org ON variable_costs(organization_id);
"#
    )
}
