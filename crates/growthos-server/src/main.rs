use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use growthos_server::config::Config;
use growthos_duckdb::{generate_id, DuckDbBackend};
use growthos_server::auth::api_keys::generate_api_key;
use growthos_server::state::AppState;

/// `growthos health`: liveness probe for container health checks.
///
/// Calls `GET http://localhost:$GROWTHOS_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("GROWTHOS_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{port}/health");
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

fn open_db(cfg: &Config) -> Result<DuckDbBackend> {
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/growthos.db", cfg.data_dir);
    DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)
}

/// `growthos create-key <organization_id> <name>`: create an ingestion key
/// and print the raw value. It is not recoverable afterwards.
async fn run_create_key(cfg: &Config, organization_id: &str, name: &str) -> Result<()> {
    let db = open_db(cfg)?;
    db.seed_organization(organization_id, organization_id).await?;

    let (raw_key, hash, prefix) = generate_api_key();
    let id = generate_id("key");
    db.create_api_key(&id, organization_id, name, &hash, &prefix, None)
        .await?;
    info!(key_id = %id, organization_id, prefix = %prefix, "API key created");
    println!("{raw_key}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("growthos=info".parse()?),
        )
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow!(e))?;

    if args.get(1).map(|s| s.as_str()) == Some("create-key") {
        let (Some(organization_id), Some(name)) = (args.get(2), args.get(3)) else {
            return Err(anyhow!("usage: growthos create-key <organization_id> <name>"));
        };
        return run_create_key(&cfg, organization_id, name).await;
    }

    let db = open_db(&cfg)?;
    let state = Arc::new(AppState::new(db, cfg.clone()));

    if cfg.rate_limit_disable {
        tracing::warn!("Rate limiting disabled (GROWTHOS_RATE_LIMIT_DISABLE=true)");
    } else {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_rate_limit_prune_loop().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = growthos_server::app::build_app(Arc::clone(&state));

    info!(
        port = cfg.port,
        rate_limit_max = cfg.rate_limit_max,
        rate_limit_window_secs = cfg.rate_limit_window_secs,
        "GrowthOS listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
