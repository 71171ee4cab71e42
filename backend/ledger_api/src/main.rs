//! Public Fund Ledger service — entry point.
//!
//! Restores the ledger from the SQLite block journal, starts a background
//! journal task that persists every newly appended block, and exposes the
//! ledger operations over a small Axum REST API.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod journal;
mod records;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use fund_ledger::Ledger;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use journal::JournalState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // ─── Ledger restore ───────────────────────────────────
    let stored = db::load_blocks(&pool).await?;
    let ledger = if stored.is_empty() {
        info!("Journal is empty, starting a new ledger");
        Ledger::new(config.ledger.clone())?
    } else {
        Ledger::restore(config.ledger.clone(), stored).map_err(|e| {
            error!("Ledger restore failed, operator attention required: {e}");
            e
        })?
    };
    let ledger = Arc::new(ledger);
    let wake = Arc::new(Notify::new());

    // ─── Background journal ───────────────────────────────
    let journal_state = Arc::new(JournalState {
        pool: pool.clone(),
        ledger: ledger.clone(),
        wake: wake.clone(),
        interval_secs: config.persist_interval_secs,
    });
    tokio::spawn(journal::run(journal_state));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        ledger: ledger.clone(),
        journal: wake,
        default_milestones: config.default_milestones.clone(),
    });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/projects", get(api::list_projects).post(api::create_project))
        .route("/projects/:id", get(api::get_project))
        .route("/projects/:id/release", post(api::release_milestone))
        .route("/projects/:id/payments", post(api::make_payment))
        .route("/chain", get(api::get_chain))
        .route("/chain/validate", get(api::validate_chain))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Final flush so nothing committed before shutdown is lost.
    let next = db::next_index(&pool).await?;
    journal::flush(&pool, &ledger, next).await?;
    info!("Ledger journal flushed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
