//! Long-running background task that copies newly appended ledger blocks
//! into the SQLite journal.

use std::sync::Arc;
use std::time::Duration;

use fund_ledger::Ledger;
use sqlx::SqlitePool;
use tokio::sync::Notify;
use tracing::{error, info};

use crate::db;
use crate::errors::Result;

pub struct JournalState {
    pub pool: SqlitePool,
    pub ledger: Arc<Ledger>,
    pub wake: Arc<Notify>,
    pub interval_secs: u64,
}

/// Run the journal loop as a background [`tokio`] task.
pub async fn run(state: Arc<JournalState>) {
    // Resume from whatever the table already holds.
    let mut next = match db::next_index(&state.pool).await {
        Ok(next) => next,
        Err(e) => {
            error!("Journal could not read its cursor: {e}");
            0
        }
    };
    info!("Journal starting at block {next}");

    loop {
        match flush(&state.pool, &state.ledger, next).await {
            Ok(advanced) => next = advanced,
            Err(e) => error!("Journal flush error: {e}"),
        }

        tokio::select! {
            _ = state.wake.notified() => {}
            _ = tokio::time::sleep(Duration::from_secs(state.interval_secs)) => {}
        }
    }
}

/// Persist every block from `next` onwards.
///
/// Returns the index of the next block still to be journaled.
pub async fn flush(pool: &SqlitePool, ledger: &Ledger, next: u64) -> Result<u64> {
    let pending = ledger.blocks_since(next);
    let Some(last) = pending.last() else {
        return Ok(next);
    };
    let advanced = last.index + 1;

    let inserted = db::insert_blocks(pool, &pending).await?;
    info!(
        "Journaled {} blocks ({} new) up to index {}",
        pending.len(),
        inserted,
        last.index
    );
    Ok(advanced)
}
