//! Database layer — migrations and the append-only block journal.

use fund_ledger::Block;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::records::BlockRecord;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    let url = if url.contains('?') || url.contains(":memory:") {
        url
    } else {
        format!("{url}?mode=rwc")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Journal cursor
// ─────────────────────────────────────────────────────────

/// Index of the next block to journal (`0` when the table is empty).
pub async fn next_index(pool: &SqlitePool) -> Result<u64> {
    let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(idx) FROM blocks")
        .fetch_one(pool)
        .await?;
    Ok(row.0.map(|max| max as u64 + 1).unwrap_or(0))
}

// ─────────────────────────────────────────────────────────
// Block writes
// ─────────────────────────────────────────────────────────

/// Persist a batch of blocks in one transaction. Blocks already journaled
/// (same `idx`) are silently skipped so a retried batch is harmless.
pub async fn insert_blocks(pool: &SqlitePool, blocks: &[Block]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;
    for block in blocks {
        let record = BlockRecord::from_block(block)?;
        let rows_affected = sqlx::query(
            r#"
            INSERT OR IGNORE INTO blocks
                (idx, timestamp, payload, previous_hash, hash)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(record.idx)
        .bind(&record.timestamp)
        .bind(&record.payload)
        .bind(&record.previous_hash)
        .bind(&record.hash)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        count += rows_affected as usize;
    }
    tx.commit().await?;
    Ok(count)
}

// ─────────────────────────────────────────────────────────
// Block reads
// ─────────────────────────────────────────────────────────

/// Load the whole journal in chain order.
pub async fn load_blocks(pool: &SqlitePool) -> Result<Vec<Block>> {
    let rows = sqlx::query_as::<_, BlockRecord>(
        r#"
        SELECT idx, timestamp, payload, previous_hash, hash
        FROM   blocks
        ORDER  BY idx ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(BlockRecord::into_block).collect()
}
