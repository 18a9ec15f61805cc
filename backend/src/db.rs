use crate::errors::ApiError;
use chrono::{DateTime, SecondsFormat, Utc};
use risklens_anchor::{PortfolioId, RegistryError, SnapshotId, UserId};
use sqlx::{sqlite::{SqlitePoolOptions, SqliteRow}, Pool, Row, Sqlite};

pub type Db = Pool<Sqlite>;

/// One persisted anchor.
#[derive(Debug, Clone)]
pub struct AnchorRow {
    pub snapshot_id: SnapshotId,
    pub user_id: UserId,
    pub portfolio_id: PortfolioId,
    pub anchored_at: DateTime<Utc>,
}

pub async fn connect(db_url: &str) -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to open anchor database");
            ApiError::Internal
        })
}

/// Single-connection in-memory database. Every pooled connection to `sqlite::memory:`
/// would otherwise see its own empty database.
#[cfg(test)]
pub async fn connect_in_memory() -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|_| ApiError::Internal)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    // Append-only: rows are inserted once and never updated or deleted.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS anchors (
  snapshot_id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  portfolio_id TEXT NOT NULL,
  anchored_at TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    Ok(())
}

pub async fn insert_anchor(
    db: &Db,
    snapshot_id: SnapshotId,
    user_id: UserId,
    portfolio_id: PortfolioId,
    anchored_at: DateTime<Utc>,
) -> Result<(), ApiError> {
    sqlx::query(
        r#"INSERT INTO anchors (snapshot_id, user_id, portfolio_id, anchored_at)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(snapshot_id.to_hex())
    .bind(user_id.to_hex())
    .bind(portfolio_id.to_hex())
    .bind(format_timestamp(anchored_at))
    .execute(db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            ApiError::from(RegistryError::DuplicateKey)
        }
        other => {
            tracing::error!(error = %other, %snapshot_id, "failed to persist anchor");
            ApiError::Internal
        }
    })?;

    Ok(())
}

pub async fn get_anchor(db: &Db, snapshot_id: SnapshotId) -> Result<Option<AnchorRow>, ApiError> {
    let row = sqlx::query(
        r#"SELECT snapshot_id, user_id, portfolio_id, anchored_at
           FROM anchors WHERE snapshot_id = ?"#,
    )
    .bind(snapshot_id.to_hex())
    .fetch_optional(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    row.map(|row| decode_row(&row)).transpose()
}

pub async fn load_anchors(db: &Db) -> Result<Vec<AnchorRow>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT snapshot_id, user_id, portfolio_id, anchored_at
           FROM anchors
           ORDER BY anchored_at"#,
    )
    .fetch_all(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    rows.iter().map(decode_row).collect()
}

fn decode_row(row: &SqliteRow) -> Result<AnchorRow, ApiError> {
    let snapshot_id: String = row.get(0);
    let user_id: String = row.get(1);
    let portfolio_id: String = row.get(2);
    let anchored_at: String = row.get(3);

    Ok(AnchorRow {
        snapshot_id: parse_id(&snapshot_id)?,
        user_id: parse_id(&user_id)?,
        portfolio_id: parse_id(&portfolio_id)?,
        anchored_at: parse_timestamp(&anchored_at)?,
    })
}

/// Fixed-width RFC 3339 (microseconds, `Z`), so text order is chronological order.
fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_id<T: std::str::FromStr>(s: &str) -> Result<T, ApiError> {
    s.parse().map_err(|_| {
        tracing::error!(value = s, "corrupt identifier in anchor database");
        ApiError::Internal
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::Internal)
}
