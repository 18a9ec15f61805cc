use chrono::{DateTime, Utc};
use risklens_anchor::analysis::{AnalysisReport, Portfolio};
use risklens_anchor::{AnchorRecord, PortfolioId, SnapshotId, UserId};
use serde::{Deserialize, Serialize};

/// Identifiers arrive as hex strings and are parsed in the handler so that a malformed id
/// yields a 400 naming the offending field.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnchorProofRequest {
    pub snapshot_id: String,
    pub user_id: String,
    pub portfolio_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnchorProofResponse {
    pub snapshot_id: SnapshotId,
    pub anchored_at: DateTime<Utc>,
}

/// `(exists, user_id, portfolio_id)`; zero ids when the snapshot was never anchored.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyProofResponse {
    pub exists: bool,
    pub user_id: UserId,
    pub portfolio_id: PortfolioId,
}

impl From<AnchorRecord> for VerifyProofResponse {
    fn from(record: AnchorRecord) -> Self {
        Self {
            exists: record.exists,
            user_id: record.user,
            portfolio_id: record.portfolio,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryStatsResponse {
    pub anchored: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub portfolio: Portfolio,

    /// `conservative`, `balanced` (default) or `aggressive`.
    pub risk_profile: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: SnapshotId,
    pub report: AnalysisReport,
}
