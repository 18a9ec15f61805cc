use crate::db::{self, Db};
use crate::errors::ApiError;
use chrono::{DateTime, SubsecRound, Utc};
use risklens_anchor::{PortfolioId, ProofAnchorRegistry, RegistryError, SnapshotId, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub registry: Arc<ProofAnchorRegistry>,
    api_key: Arc<str>,
    // Serializes durable writes; reads go straight to the registry.
    writer: Arc<Mutex<()>>,
}

impl AppState {
    /// Build the state and replay every persisted anchor into a fresh registry.
    pub async fn restore(db: Db, api_key: impl Into<Arc<str>>) -> Result<Self, ApiError> {
        let registry = ProofAnchorRegistry::new();
        let rows = db::load_anchors(&db).await?;

        for row in &rows {
            registry
                .anchor_proof(row.snapshot_id, row.user_id, row.portfolio_id)
                .map_err(|e| {
                    tracing::error!(snapshot_id = %row.snapshot_id, error = %e, "persisted anchor rejected on restore");
                    ApiError::Internal
                })?;
        }

        let latest = rows.iter().map(|r| r.anchored_at).max();
        info!(anchors = registry.len(), latest = ?latest, "anchor registry restored");

        Ok(Self {
            db,
            registry: Arc::new(registry),
            api_key: api_key.into(),
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Durably anchor `snapshot`.
    ///
    /// The write runs on its own task, so a caller that goes away mid-write (a dropped
    /// request) cannot stop it between the database insert and the registry commit.
    pub async fn anchor(
        &self,
        snapshot: SnapshotId,
        user: UserId,
        portfolio: PortfolioId,
    ) -> Result<DateTime<Utc>, ApiError> {
        let state = self.clone();
        tokio::spawn(async move { state.anchor_serialized(snapshot, user, portfolio).await })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, snapshot_id = %snapshot, "anchor task failed");
                ApiError::Internal
            })?
    }

    // Check, insert, commit under the writer lock. The registry commit after a successful
    // insert cannot fail because no other writer runs in between.
    async fn anchor_serialized(
        &self,
        snapshot: SnapshotId,
        user: UserId,
        portfolio: PortfolioId,
    ) -> Result<DateTime<Utc>, ApiError> {
        let _guard = self.writer.lock().await;

        if let Err(e) = self.registry.check_anchorable(&snapshot) {
            warn!(snapshot_id = %snapshot, reason = %e, "anchor rejected");
            return Err(e.into());
        }

        let anchored_at = Utc::now().trunc_subsecs(6);
        match db::insert_anchor(&self.db, snapshot, user, portfolio, anchored_at).await {
            Ok(()) => {}
            Err(ApiError::Conflict(msg)) => {
                self.adopt_persisted(snapshot).await?;
                return Err(ApiError::Conflict(msg));
            }
            Err(e) => return Err(e),
        }
        self.registry.anchor_proof(snapshot, user, portfolio)?;

        info!(snapshot_id = %snapshot, user_id = %user, portfolio_id = %portfolio, "proof anchored");
        Ok(anchored_at)
    }

    /// The table already holds `snapshot` but the registry does not: commit the stored row.
    async fn adopt_persisted(&self, snapshot: SnapshotId) -> Result<(), ApiError> {
        let Some(row) = db::get_anchor(&self.db, snapshot).await? else {
            return Ok(());
        };

        match self.registry.anchor_proof(row.snapshot_id, row.user_id, row.portfolio_id) {
            Ok(()) => {
                warn!(snapshot_id = %snapshot, "registry was missing a persisted anchor; recovered");
                Ok(())
            }
            Err(RegistryError::DuplicateKey) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
