use crate::errors::ApiError;
use crate::models::*;
use crate::state::AppState;
use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use risklens_anchor::analysis::{self, RiskProfile};
use risklens_anchor::{PortfolioId, SnapshotId, UserId};
use std::str::FromStr;
use tower_http::cors::{Any, CorsLayer};

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/proofs", post(anchor_proof))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/proofs", get(registry_stats))
        .route("/api/v1/proofs/:snapshot_id", get(verify_proof))
        .route("/api/v1/snapshots", post(compute_snapshot))
        .merge(protected_routes)
        .fallback(|| async { ApiError::NotFound("route not found".to_string()) })
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == state.api_key() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("unauthorized access attempt");
    Err(ApiError::Unauthorized)
}

fn parse_id<T: FromStr>(field: &str, value: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {field}")))
}

async fn anchor_proof(
    State(state): State<AppState>,
    Json(req): Json<AnchorProofRequest>,
) -> Result<(StatusCode, Json<AnchorProofResponse>), ApiError> {
    let snapshot_id: SnapshotId = parse_id("snapshot_id", &req.snapshot_id)?;
    let user_id: UserId = parse_id("user_id", &req.user_id)?;
    let portfolio_id: PortfolioId = parse_id("portfolio_id", &req.portfolio_id)?;

    let anchored_at = state.anchor(snapshot_id, user_id, portfolio_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(AnchorProofResponse {
            snapshot_id,
            anchored_at,
        }),
    ))
}

async fn verify_proof(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
) -> Result<Json<VerifyProofResponse>, ApiError> {
    let snapshot_id: SnapshotId = parse_id("snapshot_id", &snapshot_id)?;

    Ok(Json(state.registry.verify_proof(&snapshot_id).into()))
}

async fn registry_stats(State(state): State<AppState>) -> Json<RegistryStatsResponse> {
    Json(RegistryStatsResponse {
        anchored: state.registry.len() as u64,
    })
}

async fn compute_snapshot(Json(req): Json<SnapshotRequest>) -> Result<Json<SnapshotResponse>, ApiError> {
    let profile = match req.risk_profile.as_deref() {
        Some(name) => RiskProfile::from_str(name)?,
        None => RiskProfile::default(),
    };

    let report = analysis::analyze(&req.portfolio, profile)?;
    let snapshot_id = report.snapshot_id()?;

    Ok(Json(SnapshotResponse { snapshot_id, report }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use axum::body::{self, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    const API_KEY: &str = "test-key";
    const BODY_LIMIT: usize = usize::MAX;

    async fn test_state() -> AppState {
        let db = db::connect_in_memory().await.unwrap();
        db::init_schema(&db).await.unwrap();
        AppState::restore(db, API_KEY).await.unwrap()
    }

    fn anchor_request(snapshot: &str, user: &str, portfolio: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/proofs")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("X-API-KEY", key);
        }
        let body = json!({
            "snapshot_id": snapshot,
            "user_id": user,
            "portfolio_id": portfolio,
        });
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn hex_id(label: &str) -> String {
        SnapshotId::digest(label).to_hex()
    }

    #[tokio::test]
    async fn anchors_and_verifies_a_proof() {
        let state = test_state().await;
        let (snapshot, user, portfolio) = (hex_id("snapshot1"), hex_id("user1"), hex_id("portfolio1"));

        let (status, body) = send(&state, anchor_request(&snapshot, &user, &portfolio, Some(API_KEY))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["snapshot_id"], snapshot.as_str());

        let (status, body) = send(&state, get_request(&format!("/api/v1/proofs/{snapshot}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exists"], true);
        assert_eq!(body["user_id"], user.as_str());
        assert_eq!(body["portfolio_id"], portfolio.as_str());

        let (_, body) = send(&state, get_request("/api/v1/proofs")).await;
        assert_eq!(body["anchored"], 1);
    }

    #[tokio::test]
    async fn duplicate_snapshot_is_a_conflict() {
        let state = test_state().await;
        let snapshot = hex_id("dup");

        let (status, _) = send(&state, anchor_request(&snapshot, &hex_id("u"), &hex_id("p"), Some(API_KEY))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&state, anchor_request(&snapshot, &hex_id("u2"), &hex_id("p2"), Some(API_KEY))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Proof already exists");

        let (_, body) = send(&state, get_request(&format!("/api/v1/proofs/{snapshot}"))).await;
        assert_eq!(body["user_id"], hex_id("u").as_str());
    }

    #[tokio::test]
    async fn zero_snapshot_is_rejected() {
        let state = test_state().await;

        let (status, body) = send(
            &state,
            anchor_request(&SnapshotId::ZERO.to_hex(), &hex_id("u"), &hex_id("p"), Some(API_KEY)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid snapshot hash");
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn unknown_snapshot_reads_as_absent() {
        let state = test_state().await;
        let zero = SnapshotId::ZERO.to_hex();

        let (status, body) = send(&state, get_request(&format!("/api/v1/proofs/{}", hex_id("nope")))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exists"], false);
        assert_eq!(body["user_id"], zero.as_str());
        assert_eq!(body["portfolio_id"], zero.as_str());
    }

    #[tokio::test]
    async fn malformed_ids_are_bad_requests() {
        let state = test_state().await;

        let (status, body) = send(&state, anchor_request("0x1234", &hex_id("u"), &hex_id("p"), Some(API_KEY))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid snapshot_id");

        let (status, _) = send(&state, get_request("/api/v1/proofs/not-hex")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn anchor_requires_api_key() {
        let state = test_state().await;
        let snapshot = hex_id("guarded");

        let (status, _) = send(&state, anchor_request(&snapshot, &hex_id("u"), &hex_id("p"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&state, anchor_request(&snapshot, &hex_id("u"), &hex_id("p"), Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn anchors_survive_a_restart() {
        let state = test_state().await;
        let snapshot = SnapshotId::digest("persisted");
        let user = UserId::digest("u");
        let portfolio = PortfolioId::digest("p");

        state.anchor(snapshot, user, portfolio).await.unwrap();

        let restored = AppState::restore(state.db.clone(), API_KEY).await.unwrap();
        let record = restored.registry.verify_proof(&snapshot);
        assert!(record.exists);
        assert_eq!(record.user, user);
        assert_eq!(record.portfolio, portfolio);

        let err = restored.anchor(snapshot, user, portfolio).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn persisted_row_missing_from_registry_is_recovered_on_duplicate() {
        let state = test_state().await;
        let snapshot = SnapshotId::digest("interrupted");
        let user = UserId::digest("u");
        let portfolio = PortfolioId::digest("p");

        // Row committed, registry never updated: what an interrupted write leaves behind.
        db::insert_anchor(&state.db, snapshot, user, portfolio, chrono::Utc::now())
            .await
            .unwrap();

        let err = state
            .anchor(snapshot, UserId::digest("u2"), PortfolioId::digest("p2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Proof already exists"));

        let (status, body) = send(&state, get_request(&format!("/api/v1/proofs/{snapshot}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exists"], true);
        assert_eq!(body["user_id"], user.to_hex().as_str());
        assert_eq!(body["portfolio_id"], portfolio.to_hex().as_str());
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn anchor_completes_when_the_caller_goes_away() {
        let state = test_state().await;
        let snapshot = SnapshotId::digest("abandoned");

        // Drop the caller's future after it has been polled once.
        let pending = state.anchor(snapshot, UserId::digest("u"), PortfolioId::digest("p"));
        let _ = tokio::time::timeout(std::time::Duration::from_millis(0), pending).await;

        // The detached write finishes and lands in both the table and the registry.
        let _ = state.anchor(SnapshotId::digest("after"), UserId::digest("u"), PortfolioId::digest("p")).await;
        let stored = db::get_anchor(&state.db, snapshot).await.unwrap();
        let record = state.registry.verify_proof(&snapshot);
        assert_eq!(stored.is_some(), record.exists);
        assert!(record.exists);
    }

    #[tokio::test]
    async fn concurrent_anchors_have_one_winner() {
        let state = test_state().await;
        let snapshot = SnapshotId::digest("race");

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                tokio::spawn(async move {
                    state
                        .anchor(snapshot, UserId::digest(format!("u{i}")), PortfolioId::digest("p"))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(state.registry.len(), 1);
        assert_eq!(db::load_anchors(&state.db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn computes_a_snapshot_id_from_a_portfolio() {
        let state = test_state().await;
        let request = |profile: &str| {
            let body = json!({
                "portfolio": {
                    "assets": [
                        {"symbol": "AAPL", "type": "stock", "value": 20000},
                        {"symbol": "BTC", "type": "crypto", "value": 15000},
                        {"symbol": "Gold", "type": "commodity", "value": 5000},
                        {"symbol": "US Bonds", "type": "bond", "value": 10000}
                    ]
                },
                "risk_profile": profile,
            });
            Request::builder()
                .method("POST")
                .uri("/api/v1/snapshots")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let (status, first) = send(&state, request("conservative")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["report"]["risk"]["risk_level"], "Moderate");

        let (_, second) = send(&state, request("conservative")).await;
        assert_eq!(first["snapshot_id"], second["snapshot_id"]);

        let (status, body) = send(&state, request("reckless")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Invalid risk profile. Choose: conservative, balanced, aggressive"
        );

        // Computing a snapshot does not anchor it.
        assert!(state.registry.is_empty());
    }
}
