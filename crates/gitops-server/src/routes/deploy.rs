use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::gateway::DeployResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DeployQuery {
    #[serde(default)]
    pub commit: Option<String>,
}

fn ack_status(resp: &DeployResponse) -> StatusCode {
    if resp.accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    }
}

/// POST /api/deploy/{version}: request a sync to `version`.
///
/// Returns 202 once the reconciliation is accepted; the outcome shows up in
/// `/api/status` later. Returns 200 with `accepted: false` when the version
/// is already running.
pub async fn deploy(
    State(app): State<AppState>,
    Path(version): Path<String>,
    Query(query): Query<DeployQuery>,
) -> Result<(StatusCode, Json<DeployResponse>), AppError> {
    request(&app, &version, query)
}

/// POST /api/deploy/ with no version segment: always 400 InvalidVersion.
pub async fn deploy_without_version(
    State(app): State<AppState>,
    Query(query): Query<DeployQuery>,
) -> Result<(StatusCode, Json<DeployResponse>), AppError> {
    request(&app, "", query)
}

fn request(
    app: &AppState,
    version: &str,
    query: DeployQuery,
) -> Result<(StatusCode, Json<DeployResponse>), AppError> {
    let commit = query.commit.filter(|c| !c.trim().is_empty());
    let resp = app.gateway.deploy(version, commit)?;
    Ok((ack_status(&resp), Json(resp)))
}

/// POST /api/rollback: re-deploy the newest good version before the current one.
pub async fn rollback(
    State(app): State<AppState>,
) -> Result<(StatusCode, Json<DeployResponse>), AppError> {
    let resp = app.gateway.rollback()?;
    Ok((ack_status(&resp), Json(resp)))
}
