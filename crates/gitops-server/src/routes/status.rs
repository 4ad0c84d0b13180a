use axum::extract::State;
use axum::Json;

use crate::gateway::StatusView;
use crate::state::AppState;

/// GET /api/status: current reconciliation state plus recent deployments.
pub async fn get_status(State(app): State<AppState>) -> Json<StatusView> {
    Json(app.gateway.get_status())
}
