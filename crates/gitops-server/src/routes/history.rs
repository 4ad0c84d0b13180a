use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::gateway::DeploymentView;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /api/history?limit=N: deployment records, newest first.
///
/// Without `limit`, the configured `history.recent_limit` applies.
pub async fn get_history(
    State(app): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<DeploymentView>> {
    let limit = query.limit.unwrap_or(app.config.history.recent_limit);
    Json(app.gateway.history(limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitops_core::config::Config;

    #[tokio::test]
    async fn zero_limit_returns_empty() {
        let app = AppState::new(Config::default()).unwrap();
        let Json(list) = get_history(State(app), Query(HistoryQuery { limit: Some(0) })).await;
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn default_limit_includes_seed_record() {
        let app = AppState::new(Config::default()).unwrap();
        let Json(list) = get_history(State(app), Query(HistoryQuery::default())).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].version, "v1.0.0");
    }
}
