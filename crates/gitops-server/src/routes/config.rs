use axum::extract::State;
use axum::Json;
use gitops_core::config::ConfigWarning;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub config: serde_json::Value,
    pub warnings: Vec<ConfigWarning>,
}

/// GET /api/config: read-only view of the configuration the server started with.
///
/// No PUT endpoint. Config is a YAML file; changes take effect on restart.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<ConfigResponse>, AppError> {
    let config = serde_json::to_value(app.config.as_ref())?;
    Ok(Json(ConfigResponse {
        config,
        warnings: app.config.validate(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitops_core::config::Config;

    #[tokio::test]
    async fn returns_effective_config() {
        let app = AppState::new(Config::default()).unwrap();
        let Json(resp) = get_config(State(app)).await.unwrap();
        assert_eq!(resp.config["retry"]["max_retries"], 3);
        assert_eq!(resp.config["app"]["initial_version"], "v1.0.0");
        assert!(resp.warnings.is_empty());
    }
}
