use gitops_core::config::Config;
use gitops_core::error::Result;
use std::sync::Arc;

use crate::apply::Apply;
use crate::gateway::StatusGateway;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: StatusGateway,
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by the simulated apply step. Must be called inside a
    /// Tokio runtime since accepted deploys spawn reconciliation tasks.
    pub fn new(config: Config) -> Result<Self> {
        let gateway = StatusGateway::simulated(&config)?;
        Ok(Self {
            gateway,
            config: Arc::new(config),
        })
    }

    pub fn with_apply(config: Config, apply: Arc<dyn Apply>) -> Result<Self> {
        let gateway = StatusGateway::from_config(&config, apply)?;
        Ok(Self {
            gateway,
            config: Arc::new(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_stores_config() {
        let mut cfg = Config::default();
        cfg.app.name = "storefront".to_string();
        let state = AppState::new(cfg).unwrap();
        assert_eq!(state.config.app.name, "storefront");
        assert_eq!(state.gateway.get_status().app, "storefront");
    }
}
