use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitopsError {
    #[error("invalid version '{0}': expected a semantic version such as v1.2.3")]
    InvalidVersion(String),

    #[error("deployment of {target} already in progress; cannot start {requested}")]
    AlreadyInProgress { target: String, requested: String },

    #[error("no earlier successful version to roll back to from {0}")]
    NoRollbackTarget(String),

    #[error("invalid transition from {from} via {event}: {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GitopsError {
    /// Stable machine-readable code, used as the `error` field of API responses.
    pub fn code(&self) -> &'static str {
        match self {
            GitopsError::InvalidVersion(_) => "InvalidVersion",
            GitopsError::AlreadyInProgress { .. } => "AlreadyInProgress",
            GitopsError::NoRollbackTarget(_) => "NoRollbackTarget",
            GitopsError::InvalidTransition { .. } => "InvalidTransition",
            GitopsError::ConfigNotFound(_) => "ConfigNotFound",
            GitopsError::Io(_) | GitopsError::Yaml(_) | GitopsError::Json(_) => "Internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, GitopsError>;
