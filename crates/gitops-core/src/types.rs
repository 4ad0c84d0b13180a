use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SyncStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    Synced,
    Syncing,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Synced => "Synced",
            SyncStatus::Syncing => "Syncing",
            SyncStatus::Error => "Error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Health {
    Healthy,
    Degraded,
    Unknown,
}

impl Health {
    pub fn as_str(self) -> &'static str {
        match self {
            Health::Healthy => "Healthy",
            Health::Degraded => "Degraded",
            Health::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one completed deployment attempt, as recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failed,
    RolledBack,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Failed => "Failed",
            Outcome::RolledBack => "RolledBack",
        }
    }

    /// True when the version ended up running (a usable rollback target).
    pub fn is_good(self) -> bool {
        matches!(self, Outcome::Success | Outcome::RolledBack)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncKind
// ---------------------------------------------------------------------------

/// How the current target was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Deploy,
    Rollback,
}

impl SyncKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncKind::Deploy => "deploy",
            SyncKind::Rollback => "rollback",
        }
    }

    /// Outcome recorded when a sync of this kind succeeds.
    pub fn success_outcome(self) -> Outcome {
        match self {
            SyncKind::Deploy => Outcome::Success,
            SyncKind::Rollback => Outcome::RolledBack,
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_as_pascal_case() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::Syncing).unwrap(),
            "\"Syncing\""
        );
        assert_eq!(
            serde_json::to_string(&Outcome::RolledBack).unwrap(),
            "\"RolledBack\""
        );
    }

    #[test]
    fn rollback_success_is_recorded_as_rolled_back() {
        assert_eq!(SyncKind::Deploy.success_outcome(), Outcome::Success);
        assert_eq!(SyncKind::Rollback.success_outcome(), Outcome::RolledBack);
        assert!(Outcome::RolledBack.is_good());
        assert!(!Outcome::Failed.is_good());
    }
}
