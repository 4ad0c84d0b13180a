//! Append-only deployment history.
//!
//! Stored as a persistent newest-first list: appending pushes a new head node
//! and cloning the whole history only bumps a reference count. Published
//! snapshots therefore share every record with the live log instead of
//! copying it.

use crate::types::Outcome;
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// DeploymentRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub version: Version,
    pub commit: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    /// 1-based attempt number within the reconciliation that produced this record.
    #[serde(default = "default_attempt")]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_attempt() -> u32 {
    1
}

impl DeploymentRecord {
    pub fn success(version: Version, commit: impl Into<String>, attempt: u32) -> Self {
        Self {
            version,
            commit: commit.into(),
            timestamp: Utc::now(),
            outcome: Outcome::Success,
            attempt,
            error: None,
        }
    }

    pub fn failed(version: Version, attempt: u32, error: impl Into<String>) -> Self {
        Self {
            version,
            commit: String::new(),
            timestamp: Utc::now(),
            outcome: Outcome::Failed,
            attempt,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// VersionHistory
// ---------------------------------------------------------------------------

struct Node {
    record: DeploymentRecord,
    next: Option<Arc<Node>>,
}

#[derive(Clone, Default)]
pub struct VersionHistory {
    head: Option<Arc<Node>>,
    len: usize,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed attempt. O(1); the record becomes the newest entry.
    pub fn append(&mut self, record: DeploymentRecord) {
        let next = self.head.take();
        self.head = Some(Arc::new(Node { record, next }));
        self.len += 1;
    }

    /// Lazily iterate at most `limit` records, newest first.
    ///
    /// The returned iterator borrows a shared view, so calling `list` again
    /// (or cloning the iterator) restarts from the same head.
    pub fn list(&self, limit: usize) -> std::iter::Take<Iter<'_>> {
        self.iter().take(limit)
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    pub fn latest(&self) -> Option<&DeploymentRecord> {
        self.head.as_deref().map(|n| &n.record)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Newest version that ended up running and differs from `current`.
    pub fn last_good_before(&self, current: &Version) -> Option<&DeploymentRecord> {
        self.iter()
            .find(|r| r.outcome.is_good() && r.version != *current)
    }
}

impl std::fmt::Debug for VersionHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Serialize for VersionHistory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

// Unlink iteratively; the default recursive drop would overflow the stack on
// very long histories.
impl Drop for VersionHistory {
    fn drop(&mut self) {
        let mut cur = self.head.take();
        while let Some(node) = cur {
            match Arc::try_unwrap(node) {
                Ok(mut node) => cur = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

#[derive(Clone)]
pub struct Iter<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a DeploymentRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        Some(&node.record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
