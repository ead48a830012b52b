//! Tracked-state records.

use crate::addrs::ResourceInstanceAddress;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStatus {
    #[default]
    Ready,
    Tainted,
}

/// Last-known real-world value for one address. A null value means the
/// object is not present.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResourceInstanceObject {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub status: ObjectStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ResourceInstanceAddress>,
}

impl ResourceInstanceObject {
    pub fn ready(value: Value) -> Self {
        Self {
            value,
            status: ObjectStatus::Ready,
            dependencies: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: ObjectStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<ResourceInstanceAddress>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Which copy of state a write targets.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StateScope {
    /// The state being built by the current walk.
    #[default]
    Working,
    /// State refreshed from real-world objects during planning.
    Refresh,
    /// Snapshot of the previous run, kept for comparison.
    PrevRun,
}

impl fmt::Display for StateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Working => f.write_str("working"),
            Self::Refresh => f.write_str("refresh"),
            Self::PrevRun => f.write_str("prev-run"),
        }
    }
}
