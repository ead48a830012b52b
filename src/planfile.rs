//! Saved plan files.
//!
//! A plan file is the JSON output of the planning phase: the list of
//! planned changes a later walk carries out.

use serde::{Deserialize, Serialize};
use std::path::Path;
use terrawalk_core::{Action, Error, ResourceInstanceChange, Result};
use terrawalk_graph::MemoryDiffStore;
use tracing::debug;

pub const PLAN_FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanFile {
    pub format_version: u32,
    #[serde(default)]
    pub changes: Vec<ResourceInstanceChange>,
}

impl PlanFile {
    pub fn new(changes: Vec<ResourceInstanceChange>) -> Self {
        Self {
            format_version: PLAN_FORMAT_VERSION,
            changes,
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let plan: PlanFile = serde_json::from_slice(&bytes)?;
        if plan.format_version != PLAN_FORMAT_VERSION {
            return Err(Error::ConfigError(format!(
                "{}: unsupported plan format version {} (expected {})",
                path.display(),
                plan.format_version,
                PLAN_FORMAT_VERSION
            )));
        }
        debug!(path = %path.display(), changes = plan.changes.len(), "plan loaded");
        Ok(plan)
    }

    pub fn forget_changes(&self) -> impl Iterator<Item = &ResourceInstanceChange> {
        self.changes.iter().filter(|c| c.action == Action::Forget)
    }

    pub fn diff_store(&self) -> MemoryDiffStore {
        MemoryDiffStore::from_changes(self.changes.iter().cloned())
    }
}
