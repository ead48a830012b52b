//! Planned changes produced by the planning phase.

use crate::addrs::{AbsProviderConfig, ResourceInstanceAddress};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What the plan intends to do with one resource instance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    NoOp,
    Create,
    Read,
    Update,
    Delete,
    DeleteThenCreate,
    CreateThenDelete,
    Forget,
}

impl Action {
    /// Whether the real-world object is expected to be gone afterwards.
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Delete | Self::Forget)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::DeleteThenCreate => "delete-then-create",
            Self::CreateThenDelete => "create-then-delete",
            Self::Forget => "forget",
        };
        f.write_str(s)
    }
}

/// A planned action for one address. Never mutated once stored.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResourceInstanceChange {
    pub addr: ResourceInstanceAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AbsProviderConfig>,
    pub action: Action,
    #[serde(default)]
    pub before: Value,
    #[serde(default)]
    pub after: Value,
}

impl ResourceInstanceChange {
    pub fn new(addr: ResourceInstanceAddress, action: Action) -> Self {
        Self {
            addr,
            provider: None,
            action,
            before: Value::Null,
            after: Value::Null,
        }
    }

    /// A forget change: the prior value goes away without being destroyed.
    pub fn forget(addr: ResourceInstanceAddress, before: Value) -> Self {
        Self {
            before,
            ..Self::new(addr, Action::Forget)
        }
    }

    pub fn with_provider(mut self, provider: AbsProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_values(mut self, before: Value, after: Value) -> Self {
        self.before = before;
        self.after = after;
        self
    }
}
