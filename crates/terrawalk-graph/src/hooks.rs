//! Lifecycle hooks: observers notified as nodes apply changes.
//!
//! Every callback returns `Result<HookAction>`. An error or a `Halt` stops
//! the node at that point and surfaces as a diagnostic; hooks never raise.

use crate::store::StateStore;
use async_trait::async_trait;
use std::sync::Arc;
use terrawalk_core::{
    Error, ResourceInstanceAddress, ResourceInstanceChange, ResourceInstanceObject, Result,
};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    Halt,
}

#[async_trait]
pub trait Hook: Send + Sync {
    /// About to apply `change` to `addr`.
    async fn pre_apply(
        &self,
        _addr: &ResourceInstanceAddress,
        _change: &ResourceInstanceChange,
    ) -> Result<HookAction> {
        Ok(HookAction::Continue)
    }

    /// Finished applying to `addr`. `error` carries the combined error
    /// message of everything reported so far, if any.
    async fn post_apply(
        &self,
        _addr: &ResourceInstanceAddress,
        _new_state: Option<&ResourceInstanceObject>,
        _error: Option<&str>,
    ) -> Result<HookAction> {
        Ok(HookAction::Continue)
    }

    /// The walk's state changed.
    async fn post_state_update(&self, _state: &dyn StateStore) -> Result<HookAction> {
        Ok(HookAction::Continue)
    }
}

/// Fans each event out to all registered hooks, in registration order.
/// Stops at the first hook that fails or halts.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn pre_apply(
        &self,
        addr: &ResourceInstanceAddress,
        change: &ResourceInstanceChange,
    ) -> Result<()> {
        for hook in &self.hooks {
            check(hook.pre_apply(addr, change).await)?;
        }
        Ok(())
    }

    pub async fn post_apply(
        &self,
        addr: &ResourceInstanceAddress,
        new_state: Option<&ResourceInstanceObject>,
        error: Option<&str>,
    ) -> Result<()> {
        for hook in &self.hooks {
            check(hook.post_apply(addr, new_state, error).await)?;
        }
        Ok(())
    }

    pub async fn post_state_update(&self, state: &dyn StateStore) -> Result<()> {
        for hook in &self.hooks {
            check(hook.post_state_update(state).await)?;
        }
        Ok(())
    }
}

fn check(result: Result<HookAction>) -> Result<()> {
    match result {
        Ok(HookAction::Continue) => Ok(()),
        Ok(HookAction::Halt) => Err(Error::HookHalted),
        Err(Error::Hook(msg)) => Err(Error::Hook(msg)),
        Err(e) => Err(Error::Hook(e.to_string())),
    }
}

/// Logs every lifecycle event through `tracing`.
pub struct LoggingHook;

#[async_trait]
impl Hook for LoggingHook {
    async fn pre_apply(
        &self,
        addr: &ResourceInstanceAddress,
        change: &ResourceInstanceChange,
    ) -> Result<HookAction> {
        info!(%addr, action = %change.action, "applying");
        Ok(HookAction::Continue)
    }

    async fn post_apply(
        &self,
        addr: &ResourceInstanceAddress,
        new_state: Option<&ResourceInstanceObject>,
        error: Option<&str>,
    ) -> Result<HookAction> {
        match error {
            Some(err) => warn!(%addr, error = err, "apply finished with errors"),
            None => info!(%addr, tracked = new_state.is_some(), "apply complete"),
        }
        Ok(HookAction::Continue)
    }

    async fn post_state_update(&self, state: &dyn StateStore) -> Result<HookAction> {
        let tracked = state.addresses().await.len();
        debug!(tracked, "state updated");
        Ok(HookAction::Continue)
    }
}
