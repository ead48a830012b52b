//! The graph node contract.
//!
//! A node is one unit of work the walk driver visits. Each node kind
//! implements `GraphNode` directly; behaviour shared by resource-instance
//! nodes lives in `ResourceInstanceBase`, which node kinds hold by value
//! rather than inherit from.

use crate::apply::{ApplyRequest, RepetitionData, ResourceConfig};
use crate::context::EvalContext;
use crate::provider::{ProviderSchema, ResolvedProvider};
use async_trait::async_trait;
use std::sync::Arc;
use terrawalk_core::{
    AbsProviderConfig, Diagnostics, Error, ResourceInstanceAddress, ResourceInstanceChange,
    ResourceInstanceObject, Result, StateScope, WalkOperation,
};

/// Which provider configuration a node needs before it can run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderRequirement {
    NotRequired,
    /// `exact` means the address must be used as-is rather than searched
    /// for up the module tree.
    Required { addr: AbsProviderConfig, exact: bool },
}

#[async_trait]
pub trait GraphNode: Send + Sync {
    /// Display name, unique within a graph.
    fn name(&self) -> String;

    /// Perform the node's work for a walk of kind `op`. Ordinary failures
    /// are reported in the returned diagnostics, never by panicking.
    async fn execute(&self, ctx: &EvalContext, op: WalkOperation) -> Diagnostics;

    fn provided_by(&self) -> ProviderRequirement {
        ProviderRequirement::NotRequired
    }

    /// Provider configuration this node stands for, if it is a provider node.
    fn provider_addr(&self) -> Option<&AbsProviderConfig> {
        None
    }

    /// Addresses this node depends on, used to compute edges.
    fn references(&self) -> Vec<ResourceInstanceAddress> {
        Vec::new()
    }

    fn resource_instance_addr(&self) -> Option<&ResourceInstanceAddress> {
        None
    }
}

/// State and helpers common to nodes bound to one resource instance.
#[derive(Clone, Debug)]
pub struct ResourceInstanceBase {
    pub addr: ResourceInstanceAddress,
    /// Provider configuration chosen for this node when the graph was built.
    pub resolved_provider: Option<AbsProviderConfig>,
    /// Provider recorded alongside the instance in prior state.
    pub stored_provider: Option<AbsProviderConfig>,
    /// Provider named by the resource's configuration.
    pub configured_provider: Option<AbsProviderConfig>,
    /// Instance state seen when the graph was built.
    pub instance_state: Option<ResourceInstanceObject>,
}

impl ResourceInstanceBase {
    pub fn new(addr: ResourceInstanceAddress) -> Self {
        Self {
            addr,
            resolved_provider: None,
            stored_provider: None,
            configured_provider: None,
            instance_state: None,
        }
    }

    /// Configured provider first, then the one recorded in state (exact),
    /// then the provider implied by the resource type.
    pub fn provided_by(&self) -> ProviderRequirement {
        if let Some(addr) = &self.configured_provider {
            return ProviderRequirement::Required {
                addr: addr.clone(),
                exact: false,
            };
        }
        if let Some(addr) = &self.stored_provider {
            return ProviderRequirement::Required {
                addr: addr.clone(),
                exact: true,
            };
        }
        let implied = AbsProviderConfig::new(&self.addr.resource.implied_provider())
            .in_module(self.addr.module.clone());
        ProviderRequirement::Required {
            addr: implied,
            exact: false,
        }
    }

    pub fn references(&self) -> Vec<ResourceInstanceAddress> {
        self.instance_state
            .as_ref()
            .map(|s| s.dependencies.clone())
            .unwrap_or_default()
    }

    pub fn check_cancelled(&self, ctx: &EvalContext) -> Result<()> {
        if ctx.stopped() {
            Err(Error::cancelled(&self.addr))
        } else {
            Ok(())
        }
    }

    pub async fn get_provider(&self, ctx: &EvalContext) -> Result<ResolvedProvider> {
        let addr = self
            .resolved_provider
            .as_ref()
            .ok_or_else(|| Error::MissingProvider {
                addr: self.addr.to_string(),
            })?;
        ctx.provider(addr).await
    }

    /// Planned change for this instance. With a schema, a change for a type
    /// the provider does not know is an error.
    pub async fn read_diff(
        &self,
        ctx: &EvalContext,
        schema: Option<&ProviderSchema>,
    ) -> Result<Option<Arc<ResourceInstanceChange>>> {
        let change = ctx.changes().read_planned_change(&self.addr).await?;
        if let (Some(_), Some(schema)) = (&change, schema) {
            if schema.schema_for(&self.addr.resource).is_none() {
                return Err(Error::UnsupportedResourceType {
                    provider: self
                        .resolved_provider
                        .as_ref()
                        .map(|p| p.to_string())
                        .unwrap_or_default(),
                    type_name: self.addr.resource.type_name.clone(),
                });
            }
        }
        Ok(change)
    }

    pub async fn read_state(&self, ctx: &EvalContext) -> Result<Option<ResourceInstanceObject>> {
        ctx.state().read(&self.addr).await
    }

    pub async fn write_state(
        &self,
        ctx: &EvalContext,
        obj: Option<ResourceInstanceObject>,
        scope: StateScope,
    ) -> Result<()> {
        ctx.state().write(&self.addr, obj, scope).await
    }

    pub async fn pre_apply_hook(
        &self,
        ctx: &EvalContext,
        change: &ResourceInstanceChange,
    ) -> Diagnostics {
        ctx.hooks().pre_apply(&self.addr, change).await.into()
    }

    pub async fn post_apply_hook(
        &self,
        ctx: &EvalContext,
        state: Option<&ResourceInstanceObject>,
        error: Option<&str>,
    ) -> Diagnostics {
        ctx.hooks().post_apply(&self.addr, state, error).await.into()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn apply(
        &self,
        ctx: &EvalContext,
        provider: Option<&ResolvedProvider>,
        prior: Option<ResourceInstanceObject>,
        change: &ResourceInstanceChange,
        config: Option<&ResourceConfig>,
        repetition: &RepetitionData,
        destroy: bool,
    ) -> (Option<ResourceInstanceObject>, Diagnostics) {
        let request = ApplyRequest {
            addr: &self.addr,
            provider,
            prior,
            change,
            config,
            repetition,
            destroy,
        };
        ctx.applier().apply(ctx, request).await
    }
}

/// Tell walk-wide observers that state changed.
pub async fn update_state_hook(ctx: &EvalContext) -> Diagnostics {
    ctx.hooks().post_state_update(ctx.state()).await.into()
}
