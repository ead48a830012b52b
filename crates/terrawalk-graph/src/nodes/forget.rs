//! Forget: stop tracking a resource instance without destroying it.

use crate::apply::RepetitionData;
use crate::context::EvalContext;
use crate::node::{update_state_hook, GraphNode, ProviderRequirement, ResourceInstanceBase};
use async_trait::async_trait;
use terrawalk_core::{
    AbsProviderConfig, Action, Diagnostic, Diagnostics, ResourceInstanceAddress,
    ResourceInstanceObject, StateScope, WalkOperation,
};
use tracing::{debug, warn};

/// Removes one instance from state. The change goes through the shared
/// apply routine like any other, but a forget change never reaches the
/// provider's destroy path and destroy provisioners are never run.
#[derive(Clone, Debug)]
pub struct ForgetResourceInstanceNode {
    base: ResourceInstanceBase,
}

impl ForgetResourceInstanceNode {
    pub fn new(addr: ResourceInstanceAddress) -> Self {
        Self {
            base: ResourceInstanceBase::new(addr),
        }
    }

    pub fn with_resolved_provider(mut self, provider: AbsProviderConfig) -> Self {
        self.base.resolved_provider = Some(provider);
        self
    }

    pub fn with_stored_provider(mut self, provider: AbsProviderConfig) -> Self {
        self.base.stored_provider = Some(provider);
        self
    }

    pub fn with_configured_provider(mut self, provider: AbsProviderConfig) -> Self {
        self.base.configured_provider = Some(provider);
        self
    }

    pub fn with_instance_state(mut self, state: ResourceInstanceObject) -> Self {
        self.base.instance_state = Some(state);
        self
    }

    pub fn base(&self) -> &ResourceInstanceBase {
        &self.base
    }
}

#[async_trait]
impl GraphNode for ForgetResourceInstanceNode {
    fn name(&self) -> String {
        format!("{} (forget)", self.base.addr)
    }

    async fn execute(&self, ctx: &EvalContext, _op: WalkOperation) -> Diagnostics {
        let base = &self.base;
        let addr = &base.addr;
        let mut diags = Diagnostics::new();

        if base.instance_state.is_none() {
            warn!(%addr, "forget node has no instance state");
        }

        if let Err(e) = base.check_cancelled(ctx) {
            return diags.with(e);
        }

        // Data sources may have no provider at all; removing them from state
        // is bookkeeping only, so schema checks are skipped for them.
        let provider = if base.resolved_provider.is_none() && addr.is_data() {
            None
        } else {
            match base.get_provider(ctx).await {
                Ok(p) => Some(p),
                Err(e) => return diags.with(e),
            }
        };
        let schema = provider.as_ref().map(|p| p.schema.as_ref());

        if let Err(e) = base.check_cancelled(ctx) {
            return diags.with(e);
        }
        let change = match base.read_diff(ctx, schema).await {
            Ok(Some(change)) => change,
            Ok(None) => {
                debug!(%addr, "nothing planned to forget");
                return diags;
            }
            Err(e) => return diags.with(e),
        };
        if change.action != Action::Forget {
            return diags.with(
                Diagnostic::error(format!(
                    "planned {} change cannot be carried out by a forget node",
                    change.action
                ))
                .with_address(addr),
            );
        }

        if let Err(e) = base.check_cancelled(ctx) {
            return diags.with(e);
        }
        let state = match base.read_state(ctx).await {
            Ok(state) => state,
            Err(e) => return diags.with(e),
        };

        let state = match state {
            Some(state) if !state.is_null() => state,
            _ => {
                debug!(%addr, "already absent from state");
                return diags;
            }
        };

        if let Err(e) = base.check_cancelled(ctx) {
            return diags.with(e);
        }
        diags.append(base.pre_apply_hook(ctx, &change).await);
        if diags.has_errors() {
            return diags;
        }

        if let Err(e) = base.check_cancelled(ctx) {
            return diags.with(e);
        }
        let (new_state, apply_diags) = base
            .apply(
                ctx,
                provider.as_ref(),
                Some(state),
                &change,
                None,
                &RepetitionData::default(),
                false,
            )
            .await;
        diags.append(apply_diags);

        // Whatever apply produced is written even if it reported errors.
        if let Err(e) = base
            .write_state(ctx, new_state.clone(), StateScope::Working)
            .await
        {
            return diags.with(e);
        }

        let err = diags.err();
        diags.append(
            base.post_apply_hook(ctx, new_state.as_ref(), err.as_deref())
                .await,
        );
        diags.append(update_state_hook(ctx).await);
        diags
    }

    fn provided_by(&self) -> ProviderRequirement {
        if self.base.addr.is_data() {
            return ProviderRequirement::NotRequired;
        }
        self.base.provided_by()
    }

    fn references(&self) -> Vec<ResourceInstanceAddress> {
        self.base.references()
    }

    fn resource_instance_addr(&self) -> Option<&ResourceInstanceAddress> {
        Some(&self.base.addr)
    }
}
