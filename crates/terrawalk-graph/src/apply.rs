//! The shared apply routine used by every node that changes an instance.
//!
//! Create, update, destroy and forget all go through `ApplyRoutine`, so hook
//! sequencing, state writes and diagnostics look the same for each of them.
//! Provisioners are not run here; forget in particular never runs them.

use crate::context::EvalContext;
use crate::provider::{ApplyResourceChangeRequest, ResolvedProvider};
use async_trait::async_trait;
use serde_json::Value;
use terrawalk_core::{
    AbsProviderConfig, Action, Diagnostic, Diagnostics, Error, ResourceInstanceAddress,
    ResourceInstanceChange, ResourceInstanceObject,
};
use tracing::{debug, trace};

/// Evaluated configuration for one resource instance.
#[derive(Clone, Debug, Default)]
pub struct ResourceConfig {
    pub provider: Option<AbsProviderConfig>,
    pub body: Value,
}

/// Per-instance values of a multi-instance expansion (`count`/`for_each`).
/// Empty for single concrete instances.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RepetitionData {
    pub count_index: Option<i64>,
    pub each_key: Option<String>,
    pub each_value: Option<Value>,
}

impl RepetitionData {
    pub fn is_empty(&self) -> bool {
        self.count_index.is_none() && self.each_key.is_none() && self.each_value.is_none()
    }
}

pub struct ApplyRequest<'a> {
    pub addr: &'a ResourceInstanceAddress,
    pub provider: Option<&'a ResolvedProvider>,
    pub prior: Option<ResourceInstanceObject>,
    pub change: &'a ResourceInstanceChange,
    pub config: Option<&'a ResourceConfig>,
    pub repetition: &'a RepetitionData,
    /// The change is part of destroying the instance, so no configuration
    /// is expected.
    pub destroy: bool,
}

#[async_trait]
pub trait ApplyRoutine: Send + Sync {
    /// Apply one change. Returns the resulting object (`None` when the
    /// instance is gone) together with anything worth reporting. The result
    /// is meaningful even when the diagnostics carry errors.
    async fn apply(
        &self,
        ctx: &EvalContext,
        request: ApplyRequest<'_>,
    ) -> (Option<ResourceInstanceObject>, Diagnostics);
}

/// Default routine: delegates to the provider, except for actions that
/// never touch the real world.
pub struct ProviderApply;

#[async_trait]
impl ApplyRoutine for ProviderApply {
    async fn apply(
        &self,
        ctx: &EvalContext,
        req: ApplyRequest<'_>,
    ) -> (Option<ResourceInstanceObject>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let addr = req.addr;
        let action = req.change.action;
        trace!(%addr, %action, repetition = ?req.repetition, "apply");

        match action {
            Action::NoOp => return (req.prior, diags),
            Action::Forget => {
                debug!(%addr, "removing from state without calling the provider");
                return (None, diags);
            }
            Action::Read => {
                diags.push(
                    Diagnostic::error("read changes cannot be applied")
                        .with_detail("data sources are read during planning")
                        .with_address(addr),
                );
                return (req.prior, diags);
            }
            _ => {}
        }

        if req.config.is_none() && !req.destroy && !action.is_removal() {
            diags.push(
                Diagnostic::error(format!("missing configuration for {} action", action))
                    .with_address(addr),
            );
            return (req.prior, diags);
        }

        let Some(provider) = req.provider else {
            diags.append(Error::MissingProvider {
                addr: addr.to_string(),
            });
            return (req.prior, diags);
        };

        let planned = if action == Action::Delete {
            Value::Null
        } else {
            req.change.after.clone()
        };
        let request = ApplyResourceChangeRequest {
            type_name: addr.resource.type_name.clone(),
            prior: req
                .prior
                .as_ref()
                .map(|o| o.value.clone())
                .unwrap_or(Value::Null),
            planned,
            config: req.config.map(|c| c.body.clone()).unwrap_or(Value::Null),
        };

        let result = tokio::select! {
            r = provider.handle.apply_resource_change(request) => r,
            _ = ctx.cancel_token().cancelled() => Err(Error::cancelled(addr)),
        };

        match result {
            Ok(Value::Null) => (None, diags),
            Ok(value) => {
                let deps = req
                    .prior
                    .map(|o| o.dependencies)
                    .unwrap_or_default();
                (
                    Some(ResourceInstanceObject::ready(value).with_dependencies(deps)),
                    diags,
                )
            }
            Err(e @ Error::Cancelled { .. }) => {
                diags.append(e);
                (req.prior, diags)
            }
            Err(e) => {
                diags.append(Error::apply(addr, e.to_string()));
                (req.prior, diags)
            }
        }
    }
}
