//! Provider node for evaluation-only walks.

use crate::context::EvalContext;
use crate::node::GraphNode;
use async_trait::async_trait;
use terrawalk_core::{AbsProviderConfig, Diagnostics, WalkOperation};

/// Marks where a provider sits in the graph so that its dependents are
/// ordered after it. The provider is started and its schema fetched on
/// demand through the context's provider cache; this node never configures
/// it, and its own body does nothing.
#[derive(Clone, Debug)]
pub struct ProviderEvalNode {
    addr: AbsProviderConfig,
}

impl ProviderEvalNode {
    pub fn new(addr: AbsProviderConfig) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl GraphNode for ProviderEvalNode {
    fn name(&self) -> String {
        self.addr.to_string()
    }

    async fn execute(&self, _ctx: &EvalContext, _op: WalkOperation) -> Diagnostics {
        Diagnostics::new()
    }

    fn provider_addr(&self) -> Option<&AbsProviderConfig> {
        Some(&self.addr)
    }
}
