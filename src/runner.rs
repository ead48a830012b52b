//! Forget walk assembly and execution.
//!
//! Builds the graph for a saved plan's forget changes against an on-disk
//! state file, walks it, and persists the result.

use crate::config::TerrawalkConfig;
use crate::planfile::PlanFile;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use terrawalk_core::{AbsProviderConfig, ResourceInstanceAddress, Result, WalkOperation};
use terrawalk_graph::{
    EvalContext, FileStateStore, ForgetResourceInstanceNode, GraphNode, Graph, LoggingHook,
    NodeId, ProviderEvalNode, StateFile, StateStore, WalkSummary, Walker,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct ForgetOptions {
    pub plan_path: PathBuf,
    pub state_path: PathBuf,
    /// Overrides `[walk] parallelism` from the config file.
    pub parallelism: Option<usize>,
    /// Walk against the loaded state but leave the file untouched.
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct ForgetReport {
    pub summary: WalkSummary,
    /// Addresses that were tracked before the walk and are gone after it.
    pub forgotten: Vec<ResourceInstanceAddress>,
    /// The snapshot written to disk, unless this was a dry run.
    pub persisted: Option<StateFile>,
}

/// Provider a forget node should use: the one recorded in the plan, then the
/// one stored with the instance, then (managed resources only) the provider
/// implied by the resource type.
fn resolve_provider(
    addr: &ResourceInstanceAddress,
    planned: Option<&AbsProviderConfig>,
    stored: Option<&AbsProviderConfig>,
) -> Option<AbsProviderConfig> {
    if let Some(p) = planned.or(stored) {
        return Some(p.clone());
    }
    if addr.is_data() {
        return None;
    }
    Some(
        AbsProviderConfig::new(&addr.resource.implied_provider()).in_module(addr.module.clone()),
    )
}

/// One provider-eval node per provider in use, one forget node per forget
/// change. Forget nodes run after their provider node, and an instance is
/// forgotten before anything it depends on.
pub async fn build_forget_graph(plan: &PlanFile, state: &FileStateStore) -> Result<Graph> {
    let mut graph = Graph::new();
    let mut provider_nodes: BTreeMap<AbsProviderConfig, NodeId> = BTreeMap::new();
    let mut forget_nodes: HashMap<ResourceInstanceAddress, NodeId> = HashMap::new();
    let mut references: Vec<(NodeId, Vec<ResourceInstanceAddress>)> = Vec::new();

    for change in plan.forget_changes() {
        let addr = &change.addr;
        if forget_nodes.contains_key(addr) {
            debug!(%addr, "duplicate forget change ignored");
            continue;
        }
        let stored = state.stored_provider(addr).await;
        let resolved = resolve_provider(addr, change.provider.as_ref(), stored.as_ref());

        let mut node = ForgetResourceInstanceNode::new(addr.clone());
        if let Some(stored) = stored {
            node = node.with_stored_provider(stored);
        }
        if let Some(instance) = state.read(addr).await? {
            node = node.with_instance_state(instance);
        }
        if let Some(provider) = &resolved {
            node = node.with_resolved_provider(provider.clone());
        }
        let refs = node.references();
        let id = graph.add(Arc::new(node));

        if let Some(provider) = resolved {
            let provider_id = *provider_nodes
                .entry(provider.clone())
                .or_insert_with(|| graph.add(Arc::new(ProviderEvalNode::new(provider))));
            graph.connect(id, provider_id)?;
        }
        forget_nodes.insert(addr.clone(), id);
        references.push((id, refs));
    }

    for (id, refs) in references {
        for dep in refs {
            if let Some(&dep_id) = forget_nodes.get(&dep) {
                graph.connect(dep_id, id)?;
            }
        }
    }

    debug!(
        nodes = graph.len(),
        providers = provider_nodes.len(),
        forgets = forget_nodes.len(),
        "forget graph built"
    );
    Ok(graph)
}

/// Load the plan and state, walk every forget change, and persist the state
/// file (even when some nodes failed) unless `dry_run` is set.
pub async fn run_forget(
    config: &TerrawalkConfig,
    opts: &ForgetOptions,
    cancel: CancellationToken,
) -> Result<ForgetReport> {
    let plan = PlanFile::load(&opts.plan_path).await?;
    let state = Arc::new(FileStateStore::open(&opts.state_path).await?);
    let graph = build_forget_graph(&plan, &state).await?;
    let before = state.addresses().await;

    let ctx = EvalContext::builder(Arc::new(config.provider_factory()))
        .changes(Arc::new(plan.diff_store()))
        .state(state.clone())
        .hook(Arc::new(LoggingHook))
        .cancel(cancel)
        .build();
    let parallelism = opts.parallelism.unwrap_or(config.walk.parallelism);
    let summary = Walker::new(Arc::new(ctx))
        .with_parallelism(parallelism)
        .walk(&graph, WalkOperation::Forget)
        .await?;

    let after = state.addresses().await;
    let forgotten: Vec<ResourceInstanceAddress> =
        before.into_iter().filter(|a| !after.contains(a)).collect();

    let persisted = if opts.dry_run {
        info!(forgotten = forgotten.len(), "dry run, state file left unchanged");
        None
    } else {
        Some(state.persist().await?)
    };

    Ok(ForgetReport {
        summary,
        forgotten,
        persisted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrawalk_core::Resource;

    #[test]
    fn provider_resolution_order() {
        let web = ResourceInstanceAddress::root(Resource::managed("aws_instance", "web"));
        let east = AbsProviderConfig::new("aws").with_alias("east");
        let west = AbsProviderConfig::new("aws").with_alias("west");

        assert_eq!(
            resolve_provider(&web, Some(&east), Some(&west)),
            Some(east.clone())
        );
        assert_eq!(resolve_provider(&web, None, Some(&west)), Some(west));
        assert_eq!(
            resolve_provider(&web, None, None),
            Some(AbsProviderConfig::new("hashicorp/aws"))
        );

        let ami = ResourceInstanceAddress::root(Resource::data("aws_ami", "ubuntu"));
        assert_eq!(resolve_provider(&ami, None, None), None);
        assert_eq!(resolve_provider(&ami, Some(&east), None), Some(east));
    }
}
