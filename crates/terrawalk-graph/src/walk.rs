//! Reference walk driver.
//!
//! Runs nodes in dependency order with bounded parallelism:
//! - a node starts only after every node it depends on has finished
//! - a provider node's provider is started and its schema fetched before
//!   the node counts as finished
//! - dependents of a failed or skipped node are skipped, not run
//! - after cancellation no new node starts; running nodes wind down on
//!   their own and report the cancellation themselves
//!
//! Every node's diagnostics land in the context's `DiagnosticsSink`.

use crate::context::EvalContext;
use crate::node::GraphNode;
use futures::FutureExt;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use terrawalk_core::{Diagnostic, Diagnostics, Error, Result, WalkOperation};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const DEFAULT_PARALLELISM: usize = 10;

pub type NodeId = NodeIndex;

/// Nodes plus dependency edges. An edge runs from a dependency to the node
/// that depends on it.
#[derive(Default)]
pub struct Graph {
    inner: DiGraph<Arc<dyn GraphNode>, ()>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Arc<dyn GraphNode>) -> NodeId {
        self.inner.add_node(node)
    }

    /// Record that `dependent` must run after `dependency`. Both ids must come
    /// from this graph.
    pub fn connect(&mut self, dependent: NodeId, dependency: NodeId) -> Result<()> {
        for id in [dependent, dependency] {
            if self.inner.node_weight(id).is_none() {
                return Err(Error::Internal(format!(
                    "no node {} in graph of {}",
                    id.index(),
                    self.inner.node_count()
                )));
            }
        }
        if dependent != dependency {
            self.inner.update_edge(dependency, dependent, ());
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Arc<dyn GraphNode>> {
        self.inner.node_weight(id)
    }

    pub fn dependencies(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.neighbors_directed(id, Direction::Incoming)
    }

    pub fn dependents(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.neighbors_directed(id, Direction::Outgoing)
    }

    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.inner
            .node_indices()
            .find(|&id| self.inner[id].name() == name)
    }

    /// Topological order, or the name of a node caught in a cycle.
    pub fn topo_order(&self) -> Result<Vec<NodeId>> {
        petgraph::algo::toposort(&self.inner, None)
            .map_err(|cycle| Error::Cycle(self.inner[cycle.node_id()].name()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Ok,
    Failed,
    Skipped,
}

/// What happened during one walk.
#[derive(Clone, Debug, Default)]
pub struct WalkSummary {
    pub diagnostics: Diagnostics,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl WalkSummary {
    pub fn success(&self) -> bool {
        !self.diagnostics.has_errors() && !self.cancelled
    }
}

struct Schedule {
    pending: HashMap<NodeId, usize>,
    blocked: HashSet<NodeId>,
    ready: VecDeque<NodeId>,
}

impl Schedule {
    fn new(graph: &Graph) -> Self {
        let pending: HashMap<NodeId, usize> = graph
            .inner
            .node_indices()
            .map(|id| (id, graph.dependencies(id).count()))
            .collect();
        let ready = graph
            .inner
            .node_indices()
            .filter(|id| pending[id] == 0)
            .collect();
        Self {
            pending,
            blocked: HashSet::new(),
            ready,
        }
    }

    /// Record that `id` finished and release dependents whose last
    /// dependency it was.
    fn settle(&mut self, graph: &Graph, id: NodeId, outcome: Outcome, summary: &mut WalkSummary) {
        match outcome {
            Outcome::Ok => summary.completed += 1,
            Outcome::Failed => summary.failed += 1,
            Outcome::Skipped => summary.skipped += 1,
        }
        for next in graph.dependents(id) {
            if outcome != Outcome::Ok {
                self.blocked.insert(next);
            }
            if let Some(pending) = self.pending.get_mut(&next) {
                *pending -= 1;
                if *pending == 0 {
                    self.ready.push_back(next);
                }
            }
        }
    }
}

/// Run one node. A provider node first has its provider started and schema
/// fetched, so everything ordered after it finds the provider ready.
async fn visit(node: &dyn GraphNode, ctx: &EvalContext, op: WalkOperation) -> Diagnostics {
    if let Some(addr) = node.provider_addr() {
        if let Err(e) = ctx.provider(addr).await {
            return Diagnostic::from(e).with_address(addr).into();
        }
    }
    node.execute(ctx, op).await
}

pub struct Walker {
    ctx: Arc<EvalContext>,
    parallelism: usize,
}

impl Walker {
    pub fn new(ctx: Arc<EvalContext>) -> Self {
        Self {
            ctx,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn context(&self) -> &Arc<EvalContext> {
        &self.ctx
    }

    pub async fn walk(&self, graph: &Graph, op: WalkOperation) -> Result<WalkSummary> {
        graph.topo_order()?;

        let walk_id = self.ctx.walk_id();
        info!(%walk_id, %op, nodes = graph.len(), parallelism = self.parallelism, "walk starting");

        let mut sched = Schedule::new(graph);
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks: JoinSet<(NodeId, Diagnostics)> = JoinSet::new();
        let mut summary = WalkSummary::default();

        loop {
            while let Some(id) = sched.ready.pop_front() {
                let node = graph.inner[id].clone();
                if sched.blocked.contains(&id) || self.ctx.stopped() {
                    debug!(node = %node.name(), "skipped");
                    sched.settle(graph, id, Outcome::Skipped, &mut summary);
                    continue;
                }
                let ctx = self.ctx.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let name = node.name();
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            let err = Error::Internal("walk semaphore closed".into());
                            return (id, Diagnostics::from(err));
                        }
                    };
                    debug!(node = %name, "visiting");
                    let diags = AssertUnwindSafe(visit(node.as_ref(), &ctx, op))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            Diagnostics::from(Diagnostic::error(format!(
                                "internal error: node {} panicked",
                                name
                            )))
                        });
                    (id, diags)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (id, diags) = match joined {
                Ok(done) => done,
                Err(e) => return Err(Error::Internal(format!("node task failed: {}", e))),
            };
            let outcome = if diags.has_errors() {
                warn!(node = %graph.inner[id].name(), errors = diags.errors().count(), "node failed");
                Outcome::Failed
            } else {
                Outcome::Ok
            };
            self.ctx.diagnostics().append(diags);
            sched.settle(graph, id, outcome, &mut summary);
        }

        if self.ctx.stopped() {
            summary.cancelled = true;
            self.ctx.diagnostics().append(
                Diagnostic::error("walk cancelled")
                    .with_detail(format!("{} node(s) did not run", summary.skipped)),
            );
        }
        summary.diagnostics = self.ctx.diagnostics().snapshot();

        info!(
            %walk_id,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "walk finished"
        );
        Ok(summary)
    }
}
