//! terrawalk graph - node execution protocol and the walk that drives it
//!
//! A walk visits every node of an already-built dependency graph. Each node
//! resolves its provider through the shared `EvalContext`, reads its planned
//! change and tracked state, fires hooks around the shared apply routine, and
//! reports problems as `Diagnostics` rather than failing the walk.

pub mod apply;
pub mod context;
pub mod hooks;
pub mod node;
pub mod nodes;
pub mod provider;
pub mod store;
pub mod walk;

pub use apply::{ApplyRequest, ApplyRoutine, ProviderApply, RepetitionData, ResourceConfig};
pub use context::{DiagnosticsSink, EvalContext, EvalContextBuilder};
pub use hooks::{Hook, HookAction, HookDispatcher, LoggingHook};
pub use node::{GraphNode, ProviderRequirement, ResourceInstanceBase};
pub use nodes::{ForgetResourceInstanceNode, ProviderEvalNode};
pub use provider::{
    ApplyResourceChangeRequest, Provider, ProviderCache, ProviderFactory, ProviderSchema,
    ResolvedProvider, ResourceSchema, StaticProvider, StaticProviderFactory,
};
pub use store::{
    DiffStore, FileStateStore, MemoryDiffStore, MemoryStateStore, StateFile, StateFileResource,
    StateStore,
};
pub use walk::{Graph, NodeId, WalkSummary, Walker, DEFAULT_PARALLELISM};
