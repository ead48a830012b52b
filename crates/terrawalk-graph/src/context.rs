//! Per-walk execution context shared by every node.
//!
//! The context is passed by reference into `GraphNode::execute`; nodes never
//! reach walk state any other way. Its sub-components are safe to use from
//! concurrently running nodes:
//! - `ProviderCache`: DashMap of once-cells, one initialization per address
//! - `DiffStore` / `StateStore`: per-address, serialized by the store
//! - `HookDispatcher`: immutable list of hooks
//! - `DiagnosticsSink`: mutex-guarded, append-only

use crate::apply::{ApplyRoutine, ProviderApply};
use crate::hooks::{Hook, HookDispatcher};
use crate::provider::{ProviderCache, ProviderFactory, ResolvedProvider};
use crate::store::{DiffStore, MemoryDiffStore, MemoryStateStore, StateStore};
use std::sync::{Arc, Mutex};
use terrawalk_core::{AbsProviderConfig, Diagnostics, Result};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Walk-wide append-only diagnostics collection.
#[derive(Default)]
pub struct DiagnosticsSink {
    inner: Mutex<Diagnostics>,
}

impl DiagnosticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, diags: impl Into<Diagnostics>) {
        let diags = diags.into();
        if diags.is_empty() {
            return;
        }
        self.lock().append(diags);
    }

    pub fn has_errors(&self) -> bool {
        self.lock().has_errors()
    }

    pub fn snapshot(&self) -> Diagnostics {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Diagnostics> {
        // Appends cannot leave the collection half-written, so a poisoned
        // lock still holds consistent data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct EvalContext {
    walk_id: Uuid,
    providers: ProviderCache,
    changes: Arc<dyn DiffStore>,
    state: Arc<dyn StateStore>,
    hooks: HookDispatcher,
    applier: Arc<dyn ApplyRoutine>,
    diagnostics: DiagnosticsSink,
    cancel: CancellationToken,
}

impl EvalContext {
    pub fn builder(factory: Arc<dyn ProviderFactory>) -> EvalContextBuilder {
        EvalContextBuilder::new(factory)
    }

    pub fn walk_id(&self) -> Uuid {
        self.walk_id
    }

    /// Resolve (starting on first use) the provider configured at `addr`.
    pub async fn provider(&self, addr: &AbsProviderConfig) -> Result<ResolvedProvider> {
        self.providers.resolve(addr).await
    }

    pub fn providers(&self) -> &ProviderCache {
        &self.providers
    }

    pub fn changes(&self) -> &dyn DiffStore {
        self.changes.as_ref()
    }

    pub fn state(&self) -> &dyn StateStore {
        self.state.as_ref()
    }

    pub fn hooks(&self) -> &HookDispatcher {
        &self.hooks
    }

    pub fn applier(&self) -> &dyn ApplyRoutine {
        self.applier.as_ref()
    }

    pub fn diagnostics(&self) -> &DiagnosticsSink {
        &self.diagnostics
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the walk has been asked to stop.
    pub fn stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct EvalContextBuilder {
    factory: Arc<dyn ProviderFactory>,
    changes: Option<Arc<dyn DiffStore>>,
    state: Option<Arc<dyn StateStore>>,
    hooks: HookDispatcher,
    applier: Option<Arc<dyn ApplyRoutine>>,
    cancel: Option<CancellationToken>,
}

impl EvalContextBuilder {
    fn new(factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            factory,
            changes: None,
            state: None,
            hooks: HookDispatcher::new(),
            applier: None,
            cancel: None,
        }
    }

    pub fn changes(mut self, changes: Arc<dyn DiffStore>) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn state(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn applier(mut self, applier: Arc<dyn ApplyRoutine>) -> Self {
        self.applier = Some(applier);
        self
    }

    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> EvalContext {
        EvalContext {
            walk_id: Uuid::new_v4(),
            providers: ProviderCache::new(self.factory),
            changes: self
                .changes
                .unwrap_or_else(|| Arc::new(MemoryDiffStore::new())),
            state: self
                .state
                .unwrap_or_else(|| Arc::new(MemoryStateStore::new())),
            hooks: self.hooks,
            applier: self.applier.unwrap_or_else(|| Arc::new(ProviderApply)),
            diagnostics: DiagnosticsSink::new(),
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}
