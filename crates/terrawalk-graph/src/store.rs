//! Planned-change and tracked-state stores.
//!
//! Nodes only see the `DiffStore` and `StateStore` traits. The in-memory
//! stores back tests and single-process walks; `FileStateStore` adds a JSON
//! snapshot on disk that is rewritten on `persist()`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use terrawalk_core::{
    AbsProviderConfig, ResourceInstanceAddress, ResourceInstanceChange, ResourceInstanceObject,
    Result, StateScope,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Read side of the plan produced by an earlier planning phase.
#[async_trait]
pub trait DiffStore: Send + Sync {
    async fn read_planned_change(
        &self,
        addr: &ResourceInstanceAddress,
    ) -> Result<Option<Arc<ResourceInstanceChange>>>;
}

/// Tracked state, addressed per resource instance.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the working-state object at `addr`.
    async fn read(&self, addr: &ResourceInstanceAddress) -> Result<Option<ResourceInstanceObject>>;

    /// Write `obj` at `addr` in `scope`. `None` removes the address.
    async fn write(
        &self,
        addr: &ResourceInstanceAddress,
        obj: Option<ResourceInstanceObject>,
        scope: StateScope,
    ) -> Result<()>;

    /// Every address present in working state, in address order.
    async fn addresses(&self) -> Vec<ResourceInstanceAddress>;
}

// ---------------------------------------------------------------------------
// In-memory diff store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDiffStore {
    changes: HashMap<ResourceInstanceAddress, Arc<ResourceInstanceChange>>,
}

impl MemoryDiffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of changes. A later change for the same address
    /// replaces an earlier one, so at most one change is active per address.
    pub fn from_changes(changes: impl IntoIterator<Item = ResourceInstanceChange>) -> Self {
        let mut store = Self::new();
        for change in changes {
            store.insert(change);
        }
        store
    }

    pub fn insert(&mut self, change: ResourceInstanceChange) {
        self.changes.insert(change.addr.clone(), Arc::new(change));
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[async_trait]
impl DiffStore for MemoryDiffStore {
    async fn read_planned_change(
        &self,
        addr: &ResourceInstanceAddress,
    ) -> Result<Option<Arc<ResourceInstanceChange>>> {
        Ok(self.changes.get(addr).cloned())
    }
}

// ---------------------------------------------------------------------------
// In-memory state store
// ---------------------------------------------------------------------------

type ScopeMap = BTreeMap<ResourceInstanceAddress, ResourceInstanceObject>;

#[derive(Default)]
pub struct MemoryStateStore {
    working: RwLock<ScopeMap>,
    refresh: RwLock<ScopeMap>,
    prev_run: RwLock<ScopeMap>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed working state, and the refresh and prev-run snapshots with it.
    pub fn from_objects(
        objects: impl IntoIterator<Item = (ResourceInstanceAddress, ResourceInstanceObject)>,
    ) -> Self {
        let map: ScopeMap = objects.into_iter().collect();
        Self {
            working: RwLock::new(map.clone()),
            refresh: RwLock::new(map.clone()),
            prev_run: RwLock::new(map),
        }
    }

    fn scope(&self, scope: StateScope) -> &RwLock<ScopeMap> {
        match scope {
            StateScope::Working => &self.working,
            StateScope::Refresh => &self.refresh,
            StateScope::PrevRun => &self.prev_run,
        }
    }

    pub async fn read_scope(
        &self,
        addr: &ResourceInstanceAddress,
        scope: StateScope,
    ) -> Option<ResourceInstanceObject> {
        self.scope(scope).read().await.get(addr).cloned()
    }

    pub async fn snapshot(&self, scope: StateScope) -> Vec<(ResourceInstanceAddress, ResourceInstanceObject)> {
        self.scope(scope)
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.working.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.working.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self, addr: &ResourceInstanceAddress) -> Result<Option<ResourceInstanceObject>> {
        Ok(self.read_scope(addr, StateScope::Working).await)
    }

    async fn write(
        &self,
        addr: &ResourceInstanceAddress,
        obj: Option<ResourceInstanceObject>,
        scope: StateScope,
    ) -> Result<()> {
        let mut map = self.scope(scope).write().await;
        match obj {
            Some(obj) => {
                map.insert(addr.clone(), obj);
            }
            None => {
                map.remove(addr);
            }
        }
        Ok(())
    }

    async fn addresses(&self) -> Vec<ResourceInstanceAddress> {
        self.working.read().await.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// JSON file state store
// ---------------------------------------------------------------------------

pub const STATE_FORMAT_VERSION: u32 = 1;

/// One tracked resource instance as it appears in the state file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateFileResource {
    pub addr: ResourceInstanceAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AbsProviderConfig>,
    #[serde(flatten)]
    pub object: ResourceInstanceObject,
}

/// On-disk state snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    pub version: u32,
    pub serial: u64,
    pub lineage: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resources: Vec<StateFileResource>,
}

impl StateFile {
    pub fn empty() -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            serial: 0,
            lineage: Uuid::new_v4(),
            written_at: None,
            resources: Vec::new(),
        }
    }
}

struct FileMeta {
    serial: u64,
    lineage: Uuid,
}

/// State store backed by a JSON file. Reads and writes go to memory;
/// `persist()` serializes working state back to disk.
pub struct FileStateStore {
    path: PathBuf,
    inner: MemoryStateStore,
    providers: RwLock<HashMap<ResourceInstanceAddress, AbsProviderConfig>>,
    meta: Mutex<FileMeta>,
}

impl FileStateStore {
    /// Open `path`, starting from an empty state with a fresh lineage if the
    /// file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<StateFile>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state at {}, starting empty", path.display());
                StateFile::empty()
            }
            Err(e) => return Err(e.into()),
        };
        debug!(
            path = %path.display(),
            serial = file.serial,
            resources = file.resources.len(),
            "state loaded"
        );

        let mut providers = HashMap::new();
        let mut objects = Vec::with_capacity(file.resources.len());
        for res in file.resources {
            if let Some(p) = res.provider {
                providers.insert(res.addr.clone(), p);
            }
            objects.push((res.addr, res.object));
        }

        Ok(Self {
            path,
            inner: MemoryStateStore::from_objects(objects),
            providers: RwLock::new(providers),
            meta: Mutex::new(FileMeta {
                serial: file.serial,
                lineage: file.lineage,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Provider configuration recorded for `addr` in the state file.
    pub async fn stored_provider(&self, addr: &ResourceInstanceAddress) -> Option<AbsProviderConfig> {
        self.providers.read().await.get(addr).cloned()
    }

    pub async fn resources(&self) -> Vec<StateFileResource> {
        let providers = self.providers.read().await;
        self.inner
            .snapshot(StateScope::Working)
            .await
            .into_iter()
            .map(|(addr, object)| StateFileResource {
                provider: providers.get(&addr).cloned(),
                addr,
                object,
            })
            .collect()
    }

    pub async fn serial(&self) -> u64 {
        self.meta.lock().await.serial
    }

    /// Write working state to disk, bumping the serial. Concurrent calls are
    /// serialized; the file is replaced atomically via a temp file.
    pub async fn persist(&self) -> Result<StateFile> {
        let mut meta = self.meta.lock().await;
        let snapshot = StateFile {
            version: STATE_FORMAT_VERSION,
            serial: meta.serial + 1,
            lineage: meta.lineage,
            written_at: Some(Utc::now()),
            resources: self.resources().await,
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        meta.serial = snapshot.serial;
        info!(
            path = %self.path.display(),
            serial = snapshot.serial,
            resources = snapshot.resources.len(),
            "state persisted"
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self, addr: &ResourceInstanceAddress) -> Result<Option<ResourceInstanceObject>> {
        self.inner.read(addr).await
    }

    async fn write(
        &self,
        addr: &ResourceInstanceAddress,
        obj: Option<ResourceInstanceObject>,
        scope: StateScope,
    ) -> Result<()> {
        if scope == StateScope::Working && obj.is_none() {
            self.providers.write().await.remove(addr);
        }
        self.inner.write(addr, obj, scope).await
    }

    async fn addresses(&self) -> Vec<ResourceInstanceAddress> {
        self.inner.addresses().await
    }
}
