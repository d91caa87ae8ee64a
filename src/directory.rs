use async_trait::async_trait;
use moka::future::Cache;
use tracing::info;

use crate::error::Result;
use crate::model::attendance::WorkerId;
use crate::model::identity::WorkerProfile;
use crate::store::CentralHandle;
use crate::sync::ReferenceData;

const MAX_WORKERS: u64 = 50_000;
const WARMUP_BATCH: usize = 250;

/// Worker profiles for labelling events, loaded from the central store.
#[derive(Clone)]
pub struct WorkerDirectory {
    cache: Cache<WorkerId, WorkerProfile>,
    project_id: Option<i64>,
}

impl WorkerDirectory {
    pub fn new(project_id: Option<i64>) -> Self {
        Self {
            cache: Cache::builder().max_capacity(MAX_WORKERS).build(),
            project_id,
        }
    }

    pub async fn get(&self, worker_id: WorkerId) -> Option<WorkerProfile> {
        self.cache.get(&worker_id).await
    }

    /// Display label, falling back to the bare id for unknown workers.
    pub async fn label(&self, worker_id: WorkerId) -> String {
        match self.get(worker_id).await {
            Some(profile) => profile.label(),
            None => format!("worker #{worker_id}"),
        }
    }

    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Replace the cached profiles with the central store's current list.
    pub async fn load(&self, central: &CentralHandle) -> Result<usize> {
        let workers = central.list_workers(self.project_id).await?;

        self.cache.invalidate_all();
        for batch in workers.chunks(WARMUP_BATCH) {
            let inserts: Vec<_> = batch
                .iter()
                .map(|profile| self.cache.insert(profile.worker_id, profile.clone()))
                .collect();
            futures::future::join_all(inserts).await;
        }

        info!(
            count = workers.len(),
            project_id = ?self.project_id,
            "Worker directory loaded"
        );
        Ok(workers.len())
    }
}

#[async_trait]
impl ReferenceData for WorkerDirectory {
    fn name(&self) -> &'static str {
        "worker_directory"
    }

    async fn refresh(&self, central: &CentralHandle) -> Result<usize> {
        self.load(central).await
    }
}
