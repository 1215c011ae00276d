//! Keyspace selection by temporal bucket.
//!
//! The bucket is an explicit argument on every call; there is no
//! process-wide "current keyspace".

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chron_config::StoreConfig;
use chron_core::bucket::TemporalBucket;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::local::LocalStore;
use crate::memory::MemoryStore;
use crate::store::AuditStore;

/// Hands out the store for a temporal bucket.
pub trait StoreProvider: Send + Sync {
    type Store: AuditStore + 'static;

    fn for_bucket(
        &self,
        bucket: &TemporalBucket,
    ) -> impl Future<Output = Result<Arc<Self::Store>, StoreError>> + Send;
}

/// One libSQL file per bucket under the configured data directory.
/// Opened keyspaces are cached.
#[derive(Debug)]
pub struct LocalStoreProvider {
    data_dir: PathBuf,
    config: StoreConfig,
    open: Mutex<HashMap<TemporalBucket, Arc<LocalStore>>>,
}

impl LocalStoreProvider {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            data_dir: PathBuf::from(&config.data_dir),
            config,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the keyspace file for `bucket`.
    #[must_use]
    pub fn keyspace_path(&self, bucket: &TemporalBucket) -> PathBuf {
        self.data_dir.join(self.config.keyspace_file(bucket.as_str()))
    }
}

impl StoreProvider for LocalStoreProvider {
    type Store = LocalStore;

    async fn for_bucket(&self, bucket: &TemporalBucket) -> Result<Arc<LocalStore>, StoreError> {
        let mut open = self.open.lock().await;
        if let Some(store) = open.get(bucket) {
            return Ok(Arc::clone(store));
        }
        std::fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::Other(e.into()))?;
        let path = self.keyspace_path(bucket);
        let path = path
            .to_str()
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("non UTF-8 keyspace path")))?
            .to_string();
        tracing::debug!(bucket = %bucket, path, "opening keyspace");
        let store = Arc::new(LocalStore::open(&path).await?);
        open.insert(bucket.clone(), Arc::clone(&store));
        Ok(store)
    }
}

/// In-memory keyspaces, one per bucket.
#[derive(Debug, Default)]
pub struct MemoryStoreProvider {
    open: Mutex<HashMap<TemporalBucket, Arc<MemoryStore>>>,
}

impl MemoryStoreProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for MemoryStoreProvider {
    type Store = MemoryStore;

    async fn for_bucket(&self, bucket: &TemporalBucket) -> Result<Arc<MemoryStore>, StoreError> {
        let mut open = self.open.lock().await;
        Ok(Arc::clone(open.entry(bucket.clone()).or_default()))
    }
}
