use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use registry_core::registry::{RepositoryStore, RepositoryStoreManager};

use super::blobs::MemoryBlobStore;
use super::errors::{Error, Result};
use super::manifests::MemoryManifestStore;
use super::state::RepositoryData;
use super::upload_sessions::MemorySessionStore;

/// A single-process `RepositoryStoreManager` backed by an in-memory map of repository name to
/// its own lock-guarded state. No bytes ever leave the process; intended for local development
/// and conformance testing, not production use.
#[derive(Clone, Default)]
pub struct MemoryRepositoryFactory {
    repositories: Arc<RwLock<HashMap<String, Arc<RwLock<RepositoryData>>>>>,
}

impl MemoryRepositoryFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryStoreManager for MemoryRepositoryFactory {
    type RepositoryStore = MemoryRepository;
    type Error = Error;

    async fn get(&self, name: &str) -> Result<Option<Self::RepositoryStore>> {
        let repositories = self.repositories.read()?;
        Ok(repositories.get(name).map(|data| MemoryRepository {
            name: name.to_string(),
            data: data.clone(),
        }))
    }

    async fn create(&self, name: &str) -> Result<Self::RepositoryStore> {
        let mut repositories = self.repositories.write()?;
        let data = repositories
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(RepositoryData::new())))
            .clone();
        Ok(MemoryRepository {
            name: name.to_string(),
            data,
        })
    }
}

#[derive(Clone)]
pub struct MemoryRepository {
    name: String,
    data: Arc<RwLock<RepositoryData>>,
}

#[async_trait]
impl RepositoryStore for MemoryRepository {
    type ManifestStore = MemoryManifestStore;
    type BlobStore = MemoryBlobStore;
    type UploadSessionStore = MemorySessionStore;
    type Error = Error;

    fn name(&self) -> &str {
        &self.name
    }

    fn get_manifest_store(&self) -> Self::ManifestStore {
        MemoryManifestStore::new(self.data.clone(), self.name.clone())
    }

    fn get_blob_store(&self) -> Self::BlobStore {
        MemoryBlobStore::new(self.data.clone())
    }

    fn get_upload_session_store(&self) -> Self::UploadSessionStore {
        MemorySessionStore::new(self.data.clone())
    }
}
