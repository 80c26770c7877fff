use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use registry_core::registry::RepositoryStoreManager;
use registry_objectstore::{ObjectStore, S3Config};

use super::errors::{Error, Result};
use super::metadata::{PostgresConfig, PostgresMetadataPool};
use super::repositories::PgRepository;

#[derive(Clone, Deserialize)]
pub struct PgRepositoryConfig {
    postgres: PostgresConfig,
    s3: S3Config,
}

impl PgRepositoryConfig {
    pub async fn get_manager(&self) -> Result<PgRepositoryFactory> {
        Ok(PgRepositoryFactory {
            metadata: self.postgres.new_metadata().await?,
            objects: Arc::new(self.s3.new_objects().await?),
        })
    }
}

#[derive(Clone)]
pub struct PgRepositoryFactory {
    metadata: PostgresMetadataPool,
    objects: Arc<dyn ObjectStore>,
}

#[async_trait]
impl RepositoryStoreManager for PgRepositoryFactory {
    type RepositoryStore = PgRepository;
    type Error = Error;

    async fn get(&self, name: &str) -> Result<Option<Self::RepositoryStore>> {
        PgRepository::get(name, self.metadata.clone(), self.objects.clone()).await
    }

    async fn create(&self, name: &str) -> Result<Self::RepositoryStore> {
        Ok(
            PgRepository::get_or_insert(name, self.metadata.clone(), self.objects.clone())
                .await?,
        )
    }
}
