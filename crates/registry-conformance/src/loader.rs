use bytes::Bytes;
use bytes::BytesMut;
use futures::stream::TryStreamExt;
use hyper::body::Body;

use registry_core::registry::{
    BlobStore, ManifestRef, ManifestSpec, ManifestStore, RepositoryStore, RepositoryStoreManager,
};
use registry_core::OciDigest;

use super::errors::{Error, Result};
use super::{Image, Index};

/// Pushes and pulls synthetic [`Image`]/[`Index`] fixtures against any
/// [`RepositoryStoreManager`] implementation, independent of the HTTP layer. Used to exercise
/// distribution-spec storage semantics (manifest/blob referential integrity, tag resolution)
/// directly against a backend.
#[derive(Clone)]
pub struct RepositoryLoader<M: RepositoryStoreManager> {
    mgr: M,
}

impl<M: RepositoryStoreManager> RepositoryLoader<M> {
    pub fn new(mgr: M) -> Self {
        Self { mgr }
    }

    pub async fn get_or_create_repo(&self, name: &str) -> Result<M::RepositoryStore> {
        if let Some(repo) = self.mgr.get(name).await.map_err(|e| e.into())? {
            Ok(repo)
        } else {
            Ok(self.mgr.create(name).await.map_err(|e| e.into())?)
        }
    }

    fn repo_lookup_error(name: &str) -> Error {
        Error::RepositoryNotFound(name.to_string())
    }

    /// Push a single image's layers, config, and manifest. Returns the digest the manifest
    /// store calculated for the pushed manifest.
    pub async fn upload_image(&self, repo_name: &str, image: &Image) -> Result<OciDigest> {
        let repo_store = self.get_or_create_repo(repo_name).await?;
        let mut blob_store = repo_store.get_blob_store();

        for layer in &image.layers {
            tracing::info!("pushing image layer: {}", layer.descriptor.digest());
            let digest = OciDigest::try_from(layer.descriptor.digest().as_str())?;
            blob_store
                .put(
                    &digest,
                    layer.data.len() as u64,
                    Body::from(layer.data.clone()),
                )
                .await
                .map_err(|e| e.into())?;
        }

        let config_bytes = serde_json::to_vec(&image.config)?;
        let config_digest = OciDigest::try_from(image.manifest.config().digest().as_str())?;
        tracing::info!("pushing image config: {}", config_digest);
        blob_store
            .put(
                &config_digest,
                config_bytes.len() as u64,
                Body::from(config_bytes),
            )
            .await
            .map_err(|e| e.into())?;

        let mut manifest_store = repo_store.get_manifest_store();
        tracing::info!("pushing image manifest: {:?}", image.manifest_ref());
        let digest = manifest_store
            .put(
                &image.manifest_ref(),
                &ManifestSpec::Image(image.manifest.clone()),
                image.manifest_bytes.clone(),
            )
            .await
            .map_err(|e| e.into())?;

        Ok(digest)
    }

    pub async fn upload_images(&self, repo_name: &str, images: &[Image]) -> Result<()> {
        for image in images {
            self.upload_image(repo_name, image).await?;
        }
        Ok(())
    }

    /// Push every image referenced by an index, then the index manifest itself.
    pub async fn upload_index(&self, repo_name: &str, index: &Index) -> Result<OciDigest> {
        self.upload_images(repo_name, &index.manifests).await?;

        let repo_store = self.get_or_create_repo(repo_name).await?;
        let mut manifest_store = repo_store.get_manifest_store();
        tracing::info!("pushing index manifest: {:?}", index.manifest_ref());
        let digest = manifest_store
            .put(
                &index.manifest_ref(),
                &ManifestSpec::Index(index.index_manifest.clone()),
                index.manifest_bytes.clone(),
            )
            .await
            .map_err(|e| e.into())?;

        Ok(digest)
    }

    pub async fn upload_indices(&self, repo_name: &str, indices: &[Index]) -> Result<()> {
        for index in indices {
            self.upload_index(repo_name, index).await?;
        }
        Ok(())
    }

    /// Fetch the exact bytes stored for a manifest reference, as originally pushed.
    pub async fn pull_manifest_bytes(
        &self,
        repo_name: &str,
        manifest_ref: &ManifestRef,
    ) -> Result<Bytes> {
        let repo_store = self
            .mgr
            .get(repo_name)
            .await
            .map_err(|e| e.into())?
            .ok_or_else(|| Self::repo_lookup_error(repo_name))?;

        let manifest_store = repo_store.get_manifest_store();
        let (_, stream) = manifest_store
            .get(manifest_ref)
            .await
            .map_err(|e| e.into())?
            .ok_or_else(|| Error::ManifestNotFound(format!("{manifest_ref:?}")))?;

        let bytes: BytesMut = stream
            .try_collect()
            .await
            .map_err(|e| Error::StreamCollectFailed(format!("{e:?}")))?;

        Ok(bytes.freeze())
    }

    /// Fetch the exact bytes stored for a blob digest (image config or layer).
    pub async fn pull_blob_bytes(&self, repo_name: &str, digest: &OciDigest) -> Result<Bytes> {
        let repo_store = self
            .mgr
            .get(repo_name)
            .await
            .map_err(|e| e.into())?
            .ok_or_else(|| Self::repo_lookup_error(repo_name))?;

        let blob_store = repo_store.get_blob_store();
        let (_, stream) = blob_store
            .get(digest)
            .await
            .map_err(|e| e.into())?
            .ok_or_else(|| Error::BlobNotFound(String::from(digest)))?;

        let bytes: BytesMut = stream
            .try_collect()
            .await
            .map_err(|e| Error::StreamCollectFailed(format!("{e:?}")))?;

        Ok(bytes.freeze())
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;

    use registry_storage_memory::MemoryRepositoryFactory;

    use super::super::testdata;
    use super::*;

    #[tokio::test]
    async fn push_and_pull_image_round_trips_manifest_and_layers() -> Result<()> {
        let loader = RepositoryLoader::new(MemoryRepositoryFactory::new());

        let images = testdata::BASIC_IMAGES.clone();
        loader.upload_images("testrepo", &images).await?;

        for image in &images {
            let manifest_ref = image.manifest_ref();
            let pulled_manifest = loader
                .pull_manifest_bytes("testrepo", &manifest_ref)
                .await?;
            assert_eq!(pulled_manifest, image.manifest_bytes);

            for layer in &image.layers {
                let digest = OciDigest::try_from(layer.descriptor.digest().as_str())?;
                let pulled_layer = loader.pull_blob_bytes("testrepo", &digest).await?;
                assert_eq!(pulled_layer, layer.data);
            }
        }

        Ok(())
    }

    #[tokio::test]
    async fn push_and_pull_index_round_trips_manifest() -> Result<()> {
        let loader = RepositoryLoader::new(MemoryRepositoryFactory::new());

        let indices = testdata::BASIC_INDEXES.clone();
        loader.upload_indices("testrepo", &indices).await?;

        for index in &indices {
            let manifest_ref = index.manifest_ref();
            let pulled = loader
                .pull_manifest_bytes("testrepo", &manifest_ref)
                .await?;
            assert_eq!(pulled, index.manifest_bytes);
        }

        Ok(())
    }

    #[tokio::test]
    async fn pull_from_unknown_repository_is_an_error() -> Result<()> {
        let loader = RepositoryLoader::new(MemoryRepositoryFactory::new());
        let manifest_ref = ManifestRef::Tag("latest".to_string());

        let err = loader
            .pull_manifest_bytes("does-not-exist", &manifest_ref)
            .await
            .expect_err("expected repository lookup to fail");
        assert!(matches!(err, Error::RepositoryNotFound(_)));

        Ok(())
    }
}
