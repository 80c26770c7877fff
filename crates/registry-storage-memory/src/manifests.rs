use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use oci_spec::distribution::{TagList, TagListBuilder};

use registry_core::registry::{ManifestRef, ManifestSpec, ManifestStore};
use registry_core::Error as CoreError;
use registry_core::OciDigest;

use super::errors::{Error, Result};
use super::state::{RepositoryData, StoredManifest};
use super::types::Manifest;

type TryBytes = std::result::Result<Bytes, Box<dyn std::error::Error + Send + Sync>>;

pub struct MemoryManifestStore {
    data: Arc<RwLock<RepositoryData>>,
    repository_name: String,
}

impl MemoryManifestStore {
    pub(crate) fn new(data: Arc<RwLock<RepositoryData>>, repository_name: String) -> Self {
        Self {
            data,
            repository_name,
        }
    }
}

fn resolve<'a>(data: &'a RepositoryData, key: &ManifestRef) -> Option<&'a StoredManifest> {
    match key {
        ManifestRef::Digest(d) => data.manifests.get(&String::from(d)),
        ManifestRef::Tag(t) => {
            let digest = data.tags.get(t)?;
            data.manifests.get(digest)
        }
    }
}

#[async_trait]
impl ManifestStore for MemoryManifestStore {
    type Manifest = Manifest;
    type Error = Error;
    type ManifestBody = BoxStream<'static, TryBytes>;

    async fn head(&self, key: &ManifestRef) -> Result<Option<Self::Manifest>> {
        let data = self.data.read()?;
        Ok(resolve(&data, key).map(|m| m.manifest.clone()))
    }

    async fn get(&self, key: &ManifestRef) -> Result<Option<(Self::Manifest, Self::ManifestBody)>> {
        let data = self.data.read()?;
        Ok(resolve(&data, key).map(|stored| {
            let bytes = stored.bytes.clone();
            let body: Self::ManifestBody = stream::once(async move { Ok(bytes) }).boxed();
            (stored.manifest.clone(), body)
        }))
    }

    async fn put(
        &mut self,
        key: &ManifestRef,
        spec: &ManifestSpec,
        bytes: Bytes,
    ) -> Result<OciDigest> {
        let calculated_digest: OciDigest = bytes.as_ref().try_into()?;
        let digest_string = String::from(&calculated_digest);

        let mut data = self.data.write()?;

        match spec {
            ManifestSpec::Image(img) => {
                let config_digest = img.config().digest().as_str();
                if !data.blobs.contains_key(config_digest) {
                    let msg = format!("blob for config {config_digest} not found in repository");
                    tracing::warn!("{msg}");
                    return Err(CoreError::ManifestBlobUnknown(Some(msg)).into());
                }
                for layer in img.layers() {
                    let digest = layer.digest().as_str();
                    if !data.blobs.contains_key(digest) {
                        let msg = format!("blob for layer {digest} not found in repository");
                        tracing::warn!("{msg}");
                        return Err(CoreError::ManifestBlobUnknown(Some(msg)).into());
                    }
                }
            }
            ManifestSpec::Index(ind) => {
                for child in ind.manifests() {
                    let digest = child.digest().as_str();
                    if !data.manifests.contains_key(digest) {
                        let msg = format!("manifest {digest} not found in repository");
                        tracing::warn!("{msg}");
                        return Err(CoreError::ManifestUnknown(Some(msg)).into());
                    }
                }
            }
        }

        data.manifests.entry(digest_string.clone()).or_insert_with(|| StoredManifest {
            bytes: bytes.clone(),
            manifest: Manifest {
                digest: calculated_digest.clone(),
                media_type: spec.media_type(),
                byte_size: bytes.len() as u64,
            },
        });

        if let ManifestRef::Tag(t) = key {
            data.tags.insert(t.clone(), digest_string);
        }

        Ok(calculated_digest)
    }

    async fn delete(&mut self, key: &ManifestRef) -> Result<()> {
        let digest_string = match key {
            ManifestRef::Digest(d) => String::from(d),
            ManifestRef::Tag(_) => {
                return Err(CoreError::ManifestInvalid(Some(
                    "manifests can only be deleted by digest".to_string(),
                ))
                .into())
            }
        };

        let mut data = self.data.write()?;

        if data.manifests.remove(&digest_string).is_none() {
            return Err(CoreError::ManifestUnknown(None).into());
        }
        data.tags.retain(|_, v| v != &digest_string);
        Ok(())
    }

    async fn get_tags(&self, n: Option<i64>, last: Option<String>) -> Result<TagList> {
        let data = self.data.read()?;
        let mut names: Vec<String> = data.tags.keys().cloned().collect();
        names.sort();
        if let Some(last) = last {
            names.retain(|name| *name > last);
        }
        if let Some(n) = n {
            names.truncate(n as usize);
        }

        let taglist = TagListBuilder::default()
            .name(self.repository_name.as_str())
            .tags(names)
            .build()
            .map_err(|e| CoreError::ManifestInvalid(Some(e.to_string())))?;

        Ok(taglist)
    }
}
