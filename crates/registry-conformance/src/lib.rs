//! Builders for synthetic OCI images and indices, plus a generic push/pull harness
//! ([`loader::RepositoryLoader`]) usable against any [`registry_core::registry::RepositoryStoreManager`]
//! implementation. Intended for exercising distribution-spec semantics against
//! `registry_storage_memory` in unit/integration tests without standing up Postgres or S3.
//!
//! The `http` test module drives the same semantics through the actual HTTP surface, assembling
//! `registry_http`'s router over the in-memory adapter and exercising it with
//! `tower::ServiceExt::oneshot`.

use bytes::Bytes;
use derive_builder::Builder;
use oci_spec::image::{
    Descriptor, DescriptorBuilder, History, ImageConfiguration, ImageIndex, ImageIndexBuilder,
    ImageManifest, ImageManifestBuilder, MediaType,
};

use registry_core::registry::ManifestRef;
use registry_core::OciDigest;

mod errors;
pub use errors::{Error, Result};

pub mod loader;
pub mod testdata;

#[cfg(test)]
mod http;

#[derive(Builder, Clone)]
#[builder(build_fn(skip))]
pub struct Layer {
    pub data: Bytes,
    pub history: Option<History>,

    #[builder(setter(skip))]
    pub descriptor: Descriptor,
}

impl LayerBuilder {
    pub fn build(self) -> Result<Layer> {
        let data = self.data.ok_or(Error::LayerBuilderError(
            "must include data to construct Layer".to_string(),
        ))?;
        let digest = OciDigest::try_from(data.as_ref())
            .map_err(|e| Error::LayerBuilderError(format!("failed to digest layer data: {e}")))?;
        let descriptor = DescriptorBuilder::default()
            .media_type(MediaType::ImageLayer)
            .digest(digest)
            .size(data.len() as i64)
            .build()
            .expect("must set all required fields for descriptor");
        Ok(Layer {
            data,
            descriptor,
            history: self.history.flatten(),
        })
    }
}

#[derive(Builder, Clone)]
#[builder(build_fn(skip))]
pub struct Image {
    pub config: ImageConfiguration,
    pub layers: Vec<Layer>,

    // artifact_type and subject are duplicated in the ImageConfiguration, but put here for the
    // sake of generating a builder method to allow users to specify them for the ImageConfiguring
    // when building an image.
    #[allow(dead_code)]
    artifact_type: Option<MediaType>,
    #[allow(dead_code)]
    subject: Option<Descriptor>,

    /// When set, [`Image::manifest_ref`] resolves to this tag instead of the manifest's digest.
    pub tag: Option<String>,

    #[builder(setter(skip))]
    pub manifest: ImageManifest,

    #[builder(setter(skip))]
    pub manifest_bytes: Bytes,

    #[builder(setter(skip))]
    pub digest: OciDigest,
}

impl ImageBuilder {
    pub fn build(self) -> Result<Image> {
        let config = self.config.ok_or(Error::ImageBuilderError(
            "must include image configuration to construct image".to_string(),
        ))?;
        let config_bytes = serde_json::to_vec(&config)?;
        let config_digest = OciDigest::try_from(config_bytes.as_slice()).map_err(|e| {
            Error::ImageBuilderError(format!("failed to digest image configuration: {e}"))
        })?;
        let config_descriptor = DescriptorBuilder::default()
            .media_type(MediaType::ImageManifest)
            .digest(config_digest)
            .size(config_bytes.len() as i64)
            .build()
            .expect("must set all required fields for descriptor");

        let layers = self.layers.unwrap_or_else(Vec::new);
        let layer_descriptors = layers
            .iter()
            .map(|l| l.descriptor.clone())
            .collect::<Vec<Descriptor>>();

        let artifact_type = self.artifact_type.flatten();
        let subject = self.subject.flatten();

        let mut manifest_builder = ImageManifestBuilder::default()
            .schema_version(2u32)
            .media_type(MediaType::ImageManifest)
            .layers(layer_descriptors)
            .config(config_descriptor);

        if let Some(ref artifact_type) = artifact_type {
            manifest_builder = manifest_builder.artifact_type(artifact_type.clone());
        }

        if let Some(ref subject) = subject {
            manifest_builder = manifest_builder.subject(subject.clone());
        }

        let manifest = manifest_builder
            .build()
            .expect("must set all required fields for image manifest");
        let manifest_bytes = Bytes::from(serde_json::to_vec(&manifest)?);
        let digest = OciDigest::try_from(manifest_bytes.as_ref()).map_err(|e| {
            Error::ImageBuilderError(format!("failed to digest image manifest: {e}"))
        })?;

        Ok(Image {
            config,
            manifest,
            manifest_bytes,
            digest,
            layers,
            artifact_type,
            subject,
            tag: self.tag.flatten(),
        })
    }
}

impl Image {
    /// The [`ManifestRef`] this image should be pushed/pulled under: its tag if one was set on
    /// the builder, otherwise the digest of its serialized manifest.
    pub fn manifest_ref(&self) -> ManifestRef {
        match &self.tag {
            Some(tag) => ManifestRef::Tag(tag.clone()),
            None => ManifestRef::Digest(self.digest.clone()),
        }
    }

    /// A [`Descriptor`] referencing this image's manifest, suitable for inclusion in an
    /// [`ImageIndex`]'s `manifests` list.
    pub fn descriptor(&self) -> Descriptor {
        DescriptorBuilder::default()
            .media_type(MediaType::ImageManifest)
            .digest(self.digest.clone())
            .size(self.manifest_bytes.len() as i64)
            .build()
            .expect("must set all required fields for descriptor")
    }
}

#[derive(Builder, Clone)]
#[builder(build_fn(skip))]
pub struct Index {
    pub manifests: Vec<Image>,

    // artifact_type and subject are duplicated in the ImageConfiguration, but put here for the
    // sake of generating a builder method to allow users to specify them for the ImageConfiguring
    // when building an image.
    #[allow(dead_code)]
    artifact_type: Option<MediaType>,
    #[allow(dead_code)]
    subject: Option<Descriptor>,

    /// When set, [`Index::manifest_ref`] resolves to this tag instead of the index's digest.
    pub tag: Option<String>,

    #[builder(setter(skip))]
    pub index_manifest: ImageIndex,

    #[builder(setter(skip))]
    pub manifest_bytes: Bytes,

    #[builder(setter(skip))]
    pub digest: OciDigest,
}

impl IndexBuilder {
    pub fn build(self) -> Result<Index> {
        let manifests = self.manifests.unwrap_or_else(Vec::new);
        let manifest_descriptors = manifests
            .iter()
            .map(|m| m.descriptor())
            .collect::<Vec<Descriptor>>();

        let artifact_type = self.artifact_type.flatten();
        let subject = self.subject.flatten();

        let mut manifest_builder = ImageIndexBuilder::default()
            .schema_version(2u32)
            .media_type(MediaType::ImageIndex)
            .manifests(manifest_descriptors);

        if let Some(ref artifact_type) = artifact_type {
            manifest_builder = manifest_builder.artifact_type(artifact_type.clone());
        }

        if let Some(ref subject) = subject {
            manifest_builder = manifest_builder.subject(subject.clone());
        }

        let index_manifest = manifest_builder
            .build()
            .expect("must set all required fields for image manifest");
        let manifest_bytes = Bytes::from(serde_json::to_vec(&index_manifest)?);
        let digest = OciDigest::try_from(manifest_bytes.as_ref()).map_err(|e| {
            Error::IndexBuilderError(format!("failed to digest image index: {e}"))
        })?;

        Ok(Index {
            manifests,
            index_manifest,
            manifest_bytes,
            digest,
            artifact_type,
            subject,
            tag: self.tag.flatten(),
        })
    }
}

impl Index {
    /// The [`ManifestRef`] this index should be pushed/pulled under: its tag if one was set on
    /// the builder, otherwise the digest of its serialized manifest.
    pub fn manifest_ref(&self) -> ManifestRef {
        match &self.tag {
            Some(tag) => ManifestRef::Tag(tag.clone()),
            None => ManifestRef::Digest(self.digest.clone()),
        }
    }
}
