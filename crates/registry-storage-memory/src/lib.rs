//! An in-memory `StorageAdapter` implementation: repositories, blobs, manifests, tags and upload
//! sessions all live in process memory behind a tree of `RwLock`s. Nothing is persisted and
//! nothing leaves the process. Useful for local development, examples, and the conformance suite,
//! which wants a real (if minimal) backend to drive distribution-spec scenarios against without
//! standing up Postgres and S3.
mod blobs;
mod errors;
mod manifests;
mod repositories;
mod state;
mod types;
mod upload_sessions;

pub use errors::Error;
pub use repositories::{MemoryRepository, MemoryRepositoryFactory};

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use hyper::body::Body;
    use oci_spec::image::{DescriptorBuilder, ImageManifestBuilder, MediaType};

    use registry_core::registry::{
        BlobStore, BlobWriter, ManifestRef, ManifestSpec, ManifestStore, RepositoryStore,
        RepositoryStoreManager, UploadSessionStore,
    };
    use registry_core::OciDigest;

    use super::MemoryRepositoryFactory;

    fn digest_of(bytes: &[u8]) -> OciDigest {
        bytes.try_into().unwrap()
    }

    #[tokio::test]
    async fn create_then_get_round_trips_the_same_repository() {
        let factory = MemoryRepositoryFactory::new();
        let created = factory.create("library/alpine").await.unwrap();
        assert_eq!(created.name(), "library/alpine");

        let fetched = factory.get("library/alpine").await.unwrap();
        assert!(fetched.is_some());

        assert!(factory.get("library/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blob_put_then_get_round_trips_bytes() {
        let factory = MemoryRepositoryFactory::new();
        let repo = factory.create("library/alpine").await.unwrap();
        let mut blobstore = repo.get_blob_store();

        let content = Bytes::from_static(b"hello layer");
        let digest = digest_of(&content);

        let uuid = blobstore
            .put(&digest, content.len() as u64, Body::from(content.clone()))
            .await
            .unwrap();
        assert!(!uuid.is_nil());

        let (blob, mut body) = blobstore.get(&digest).await.unwrap().unwrap();
        assert_eq!(blob.digest, String::from(&digest));

        let chunk = futures::StreamExt::next(&mut body)
            .await
            .expect("body should yield exactly one chunk")
            .expect("chunk should not be an error");
        assert_eq!(chunk, content);
    }

    #[tokio::test]
    async fn blob_put_rejects_mismatched_digest() {
        let factory = MemoryRepositoryFactory::new();
        let repo = factory.create("library/alpine").await.unwrap();
        let mut blobstore = repo.get_blob_store();

        let content = Bytes::from_static(b"hello layer");
        let wrong_digest = digest_of(b"some other content");

        let result = blobstore
            .put(&wrong_digest, content.len() as u64, Body::from(content))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn chunked_upload_session_finalizes_into_a_blob() {
        let factory = MemoryRepositoryFactory::new();
        let repo = factory.create("library/alpine").await.unwrap();
        let blobstore = repo.get_blob_store();
        let sessions = repo.get_upload_session_store();

        let session = sessions.new_upload_session().await.unwrap();
        let session_uuid = session.uuid;
        let writer = blobstore.resume(&session.uuid, Some(0)).await.unwrap();

        let content = Bytes::from_static(b"chunked content");
        let digest = digest_of(&content);
        let session = writer
            .write(content.len() as u64, Body::from(content.clone()))
            .await
            .unwrap();

        let writer = blobstore
            .resume(&session.uuid, Some((session.last_range_end + 1) as u64))
            .await
            .unwrap();
        let session = writer.finalize(&digest).await.unwrap();
        assert_eq!(session.uuid, session_uuid);

        assert!(blobstore.head(&digest).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn manifest_put_rejects_unknown_layer() {
        let factory = MemoryRepositoryFactory::new();
        let repo = factory.create("library/alpine").await.unwrap();
        let mut manifests = repo.get_manifest_store();

        let missing_layer_digest = digest_of(b"not uploaded");
        let layer = DescriptorBuilder::default()
            .media_type(MediaType::ImageLayerGzip)
            .digest(missing_layer_digest)
            .size(10_i64)
            .build()
            .unwrap();
        let config_digest = digest_of(b"config bytes");
        let config = DescriptorBuilder::default()
            .media_type(MediaType::ImageConfig)
            .digest(config_digest)
            .size(2_i64)
            .build()
            .unwrap();

        let manifest = ImageManifestBuilder::default()
            .schema_version(2_u32)
            .media_type(MediaType::ImageManifest)
            .config(config)
            .layers(vec![layer])
            .build()
            .unwrap();

        let bytes = Bytes::from(serde_json::to_vec(&manifest).unwrap());
        let spec = ManifestSpec::Image(manifest);

        let result = manifests
            .put(&ManifestRef::Tag("latest".to_string()), &spec, bytes)
            .await;
        assert!(result.is_err());
    }
}
