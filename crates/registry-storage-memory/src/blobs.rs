use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use hyper::body;
use hyper::body::Body;
use uuid::Uuid;

use registry_core::registry::{BlobStore, BlobWriter};
use registry_core::Error as CoreError;
use registry_core::{OciDigest, Result};

use super::state::{RepositoryData, SessionState, StoredBlob};
use super::types::{Blob, UploadSession};

type TryBytes = std::result::Result<Bytes, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone)]
pub struct MemoryBlobStore {
    data: Arc<RwLock<RepositoryData>>,
}

impl MemoryBlobStore {
    pub(crate) fn new(data: Arc<RwLock<RepositoryData>>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    type BlobWriter = MemoryBlobWriter;
    type Error = CoreError;
    type UploadSession = UploadSession;
    type Blob = Blob;
    type BlobBody = BoxStream<'static, TryBytes>;

    async fn head(&self, key: &OciDigest) -> Result<Option<Self::Blob>> {
        let data = self.data.read().expect("lock poisoned");
        Ok(data.blobs.get(&String::from(key)).map(|b| Blob {
            digest: String::from(key),
            byte_size: b.bytes.len() as u64,
        }))
    }

    async fn get(&self, key: &OciDigest) -> Result<Option<(Self::Blob, Self::BlobBody)>> {
        let data = self.data.read().expect("lock poisoned");
        Ok(data.blobs.get(&String::from(key)).map(|stored| {
            let blob = Blob {
                digest: String::from(key),
                byte_size: stored.bytes.len() as u64,
            };
            let bytes = stored.bytes.clone();
            let body: Self::BlobBody = stream::once(async move { Ok(bytes) }).boxed();
            (blob, body)
        }))
    }

    async fn put(&mut self, digest: &OciDigest, content_length: u64, body: Body) -> Result<Uuid> {
        let bytes = body::to_bytes(body)
            .await
            .map_err(|e| CoreError::BackendError(e.to_string()))?;
        if bytes.len() as u64 != content_length {
            return Err(CoreError::SizeInvalid(None));
        }
        let computed: OciDigest = bytes.as_ref().try_into()?;
        if computed != *digest {
            return Err(CoreError::DigestInvalid(None));
        }

        let mut data = self.data.write().expect("lock poisoned");
        data.blobs
            .insert(String::from(digest), StoredBlob { bytes });
        Ok(Uuid::new_v4())
    }

    async fn delete(&mut self, digest: &OciDigest) -> Result<()> {
        let mut data = self.data.write().expect("lock poisoned");
        data.blobs
            .remove(&String::from(digest))
            .ok_or(CoreError::BlobUnknown(None))?;
        Ok(())
    }

    async fn resume(&self, session_uuid: &Uuid, start: Option<u64>) -> Result<Self::BlobWriter> {
        let data = self.data.read().expect("lock poisoned");
        let state = data
            .sessions
            .get(session_uuid)
            .ok_or(CoreError::BlobUploadUnknown(None))?;

        if let Some(start) = start {
            if !state.session.validate_range(start) {
                tracing::debug!("content range start {start} is invalid");
                return Err(CoreError::BlobUploadOutOfOrder(Some(
                    "content range start is invalid".to_string(),
                )));
            }
        }

        Ok(MemoryBlobWriter {
            data: self.data.clone(),
            session_uuid: *session_uuid,
        })
    }
}

pub struct MemoryBlobWriter {
    data: Arc<RwLock<RepositoryData>>,
    session_uuid: Uuid,
}

impl MemoryBlobWriter {
    fn append(&self, state: &mut SessionState, bytes: &[u8]) {
        state.buffer.extend_from_slice(bytes);
        state.session.chunk_number += 1;
        state.session.last_range_end += bytes.len() as i64;
    }
}

#[async_trait]
impl BlobWriter for MemoryBlobWriter {
    type Error = CoreError;
    type UploadSession = UploadSession;

    async fn write(self, _content_length: u64, body: Body) -> Result<UploadSession> {
        let bytes = body::to_bytes(body)
            .await
            .map_err(|e| CoreError::BackendError(e.to_string()))?;

        let mut data = self.data.write().expect("lock poisoned");
        let state = data
            .sessions
            .get_mut(&self.session_uuid)
            .ok_or(CoreError::BlobUploadUnknown(None))?;
        self.append(state, &bytes);
        Ok(state.session.clone())
    }

    async fn write_chunked(self, body: Body) -> Result<UploadSession> {
        // no multipart protocol exists in-memory; a chunked upload is just a series of writes
        // against the same buffered session.
        self.write(0, body).await
    }

    async fn finalize(self, digest: &OciDigest) -> Result<UploadSession> {
        let mut data = self.data.write().expect("lock poisoned");
        let state = data
            .sessions
            .get(&self.session_uuid)
            .ok_or(CoreError::BlobUploadUnknown(None))?;

        let bytes = Bytes::from(state.buffer.clone());
        let computed: OciDigest = bytes.as_ref().try_into()?;
        if computed != *digest {
            return Err(CoreError::DigestInvalid(Some(
                "uploaded content does not match provided digest".to_string(),
            )));
        }

        // only remove the session once the digest has been confirmed to match; a mismatch
        // leaves the session in place so the client can retry the commit.
        let state = data.sessions.remove(&self.session_uuid).expect("checked above");
        data.blobs
            .insert(String::from(digest), StoredBlob { bytes });
        Ok(state.session)
    }
}
