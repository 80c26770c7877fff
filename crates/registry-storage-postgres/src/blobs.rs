use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::stream::StreamExt;
use futures::stream::TryStreamExt;
use hyper::body::Body;
use uuid::Uuid;

use registry_core::registry::{BlobStore, BlobWriter};
use registry_core::Error as CoreError;
use registry_core::Result;
use registry_core::{ChunkedBody, DigestBody, Digester, OciDigest};
use registry_objectstore::{Chunk, Key, ObjectStore};

use super::errors::Error;
use super::metadata::{
    Chunk as MetadataChunk, PostgresMetadataPool, PostgresMetadataTx, UploadSession,
};

pub struct PgBlobStore {
    pub(crate) metadata: PostgresMetadataPool,
    pub(crate) objects: Arc<dyn ObjectStore>,
}

impl PgBlobStore {
    pub fn new(metadata: PostgresMetadataPool, objects: Arc<dyn ObjectStore>) -> Self {
        Self { metadata, objects }
    }
}

type TryBytes = std::result::Result<Bytes, Box<dyn std::error::Error + Send + Sync>>;

#[async_trait]
impl BlobStore for PgBlobStore {
    type BlobWriter = PgBlobWriter;
    type Error = CoreError;
    type UploadSession = UploadSession;
    type Blob = super::metadata::Blob;
    type BlobBody = BoxStream<'static, TryBytes>;

    async fn resume(&self, session_uuid: &Uuid, start_of_range: Option<u64>) -> Result<PgBlobWriter> {
        // retrieve the session or fail if it doesn't exist
        let mut session = self
            .metadata
            .get_conn()
            .await?
            .get_session(session_uuid)
            .await
            .map_err(|_| CoreError::BlobUploadInvalid(None))?;

        if let Some(start) = start_of_range {
            if !session.validate_range(start) {
                tracing::debug!("content range start {start} is invalid");
                return Err(CoreError::BlobUploadOutOfOrder(Some(
                    "content range start is invalid".to_string(),
                )));
            }
        }

        if session.upload_id.is_none() {
            session.upload_id = Some(
                self.objects
                    .initiate_chunked_upload(&Key::from(&session.uuid))
                    .await
                    .map_err(Error::from)?,
            );
        }

        Ok(PgBlobWriter {
            metadata: self.metadata.clone(),
            objects: self.objects.clone(),
            session: Some(session),
        })
    }

    async fn put(&mut self, digest: &OciDigest, content_length: u64, body: Body) -> Result<Uuid> {
        let mut tx = self.metadata.get_tx().await?;
        let uuid = match tx.get_blob(digest).await? {
            Some(b) => {
                // verify blob actually exists before returning a potentially bogus uuid
                if self
                    .objects
                    .exists(&Key::from(&b.id))
                    .await
                    .map_err(Error::from)?
                {
                    return Ok(b.id);
                }
                b.id
            }
            None => tx
                .insert_blob(digest, content_length as i64)
                .await
                .map_err(Error::from)?,
        };

        // upload blob
        let digester = Arc::new(Mutex::new(digest.digester()));
        let stream_body = DigestBody::from_body(body, digester);
        let blob_key = Key::from(&uuid);
        self.objects
            .put(&blob_key, stream_body.into(), content_length)
            .await
            .map_err(Error::from)?;

        // read the uploaded bytes back and confirm they actually hash to the claimed digest
        // before committing; on mismatch, remove the bad object and roll back the transaction
        // (dropping `tx` without committing) so the blob row never becomes visible.
        let uploaded = self.objects.get(&blob_key).await.map_err(Error::from)?;
        let bytes: Bytes = uploaded
            .try_collect::<Vec<Bytes>>()
            .await
            .map_err(Error::from)?
            .concat()
            .into();
        let computed: OciDigest = bytes.as_ref().try_into()?;
        if computed != *digest {
            self.objects.delete(&blob_key).await.map_err(Error::from)?;
            return Err(CoreError::DigestInvalid(Some(
                "uploaded content does not match provided digest".to_string(),
            )));
        }

        tx.commit().await.map_err(Error::from)?;

        Ok(uuid)
    }

    async fn head(&self, key: &OciDigest) -> Result<Option<Self::Blob>> {
        match self.metadata.get_conn().await?.get_blob(key).await? {
            Some(b) => Ok(Some(b)),
            None => Ok(None),
        }
    }

    async fn get(&self, key: &OciDigest) -> Result<Option<(Self::Blob, Self::BlobBody)>> {
        if let Some(blob) = self.metadata.get_conn().await?.get_blob(key).await? {
            let body = self
                .objects
                .get(&Key::from(&blob.id))
                .await
                .map_err(Error::from)?;
            Ok(Some((blob, body.map_err(|e| e.into()).boxed())))
        } else {
            Ok(None)
        }
    }

    async fn delete(&mut self, digest: &OciDigest) -> Result<()> {
        let mut tx = self.metadata.get_tx().await?;

        let blob = tx
            .get_blob(digest)
            .await?
            .ok_or(CoreError::BlobUnknown(None))?;

        // TODO: reject deletion when the blob is still referenced by a manifest.
        tx.delete_blob(&blob.id).await?;
        tx.commit().await?;
        Ok(())
    }
}

pub struct PgBlobWriter {
    metadata: PostgresMetadataPool,
    objects: Arc<dyn ObjectStore>,

    session: Option<UploadSession>,
}

impl PgBlobWriter {
    async fn write_chunk(
        &self,
        tx: &mut PostgresMetadataTx,
        session: &mut UploadSession,
        bytes: Bytes,
    ) -> Result<()> {
        let chunk = self
            .objects
            .upload_chunk(
                session
                    .upload_id
                    .as_ref()
                    .expect("UploadSession.upload_id should always be Some here")
                    .as_str(),
                &Key::from(&session.uuid),
                session.chunk_number,
                bytes.len() as u64,
                bytes.into(),
            )
            .await
            .map_err(Error::from)?;

        tx.insert_chunk(session, &MetadataChunk::from(chunk)).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobWriter for PgBlobWriter {
    type Error = CoreError;
    type UploadSession = UploadSession;

    async fn write(mut self, content_length: u64, body: Body) -> Result<UploadSession> {
        let mut session = self.session.take().ok_or(CoreError::BlobWriterFinished)?;
        tracing::debug!("before chunk upload: {:?}", session);
        let digester = Arc::new(Mutex::new(Digester::default()));
        let stream_body = DigestBody::from_body(body, digester.clone());
        let chunk = self
            .objects
            .upload_chunk(
                session
                    .upload_id
                    .as_ref()
                    .expect("UploadSession.upload_id should always be Some here")
                    .as_str(),
                &Key::from(&session.uuid),
                session.chunk_number,
                content_length,
                stream_body.into(),
            )
            .await
            .map_err(Error::from)?;

        let mut conn = self.metadata.get_conn().await?;
        conn.insert_chunk(&session, &MetadataChunk::from(chunk))
            .await?;

        let digester = Arc::into_inner(digester)
            .expect("no other references should exist at this point")
            .into_inner()
            .expect("the mutex cannot be locked if there are no other Arc references");

        session.chunk_number += 1;
        session.last_range_end += digester.bytes() as i64 - 1;

        conn.update_session(&session).await?;

        // TODO: return uploaded content length to the caller for Location/Range header updates.
        Ok(session)
    }

    async fn write_chunked(mut self, body: Body) -> Result<UploadSession> {
        let mut session = self.session.take().ok_or(CoreError::BlobWriterFinished)?;
        let md = self.metadata.clone();
        let mut tx = md.get_tx().await?;
        let mut digester = Digester::default();

        let chunked = ChunkedBody::from_body(body);
        tokio::pin!(chunked);

        while let Some(vbytes) = chunked.next().await {
            for bytes in vbytes.into_iter() {
                digester.update(&bytes);
                self.write_chunk(&mut tx, &mut session, bytes).await?;
                session.chunk_number += 1;
            }
        }

        session.last_range_end += digester.bytes() as i64 - 1;
        tx.update_session(&session).await?;

        tx.commit().await?;
        Ok(session)
    }

    async fn finalize(mut self, digest: &OciDigest) -> Result<UploadSession> {
        let session = self.session.take().ok_or(CoreError::BlobWriterFinished)?;
        let mut tx = self.metadata.get_tx().await?;
        let uuid = match tx.get_blob(digest).await? {
            Some(b) => b.id,
            None => tx.insert_blob(digest, session.last_range_end + 1).await?,
        };

        let blob_key = Key::from(&uuid);
        let session_key = Key::from(&session.uuid);

        // only the branch that assembles fresh chunks into `blob_key` needs to be checked
        // against the claimed digest; the other branch aborts because the object already exists
        // under a key derived from this very digest, so it was validated on a prior finalize.
        let assembled_fresh = !self.objects.exists(&blob_key).await.map_err(Error::from)?;
        if assembled_fresh {
            let chunks = tx
                .get_chunks(&session)
                .await?
                .into_iter()
                .map(Chunk::from)
                .collect();
            self.objects
                .finalize_chunked_upload(
                    session
                        .upload_id
                        .as_ref()
                        .expect("UploadSession.upload_id should always be Some here")
                        .as_str(),
                    &session_key,
                    chunks,
                    &blob_key,
                )
                .await
                .map_err(Error::from)?;
        } else {
            self.objects
                .abort_chunked_upload(
                    session
                        .upload_id
                        .as_ref()
                        .expect("UploadSession.upload_id should always be Some here")
                        .as_str(),
                    &session_key,
                )
                .await
                .map_err(Error::from)?;
        }

        if assembled_fresh {
            // read the assembled object back and confirm it hashes to the claimed digest before
            // committing; on mismatch, remove the bad object and roll back the transaction
            // (dropping `tx` without committing) so the blob row never becomes visible and the
            // session remains usable for a retry.
            let uploaded = self.objects.get(&blob_key).await.map_err(Error::from)?;
            let bytes: Bytes = uploaded
                .try_collect::<Vec<Bytes>>()
                .await
                .map_err(Error::from)?
                .concat()
                .into();
            let computed: OciDigest = bytes.as_ref().try_into()?;
            if computed != *digest {
                self.objects.delete(&blob_key).await.map_err(Error::from)?;
                return Err(CoreError::DigestInvalid(Some(
                    "uploaded content does not match provided digest".to_string(),
                )));
            }
        }

        tx.commit().await?;
        Ok(session)
    }
}
