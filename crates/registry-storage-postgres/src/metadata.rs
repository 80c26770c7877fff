//! Postgres persistence for registry metadata: registries, repositories, blobs, manifests, tags,
//! upload sessions and chunks.
//!
//! Bulk bytes never pass through this module; they live behind `registry_objectstore`. Only
//! identity and relationships (which blob backs which manifest, which tag points at which
//! manifest, how far an in-progress upload has gotten) are tracked here.

use chrono::{DateTime, Utc};
use oci_spec::image::MediaType;
use sea_query::{Expr, Iden, OnConflict, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use serde::Deserialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::types::Json;
use sqlx::{Pool, Row, Transaction};
use uuid::Uuid;

use registry_core::registry::{Blob as BlobTrait, Manifest as ManifestTrait, ManifestRef, ManifestSpec, UploadSession as UploadSessionTrait};
use registry_core::{DigestState, OciDigest};

use super::errors::{Error, Result};

fn default_registry_name() -> String {
    "default".to_string()
}

#[derive(Clone, Deserialize)]
pub struct PostgresConfig {
    connection_string: String,
    #[serde(default = "default_registry_name")]
    registry_name: String,
}

impl PostgresConfig {
    pub async fn new_metadata(&self) -> Result<PostgresMetadataPool> {
        let pool = PgPoolOptions::new().connect(&self.connection_string).await?;
        let registry_id = ensure_registry(&pool, &self.registry_name).await?;
        Ok(PostgresMetadataPool { pool, registry_id })
    }
}

async fn ensure_registry(pool: &Pool<Postgres>, name: &str) -> Result<Uuid> {
    let mut conn = pool.acquire().await?;

    let (sql, values) = Query::select()
        .column(Registries::Id)
        .from(Registries::Table)
        .and_where(Expr::col(Registries::Name).eq(name))
        .build_sqlx(PostgresQueryBuilder);
    if let Some(row) = sqlx::query_with(&sql, values)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(row.try_get("id")?);
    }

    let id = Uuid::new_v4();
    let (sql, values) = Query::insert()
        .into_table(Registries::Table)
        .columns([Registries::Id, Registries::Name])
        .values_panic([id.into(), name.into()])
        .build_sqlx(PostgresQueryBuilder);
    sqlx::query_with(&sql, values).execute(&mut *conn).await?;

    Ok(id)
}

#[derive(Clone)]
pub struct PostgresMetadataPool {
    pool: Pool<Postgres>,
    registry_id: Uuid,
}

impl PostgresMetadataPool {
    pub async fn get_conn(&self) -> Result<PostgresMetadataConn> {
        Ok(PostgresMetadataConn {
            conn: self.pool.acquire().await?,
            registry_id: self.registry_id,
        })
    }

    pub async fn get_tx(&self) -> Result<PostgresMetadataTx> {
        Ok(PostgresMetadataTx {
            tx: self.pool.begin().await?,
            registry_id: self.registry_id,
        })
    }
}

pub struct PostgresMetadataConn {
    conn: PoolConnection<Postgres>,
    registry_id: Uuid,
}

pub struct PostgresMetadataTx {
    tx: Transaction<'static, Postgres>,
    registry_id: Uuid,
}

impl PostgresMetadataTx {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Registries {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Repositories {
    Table,
    Id,
    RegistryId,
    Name,
}

#[derive(Iden)]
enum Blobs {
    Table,
    Id,
    RegistryId,
    Digest,
    ByteSize,
}

#[derive(Iden)]
enum Manifests {
    Table,
    Id,
    RepositoryId,
    BlobId,
    Digest,
    MediaType,
    ArtifactType,
    ByteSize,
}

#[derive(Iden)]
enum ImageLayers {
    Table,
    ManifestId,
    BlobId,
}

#[derive(Iden)]
enum IndexManifests {
    Table,
    ManifestId,
    ChildManifestId,
}

#[derive(Iden)]
enum Tags {
    Table,
    RepositoryId,
    ManifestId,
    Name,
}

#[derive(Iden)]
enum UploadSessions {
    Table,
    Uuid,
    StartDate,
    UploadId,
    ChunkNumber,
    LastRangeEnd,
    DigestState,
}

#[derive(Iden)]
enum Chunks {
    Table,
    ChunkNumber,
    UploadSessionUuid,
    ETag,
}

#[derive(Clone)]
pub struct Repository {
    pub id: Uuid,
    pub registry_id: Uuid,
    pub name: String,
}

pub struct Blob {
    pub id: Uuid,
    pub digest: String,
    pub byte_size: i64,
}

impl BlobTrait for Blob {
    fn bytes_on_disk(&self) -> u64 {
        self.byte_size as u64
    }
}

#[derive(Clone)]
pub struct Manifest {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub blob_id: Uuid,
    pub digest: OciDigest,
    pub media_type: Option<MediaType>,
    pub artifact_type: Option<MediaType>,
    pub byte_size: i64,
}

impl Manifest {
    pub fn from_spec_with_params(
        spec: &ManifestSpec,
        repository_id: Uuid,
        blob_id: Uuid,
        digest: OciDigest,
        byte_size: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            repository_id,
            blob_id,
            digest,
            media_type: spec.media_type(),
            artifact_type: spec.artifact_type(),
            byte_size,
        }
    }
}

impl ManifestTrait for Manifest {
    fn bytes_on_disk(&self) -> u64 {
        self.byte_size as u64
    }

    fn digest(&self) -> &OciDigest {
        &self.digest
    }

    fn media_type(&self) -> &Option<MediaType> {
        &self.media_type
    }
}

#[derive(Debug, Clone)]
pub struct UploadSession {
    pub uuid: Uuid,
    pub start_date: DateTime<Utc>,
    pub upload_id: Option<String>,
    pub chunk_number: i32,
    pub last_range_end: i64,
    pub digest_state: Option<Json<DigestState>>,
}

impl UploadSession {
    /// Verifies that a proposed chunk's starting offset is the immediate continuation of the
    /// last chunk written to this session.
    pub fn validate_range(&self, start: u64) -> bool {
        if self.chunk_number == 0 {
            return start == 0;
        }
        start as i64 == self.last_range_end + 1
    }
}

impl UploadSessionTrait for UploadSession {
    fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    fn upload_id(&self) -> &Option<String> {
        &self.upload_id
    }

    fn last_range_end(&self) -> i64 {
        self.last_range_end
    }
}

#[derive(Default)]
pub struct Chunk {
    pub e_tag: Option<String>,
    pub chunk_number: i32,
}

impl From<registry_objectstore::Chunk> for Chunk {
    fn from(c: registry_objectstore::Chunk) -> Self {
        Self {
            e_tag: c.e_tag,
            chunk_number: c.chunk_number,
        }
    }
}

impl From<Chunk> for registry_objectstore::Chunk {
    fn from(c: Chunk) -> Self {
        Self {
            e_tag: c.e_tag,
            chunk_number: c.chunk_number,
        }
    }
}

pub struct Tag {
    pub name: String,
}

// shared query helpers used by both the connection and transaction handles.
macro_rules! impl_queries {
    ($handle:ty, $exec:ident) => {
        impl $handle {
            pub async fn get_repository(&mut self, name: &str) -> Result<Option<Repository>> {
                let (sql, values) = Query::select()
                    .columns([Repositories::Id, Repositories::RegistryId, Repositories::Name])
                    .from(Repositories::Table)
                    .and_where(Expr::col(Repositories::RegistryId).eq(self.registry_id))
                    .and_where(Expr::col(Repositories::Name).eq(name))
                    .build_sqlx(PostgresQueryBuilder);
                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(&mut *self.$exec)
                    .await?;
                Ok(row.map(|r| Repository {
                    id: r.get("id"),
                    registry_id: r.get("registry_id"),
                    name: r.get("name"),
                }))
            }

            pub async fn insert_repository(&mut self, name: &str) -> Result<Repository> {
                let id = Uuid::new_v4();
                let (sql, values) = Query::insert()
                    .into_table(Repositories::Table)
                    .columns([Repositories::Id, Repositories::RegistryId, Repositories::Name])
                    .values_panic([id.into(), self.registry_id.into(), name.into()])
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(Repository {
                    id,
                    registry_id: self.registry_id,
                    name: name.to_string(),
                })
            }

            pub async fn get_blob(&mut self, digest: &OciDigest) -> Result<Option<Blob>> {
                let (sql, values) = Query::select()
                    .columns([Blobs::Id, Blobs::Digest, Blobs::ByteSize])
                    .from(Blobs::Table)
                    .and_where(Expr::col(Blobs::RegistryId).eq(self.registry_id))
                    .and_where(Expr::col(Blobs::Digest).eq(String::from(digest)))
                    .build_sqlx(PostgresQueryBuilder);
                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(&mut *self.$exec)
                    .await?;
                Ok(row.map(|r| Blob {
                    id: r.get("id"),
                    digest: r.get("digest"),
                    byte_size: r.get("byte_size"),
                }))
            }

            pub async fn get_blobs(&mut self, digests: &Vec<&str>) -> Result<Vec<Blob>> {
                if digests.is_empty() {
                    return Ok(Vec::new());
                }
                let (sql, values) = Query::select()
                    .columns([Blobs::Id, Blobs::Digest, Blobs::ByteSize])
                    .from(Blobs::Table)
                    .and_where(Expr::col(Blobs::RegistryId).eq(self.registry_id))
                    .and_where(Expr::col(Blobs::Digest).is_in(digests.iter().map(|d| d.to_string())))
                    .build_sqlx(PostgresQueryBuilder);
                let rows = sqlx::query_with(&sql, values).fetch_all(&mut *self.$exec).await?;
                Ok(rows
                    .into_iter()
                    .map(|r| Blob {
                        id: r.get("id"),
                        digest: r.get("digest"),
                        byte_size: r.get("byte_size"),
                    })
                    .collect())
            }

            pub async fn insert_blob(&mut self, digest: &OciDigest, byte_size: i64) -> Result<Uuid> {
                let id = Uuid::new_v4();
                let (sql, values) = Query::insert()
                    .into_table(Blobs::Table)
                    .columns([Blobs::Id, Blobs::RegistryId, Blobs::Digest, Blobs::ByteSize])
                    .values_panic([
                        id.into(),
                        self.registry_id.into(),
                        String::from(digest).into(),
                        byte_size.into(),
                    ])
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(id)
            }

            pub async fn delete_blob(&mut self, id: &Uuid) -> Result<()> {
                let (sql, values) = Query::delete()
                    .from_table(Blobs::Table)
                    .and_where(Expr::col(Blobs::Id).eq(*id))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn get_manifest(
                &mut self,
                repository_id: &Uuid,
                manifest_ref: &ManifestRef,
            ) -> Result<Option<Manifest>> {
                let mut select = Query::select();
                select
                    .columns([
                        (Manifests::Table, Manifests::Id),
                        (Manifests::Table, Manifests::RepositoryId),
                        (Manifests::Table, Manifests::BlobId),
                        (Manifests::Table, Manifests::Digest),
                        (Manifests::Table, Manifests::MediaType),
                        (Manifests::Table, Manifests::ArtifactType),
                        (Manifests::Table, Manifests::ByteSize),
                    ])
                    .from(Manifests::Table)
                    .and_where(Expr::col((Manifests::Table, Manifests::RepositoryId)).eq(*repository_id));

                match manifest_ref {
                    ManifestRef::Digest(d) => {
                        select.and_where(
                            Expr::col((Manifests::Table, Manifests::Digest)).eq(String::from(d)),
                        );
                    }
                    ManifestRef::Tag(t) => {
                        select
                            .inner_join(
                                Tags::Table,
                                Expr::col((Tags::Table, Tags::ManifestId))
                                    .equals((Manifests::Table, Manifests::Id)),
                            )
                            .and_where(Expr::col((Tags::Table, Tags::Name)).eq(t.as_str()));
                    }
                }

                let (sql, values) = select.build_sqlx(PostgresQueryBuilder);
                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(&mut *self.$exec)
                    .await?;
                row.map(|r| row_to_manifest(&r)).transpose()
            }

            pub async fn get_manifests(
                &mut self,
                repository_id: &Uuid,
                digests: &Vec<&str>,
            ) -> Result<Vec<Manifest>> {
                if digests.is_empty() {
                    return Ok(Vec::new());
                }
                let (sql, values) = Query::select()
                    .columns([
                        Manifests::Id,
                        Manifests::RepositoryId,
                        Manifests::BlobId,
                        Manifests::Digest,
                        Manifests::MediaType,
                        Manifests::ArtifactType,
                        Manifests::ByteSize,
                    ])
                    .from(Manifests::Table)
                    .and_where(Expr::col(Manifests::RepositoryId).eq(*repository_id))
                    .and_where(Expr::col(Manifests::Digest).is_in(digests.iter().map(|d| d.to_string())))
                    .build_sqlx(PostgresQueryBuilder);
                let rows = sqlx::query_with(&sql, values).fetch_all(&mut *self.$exec).await?;
                rows.iter().map(row_to_manifest).collect()
            }

            pub async fn insert_manifest(&mut self, manifest: &Manifest) -> Result<()> {
                let (sql, values) = Query::insert()
                    .into_table(Manifests::Table)
                    .columns([
                        Manifests::Id,
                        Manifests::RepositoryId,
                        Manifests::BlobId,
                        Manifests::Digest,
                        Manifests::MediaType,
                        Manifests::ArtifactType,
                        Manifests::ByteSize,
                    ])
                    .values_panic([
                        manifest.id.into(),
                        manifest.repository_id.into(),
                        manifest.blob_id.into(),
                        String::from(&manifest.digest).into(),
                        manifest.media_type.as_ref().map(|m| m.to_string()).into(),
                        manifest.artifact_type.as_ref().map(|m| m.to_string()).into(),
                        manifest.byte_size.into(),
                    ])
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn delete_manifest(&mut self, id: &Uuid) -> Result<()> {
                let (sql, values) = Query::delete()
                    .from_table(Manifests::Table)
                    .and_where(Expr::col(Manifests::Id).eq(*id))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn associate_image_layers(
                &mut self,
                manifest_id: &Uuid,
                blob_ids: Vec<&Uuid>,
            ) -> Result<()> {
                if blob_ids.is_empty() {
                    return Ok(());
                }
                let mut insert = Query::insert();
                insert
                    .into_table(ImageLayers::Table)
                    .columns([ImageLayers::ManifestId, ImageLayers::BlobId]);
                for blob_id in blob_ids {
                    insert.values_panic([(*manifest_id).into(), (*blob_id).into()]);
                }
                let (sql, values) = insert.build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn delete_image_layers(&mut self, manifest_id: &Uuid) -> Result<()> {
                let (sql, values) = Query::delete()
                    .from_table(ImageLayers::Table)
                    .and_where(Expr::col(ImageLayers::ManifestId).eq(*manifest_id))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn associate_index_manifests(
                &mut self,
                manifest_id: &Uuid,
                child_manifest_ids: Vec<&Uuid>,
            ) -> Result<()> {
                if child_manifest_ids.is_empty() {
                    return Ok(());
                }
                let mut insert = Query::insert();
                insert
                    .into_table(IndexManifests::Table)
                    .columns([IndexManifests::ManifestId, IndexManifests::ChildManifestId]);
                for child_id in child_manifest_ids {
                    insert.values_panic([(*manifest_id).into(), (*child_id).into()]);
                }
                let (sql, values) = insert.build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn delete_index_manifests(&mut self, manifest_id: &Uuid) -> Result<()> {
                let (sql, values) = Query::delete()
                    .from_table(IndexManifests::Table)
                    .and_where(Expr::col(IndexManifests::ManifestId).eq(*manifest_id))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn upsert_tag(
                &mut self,
                repository_id: &Uuid,
                manifest_id: &Uuid,
                name: &str,
            ) -> Result<()> {
                let (sql, values) = Query::insert()
                    .into_table(Tags::Table)
                    .columns([Tags::RepositoryId, Tags::ManifestId, Tags::Name])
                    .values_panic([(*repository_id).into(), (*manifest_id).into(), name.into()])
                    .on_conflict(
                        OnConflict::columns([Tags::RepositoryId, Tags::Name])
                            .update_column(Tags::ManifestId)
                            .to_owned(),
                    )
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn delete_tags_by_manifest_id(&mut self, manifest_id: &Uuid) -> Result<()> {
                let (sql, values) = Query::delete()
                    .from_table(Tags::Table)
                    .and_where(Expr::col(Tags::ManifestId).eq(*manifest_id))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn get_tags(
                &mut self,
                repository_id: &Uuid,
                n: Option<i64>,
                last: Option<String>,
            ) -> Result<Vec<Tag>> {
                let mut select = Query::select();
                select
                    .column(Tags::Name)
                    .from(Tags::Table)
                    .and_where(Expr::col(Tags::RepositoryId).eq(*repository_id))
                    .order_by(Tags::Name, sea_query::Order::Asc);
                if let Some(last) = last {
                    select.and_where(Expr::col(Tags::Name).gt(last));
                }
                if let Some(n) = n {
                    select.limit(n as u64);
                }
                let (sql, values) = select.build_sqlx(PostgresQueryBuilder);
                let rows = sqlx::query_with(&sql, values).fetch_all(&mut *self.$exec).await?;
                Ok(rows.into_iter().map(|r| Tag { name: r.get("name") }).collect())
            }

            pub async fn new_upload_session(&mut self) -> Result<UploadSession> {
                let session = UploadSession {
                    uuid: Uuid::new_v4(),
                    start_date: Utc::now(),
                    upload_id: None,
                    chunk_number: 0,
                    last_range_end: -1,
                    digest_state: Some(Json(DigestState::default())),
                };
                let (sql, values) = Query::insert()
                    .into_table(UploadSessions::Table)
                    .columns([
                        UploadSessions::Uuid,
                        UploadSessions::StartDate,
                        UploadSessions::UploadId,
                        UploadSessions::ChunkNumber,
                        UploadSessions::LastRangeEnd,
                    ])
                    .values_panic([
                        session.uuid.into(),
                        session.start_date.into(),
                        session.upload_id.clone().into(),
                        session.chunk_number.into(),
                        session.last_range_end.into(),
                    ])
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(session)
            }

            pub async fn get_session(&mut self, uuid: &Uuid) -> Result<UploadSession> {
                let (sql, values) = Query::select()
                    .columns([
                        UploadSessions::Uuid,
                        UploadSessions::StartDate,
                        UploadSessions::UploadId,
                        UploadSessions::ChunkNumber,
                        UploadSessions::LastRangeEnd,
                    ])
                    .from(UploadSessions::Table)
                    .and_where(Expr::col(UploadSessions::Uuid).eq(*uuid))
                    .build_sqlx(PostgresQueryBuilder);
                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(&mut *self.$exec)
                    .await?
                    .ok_or(Error::RegistryCoreError(registry_core::Error::BlobUploadUnknown(None)))?;
                Ok(UploadSession {
                    uuid: row.get("uuid"),
                    start_date: row.get("start_date"),
                    upload_id: row.get("upload_id"),
                    chunk_number: row.get("chunk_number"),
                    last_range_end: row.get("last_range_end"),
                    digest_state: None,
                })
            }

            pub async fn update_session(&mut self, session: &UploadSession) -> Result<()> {
                let (sql, values) = Query::update()
                    .table(UploadSessions::Table)
                    .values([
                        (UploadSessions::UploadId, session.upload_id.clone().into()),
                        (UploadSessions::ChunkNumber, session.chunk_number.into()),
                        (UploadSessions::LastRangeEnd, session.last_range_end.into()),
                    ])
                    .and_where(Expr::col(UploadSessions::Uuid).eq(session.uuid))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn delete_session(&mut self, uuid: &Uuid) -> Result<()> {
                let (sql, values) = Query::delete()
                    .from_table(UploadSessions::Table)
                    .and_where(Expr::col(UploadSessions::Uuid).eq(*uuid))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn get_chunks(&mut self, session: &UploadSession) -> Result<Vec<Chunk>> {
                let (sql, values) = Query::select()
                    .columns([Chunks::ETag, Chunks::ChunkNumber])
                    .from(Chunks::Table)
                    .and_where(Expr::col(Chunks::UploadSessionUuid).eq(session.uuid))
                    .order_by(Chunks::ChunkNumber, sea_query::Order::Asc)
                    .build_sqlx(PostgresQueryBuilder);
                let rows = sqlx::query_with(&sql, values).fetch_all(&mut *self.$exec).await?;
                Ok(rows
                    .into_iter()
                    .map(|r| Chunk {
                        e_tag: r.get("e_tag"),
                        chunk_number: r.get("chunk_number"),
                    })
                    .collect())
            }

            pub async fn insert_chunk(&mut self, session: &UploadSession, chunk: &Chunk) -> Result<()> {
                let (sql, values) = Query::insert()
                    .into_table(Chunks::Table)
                    .columns([Chunks::ChunkNumber, Chunks::UploadSessionUuid, Chunks::ETag])
                    .values_panic([
                        chunk.chunk_number.into(),
                        session.uuid.into(),
                        chunk.e_tag.clone().into(),
                    ])
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }

            pub async fn delete_chunks(&mut self, session_uuid: &Uuid) -> Result<()> {
                let (sql, values) = Query::delete()
                    .from_table(Chunks::Table)
                    .and_where(Expr::col(Chunks::UploadSessionUuid).eq(*session_uuid))
                    .build_sqlx(PostgresQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *self.$exec).await?;
                Ok(())
            }
        }
    };
}

impl_queries!(PostgresMetadataConn, conn);
impl_queries!(PostgresMetadataTx, tx);

fn row_to_manifest(row: &sqlx::postgres::PgRow) -> Result<Manifest> {
    let digest: String = row.get("digest");
    let media_type: Option<String> = row.get("media_type");
    let artifact_type: Option<String> = row.get("artifact_type");
    Ok(Manifest {
        id: row.get("id"),
        repository_id: row.get("repository_id"),
        blob_id: row.get("blob_id"),
        digest: digest.as_str().try_into()?,
        media_type: media_type.map(|m| m.as_str().into()),
        artifact_type: artifact_type.map(|m| m.as_str().into()),
        byte_size: row.get("byte_size"),
    })
}
