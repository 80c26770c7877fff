use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("registry-core error: {0}")]
    RegistryCoreError(#[from] registry_core::Error),

    #[error("objectstore error: {0}")]
    ObjectStoreError(#[from] registry_objectstore::Error),

    #[error("sqlx error")]
    SQLXError(#[from] sqlx::Error),
    #[error("sqlx migration error")]
    SQLXMigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("sea-query error")]
    SeaQueryError(#[from] sea_query::error::Error),

    #[error("http error")]
    HTTPError(#[from] http::Error),

    #[error("{0}")]
    TokioJoinError(#[from] tokio::task::JoinError),

    #[error("failed to initiate chunked upload: {0}")]
    ObjectsFailedToInitiateChunkedUpload(&'static str),
    #[error("missing upload id for session: {0}")]
    ObjectsMissingUploadID(uuid::Uuid),

    #[error("OCI spec error: {0}")]
    OciSpecError(#[from] oci_spec::OciSpecError),

    #[error("error serializing to value")]
    SerdeJsonToValueError(#[from] serde_json::Error),

    #[error("missing query parameter: {0}")]
    MissingQueryParameter(&'static str),

    #[error("metadata transaction already rolled back or committed")]
    MetadataTxInactive,

    #[error("registry spec error: {0:?}")]
    RegistrySpecError(registry_core::errors::RegistryErrorCode),
}

/// Bridges this crate's error type back into `registry_core::Error` at the `registry::*Store`
/// trait seams; anything not already a `registry_core` error is reported as an opaque backend
/// error carrying its `Display` text.
impl From<Error> for registry_core::errors::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::RegistryCoreError(e) => e,
            other => registry_core::errors::Error::BackendError(other.to_string()),
        }
    }
}
