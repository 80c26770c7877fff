use std::sync::PoisonError;

use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("registry-core error: {0}")]
    RegistryCoreError(#[from] registry_core::Error),

    #[error("OCI spec error: {0}")]
    OciSpecError(#[from] oci_spec::OciSpecError),

    #[error("error reading request body: {0}")]
    HyperError(#[from] hyper::Error),

    #[error("in-memory store lock poisoned")]
    LockPoisoned,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}

/// Bridges this crate's error type back into `registry_core::Error` at the `registry::*Store`
/// trait seams, same as the Postgres-backed adapter.
impl From<Error> for registry_core::errors::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::RegistryCoreError(e) => e,
            other => registry_core::errors::Error::BackendError(other.to_string()),
        }
    }
}
