//! # registry_core
//!
//! Backend-neutral types shared between `registry_http` and the storage adapter crates:
//! digests, the `StorageAdapter`-shaped traits (`registry::*`), the `AuthAdapter` interface
//! (`auth`), request-scoped `Context` construction (`context`), and Registry policy configuration
//! (`config`).
pub mod errors;
pub use errors::{DistributionErrorCode, Error, RegistryErrorCode, Result};

mod oci_digest;
pub use oci_digest::{DigestState, Digester, OciDigest};

pub mod registry;

mod stream;
pub use stream::ChunkedBody;
pub use stream::DigestBody;

pub mod auth;
pub mod config;
pub mod context;
