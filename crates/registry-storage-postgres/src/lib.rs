mod blobs;
mod config;
mod errors;
mod manifests;
mod metadata;
mod repositories;
mod upload_sessions;

pub use config::PgRepositoryConfig;
pub use config::PgRepositoryFactory;
pub use repositories::PgRepository;
