use serde::Deserialize;

use registry_core::config::{RegistryConfig, RepositoryDefinition};
use registry_storage_postgres::PgRepositoryConfig;

fn default_bind_address() -> String {
    "0.0.0.0:13030".to_string()
}

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub registry: RegistryConfig,

    pub backend: RepositoryBackend,

    #[serde(default)]
    pub auth: AuthBackend,

    pub static_repositories: Option<Vec<RepositoryDefinition>>,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum RepositoryBackend {
    Postgres(PgRepositoryConfig),
    Memory,
}

/// Which [`registry_core::auth::AuthAdapter`] to construct. `AllowAll` is the default so a
/// freshly-generated config file runs out of the box; deployments that need access control
/// configure `Basic` with a static credential pair.
#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AuthBackend {
    AllowAll,
    Basic { username: String, password: String },
}

impl Default for AuthBackend {
    fn default() -> Self {
        AuthBackend::AllowAll
    }
}
