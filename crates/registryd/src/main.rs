use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::middleware;
use clap::Parser;

use registry_core::auth::{AllowAll, AuthAdapter, BasicAuth};
use registry_http::{auth_and_repository_middleware, Registry};
use registry_storage_memory::MemoryRepositoryFactory;
use registry_storage_postgres::PgRepositoryFactory;

mod config;
use crate::config::{AuthBackend, Config, RepositoryBackend};

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

fn build_auth(backend: &AuthBackend, realm: &str) -> Arc<dyn AuthAdapter> {
    match backend {
        AuthBackend::AllowAll => Arc::new(AllowAll::new(realm)),
        AuthBackend::Basic { username, password } => {
            Arc::new(BasicAuth::new(realm, username.clone(), password.clone()))
        }
    }
}

/// Wraps each backend's concrete `Registry<M>` so `main` can pick one at runtime while still
/// producing a single uniformly-typed `axum::Router` to serve.
enum AnyRegistry {
    Postgres(Registry<PgRepositoryFactory>),
    Memory(Registry<MemoryRepositoryFactory>),
}

impl AnyRegistry {
    async fn initialize_static_repositories(
        &self,
        repositories: Vec<registry_core::config::RepositoryDefinition>,
    ) -> Result<()> {
        match self {
            AnyRegistry::Postgres(r) => r.initialize_static_repositories(repositories).await?,
            AnyRegistry::Memory(r) => r.initialize_static_repositories(repositories).await?,
        };
        Ok(())
    }

    fn into_router(self) -> Result<axum::Router> {
        let router = match self {
            AnyRegistry::Postgres(registry) => registry.router()?.route_layer(
                middleware::from_fn_with_state(
                    registry,
                    auth_and_repository_middleware::<PgRepositoryFactory>,
                ),
            ),
            AnyRegistry::Memory(registry) => registry.router()?.route_layer(
                middleware::from_fn_with_state(
                    registry,
                    auth_and_repository_middleware::<MemoryRepositoryFactory>,
                ),
            ),
        };
        Ok(router)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let mut dev_config = File::open(cli.config_file.unwrap_or_else(|| "./dev-config.yml".into()))?;
    let mut s = String::new();
    dev_config.read_to_string(&mut s)?;
    let config: Config = serde_yaml::from_str(&s)?;

    let auth = build_auth(&config.auth, &config.registry.realm);

    // initialize persistence layer
    let registry = match config.backend {
        RepositoryBackend::Postgres(cfg) => {
            let manager = cfg.get_manager().await?;
            AnyRegistry::Postgres(Registry::<PgRepositoryFactory>::new(
                manager,
                auth,
                config.registry.clone(),
            ))
        }
        RepositoryBackend::Memory => {
            let manager = MemoryRepositoryFactory::new();
            AnyRegistry::Memory(Registry::<MemoryRepositoryFactory>::new(
                manager,
                auth,
                config.registry.clone(),
            ))
        }
    };

    if let Some(repositories) = config.static_repositories {
        registry.initialize_static_repositories(repositories).await?;
    }

    let router = registry.into_router()?;

    // run HTTP server
    axum::Server::bind(&config.bind_address.parse()?)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}
