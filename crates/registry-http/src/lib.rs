//! # registry_http
//!
//! An implementation of the [Distribution
//! Spec](https://github.com/opencontainers/distribution-spec) HTTP API that is generic over the
//! `StorageAdapter`-shaped traits defined in [`registry_core::registry`] and the
//! [`registry_core::auth::AuthAdapter`] trait, and therefore compatible with any combination of
//! storage and auth backend that implements them.
//!
//! ## Example `main.rs`
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use axum::middleware;
//!
//! use registry_core::auth::AllowAll;
//! use registry_core::config::RegistryConfig;
//! use registry_storage_memory::MemoryRepositoryFactory;
//! use registry_http::{auth_and_repository_middleware, Registry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = MemoryRepositoryFactory::new();
//!     let auth = Arc::new(AllowAll::new("registry"));
//!     let registry = Registry::new(manager, auth, RegistryConfig::default());
//!
//!     let router = registry.router()?.route_layer(middleware::from_fn_with_state(
//!         registry.clone(),
//!         auth_and_repository_middleware::<MemoryRepositoryFactory>,
//!     ));
//!
//!     axum::Server::bind(&"0.0.0.0:13030".parse()?)
//!         .serve(router.into_make_service())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http::Response as HttpResponse;
use http_body::Body;
use serde::{de, Deserialize, Deserializer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{self, TraceLayer};

mod errors;
pub(crate) use errors::Error;
pub(crate) use errors::Result;

pub(crate) mod blobs;
pub(crate) mod headers;
mod manifests;
mod tags;

use registry_core::auth::{Action, AuthAdapter, AuthError};
use registry_core::config::RegistryConfig;
pub use registry_core::config::RepositoryDefinition;
use registry_core::context::{self, Context, Endpoint};
use registry_core::registry::{RepositoryStore, RepositoryStoreManager};
use registry_core::Error as CoreError;

/// Serde deserialization decorator to map empty Strings to None.
fn empty_string_as_none<'de, D, T>(de: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => FromStr::from_str(s).map_err(de::Error::custom).map(Some),
    }
}

fn maybe_get_content_length(response: &HttpResponse<impl Body>) -> Option<HeaderValue> {
    if let Some(size) = response.body().size_hint().exact() {
        Some(
            HeaderValue::from_str(&size.to_string())
                .expect("size should have valid to_string conversion"),
        )
    } else {
        None
    }
}

async fn version() -> Result<Response> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str("application/json")?,
    );
    Ok((axum::http::StatusCode::OK, headers, "{}").into_response())
}

/// Centralizes management of registered repositories and composes the configured
/// [`AuthAdapter`] with the [`RepositoryStoreManager`] `M` to provide an [`axum::Router`] that
/// implements the [Distribution Spec](https://github.com/opencontainers/distribution-spec).
#[derive(Clone)]
pub struct Registry<M: RepositoryStoreManager> {
    manager: Arc<M>,
    auth: Arc<dyn AuthAdapter>,
    config: RegistryConfig,
}

impl<M: RepositoryStoreManager> Registry<M> {
    pub fn new(manager: M, auth: Arc<dyn AuthAdapter>, config: RegistryConfig) -> Self {
        Self {
            manager: Arc::new(manager),
            auth,
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub async fn initialize_static_repositories(
        &self,
        repositories: Vec<RepositoryDefinition>,
    ) -> std::result::Result<(), CoreError> {
        for repository_config in repositories {
            match self.get_repository(&repository_config.name).await {
                Ok(Some(_)) => (),
                Ok(None) => {
                    tracing::info!(
                        "static repository '{}' not found, inserting",
                        repository_config.name,
                    );
                    self.insert_repository(&repository_config.name).await?;
                }
                Err(e) => return Err(e),
            };
        }
        Ok(())
    }

    /// §4's `validate_repository_name`: repositories not matching the configured pattern are
    /// rejected before a storage backend ever sees them.
    fn validate_repository_name(&self, name: &str) -> std::result::Result<(), CoreError> {
        let pattern = self
            .config
            .compile_repo_name_pattern()
            .map_err(|e| CoreError::BackendError(e.to_string()))?;
        if pattern.is_match(name) {
            Ok(())
        } else {
            Err(CoreError::NameInvalid(None))
        }
    }

    async fn get_repository(
        &self,
        name: &str,
    ) -> std::result::Result<Option<M::RepositoryStore>, CoreError> {
        self.manager.get(name).await.map_err(Into::into)
    }

    async fn insert_repository(
        &self,
        name: &str,
    ) -> std::result::Result<M::RepositoryStore, CoreError> {
        self.validate_repository_name(name)?;
        self.manager.create(name).await.map_err(Into::into)
    }

    /// Return an [`axum::Router`] that implements the Distribution Specification. The caller is
    /// responsible for layering [`auth_and_repository_middleware`] on top so that route handlers
    /// find a [`RepositoryStore`] and [`Context`] in their request extensions.
    pub fn router(&self) -> Result<axum::Router> {
        let blobs = blobs::router::<M::RepositoryStore>();
        let manifests = manifests::router::<M::RepositoryStore>();
        let tags = tags::router::<M::RepositoryStore>();

        let repository = Router::new()
            .nest("/blobs", blobs)
            .nest("/manifests", manifests)
            .nest("/tags", tags);

        let app = Router::new()
            .route("/v2/", get(version))
            .nest("/v2/:repository", repository)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().include_headers(true))
                    .on_response(trace::DefaultOnResponse::new())
                    .on_request(trace::DefaultOnRequest::new()),
            )
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_str("docker-distribution-api-version")?,
                HeaderValue::from_str("registry/2.0")?,
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_str("content-type")?,
                HeaderValue::from_str("application/json")?,
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CONTENT_LENGTH,
                maybe_get_content_length,
            ));

        Ok(app)
    }
}

/// Produce a 401/403 [`Response`] from an [`AuthError`], attaching `WWW-Authenticate` for
/// credential failures per §4.6.
fn auth_error_response(auth: &dyn AuthAdapter, err: AuthError) -> Response {
    let (core_err, challenge) = match err {
        AuthError::Unauthorized(d) => (CoreError::Unauthorized(Some(d)), true),
        AuthError::Unsupported(d) => (CoreError::Unauthorized(Some(d)), true),
        AuthError::Denied(d) => (CoreError::Denied(Some(d)), false),
    };
    let mut response = Error::from(core_err).into_response();
    if challenge {
        if let Ok(value) = HeaderValue::from_str(&auth.challenge().header_value()) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
    }
    response
}

/// Parses the request path into a [`Context`], authenticates and authorizes the caller against
/// it via the configured [`AuthAdapter`], resolves (creating if necessary) the named
/// [`RepositoryStore`], and inserts the [`Context`], [`RegistryConfig`], and `M::RepositoryStore`
/// into the request's extensions for downstream handlers.
///
/// Every endpoint other than `/v2/` (ping) requires authentication, per §4.6.
pub async fn auth_and_repository_middleware<M: RepositoryStoreManager>(
    State(registry): State<Registry<M>>,
    mut req: Request<axum::body::Body>,
    next: Next<axum::body::Body>,
) -> Response {
    let path = req.uri().path();
    let tail = path.strip_prefix("/v2/").or_else(|| path.strip_prefix("/v2"));
    let segments: Vec<&str> = match tail {
        Some(t) => t.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };

    let (repo, endpoint, resource_id) = match context::parse_path(&segments) {
        Ok(v) => v,
        Err(e) => return Error::from(e).into_response(),
    };

    let mut context = Context {
        repo: repo.clone(),
        endpoint: endpoint.clone(),
        resource_id,
        method: req.method().clone(),
        subject: None,
    };

    if matches!(endpoint, Endpoint::Ping) {
        req.extensions_mut().insert(context);
        return next.run(req).await;
    }

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let subject = match registry.auth.authenticate(auth_header).await {
        Ok(s) => s,
        Err(e) => return auth_error_response(&*registry.auth, e),
    };

    let action = Action::from_method(&context.method);
    if let Err(e) = registry.auth.authorize(&subject, &repo, action).await {
        return auth_error_response(&*registry.auth, e);
    }
    context.subject = Some(subject);

    let repository = match registry.get_repository(&repo).await {
        Ok(Some(r)) => r,
        Ok(None) => match registry.insert_repository(&repo).await {
            Ok(r) => r,
            Err(e) => return Error::from(e).into_response(),
        },
        Err(e) => return Error::from(e).into_response(),
    };

    req.extensions_mut().insert(repository);
    req.extensions_mut().insert(registry.config().clone());
    req.extensions_mut().insert(context);

    next.run(req).await
}
