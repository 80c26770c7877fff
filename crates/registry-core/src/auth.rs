//! # AuthAdapter
//!
//! The authentication/authorization interface the Registry composes against. Concrete schemes
//! (Basic, Bearer, a token service) are expected to live behind this trait the same way storage
//! backends live behind `registry::StorageAdapter`-shaped traits -- as opaque, swappable
//! capabilities rather than base classes.
use async_trait::async_trait;
use base64::Engine;
use thiserror;

/// The action implied by the HTTP method of an incoming request: read operations require `Pull`,
/// mutating operations require `Push`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Pull,
    Push,
}

impl Action {
    pub fn from_method(method: &http::Method) -> Self {
        match *method {
            http::Method::GET | http::Method::HEAD => Action::Pull,
            _ => Action::Push,
        }
    }
}

/// An authenticated caller. Opaque beyond its name; concrete adapters may carry more (scopes,
/// claims) in their own types and downcast if they need to, but the Registry only ever needs the
/// name for logging and the adapter's own `authorize` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
}

impl Subject {
    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
        }
    }
}

/// The `WWW-Authenticate` challenge an adapter wants emitted on a 401.
#[derive(Clone, Debug)]
pub struct Challenge {
    pub scheme: String,
    pub params: String,
}

impl Challenge {
    pub fn basic(realm: &str) -> Self {
        Self {
            scheme: "Basic".to_string(),
            params: format!("realm=\"{realm}\""),
        }
    }

    /// Render as the literal value of a `WWW-Authenticate` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.scheme, self.params)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("authentication required: {0}")]
    Unauthorized(String),

    #[error("unsupported authentication scheme: {0}")]
    Unsupported(String),

    #[error("access denied: {0}")]
    Denied(String),
}

/// The AuthAdapter interface: credential validation, per-repository authorization, and challenge
/// production for 401 responses.
#[async_trait]
pub trait AuthAdapter: Send + Sync + 'static {
    /// Validate the `Authorization` header value (without the leading `Authorization: `),
    /// returning the authenticated subject.
    async fn authenticate(
        &self,
        authorization_header: Option<&str>,
    ) -> std::result::Result<Subject, AuthError>;

    /// Decide whether `subject` may perform `action` against `repo`.
    async fn authorize(
        &self,
        subject: &Subject,
        repo: &str,
        action: Action,
    ) -> std::result::Result<(), AuthError>;

    /// Produce the challenge to emit in `WWW-Authenticate` on a 401.
    fn challenge(&self) -> Challenge;
}

/// Permissive adapter: authenticates anyone (including requests with no `Authorization` header
/// at all) as [`Subject::anonymous`] and authorizes every action. Intended for local development
/// and for deployments that enforce access control upstream (eg a reverse proxy).
pub struct AllowAll {
    realm: String,
}

impl AllowAll {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
        }
    }
}

#[async_trait]
impl AuthAdapter for AllowAll {
    async fn authenticate(
        &self,
        _authorization_header: Option<&str>,
    ) -> std::result::Result<Subject, AuthError> {
        Ok(Subject::anonymous())
    }

    async fn authorize(
        &self,
        _subject: &Subject,
        _repo: &str,
        _action: Action,
    ) -> std::result::Result<(), AuthError> {
        Ok(())
    }

    fn challenge(&self) -> Challenge {
        Challenge::basic(&self.realm)
    }
}

/// Single static-credential HTTP Basic adapter. Every authenticated subject is authorized for
/// every repository; this exists to demonstrate the AuthAdapter seam with something slightly
/// more than a no-op, not as a production-grade multi-user scheme.
pub struct BasicAuth {
    realm: String,
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(realm: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl AuthAdapter for BasicAuth {
    async fn authenticate(
        &self,
        authorization_header: Option<&str>,
    ) -> std::result::Result<Subject, AuthError> {
        let header = authorization_header
            .ok_or_else(|| AuthError::Unauthorized("missing Authorization header".to_string()))?;

        let encoded = header
            .strip_prefix("Basic ")
            .ok_or_else(|| AuthError::Unsupported(format!("unsupported scheme in {header:?}")))?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AuthError::Unauthorized(format!("invalid base64 credentials: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|e| AuthError::Unauthorized(format!("invalid utf8 credentials: {e}")))?;

        let (user, pass) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::Unauthorized("malformed basic credentials".to_string()))?;

        if user == self.username && pass == self.password {
            Ok(Subject {
                name: user.to_string(),
            })
        } else {
            Err(AuthError::Unauthorized("invalid credentials".to_string()))
        }
    }

    async fn authorize(
        &self,
        _subject: &Subject,
        _repo: &str,
        _action: Action,
    ) -> std::result::Result<(), AuthError> {
        Ok(())
    }

    fn challenge(&self) -> Challenge {
        Challenge::basic(&self.realm)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn basic_auth_accepts_matching_credentials() {
        let adapter = BasicAuth::new("test", "alice", "hunter2");
        let header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("alice:hunter2")
        );
        let subject = adapter.authenticate(Some(&header)).await.unwrap();
        assert_eq!(subject.name, "alice");
    }

    #[tokio::test]
    async fn basic_auth_rejects_bad_password() {
        let adapter = BasicAuth::new("test", "alice", "hunter2");
        let header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("alice:wrong")
        );
        assert!(adapter.authenticate(Some(&header)).await.is_err());
    }

    #[tokio::test]
    async fn basic_auth_rejects_missing_header() {
        let adapter = BasicAuth::new("test", "alice", "hunter2");
        assert!(adapter.authenticate(None).await.is_err());
    }

    #[tokio::test]
    async fn allow_all_accepts_anything() {
        let adapter = AllowAll::new("test");
        let subject = adapter.authenticate(None).await.unwrap();
        assert_eq!(subject, Subject::anonymous());
    }
}
