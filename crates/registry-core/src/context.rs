//! # ContextExtractor
//!
//! Parses the tail of a `/v2/...` request path into a [`Context`]: which repository, which
//! endpoint, and which resource within it. This happens before authentication/authorization so
//! that the AuthAdapter can authorize per-repository without re-parsing the path itself.
use crate::auth::{Action, Subject};
use crate::errors::{DistributionErrorCode, Error};

/// Which of the distribution API's endpoint families a request targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Ping,
    TagsList,
    BlobsUploads,
    Blobs,
    Manifests,
}

/// Request-scoped carrier built from the URL path and method, before authorization runs.
#[derive(Clone, Debug)]
pub struct Context {
    pub repo: String,
    pub endpoint: Endpoint,
    pub resource_id: Option<String>,
    pub method: http::Method,
    pub subject: Option<Subject>,
}

impl Context {
    /// The action implied by this request's method, per §4.6.
    pub fn action(&self) -> Action {
        Action::from_method(&self.method)
    }
}

/// Parse the path segments following the `/v2` mount point (already split on `/`, with empty
/// segments from a trailing slash removed) into `(repo, endpoint, resource_id)`.
///
/// Mirrors §4.5's "parsed from the tail" algorithm: the last one or two segments identify the
/// endpoint and optional resource, and everything before that is the (possibly multi-component)
/// repository name.
pub fn parse_path<'a>(
    segments: &'a [&'a str],
) -> std::result::Result<(String, Endpoint, Option<String>), Error> {
    if segments.is_empty() {
        return Ok((String::new(), Endpoint::Ping, None));
    }

    let n = segments.len();

    if n >= 2 && segments[n - 2] == "tags" && segments[n - 1] == "list" {
        let repo = segments[..n - 2].join("/");
        return Ok((repo, Endpoint::TagsList, None));
    }

    if n >= 2 && segments[n - 2] == "blobs" && segments[n - 1] == "uploads" {
        let repo = segments[..n - 2].join("/");
        return Ok((repo, Endpoint::BlobsUploads, None));
    }

    if n >= 3 && segments[n - 3] == "blobs" && segments[n - 2] == "uploads" {
        let repo = segments[..n - 3].join("/");
        return Ok((repo, Endpoint::BlobsUploads, Some(segments[n - 1].to_string())));
    }

    if n >= 2 && segments[n - 2] == "blobs" {
        let repo = segments[..n - 2].join("/");
        return Ok((repo, Endpoint::Blobs, Some(segments[n - 1].to_string())));
    }

    if n >= 2 && segments[n - 2] == "manifests" {
        let repo = segments[..n - 2].join("/");
        return Ok((repo, Endpoint::Manifests, Some(segments[n - 1].to_string())));
    }

    Err(Error::DistributionSpecError(DistributionErrorCode::NameInvalid))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_ping() {
        let (repo, endpoint, resource) = parse_path(&[]).unwrap();
        assert_eq!(repo, "");
        assert_eq!(endpoint, Endpoint::Ping);
        assert_eq!(resource, None);
    }

    #[test]
    fn parses_tags_list() {
        let (repo, endpoint, _) = parse_path(&["lib", "x", "tags", "list"]).unwrap();
        assert_eq!(repo, "lib/x");
        assert_eq!(endpoint, Endpoint::TagsList);
    }

    #[test]
    fn parses_blobs_uploads_create() {
        let (repo, endpoint, resource) = parse_path(&["lib", "x", "blobs", "uploads"]).unwrap();
        assert_eq!(repo, "lib/x");
        assert_eq!(endpoint, Endpoint::BlobsUploads);
        assert_eq!(resource, None);
    }

    #[test]
    fn parses_blobs_uploads_session() {
        let (repo, endpoint, resource) =
            parse_path(&["lib", "x", "blobs", "uploads", "abc-123"]).unwrap();
        assert_eq!(repo, "lib/x");
        assert_eq!(endpoint, Endpoint::BlobsUploads);
        assert_eq!(resource, Some("abc-123".to_string()));
    }

    #[test]
    fn parses_blob_by_digest() {
        let (repo, endpoint, resource) =
            parse_path(&["lib", "x", "blobs", "sha256:abcd"]).unwrap();
        assert_eq!(repo, "lib/x");
        assert_eq!(endpoint, Endpoint::Blobs);
        assert_eq!(resource, Some("sha256:abcd".to_string()));
    }

    #[test]
    fn parses_manifest_by_reference() {
        let (repo, endpoint, resource) = parse_path(&["lib", "x", "manifests", "latest"]).unwrap();
        assert_eq!(repo, "lib/x");
        assert_eq!(endpoint, Endpoint::Manifests);
        assert_eq!(resource, Some("latest".to_string()));
    }

    #[test]
    fn single_component_repo_is_allowed() {
        let (repo, endpoint, resource) = parse_path(&["nginx", "manifests", "latest"]).unwrap();
        assert_eq!(repo, "nginx");
        assert_eq!(endpoint, Endpoint::Manifests);
        assert_eq!(resource, Some("latest".to_string()));
    }
}
