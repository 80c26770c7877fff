//! Drives the HTTP surface end-to-end against the in-memory storage adapter via
//! [`tower::ServiceExt::oneshot`], exercising the scenarios and invariants that the
//! storage-level harness in [`super::loader`] never touches: status codes, `Location`/`Range`
//! headers, chunk ordering, digest verification, cross-repository mounts, and tag-delete
//! refusal.
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::middleware;
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;

use registry_core::auth::AllowAll;
use registry_core::config::RegistryConfig;
use registry_http::{auth_and_repository_middleware, Registry};
use registry_storage_memory::MemoryRepositoryFactory;

const HELLO_DIGEST: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
const BOGUS_DIGEST: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9825";

fn test_app() -> Router {
    let manager = MemoryRepositoryFactory::new();
    let auth = Arc::new(AllowAll::new("test"));
    let config = RegistryConfig {
        enable_blob_deletion: true,
        enable_manifest_deletion: true,
        ..Default::default()
    };
    let registry = Registry::new(manager, auth, config);

    registry
        .router()
        .expect("router assembly should not fail")
        .route_layer(middleware::from_fn_with_state(
            registry.clone(),
            auth_and_repository_middleware::<MemoryRepositoryFactory>,
        ))
}

fn header_str(response: &Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("response missing {name} header"))
        .to_str()
        .expect("header value should be valid utf8")
        .to_string()
}

async fn body_bytes(response: Response) -> Bytes {
    hyper::body::to_bytes(response.into_body())
        .await
        .expect("response body should collect")
}

async fn json_error_code(response: Response) -> String {
    let bytes = body_bytes(response).await;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).expect("error response should be valid json");
    value["errors"][0]["code"]
        .as_str()
        .expect("error response should carry a code")
        .to_string()
}

fn req(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .expect("request should build")
}

/// S1 — monolithic upload.
#[tokio::test]
async fn monolithic_upload_commits_and_round_trips() {
    let app = test_app();

    let uri = format!("/v2/s1/blobs/uploads/?digest={HELLO_DIGEST}");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header(header::CONTENT_LENGTH, 5)
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = header_str(&response, "location");
    assert_eq!(location, format!("/v2/s1/blobs/{HELLO_DIGEST}"));

    let response = app
        .clone()
        .oneshot(req("GET", &location, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), b"hello");
}

/// S2 — chunked upload; confirms the `Range` headers fixed in this review (`0-0` on session
/// creation, `0-4` after a 5 byte append) and that the closing PUT commits the buffered chunk.
#[tokio::test]
async fn chunked_upload_sets_range_headers_and_commits() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(req("POST", "/v2/s2/blobs/uploads/", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(header_str(&response, "range"), "0-0");
    let location = header_str(&response, "location");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(&location)
                .header(header::CONTENT_LENGTH, 5)
                .header("content-range", "0-4")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(header_str(&response, "range"), "0-4");

    let put_uri = format!("{location}?digest={HELLO_DIGEST}");
    let response = app
        .clone()
        .oneshot(req("PUT", &put_uri, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let blob_location = format!("/v2/s2/blobs/{HELLO_DIGEST}");
    let response = app
        .clone()
        .oneshot(req("GET", &blob_location, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), b"hello");
}

/// S3 — a chunk that doesn't start at offset 0 on a fresh session is out of order.
#[tokio::test]
async fn out_of_order_chunk_is_rejected() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(req("POST", "/v2/s3/blobs/uploads/", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let location = header_str(&response, "location");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(&location)
                .header(header::CONTENT_LENGTH, 5)
                .header("content-range", "5-9")
                .body(Body::from("later"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(json_error_code(response).await, "EXT_BLOB_UPLOAD_OUT_OF_ORDER");
}

/// S4 — a digest mismatch on commit fails `DIGEST_INVALID` and leaves the session usable for a
/// retry with the correct digest.
#[tokio::test]
async fn digest_mismatch_leaves_session_usable_for_retry() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(req("POST", "/v2/s4/blobs/uploads/", Body::empty()))
        .await
        .unwrap();
    let location = header_str(&response, "location");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(&location)
                .header(header::CONTENT_LENGTH, 5)
                .header("content-range", "0-4")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let bad_put_uri = format!("{location}?digest={BOGUS_DIGEST}");
    let response = app
        .clone()
        .oneshot(req("PUT", &bad_put_uri, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_error_code(response).await, "DIGEST_INVALID");

    let good_put_uri = format!("{location}?digest={HELLO_DIGEST}");
    let response = app
        .clone()
        .oneshot(req("PUT", &good_put_uri, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// S5 — a manifest referencing a config blob absent from the repository is refused.
#[tokio::test]
async fn manifest_with_missing_config_blob_is_rejected() {
    let app = test_app();

    let manifest = serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "digest": "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "size": 2
        },
        "layers": []
    });
    let bytes = serde_json::to_vec(&manifest).unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/v2/s5/manifests/latest")
                .header(header::CONTENT_TYPE, "application/vnd.oci.image.manifest.v1+json")
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_error_code(response).await, "MANIFEST_BLOB_UNKNOWN");
}

/// S6 — mounting a blob that already exists in a source repository into a destination
/// repository succeeds without re-uploading the bytes.
#[tokio::test]
async fn cross_repository_mount_succeeds() {
    let app = test_app();

    let uri = format!("/v2/src/blobs/uploads/?digest={HELLO_DIGEST}");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header(header::CONTENT_LENGTH, 5)
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let mount_uri = format!("/v2/dst/blobs/uploads/?mount={HELLO_DIGEST}&from=src");
    let response = app
        .clone()
        .oneshot(req("POST", &mount_uri, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        header_str(&response, "location"),
        format!("/v2/dst/blobs/{HELLO_DIGEST}")
    );

    let response = app
        .clone()
        .oneshot(req(
            "HEAD",
            &format!("/v2/dst/blobs/{HELLO_DIGEST}"),
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Invariant 6 — deleting a manifest by tag is refused; deleting by digest then fetching the
/// blob returns `BLOB_UNKNOWN`.
#[tokio::test]
async fn tag_delete_is_refused_and_digest_delete_removes_blob() {
    let app = test_app();

    let uri = format!("/v2/s7/blobs/uploads/?digest={HELLO_DIGEST}");
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header(header::CONTENT_LENGTH, 5)
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(req("DELETE", "/v2/s7/manifests/latest", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_error_code(response).await, "MANIFEST_INVALID");

    let blob_location = format!("/v2/s7/blobs/{HELLO_DIGEST}");
    let response = app
        .clone()
        .oneshot(req("DELETE", &blob_location, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .clone()
        .oneshot(req("GET", &blob_location, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_error_code(response).await, "BLOB_UNKNOWN");
}
