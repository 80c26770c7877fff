use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error codes from the OCI Distribution specification, plus the
/// `EXT_BLOB_UPLOAD_OUT_OF_ORDER` extension used for chunk ordering violations.
///
/// The ordinal values have no wire meaning; `Display` renders the wire-format `SCREAMING_SNAKE`
/// code used in the JSON error envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistributionErrorCode {
    BlobUnknown,
    BlobUploadInvalid,
    BlobUploadUnknown,
    DigestInvalid,
    ManifestBlobUnknown,
    ManifestInvalid,
    ManifestUnknown,
    NameInvalid,
    NameUnknown,
    SizeInvalid,
    Unauthorized,
    Denied,
    Unsupported,
    TooManyRequests,
    ExtBlobUploadOutOfOrder,
}

impl DistributionErrorCode {
    /// HTTP status mapping, normative per the distribution error taxonomy.
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Self::BlobUnknown => StatusCode::NOT_FOUND,
            Self::BlobUploadUnknown => StatusCode::NOT_FOUND,
            Self::BlobUploadInvalid => StatusCode::BAD_REQUEST,
            Self::DigestInvalid => StatusCode::BAD_REQUEST,
            Self::ManifestUnknown => StatusCode::NOT_FOUND,
            Self::ManifestInvalid => StatusCode::BAD_REQUEST,
            Self::ManifestBlobUnknown => StatusCode::BAD_REQUEST,
            Self::NameInvalid => StatusCode::BAD_REQUEST,
            Self::NameUnknown => StatusCode::NOT_FOUND,
            Self::SizeInvalid => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Denied => StatusCode::FORBIDDEN,
            Self::Unsupported => StatusCode::METHOD_NOT_ALLOWED,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::ExtBlobUploadOutOfOrder => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::BlobUnknown => "blob unknown to registry",
            Self::BlobUploadUnknown => "blob upload unknown to registry",
            Self::BlobUploadInvalid => "blob upload invalid",
            Self::DigestInvalid => "provided digest did not match uploaded content",
            Self::ManifestUnknown => "manifest unknown",
            Self::ManifestInvalid => "manifest invalid",
            Self::ManifestBlobUnknown => "manifest references a blob unknown to the repository",
            Self::NameInvalid => "invalid repository name",
            Self::NameUnknown => "repository name not known to registry",
            Self::SizeInvalid => "provided length did not match content length",
            Self::Unauthorized => "authentication required",
            Self::Denied => "requested access to the resource is denied",
            Self::Unsupported => "the operation is unsupported",
            Self::TooManyRequests => "too many requests",
            Self::ExtBlobUploadOutOfOrder => "blob upload chunk out of order",
        }
    }
}

impl std::fmt::Display for DistributionErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BlobUnknown => "BLOB_UNKNOWN",
            Self::BlobUploadInvalid => "BLOB_UPLOAD_INVALID",
            Self::BlobUploadUnknown => "BLOB_UPLOAD_UNKNOWN",
            Self::DigestInvalid => "DIGEST_INVALID",
            Self::ManifestBlobUnknown => "MANIFEST_BLOB_UNKNOWN",
            Self::ManifestInvalid => "MANIFEST_INVALID",
            Self::ManifestUnknown => "MANIFEST_UNKNOWN",
            Self::NameInvalid => "NAME_INVALID",
            Self::NameUnknown => "NAME_UNKNOWN",
            Self::SizeInvalid => "SIZE_INVALID",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Denied => "DENIED",
            Self::Unsupported => "UNSUPPORTED",
            Self::TooManyRequests => "TOOMANYREQUESTS",
            Self::ExtBlobUploadOutOfOrder => "EXT_BLOB_UPLOAD_OUT_OF_ORDER",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RegistryErrorCode {
    /// content (eg a blob) is still referenced elsewhere and cannot be removed outright.
    ContentReferenced = 99,
}

/// Top level error type shared across `registry_core`, the storage adapter crates, and
/// `registry_http`. Backend-specific error types (sqlx, aws-sdk-s3, ...) are expected to carry
/// their own enums and convert into this one at the `registry::*Store` trait seams via `Into`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(String),

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("blob unknown to registry{}", detail_suffix(.0))]
    BlobUnknown(Option<String>),
    #[error("blob upload invalid{}", detail_suffix(.0))]
    BlobUploadInvalid(Option<String>),
    #[error("blob upload session unknown to registry{}", detail_suffix(.0))]
    BlobUploadUnknown(Option<String>),
    #[error("blob upload chunk out of order{}", detail_suffix(.0))]
    BlobUploadOutOfOrder(Option<String>),
    #[error("digest did not match uploaded content{}", detail_suffix(.0))]
    DigestInvalid(Option<String>),
    #[error("provided length did not match content length{}", detail_suffix(.0))]
    SizeInvalid(Option<String>),
    #[error("blob upload session writer already finished")]
    BlobWriterFinished,

    #[error("manifest unknown to registry{}", detail_suffix(.0))]
    ManifestUnknown(Option<String>),
    #[error("manifest invalid{}", detail_suffix(.0))]
    ManifestInvalid(Option<String>),
    #[error("manifest references a blob unknown to the repository{}", detail_suffix(.0))]
    ManifestBlobUnknown(Option<String>),

    #[error("invalid repository name{}", detail_suffix(.0))]
    NameInvalid(Option<String>),
    #[error("repository name not known to registry{}", detail_suffix(.0))]
    NameUnknown(Option<String>),

    #[error("authentication required{}", detail_suffix(.0))]
    Unauthorized(Option<String>),
    #[error("access denied{}", detail_suffix(.0))]
    Denied(Option<String>),
    #[error("unsupported operation{}", detail_suffix(.0))]
    Unsupported(Option<String>),
    #[error("too many requests{}", detail_suffix(.0))]
    TooManyRequests(Option<String>),

    #[error("distribution spec error: {0}")]
    DistributionSpecError(DistributionErrorCode),

    #[error("registry spec error: {0:?}")]
    RegistrySpecError(RegistryErrorCode),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}

impl Error {
    /// Maps this error onto the OCI Distribution error code used to render the JSON error
    /// envelope and select the HTTP response status.
    pub fn code(&self) -> DistributionErrorCode {
        match self {
            Self::InvalidDigest(_) => DistributionErrorCode::DigestInvalid,
            Self::UnsupportedDigestAlgorithm(_) => DistributionErrorCode::DigestInvalid,
            Self::BackendError(_) => DistributionErrorCode::Unsupported,
            Self::BlobUnknown(_) => DistributionErrorCode::BlobUnknown,
            Self::BlobUploadInvalid(_) => DistributionErrorCode::BlobUploadInvalid,
            Self::BlobUploadUnknown(_) => DistributionErrorCode::BlobUploadUnknown,
            Self::BlobUploadOutOfOrder(_) => DistributionErrorCode::ExtBlobUploadOutOfOrder,
            Self::DigestInvalid(_) => DistributionErrorCode::DigestInvalid,
            Self::SizeInvalid(_) => DistributionErrorCode::SizeInvalid,
            Self::BlobWriterFinished => DistributionErrorCode::BlobUploadInvalid,
            Self::ManifestUnknown(_) => DistributionErrorCode::ManifestUnknown,
            Self::ManifestInvalid(_) => DistributionErrorCode::ManifestInvalid,
            Self::ManifestBlobUnknown(_) => DistributionErrorCode::ManifestBlobUnknown,
            Self::NameInvalid(_) => DistributionErrorCode::NameInvalid,
            Self::NameUnknown(_) => DistributionErrorCode::NameUnknown,
            Self::Unauthorized(_) => DistributionErrorCode::Unauthorized,
            Self::Denied(_) => DistributionErrorCode::Denied,
            Self::Unsupported(_) => DistributionErrorCode::Unsupported,
            Self::TooManyRequests(_) => DistributionErrorCode::TooManyRequests,
            Self::DistributionSpecError(c) => *c,
            Self::RegistrySpecError(_) => DistributionErrorCode::Unsupported,
        }
    }

    /// Detail message to surface in the JSON error envelope, falling back to the distribution
    /// code's default message when no specific detail was attached.
    pub fn detail_message(&self) -> String {
        match self {
            Self::InvalidDigest(s) | Self::UnsupportedDigestAlgorithm(s) | Self::BackendError(s) => {
                s.clone()
            }
            Self::BlobUnknown(d)
            | Self::BlobUploadInvalid(d)
            | Self::BlobUploadUnknown(d)
            | Self::BlobUploadOutOfOrder(d)
            | Self::DigestInvalid(d)
            | Self::SizeInvalid(d)
            | Self::ManifestUnknown(d)
            | Self::ManifestInvalid(d)
            | Self::ManifestBlobUnknown(d)
            | Self::NameInvalid(d)
            | Self::NameUnknown(d)
            | Self::Unauthorized(d)
            | Self::Denied(d)
            | Self::Unsupported(d)
            | Self::TooManyRequests(d) => d.clone().unwrap_or_else(|| self.code().default_message().to_string()),
            Self::BlobWriterFinished => self.code().default_message().to_string(),
            Self::DistributionSpecError(c) => c.default_message().to_string(),
            Self::RegistrySpecError(_) => format!("{self}"),
        }
    }

    pub fn status_code(&self) -> http::StatusCode {
        match self {
            // content still referenced: not part of the distribution taxonomy, map to 409.
            Self::RegistrySpecError(RegistryErrorCode::ContentReferenced) => {
                http::StatusCode::CONFLICT
            }
            // transient storage I/O, not a client error; §7 requires these surface as 5xx rather
            // than be folded into the client-facing UNSUPPORTED (405) code.
            Self::BackendError(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            other => other.code().status_code(),
        }
    }
}
