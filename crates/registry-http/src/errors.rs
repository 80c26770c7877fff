use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use thiserror;

use registry_core::Error as CoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http invalid header name")]
    HTTPInvalidHeaderName(#[from] http::header::InvalidHeaderName),
    #[error("http invalid header value")]
    HTTPInvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("missing query parameter: {0}")]
    MissingQueryParameter(&'static str),
    #[error("missing header: {0}")]
    MissingHeader(&'static str),
    #[error("missing path parameter: {0}")]
    MissingPathParameter(&'static str),

    #[error(transparent)]
    Registry(#[from] CoreError),
}

/// The error envelope all 4xx/5xx responses carry, per the distribution spec's error format.
#[derive(Debug, Serialize)]
struct ErrorInfo {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorInfo>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Registry(e) => {
                let status = e.status_code();
                let body = ErrorResponse {
                    errors: vec![ErrorInfo {
                        code: e.code().to_string(),
                        message: e.detail_message(),
                    }],
                };
                (status, axum::Json(body)).into_response()
            }
            Error::MissingHeader(_)
            | Error::MissingQueryParameter(_)
            | Error::MissingPathParameter(_) => {
                (StatusCode::BAD_REQUEST, format!("{}", self)).into_response()
            }
            Error::HTTPInvalidHeaderName(_) | Error::HTTPInvalidHeaderValue(_) => {
                tracing::warn!("{:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("internal server error"),
                )
                    .into_response()
            }
        }
    }
}
