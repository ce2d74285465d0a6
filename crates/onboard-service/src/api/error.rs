//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use onboard_core::OnboardError;

/// API error type
///
/// Only batch-level failures become API errors. Per-entry failures are part
/// of a successful batch report.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body is not a manifest
    #[error("Manifest decode error: {0}")]
    ManifestDecode(String),
}

impl ApiError {
    /// Error kind name reported in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ManifestDecode(_) => "ManifestDecodeError",
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::ManifestDecode(_) => (StatusCode::BAD_REQUEST, "MANIFEST_DECODE_ERROR"),
        }
    }
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorResponse {
            kind: self.kind().to_string(),
            code: code.to_string(),
            error: match self {
                ApiError::ManifestDecode(msg) => msg,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Reading the request body only fails with a decode error; any other kind
/// is reported the same way with its full message.
impl From<OnboardError> for ApiError {
    fn from(err: OnboardError) -> Self {
        match err {
            OnboardError::ManifestDecode(msg) => ApiError::ManifestDecode(msg),
            other => ApiError::ManifestDecode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_decode_is_bad_request() {
        let response = ApiError::ManifestDecode("x".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_body_shape() {
        let (_, code) = ApiError::ManifestDecode("x".into()).status_and_code();
        let body = ErrorResponse {
            kind: "ManifestDecodeError".into(),
            error: "manifest must be a JSON array".into(),
            code: code.into(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "ManifestDecodeError");
        assert_eq!(json["code"], "MANIFEST_DECODE_ERROR");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_from_onboard_error() {
        let err: ApiError = OnboardError::ManifestDecode("manifest must be a JSON array".into()).into();
        assert_eq!(err.kind(), "ManifestDecodeError");
        assert_eq!(err.to_string(), "Manifest decode error: manifest must be a JSON array");
    }
}
