// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! API error type and classification.
//!
//! Every error response carries a machine-readable `kind` plus a
//! human-readable message. Internal identifiers and backtraces are never
//! exposed to callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StorageError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// Malformed or missing input. Client fault, never retried automatically.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    /// Content hash uniqueness violation.
    pub fn duplicate_hash(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "duplicate_hash", message)
    }

    /// Non-hash uniqueness conflicts (email, wallet address).
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Missing or invalid credentials.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication_error", message)
    }

    /// Caller lacks rights over the targeted resource.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "authorization_error", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
    }

    /// External chain node or content store unreachable or timed out.
    /// Safe for the caller to retry with backoff.
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream_unavailable",
            message,
        )
    }

    /// The backing store itself failed. Logged, not retried in-process.
    pub fn storage_fault(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_fault", message)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::not_found(format!("{what} not found")),
            StorageError::DuplicateHash(hash) => {
                Self::duplicate_hash(format!("File with hash {hash} already exists"))
            }
            StorageError::AlreadyExists(what) => Self::conflict(format!("{what} already exists")),
            other => {
                tracing::error!(error = %other, "storage fault");
                Self::storage_fault("Storage operation failed")
            }
        }
    }
}

impl From<crate::chain::ChainError> for ApiError {
    fn from(err: crate::chain::ChainError) -> Self {
        use crate::chain::ChainError;
        match err {
            ChainError::InvalidAddress(msg) => Self::validation(format!("Invalid address: {msg}")),
            ChainError::InvalidHash(msg) => {
                Self::validation(format!("Invalid transaction hash: {msg}"))
            }
            ChainError::InvalidRpcUrl(msg) => {
                tracing::error!(error = %msg, "misconfigured RPC URL");
                Self::storage_fault("Chain client misconfigured")
            }
            ChainError::Timeout => Self::upstream_unavailable("Chain RPC timed out"),
            ChainError::Rpc(msg) => {
                tracing::warn!(error = %msg, "chain RPC failed");
                Self::upstream_unavailable("Chain RPC unavailable")
            }
        }
    }
}

impl From<crate::providers::IpfsError> for ApiError {
    fn from(err: crate::providers::IpfsError) -> Self {
        tracing::warn!(error = %err, "IPFS request failed");
        Self::upstream_unavailable("IPFS node unavailable")
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        Self::new(err.status_code(), err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            kind: self.kind.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_kind_and_message() {
        let dup = ApiError::duplicate_hash("taken");
        assert_eq!(dup.status, StatusCode::CONFLICT);
        assert_eq!(dup.kind, "duplicate_hash");
        assert_eq!(dup.message, "taken");

        let bad = ApiError::validation("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.kind, "validation_error");

        let upstream = ApiError::upstream_unavailable("node down");
        assert_eq!(upstream.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(upstream.kind, "upstream_unavailable");
    }

    #[test]
    fn storage_errors_map_to_api_classification() {
        let not_found: ApiError = StorageError::NotFound("File record".into()).into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let dup: ApiError = StorageError::DuplicateHash("deadbeef".into()).into();
        assert_eq!(dup.status, StatusCode::CONFLICT);
        assert_eq!(dup.kind, "duplicate_hash");

        let fault: ApiError = StorageError::Serde(
            serde_json::from_str::<serde_json::Value>("not json").unwrap_err(),
        )
        .into();
        assert_eq!(fault.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fault.kind, "storage_fault");
        // Internal details are not leaked to the caller
        assert_eq!(fault.message, "Storage operation failed");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::validation("fileName is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"], "fileName is required");
        assert_eq!(body["kind"], "validation_error");
    }
}
