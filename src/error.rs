/*
 * Responsibility
 * - 認可失敗の分類 (AuthError) と HTTP status への対応
 * - クライアントに返してよいメッセージ (ErrorResponse) の組み立て
 *
 * Notes
 * - client fault (401) と infrastructure fault (503) は必ず区別する
 * - upstream のエラー文字列は外に出さない (ログにだけ残す)
 */
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::gate::{AuthorizationDecision, DenyReason};
use crate::services::auth::introspection::IntrospectionError;

pub const UNAUTHORIZED_CODE: &str = "UNAUTHORIZED";
pub const SERVICE_UNAVAILABLE_CODE: &str = "SERVICE_UNAVAILABLE";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "authorization service unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing or malformed credential")]
    ClientCredential,
    #[error("inactive token")]
    TokenInactive,
    #[error("authorization server unreachable: {0}")]
    UpstreamTransport(String),
    #[error("authorization server error: {0}")]
    UpstreamServer(String),
    #[error("service credential misconfigured: {0}")]
    ServiceMisconfiguration(String),
}

impl AuthError {
    /// `None` for `Authorized`.
    pub fn from_decision(decision: AuthorizationDecision) -> Option<Self> {
        match decision {
            AuthorizationDecision::Authorized { .. } => None,
            AuthorizationDecision::Denied { reason } => Some(reason.into()),
            AuthorizationDecision::ServiceError { cause } => Some(cause.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::ClientCredential | AuthError::TokenInactive => StatusCode::UNAUTHORIZED,
            AuthError::UpstreamTransport(_)
            | AuthError::UpstreamServer(_)
            | AuthError::ServiceMisconfiguration(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn is_client_fault(&self) -> bool {
        self.status() == StatusCode::UNAUTHORIZED
    }

    /// Body safe to show to the caller.
    pub fn to_response(&self) -> ErrorResponse {
        let error = if self.is_client_fault() {
            ErrorBody {
                code: UNAUTHORIZED_CODE,
                message: self.to_string(),
            }
        } else {
            ErrorBody {
                code: SERVICE_UNAVAILABLE_CODE,
                message: SERVICE_UNAVAILABLE_MESSAGE.into(),
            }
        };

        ErrorResponse { error }
    }
}

impl From<DenyReason> for AuthError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::MissingCredential => AuthError::ClientCredential,
            DenyReason::InactiveToken => AuthError::TokenInactive,
        }
    }
}

impl From<IntrospectionError> for AuthError {
    fn from(e: IntrospectionError) -> Self {
        match e {
            IntrospectionError::Transport(msg) => AuthError::UpstreamTransport(msg),
            IntrospectionError::Server(msg) => AuthError::UpstreamServer(msg),
            IntrospectionError::CredentialConfig(msg) => AuthError::ServiceMisconfiguration(msg),
        }
    }
}
