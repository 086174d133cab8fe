use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    #[error("Invalid input provided")]
    InvalidInput,
    #[error("Inconsistent vote state")]
    InconsistentVote,
    #[error("Resource not found")]
    NotFound,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Operation not permitted")]
    Forbidden,
    #[error("Resource conflict")]
    Conflict,
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Request token expired")]
    TokenExpired,
    #[error("Internal system error")]
    SystemError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self { error: error.into(), code, csrf_token: None }
    }

    pub fn with_token(code: ErrorCode, error: impl Into<String>, token: impl Into<String>) -> Self {
        Self { error: error.into(), code, csrf_token: Some(token.into()) }
    }
}
