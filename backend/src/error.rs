use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::{ErrorCode, ErrorResponse, FilterError, ValidationError, VoteError};
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Invalid id")]
    InvalidId,
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InconsistentVote(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("CSRF token expired, please retry with the new token")]
    CsrfExpired(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::InvalidId => Status::BadRequest,
            ApiError::InvalidInput(_) => Status::BadRequest,
            ApiError::InconsistentVote(_) => Status::BadRequest,
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::RateLimited(_) => Status::TooManyRequests,
            ApiError::CsrfExpired(_) => Status::Forbidden,
            ApiError::Database(_) => Status::InternalServerError,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::InvalidId | ApiError::InvalidInput(_) => ErrorCode::InvalidInput,
            ApiError::InconsistentVote(_) => ErrorCode::InconsistentVote,
            ApiError::Unauthorized => ErrorCode::Unauthorized,
            ApiError::Forbidden(_) => ErrorCode::Forbidden,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::RateLimited(_) => ErrorCode::RateLimited,
            ApiError::CsrfExpired(_) => ErrorCode::TokenExpired,
            ApiError::Database(_) | ApiError::Internal(_) => ErrorCode::SystemError,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        match self {
            ApiError::CsrfExpired(token) => ErrorResponse::with_token(self.code(), self.to_string(), token.clone()),
            _ => ErrorResponse::new(self.code(), self.to_string()),
        }
    }
}

impl From<VoteError> for ApiError {
    fn from(e: VoteError) -> Self {
        match e {
            VoteError::InconsistentSnapshot => ApiError::InconsistentVote(e.to_string()),
            VoteError::MissingVoter | VoteError::MissingTarget => ApiError::InvalidInput(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::InvalidInput(e.to_string())
    }
}

impl From<FilterError> for ApiError {
    fn from(e: FilterError) -> Self {
        ApiError::InvalidInput(e.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource"),
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation => ApiError::Conflict(match db.constraint() {
                    Some(c) if c.contains("username") => "Username is already taken".into(),
                    Some(c) if c.contains("email") => "Email is already registered".into(),
                    Some(c) if c.contains("pkey") => "Resource already exists".into(),
                    _ => "Duplicate value".into(),
                }),
                ErrorKind::ForeignKeyViolation => ApiError::NotFound("Referenced resource"),
                ErrorKind::CheckViolation => {
                    ApiError::Conflict("Vote state changed, reload and try again".into())
                }
                _ => ApiError::Database(e.to_string()),
            },
            _ => ApiError::Database(e.to_string()),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{} {} failed: {}", req.method(), req.uri(), self);
        }

        rocket::Response::build_from(Json(self.body()).respond_to(req)?)
            .status(status)
            .ok()
    }
}
