use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const INCORRECT_CREDENTIALS: &str = "Incorrect username or password";
pub const INVALID_TOKEN: &str = "Could not validate credentials";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    Expired,

    #[error("email already registered")]
    Conflict,

    #[error("{0}")]
    Validation(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepoError),

    #[error("hash error: {0}")]
    Hash(String),

    #[error("token signing error: {0}")]
    Token(String),
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepoError::Duplicate(db_err.message().to_string())
            }
            other => RepoError::Database(other.to_string()),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::UserNotFound
            | AuthError::InvalidToken
            | AuthError::Expired => StatusCode::UNAUTHORIZED,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Repository(_) | AuthError::Hash(_) | AuthError::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client. Lookup misses and password mismatches share one text.
    pub fn detail(&self) -> String {
        match self {
            AuthError::InvalidCredentials | AuthError::UserNotFound => {
                INCORRECT_CREDENTIALS.to_string()
            }
            AuthError::InvalidToken | AuthError::Expired => INVALID_TOKEN.to_string(),
            AuthError::Conflict => "Email already registered".to_string(),
            AuthError::Validation(msg) => msg.clone(),
            AuthError::Repository(_) | AuthError::Hash(_) | AuthError::Token(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let mut res = (status, Json(json!({ "detail": self.detail() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}
