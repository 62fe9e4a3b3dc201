use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::billing::catalog::CatalogError;
use crate::billing::provider::ProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("billing provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Message(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Db(_) | AppError::Message(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(?self);
        (status, self.to_string()).into_response()
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => AppError::NotFound,
            CatalogError::Db(err) => AppError::Db(err),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
