//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body is `{"error": {"kind": ..., "message": ...}}` so callers
//! can branch on the kind without parsing the message.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  fn kind(&self) -> &'static str {
    match self {
      Self::Unauthorized(_) => "unauthorized",
      Self::Forbidden(_) => "forbidden",
      Self::NotFound(_) => "not_found",
      Self::Validation(_) => "validation",
      Self::Conflict(_) => "invalid_state_transition",
      Self::Internal(_) => "internal",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Self::Forbidden(_) => StatusCode::FORBIDDEN,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Self::Conflict(_) => StatusCode::CONFLICT,
      Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<retiro_core::Error> for ApiError {
  fn from(e: retiro_core::Error) -> Self {
    use retiro_core::Error as E;
    match &e {
      E::Validation { .. } => Self::Validation(e.to_string()),
      E::StudentNotFound(_) | E::WithdrawalNotFound(_) => {
        Self::NotFound(e.to_string())
      }
      E::InvalidStateTransition { .. } | E::NotDeletable { .. } => {
        Self::Conflict(e.to_string())
      }
      E::Transaction(_) => Self::Internal(e.to_string()),
    }
  }
}

/// Map a raw store error (from a read-only handler) to a 500.
pub fn store_error<E: std::error::Error>(e: E) -> ApiError {
  ApiError::Internal(e.to_string())
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = json!({
      "error": { "kind": self.kind(), "message": self.to_string() }
    });
    (status, Json(body)).into_response()
  }
}
