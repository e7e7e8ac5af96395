//! Actor extraction from forwarded identity headers.
//!
//! The platform's auth proxy authenticates the caller and forwards their id
//! and role in `x-actor-id` / `x-actor-role`. This service trusts those
//! headers; transport-level authentication is out of scope here.

use axum::{extract::FromRequestParts, http::request::Parts};
use retiro_core::actor::{Actor, ActorRole};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extractor wrapper for the authenticated [`Actor`].
#[derive(Debug, Clone, Copy)]
pub struct ActorIdentity(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
  parts
    .headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
}

impl<S: Send + Sync> FromRequestParts<S> for ActorIdentity {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let id: Uuid = header(parts, ACTOR_ID_HEADER)?
      .parse()
      .map_err(|_| ApiError::Unauthorized(format!("malformed {ACTOR_ID_HEADER}")))?;
    let role: ActorRole = header(parts, ACTOR_ROLE_HEADER)?
      .parse()
      .map_err(|_| ApiError::Unauthorized(format!("malformed {ACTOR_ROLE_HEADER}")))?;
    Ok(Self(Actor::new(id, role)))
  }
}
