//! Handlers for `/withdrawals` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/withdrawals` | Optional `?student_id`, `?date`, `?state` |
//! | `POST`   | `/withdrawals` | Body: [`CreateBody`]; returns 201 `{id, state}` |
//! | `GET`    | `/withdrawals/:id` | 404 if not found |
//! | `DELETE` | `/withdrawals/:id` | Only while pending |
//! | `POST`   | `/withdrawals/:id/authorize` | Admin only |
//! | `POST`   | `/withdrawals/:id/reject` | Admin only; body `{"reason": ...}` |
//! | `POST`   | `/withdrawals/:id/complete` | Staff only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use retiro_core::{
  actor::ActorRole,
  mailer::Mailer,
  store::{RetiroStore, WithdrawalQuery},
  withdrawal::{Withdrawal, WithdrawalOrigin, WithdrawalState},
};
use retiro_engine::{CreateWithdrawal, WithdrawalService};

use crate::{
  actor::ActorIdentity,
  error::{ApiError, store_error},
};

type Service<S, M> = Arc<WithdrawalService<S, M>>;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub student_id: Option<Uuid>,
  pub date:       Option<NaiveDate>,
  pub state:      Option<WithdrawalState>,
}

/// `GET /withdrawals[?student_id=..][&date=..][&state=..]`
pub async fn list<S, M>(
  State(service): State<Service<S, M>>,
  _actor: ActorIdentity,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Withdrawal>>, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  let query = WithdrawalQuery {
    student_id: params.student_id,
    date:       params.date,
    state:      params.state,
  };
  let withdrawals = service
    .store()
    .list_withdrawals(&query)
    .await
    .map_err(store_error)?;
  Ok(Json(withdrawals))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /withdrawals`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub student_id:          Uuid,
  pub date:                String,
  pub time:                String,
  pub category:            String,
  pub origin:              WithdrawalOrigin,
  pub section_id:          Option<Uuid>,
  pub contact_medium:      Option<String>,
  pub guardian_contacted:  Option<String>,
  pub guardian_authorized: Option<String>,
  pub notes:               Option<String>,
}

impl From<CreateBody> for CreateWithdrawal {
  fn from(b: CreateBody) -> Self {
    CreateWithdrawal {
      student_id:          b.student_id,
      date:                b.date,
      time:                b.time,
      category:            b.category,
      origin:              b.origin,
      section_id:          b.section_id,
      contact_medium:      b.contact_medium,
      guardian_contacted:  b.guardian_contacted,
      guardian_authorized: b.guardian_authorized,
      notes:               b.notes,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
  pub id:    Uuid,
  pub state: WithdrawalState,
}

/// `POST /withdrawals` — returns 201 + `{id, state}`.
pub async fn create<S, M>(
  State(service): State<Service<S, M>>,
  ActorIdentity(actor): ActorIdentity,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  let withdrawal = service.create(actor, body.into()).await?;
  Ok((
    StatusCode::CREATED,
    Json(CreatedResponse {
      id:    withdrawal.withdrawal_id,
      state: withdrawal.state,
    }),
  ))
}

// ─── Get one / delete ─────────────────────────────────────────────────────────

/// `GET /withdrawals/:id`
pub async fn get_one<S, M>(
  State(service): State<Service<S, M>>,
  _actor: ActorIdentity,
  Path(id): Path<Uuid>,
) -> Result<Json<Withdrawal>, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  let withdrawal = service
    .store()
    .get_withdrawal(id)
    .await
    .map_err(store_error)?
    .ok_or_else(|| ApiError::NotFound(format!("withdrawal {id} not found")))?;
  Ok(Json(withdrawal))
}

/// `DELETE /withdrawals/:id` — 204, only while the request is pending.
pub async fn delete_one<S, M>(
  State(service): State<Service<S, M>>,
  _actor: ActorIdentity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  service.delete(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Transitions ──────────────────────────────────────────────────────────────

fn require_admin(actor: retiro_core::actor::Actor) -> Result<(), ApiError> {
  if actor.role != ActorRole::Admin {
    return Err(ApiError::Forbidden(
      "only administrative users may authorize or reject withdrawals".into(),
    ));
  }
  Ok(())
}

/// `POST /withdrawals/:id/authorize`
pub async fn authorize<S, M>(
  State(service): State<Service<S, M>>,
  ActorIdentity(actor): ActorIdentity,
  Path(id): Path<Uuid>,
) -> Result<Json<Withdrawal>, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  require_admin(actor)?;
  let withdrawal = service.authorize(id, actor).await?;
  Ok(Json(withdrawal))
}

/// JSON body accepted by `POST /withdrawals/:id/reject`; `{}` is valid.
#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
  #[serde(default)]
  pub reason: Option<String>,
}

/// `POST /withdrawals/:id/reject`
pub async fn reject<S, M>(
  State(service): State<Service<S, M>>,
  ActorIdentity(actor): ActorIdentity,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<Withdrawal>, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  require_admin(actor)?;
  let withdrawal = service.reject(id, actor, body.reason).await?;
  Ok(Json(withdrawal))
}

/// `POST /withdrawals/:id/complete` — physical hand-off confirmed.
pub async fn complete<S, M>(
  State(service): State<Service<S, M>>,
  ActorIdentity(actor): ActorIdentity,
  Path(id): Path<Uuid>,
) -> Result<Json<Withdrawal>, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  if !actor.role.is_staff() {
    return Err(ApiError::Forbidden(
      "only staff may confirm a completed hand-off".into(),
    ));
  }
  let withdrawal = service.complete(id).await?;
  Ok(Json(withdrawal))
}
