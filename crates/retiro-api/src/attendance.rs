//! Handler for the `/attendance` read endpoint.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use retiro_core::{attendance::AttendanceRecord, mailer::Mailer, store::RetiroStore};
use retiro_engine::WithdrawalService;

use crate::{
  actor::ActorIdentity,
  error::{ApiError, store_error},
};

#[derive(Debug, Deserialize)]
pub struct AttendanceParams {
  pub student_id: Uuid,
  pub date:       NaiveDate,
}

/// `GET /attendance?student_id=<id>&date=<YYYY-MM-DD>` — the reconciled
/// daily record, 404 if the day has no record yet.
pub async fn get_for_day<S, M>(
  State(service): State<Arc<WithdrawalService<S, M>>>,
  _actor: ActorIdentity,
  Query(params): Query<AttendanceParams>,
) -> Result<Json<AttendanceRecord>, ApiError>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  let record = service
    .store()
    .attendance_for(params.student_id, params.date)
    .await
    .map_err(store_error)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no attendance record for student {} on {}",
        params.student_id, params.date
      ))
    })?;
  Ok(Json(record))
}
