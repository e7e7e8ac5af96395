//! [`WithdrawalService`] — the request/approval state machine.
//!
//! Validation and state-machine errors are raised before any store write, so
//! a rejected call has no side effects. Notification dispatch runs strictly
//! after the store transaction commits; its failures never surface here.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use retiro_core::{
  Error, Result,
  actor::Actor,
  attendance::AttendanceUpsert,
  mailer::Mailer,
  store::RetiroStore,
  withdrawal::{
    NewWithdrawal, StateTransition, Withdrawal, WithdrawalEvent,
    WithdrawalOrigin, WithdrawalState,
  },
};

use crate::router;

// ─── Input ───────────────────────────────────────────────────────────────────

/// Input to [`WithdrawalService::create`]. Date and time arrive as strings
/// from the wire and are validated here, not at the API layer, so every
/// caller gets the same strictness.
#[derive(Debug, Clone)]
pub struct CreateWithdrawal {
  pub student_id:          Uuid,
  /// Calendar date, `YYYY-MM-DD`.
  pub date:                String,
  /// Wall-clock departure time, strict `HH:MM`.
  pub time:                String,
  pub category:            String,
  pub origin:              WithdrawalOrigin,
  /// Resolved from the student record when not supplied.
  pub section_id:          Option<Uuid>,
  pub contact_medium:      Option<String>,
  pub guardian_contacted:  Option<String>,
  pub guardian_authorized: Option<String>,
  pub notes:               Option<String>,
}

// ─── Validation helpers ──────────────────────────────────────────────────────

fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|_| Error::validation("date", format!("expected YYYY-MM-DD, got {s:?}")))
}

/// Strict `HH:MM`: exactly five chars, two digits, a colon, two digits,
/// hour 00-23, minute 00-59.
fn parse_time(s: &str) -> Result<NaiveTime> {
  let bytes = s.as_bytes();
  let well_formed = bytes.len() == 5
    && bytes[0].is_ascii_digit()
    && bytes[1].is_ascii_digit()
    && bytes[2] == b':'
    && bytes[3].is_ascii_digit()
    && bytes[4].is_ascii_digit();
  if !well_formed {
    return Err(Error::validation("time", format!("expected HH:MM, got {s:?}")));
  }

  let hour = u32::from(bytes[0] - b'0') * 10 + u32::from(bytes[1] - b'0');
  let minute = u32::from(bytes[3] - b'0') * 10 + u32::from(bytes[4] - b'0');
  NaiveTime::from_hms_opt(hour, minute, 0)
    .ok_or_else(|| Error::validation("time", format!("{s:?} is out of range")))
}

fn store_err<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Transaction(Box::new(e))
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// The withdrawal state machine over a store and a mail gateway.
///
/// Cloning is cheap; both collaborators are behind `Arc`.
pub struct WithdrawalService<S, M> {
  store:  Arc<S>,
  mailer: Arc<M>,
}

impl<S, M> Clone for WithdrawalService<S, M> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), mailer: Arc::clone(&self.mailer) }
  }
}

impl<S, M> WithdrawalService<S, M>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  pub fn new(store: Arc<S>, mailer: Arc<M>) -> Self { Self { store, mailer } }

  /// The underlying store, for read-only collaborators (API GET handlers).
  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Creation ──────────────────────────────────────────────────────────────

  /// Create a withdrawal request. Always enters at `Pending`, whatever the
  /// actor's role or the declared origin; the attendance record for the
  /// departure day is reconciled inside the same store transaction.
  pub async fn create(
    &self,
    actor: Actor,
    input: CreateWithdrawal,
  ) -> Result<Withdrawal> {
    let date = parse_date(&input.date)?;
    let time = parse_time(&input.time)?;

    let category_name = input.category.trim();
    if category_name.is_empty() {
      return Err(Error::validation("category", "must not be empty"));
    }

    let student = self
      .store
      .get_student(input.student_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::StudentNotFound(input.student_id))?;

    let section_id = input.section_id.unwrap_or(student.section_id);

    let category = self
      .store
      .upsert_category(category_name)
      .await
      .map_err(store_err)?;

    let attendance = AttendanceUpsert::from_departure(
      student.student_id,
      date,
      time,
      actor.user_id,
    );

    let withdrawal = self
      .store
      .create_withdrawal(
        NewWithdrawal {
          student_id: student.student_id,
          institution_id: student.institution_id,
          section_id,
          date,
          time,
          category_id: category.category_id,
          origin: input.origin,
          contact_medium: input.contact_medium,
          guardian_contacted: input.guardian_contacted,
          guardian_authorized: input.guardian_authorized,
          notes: input.notes,
          created_by: actor.user_id,
        },
        attendance,
      )
      .await
      .map_err(store_err)?;

    self.notify(WithdrawalEvent::Created, &withdrawal, actor).await;
    Ok(withdrawal)
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// `Pending → Authorized`, recording the acting verifier.
  pub async fn authorize(&self, id: Uuid, actor: Actor) -> Result<Withdrawal> {
    let withdrawal = self
      .transition(id, StateTransition {
        from:        WithdrawalState::Pending,
        to:          WithdrawalState::Authorized,
        verified_by: Some(actor.user_id),
        reason:      None,
      })
      .await?;

    self.notify(WithdrawalEvent::Authorized, &withdrawal, actor).await;
    Ok(withdrawal)
  }

  /// `Pending → Rejected`, recording the verifier and an optional reason.
  pub async fn reject(
    &self,
    id: Uuid,
    actor: Actor,
    reason: Option<String>,
  ) -> Result<Withdrawal> {
    let withdrawal = self
      .transition(id, StateTransition {
        from:        WithdrawalState::Pending,
        to:          WithdrawalState::Rejected,
        verified_by: Some(actor.user_id),
        reason,
      })
      .await?;

    self.notify(WithdrawalEvent::Rejected, &withdrawal, actor).await;
    Ok(withdrawal)
  }

  /// `Authorized → Completed` — physical hand-off confirmed. No event.
  pub async fn complete(&self, id: Uuid) -> Result<Withdrawal> {
    self
      .transition(id, StateTransition {
        from:        WithdrawalState::Authorized,
        to:          WithdrawalState::Completed,
        verified_by: None,
        reason:      None,
      })
      .await
  }

  /// Delete a request that is still `Pending`. Anything later is part of
  /// the approval audit trail and can no longer be removed.
  pub async fn delete(&self, id: Uuid) -> Result<()> {
    let deleted = self
      .store
      .delete_withdrawal(id, WithdrawalState::Pending)
      .await
      .map_err(store_err)?;
    if deleted {
      return Ok(());
    }

    let current = self
      .store
      .get_withdrawal(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::WithdrawalNotFound(id))?;
    Err(Error::NotDeletable { id, state: current.state })
  }

  /// Apply a guarded transition; a compare-and-set miss is surfaced as
  /// [`Error::InvalidStateTransition`] with the state actually found, never
  /// silently ignored.
  async fn transition(
    &self,
    id: Uuid,
    transition: StateTransition,
  ) -> Result<Withdrawal> {
    let to = transition.to;
    match self
      .store
      .transition_withdrawal(id, transition)
      .await
      .map_err(store_err)?
    {
      Some(withdrawal) => Ok(withdrawal),
      None => {
        let current = self
          .store
          .get_withdrawal(id)
          .await
          .map_err(store_err)?
          .ok_or(Error::WithdrawalNotFound(id))?;
        Err(Error::InvalidStateTransition { from: current.state, to })
      }
    }
  }

  // ── Dispatch ──────────────────────────────────────────────────────────────

  /// Fan the event out. Runs only after the transaction committed; every
  /// failure inside is logged by the router and swallowed here.
  async fn notify(
    &self,
    event: WithdrawalEvent,
    withdrawal: &Withdrawal,
    actor: Actor,
  ) {
    let summary =
      router::dispatch(&self.store, &self.mailer, event, withdrawal, actor)
        .await;
    debug!(
      withdrawal = %withdrawal.withdrawal_id,
      event = ?event,
      recipients = summary.recipients,
      inapp_failures = summary.inapp_failures,
      email_attempts = summary.email_attempts,
      email_failures = summary.email_failures,
      "notification fan-out finished"
    );
  }
}
